/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */


use std::sync::Arc;

use maplit::btreemap;
use maplit::btreeset;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use dvmbm_hw::layout::ClusterCore;
use dvmbm_hw::layout::DieClusters;
use dvmbm_hw::layout::ScopeFields;
use dvmbm_hw::PlatformVariant;
use dvmbm_hw::ShadowScopeRegister;
use dvmbm_hw::StaticFeatureProbe;
use dvmbm_hw::StaticGatingProbe;
use dvmbm_hw::HIP09_LAYOUT;
use dvmbm_shared::types::CoreSet;
use dvmbm_shared::types::ProcessorId;
use dvmbm_shared::types::VmId;
use dvmbm_test_utils::fakes::CountingTlbFlush;
use dvmbm_test_utils::fakes::FakeFeatures;
use dvmbm_test_utils::fakes::RecordingScopeRegister;
use dvmbm_test_utils::machine::FakeMachine;
use dvmbm_test_utils::test_values as test;
use dvmbm_topology::PlatformTopology;

use super::PlatformContext;
use super::ScopeController;
use crate::affinity::ScheduleState;
use crate::ScopeError;
use crate::ScopeStatsSnapshot;

const VM_ID: VmId = VmId::new(1);

struct Fixture {
    machine: FakeMachine,
    register: Arc<RecordingScopeRegister>,
    tlb: Arc<CountingTlbFlush>,
    controller: ScopeController,
}

impl Fixture {
    fn hip09(sockets: u32) -> Self {
        let machine = FakeMachine::hip09(sockets);
        let topology =
            PlatformTopology::probe(HIP09_LAYOUT, &machine.topology_probe(), &machine.ungated())
                .unwrap();
        let register = Arc::new(RecordingScopeRegister::new());
        let tlb = Arc::new(CountingTlbFlush::new());
        let controller = ScopeController::new(Arc::new(topology), register.clone(), tlb.clone());

        Self {
            machine,
            register,
            tlb,
            controller,
        }
    }

    fn encode(&self, cores: &CoreSet) -> u64 {
        self.controller.encoder().unwrap().encode(cores).value()
    }

    fn fields(&self, cores: &CoreSet) -> ScopeFields {
        self.controller
            .encoder()
            .unwrap()
            .encode(cores)
            .fields()
            .clone()
    }
}

fn bootstrap(
    machine: &FakeMachine,
    variant: PlatformVariant,
    gating: &StaticGatingProbe,
    register: &Arc<RecordingScopeRegister>,
    tlb: &Arc<CountingTlbFlush>,
) -> ScopeController {
    let context = PlatformContext {
        variant,
        switch_enabled: true,
        layout: HIP09_LAYOUT,
        features: &FakeFeatures::capable(),
        topology_probe: &machine.topology_probe(),
        gating_probe: gating,
        register: register.clone(),
        tlb: tlb.clone(),
    };

    ScopeController::bootstrap(context)
}

#[test_log::test]
fn single_die_vm_gets_core_granularity() {
    let fixture = Fixture::hip09(1);
    let machine = &fixture.machine;
    let vm = fixture.controller.vm_init(VM_ID).unwrap();
    let vcpu = fixture.controller.vcpu_init(&vm, 0).unwrap();

    let running_core = machine.core_id(0, 0, 0, 1);
    let allowed: CoreSet = [running_core, machine.core_id(0, 0, 2, 0)].into();
    fixture
        .controller
        .on_vcpu_schedule_in(&vcpu, running_core, &allowed);

    let expected_fields = ScopeFields::OneDie {
        die_id: machine.die_id(0, 0),
        cores: btreeset! { ClusterCore::new(0, 1), ClusterCore::new(2, 0) },
    };
    assert_eq!(fixture.fields(&vm.occupied_cores()), expected_fields);
    assert_eq!(vm.occupied_cores(), allowed);
    assert_eq!(vm.scope_value(), fixture.encode(&allowed));
    assert_eq!(
        fixture.register.last_write(),
        Some((running_core, vm.scope_value()))
    );
    assert_eq!(fixture.tlb.flushes_of(VM_ID), 1);
}

#[test_log::test]
fn migration_to_another_die_widens_scope_and_requests_reloads() {
    let fixture = Fixture::hip09(1);
    let machine = &fixture.machine;
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu_0 = controller.vcpu_init(&vm, 0).unwrap();
    let vcpu_1 = controller.vcpu_init(&vm, 1).unwrap();

    let core_0 = machine.core_id(0, 0, 0, 0);
    let core_1 = machine.core_id(0, 0, 2, 1);
    controller.on_vcpu_schedule_in(&vcpu_0, core_0, &CoreSet::single(core_0));
    controller.on_vcpu_schedule_in(&vcpu_1, core_1, &CoreSet::single(core_1));
    assert!(controller.process_requests(&vcpu_0, core_0));
    assert!(controller.process_requests(&vcpu_1, core_1));
    assert!(!controller.process_requests(&vcpu_1, core_1));
    controller.on_vcpu_schedule_out(&vcpu_0);
    let flushes_before = fixture.tlb.flush_count();

    let migrated_core = machine.core_id(0, 1, 3, 0);
    controller.on_vcpu_schedule_in(&vcpu_0, migrated_core, &CoreSet::single(migrated_core));

    assert_eq!(fixture.tlb.flush_count(), flushes_before + 1);
    let expected_fields = ScopeFields::TwoDies {
        first: DieClusters {
            die_id: machine.die_id(0, 0),
            clusters: btreeset! {2},
        },
        second: DieClusters {
            die_id: machine.die_id(0, 1),
            clusters: btreeset! {3},
        },
    };
    assert_eq!(fixture.fields(&vm.occupied_cores()), expected_fields);
    assert_eq!(vm.occupied_cores(), CoreSet::from([core_1, migrated_core]));
    assert!(vcpu_0.reload_pending());
    assert!(vcpu_1.reload_pending());

    assert!(controller.process_requests(&vcpu_1, core_1));
    assert_eq!(
        fixture.register.last_write_on(core_1),
        Some(vm.scope_value())
    );
    assert!(!vcpu_1.reload_pending());
}

#[test]
fn third_die_falls_back_to_all_dies() {
    let fixture = Fixture::hip09(2);
    let machine = &fixture.machine;
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();

    let cores = [
        machine.core_id(0, 0, 1, 1),
        machine.core_id(0, 1, 1, 1),
        machine.core_id(1, 0, 1, 1),
    ];
    for (index, core_id) in cores.into_iter().enumerate() {
        let vcpu = controller.vcpu_init(&vm, index as u32).unwrap();
        controller.on_vcpu_schedule_in(&vcpu, core_id, &CoreSet::single(core_id));
    }

    assert_eq!(vm.scope_value(), HIP09_LAYOUT.scope.all_dies_value());
    assert_eq!(fixture.tlb.flushes_of(VM_ID), 3);
}

#[test]
fn unchanged_placement_takes_fast_path() {
    let fixture = Fixture::hip09(1);
    let machine = &fixture.machine;
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu = controller.vcpu_init(&vm, 0).unwrap();
    let allowed = test::generate_core_set(&[4, 5, 6, 40]);

    controller.on_vcpu_schedule_in(&vcpu, ProcessorId::new(5), &allowed);
    controller.on_vcpu_schedule_out(&vcpu);
    controller.on_vcpu_schedule_in(&vcpu, ProcessorId::new(40), &allowed);

    let expected_stats = ScopeStatsSnapshot {
        fast_path: 1,
        slow_path: 1,
        scope_changes: 1,
        reloads: 0,
    };
    assert_eq!(vm.stats(), expected_stats);
    assert_eq!(fixture.tlb.flush_count(), 1);
    assert_eq!(
        fixture.register.last_write(),
        Some((ProcessorId::new(40), fixture.encode(&allowed)))
    );
    assert!(machine.cores().len() > 40);
}

#[test]
fn slow_path_without_scope_change_skips_flush() {
    let fixture = Fixture::hip09(1);
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu_0 = controller.vcpu_init(&vm, 0).unwrap();
    let vcpu_1 = controller.vcpu_init(&vm, 1).unwrap();
    let shared = test::generate_core_set(&[1, 2]);

    controller.on_vcpu_schedule_in(&vcpu_0, ProcessorId::new(1), &shared);
    controller.on_vcpu_schedule_in(&vcpu_1, ProcessorId::new(2), &shared);

    let stats = vm.stats();
    assert_eq!(stats.slow_path, 2);
    assert_eq!(stats.scope_changes, 1);
    assert_eq!(fixture.tlb.flush_count(), 1);
    assert_eq!(fixture.register.write_count(), 2);
}

#[test_log::test]
fn fast_path_after_sibling_migration_writes_widened_scope() {
    let fixture = Fixture::hip09(1);
    let machine = &fixture.machine;
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu_a = controller.vcpu_init(&vm, 0).unwrap();
    let vcpu_b = controller.vcpu_init(&vm, 1).unwrap();

    let core_a = machine.core_id(0, 0, 1, 0);
    let core_b = machine.core_id(0, 0, 1, 1);
    controller.on_vcpu_schedule_in(&vcpu_a, core_a, &CoreSet::single(core_a));
    controller.on_vcpu_schedule_in(&vcpu_b, core_b, &CoreSet::single(core_b));
    controller.on_vcpu_schedule_out(&vcpu_a);
    controller.on_vcpu_schedule_out(&vcpu_b);
    let narrow_scope = vm.scope_value();

    let migrated_core = machine.core_id(0, 1, 4, 2);
    controller.on_vcpu_schedule_in(&vcpu_b, migrated_core, &CoreSet::single(migrated_core));
    let fast_path_before = vm.stats().fast_path;

    controller.on_vcpu_schedule_in(&vcpu_a, core_a, &CoreSet::single(core_a));

    assert_eq!(
        vcpu_a.schedule_state(),
        ScheduleState::Scheduled { core_id: core_a }
    );
    let union = CoreSet::from([core_a, migrated_core]);
    assert_eq!(vm.occupied_cores(), union);
    assert_ne!(vm.scope_value(), narrow_scope);
    assert_eq!(vm.stats().fast_path, fast_path_before + 1);
    assert_eq!(
        fixture.register.last_write(),
        Some((core_a, fixture.encode(&union)))
    );
    assert!(vcpu_a.reload_pending());
}

#[test]
fn concurrent_schedule_ins_keep_union_correct() {
    const VCPUS: u32 = 8;
    const ROUNDS: usize = 200;

    let fixture = Fixture::hip09(2);
    let controller = &fixture.controller;
    let cores_count = fixture.machine.cores().len() as u32;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpus = (0..VCPUS)
        .map(|index| controller.vcpu_init(&vm, index).unwrap())
        .collect::<Vec<_>>();

    std::thread::scope(|scope| {
        for vcpu in &vcpus {
            scope.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(vcpu.index() as u64);
                for _ in 0..ROUNDS {
                    let allowed = test::generate_random_core_set(&mut rng, 3, 0..cores_count);
                    let core_id = allowed.iter().next().unwrap();
                    controller.on_vcpu_schedule_in(vcpu, core_id, &allowed);
                    controller.process_requests(vcpu, core_id);
                    controller.on_vcpu_schedule_out(vcpu);
                }
            });
        }
    });

    let mut expected = CoreSet::new();
    for vcpu in &vcpus {
        expected.extend_from(&vcpu.current_cores());
    }
    assert_eq!(vm.occupied_cores(), expected);
    assert_eq!(vm.scope_value(), fixture.encode(&expected));
}

#[test]
fn failed_register_write_is_swallowed() {
    let fixture = Fixture::hip09(1);
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu = controller.vcpu_init(&vm, 0).unwrap();
    let core_id = ProcessorId::new(3);
    fixture.register.fail_on(core_id);

    controller.on_vcpu_schedule_in(&vcpu, core_id, &CoreSet::single(core_id));

    assert_eq!(fixture.register.write_count(), 0);
    assert_eq!(vm.scope_value(), fixture.encode(&CoreSet::single(core_id)));
}

#[test]
fn vcpu_registration() {
    let fixture = Fixture::hip09(1);
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();

    let vcpu = controller.vcpu_init(&vm, 7).unwrap();
    let duplicate = controller.vcpu_init(&vm, 7);
    assert!(matches!(
        duplicate,
        Err(ScopeError::VcpuAlreadyRegistered {
            vm_id: VM_ID,
            vcpu_index: 7
        })
    ));
    assert_eq!(vm.vcpu_count(), 1);

    controller.vcpu_destroy(vcpu);
    assert_eq!(vm.vcpu_count(), 0);
    let vcpu = controller.vcpu_init(&vm, 7).unwrap();
    assert!(vcpu.is_enabled());
    assert_eq!(vcpu.vm_id(), VM_ID);

    controller.vm_destroy(vm);
}

#[test_log::test]
fn vcpu_outliving_its_vm_never_writes() {
    let fixture = Fixture::hip09(1);
    let machine = &fixture.machine;
    let controller = &fixture.controller;
    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu = controller.vcpu_init(&vm, 0).unwrap();
    let core_id = machine.core_id(0, 0, 0, 0);
    controller.on_vcpu_schedule_in(&vcpu, core_id, &CoreSet::single(core_id));
    controller.on_vcpu_schedule_out(&vcpu);
    let writes = fixture.register.writes();

    controller.vm_destroy(vm);

    let other_core = machine.core_id(0, 1, 0, 0);
    controller.on_vcpu_schedule_in(&vcpu, other_core, &CoreSet::single(other_core));
    controller.on_vcpu_schedule_out(&vcpu);
    controller.on_vcpu_schedule_in(&vcpu, core_id, &CoreSet::single(core_id));
    controller.force_reload(&vcpu, core_id);
    controller.process_requests(&vcpu, core_id);

    assert_eq!(vcpu.schedule_state(), ScheduleState::Descheduled);
    assert_eq!(fixture.register.writes(), writes);
    assert_eq!(fixture.tlb.flushes_of(VM_ID), 1);
    controller.vcpu_destroy(vcpu);
}

#[test_log::test]
fn disabled_capability_keeps_everything_untouched() {
    let machine = FakeMachine::hip09(1);
    let register = Arc::new(RecordingScopeRegister::new());
    let tlb = Arc::new(CountingTlbFlush::new());
    let controller = bootstrap(
        &machine,
        PlatformVariant::Hi1620,
        &machine.ungated(),
        &register,
        &tlb,
    );
    assert!(!controller.is_enabled());

    let vm = controller.vm_init(VM_ID).unwrap();
    let vcpu = controller.vcpu_init(&vm, 0).unwrap();
    let core_id = machine.core_id(0, 0, 0, 0);
    controller.on_vcpu_schedule_in(&vcpu, core_id, &CoreSet::single(core_id));
    controller.force_reload(&vcpu, core_id);
    assert!(!controller.process_requests(&vcpu, core_id));
    controller.on_vcpu_schedule_out(&vcpu);

    assert!(!vm.is_enabled());
    assert!(!vcpu.is_enabled());
    assert_eq!(vcpu.schedule_state(), ScheduleState::Descheduled);
    assert_eq!(vm.vcpu_count(), 0);
    assert!(vm.occupied_cores().is_empty());
    assert_eq!(vm.stats(), ScopeStatsSnapshot::default());
    assert_eq!(register.write_count(), 0);
    assert!(register.filtering_states().is_empty());
    assert_eq!(tlb.flush_count(), 0);
}

#[test_log::test]
fn bootstrap_enables_filtering_on_capable_platform() {
    let machine = FakeMachine::hip09(1);
    let register = Arc::new(RecordingScopeRegister::new());
    let tlb = Arc::new(CountingTlbFlush::new());
    let gating = StaticGatingProbe::new(btreemap! { (0, 1) => 0b0000_0100 }).with_default(0);

    let controller = bootstrap(&machine, PlatformVariant::Hip09, &gating, &register, &tlb);

    assert!(controller.is_enabled());
    let permutations = controller.encoder().unwrap().topology().permutations();
    assert_eq!(permutations.len(), 2);
    assert!(machine
        .cores()
        .iter()
        .all(|(core_id, _)| register.filtering(*core_id) == Some(true)));
}

#[test_log::test]
fn gating_probe_failure_disables_controller() {
    let machine = FakeMachine::hip09(1);
    let register = Arc::new(RecordingScopeRegister::new());
    let tlb = Arc::new(CountingTlbFlush::new());
    let gating = StaticGatingProbe::new(btreemap! { (0, 0) => 0 });

    let controller = bootstrap(&machine, PlatformVariant::Hip09, &gating, &register, &tlb);

    assert!(!controller.is_enabled());
    assert!(machine
        .cores()
        .iter()
        .all(|(core_id, _)| register.filtering(*core_id) == Some(false)));
}

#[test_log::test]
fn bootstrap_follows_identification_register() {
    let machine = FakeMachine::hip09(1);
    let control = HIP09_LAYOUT.control;
    let cores = machine
        .cores()
        .iter()
        .map(|(core_id, _)| *core_id)
        .collect::<Vec<_>>();
    let cases = [(1 << 12, true, true), (0, true, false), (1 << 12, false, false)];

    for (identification, hyp_mode, expected) in cases {
        let register = Arc::new(ShadowScopeRegister::new(control, cores.iter().copied()));
        let features = StaticFeatureProbe::new(control, identification, hyp_mode);
        let context = PlatformContext {
            variant: PlatformVariant::Hip09,
            switch_enabled: true,
            layout: HIP09_LAYOUT,
            features: &features,
            topology_probe: &machine.topology_probe(),
            gating_probe: &machine.ungated(),
            register: register.clone(),
            tlb: Arc::new(CountingTlbFlush::new()),
        };

        let controller = ScopeController::bootstrap(context);

        assert_eq!(controller.is_enabled(), expected);
        let filtering_cores = if expected { cores.len() } else { 0 };
        assert_eq!(register.filtering_cores(), filtering_cores);

        let vm = controller.vm_init(VM_ID).unwrap();
        let vcpu = controller.vcpu_init(&vm, 0).unwrap();
        let core_id = machine.core_id(0, 1, 2, 3);
        controller.on_vcpu_schedule_in(&vcpu, core_id, &CoreSet::single(core_id));
        assert_eq!(register.scope(core_id), Some(vm.scope_value()));
        assert_eq!(vm.scope_value() != 0, expected);
    }
}
