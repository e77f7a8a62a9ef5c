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


#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![deny(
    dead_code,
    nonstandard_style,
    unused_imports,
    unused_mut,
    unused_variables,
    unused_unsafe,
    unreachable_patterns
)]

use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use eyre::WrapErr as _;
use itertools::Itertools;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use dvmbm::PlatformContext;
use dvmbm::ScopeController;
use dvmbm::ScopeEncoder;
use dvmbm_config::load_config;
use dvmbm_config::DvmbmConfig;
use dvmbm_config::GatingSource;
use dvmbm_hw::DevMemGatingProbe;
use dvmbm_hw::GatingProbe;
use dvmbm_hw::ShadowScopeRegister;
use dvmbm_hw::StaticFeatureProbe;
use dvmbm_hw::StaticGatingProbe;
use dvmbm_hw::StaticTopologyProbe;
use dvmbm_hw::TlbFlush;
use dvmbm_shared::types::CoreSet;
use dvmbm_shared::types::ProcessorId;
use dvmbm_shared::types::VmId;
use dvmbm_topology::PlatformTopology;

/// `DVMBM_ENABLED` overrides `feature.enabled` of the config file.
#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long)]
    config_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the boot-time detection against the described machine and prints
    /// its sockets, dies and cluster permutations.
    Topology,
    /// Prints the broadcast scope of a VM occupying the given cores.
    Encode {
        #[arg(long, value_delimiter = ',', required = true)]
        cores: Vec<u32>,
    },
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config_path.as_str())?;

    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .with_default_directive(Directive::from(config.logs.log_level))
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("setting global tracing subscriber failed")?;
    tracing_log::LogTracer::init()?;

    tracing::info!("loaded config {config:?}");

    match args.command {
        Command::Topology => run_bootstrap(&config)?,
        Command::Encode { cores } => {
            let topology = probe_topology(&config)?;
            let cores = cores.into_iter().map(ProcessorId::new).collect::<CoreSet>();
            print_scope(Arc::new(topology), &cores);
        }
    }

    Ok(())
}

/// Only reports the flushes, the described machine has no TLBs to invalidate.
struct LoggingTlbFlush;

impl TlbFlush for LoggingTlbFlush {
    fn flush_vm_tlbs(&self, vm_id: VmId) {
        tracing::debug!("vm {vm_id}: TLBs are flushed");
    }
}

fn run_bootstrap(config: &DvmbmConfig) -> eyre::Result<()> {
    let platform = &config.platform;
    let control = platform.layout.control;
    let topology_probe = StaticTopologyProbe::new(platform.cores.clone());
    let gating_probe = gating_probe(config);
    let features = StaticFeatureProbe::new(
        control,
        config.feature.identification,
        config.feature.hyp_mode,
    );
    let register = Arc::new(ShadowScopeRegister::new(
        control,
        platform.cores.iter().map(|(core_id, _)| *core_id),
    ));

    let context = PlatformContext {
        variant: config.feature.variant,
        switch_enabled: config.feature.enabled,
        layout: platform.layout,
        features: &features,
        topology_probe: &topology_probe,
        gating_probe: gating_probe.as_ref(),
        register: register.clone(),
        tlb: Arc::new(LoggingTlbFlush),
    };
    let controller = ScopeController::bootstrap(context);

    match controller.encoder() {
        Some(encoder) => {
            println!(
                "broadcast scoping: enabled on {} of {} cores",
                register.filtering_cores(),
                platform.cores.len()
            );
            print_topology(encoder.topology());
        }
        None => {
            println!("broadcast scoping: disabled");
            match probe_topology(config) {
                Ok(topology) => print_topology(&topology),
                Err(error) => println!("topology isn't available: {error:#}"),
            }
        }
    }

    Ok(())
}

fn probe_topology(config: &DvmbmConfig) -> eyre::Result<PlatformTopology> {
    let platform = &config.platform;
    let topology_probe = StaticTopologyProbe::new(platform.cores.clone());
    let gating_probe = gating_probe(config);

    PlatformTopology::probe(platform.layout, &topology_probe, gating_probe.as_ref())
        .wrap_err("probing the platform topology failed")
}

fn gating_probe(config: &DvmbmConfig) -> Box<dyn GatingProbe> {
    let platform = &config.platform;
    match &platform.gating {
        GatingSource::Static {
            masks,
            default_mask,
        } => {
            let probe = StaticGatingProbe::new(masks.clone());
            match default_mask {
                Some(mask) => Box::new(probe.with_default(*mask)),
                None => Box::new(probe),
            }
        }
        GatingSource::DevMem => Box::new(DevMemGatingProbe::new(platform.layout.gating)),
    }
}

fn print_topology(topology: &PlatformTopology) {
    println!("platform: {}", topology.layout().name);
    println!("sockets: {}", topology.socket_count());
    println!("dies per socket: {}", topology.die_count());

    for (die, permutation) in topology.permutations().iter() {
        let cores_count = topology
            .cores()
            .filter_map(|core_id| topology.location(core_id))
            .filter(|location| location.die_key() == *die)
            .count();
        println!("{die}: {cores_count} cores, cluster permutation {permutation}");
    }
}

fn print_scope(topology: Arc<PlatformTopology>, cores: &CoreSet) {
    let encoder = ScopeEncoder::new(topology);
    let scope = encoder.encode(cores);

    println!("cores: {}", cores.iter().join(", "));
    println!("scope: {:?}", scope.fields());
    println!("register: {:#018x}", scope.value());
}
