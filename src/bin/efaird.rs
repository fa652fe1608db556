//! Scheduler daemon: wires configuration, logging, the scheduler core, and the
//! gRPC façade together, then waits for `SIGINT` to drain and export results.
//! Grounded on `efair::example::run_server` in
//! `original_source/efair/example/run_server.cpp` (the quantum/alpha CLI
//! arguments, the interrupt-triggered `summary_task_by_model` +
//! `export_task_data` sequence, and the `results/runN/` output layout).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use efair_sched::config::SchedulerConfig;
use efair_sched::freq::{Governor, SysfsGovernor};
use efair_sched::rpc::{EFairService, EFairGrpcServer};
use efair_sched::scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "efaird", about = "Energy- and fairness-aware GPU inference scheduler daemon")]
struct Args {
    /// Path to a TOML configuration file; missing is not an error.
    #[arg(long, env = "EFAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured total per-round quantum budget, in microseconds.
    #[arg(long)]
    quantum_us: Option<u64>,

    /// Overrides the configured energy/fairness blend factor (0, 1].
    #[arg(long)]
    alpha: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = SchedulerConfig::load(args.config.as_deref())?;
    if let Some(q) = args.quantum_us {
        config.total_quantum_size_us = q;
    }
    if let Some(a) = args.alpha {
        config.alpha = a;
    }

    efair_sched::logging::init(config.log_format);

    let governor: Arc<dyn Governor> = Arc::new(SysfsGovernor::new(config.governor.clone()));
    let scheduler = Scheduler::new(config.clone(), governor)?;
    scheduler.run()?;

    let addr = config.rpc_addr.parse()?;
    let service = EFairService::new(Arc::clone(&scheduler));

    let scheduler_for_shutdown = Arc::clone(&scheduler);
    let server = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(EFairGrpcServer::new(service))
            .serve(addr)
            .await
    });

    tracing::info!(addr = %config.rpc_addr, "efaird: listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("efaird: shutdown requested");

    scheduler_for_shutdown.shutdown()?;
    scheduler_for_shutdown.summary_task_by_model();

    let run_dir = next_run_dir("./results")?;
    std::fs::create_dir_all(&run_dir)?;
    scheduler_for_shutdown.export_task_data(&run_dir.join("tasks.csv"))?;
    tracing::info!(dir = %run_dir.display(), "efaird: exported task data");

    server.abort();
    Ok(())
}

/// Finds the first `results/runN` directory that doesn't already exist.
fn next_run_dir(base: &str) -> anyhow::Result<PathBuf> {
    let base = PathBuf::from(base);
    let mut run_num = 0usize;
    loop {
        let candidate = base.join(format!("run{run_num}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        run_num += 1;
    }
}
