use std::io;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use stackspy::args::{Commands, Format, Opt};
use stackspy::config::StackSpyConfig;
use stackspy::registry::{self, Factory, Registry};
use stackspy::run::{LoopStats, SamplingLoop};
use stackspy::sink::{FoldedSink, JsonLinesSink, Sink, WithLabels};
use stackspy::{processes, Pid};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// how often to check whether the target is still alive
const LIVENESS_PERIOD: Duration = Duration::from_millis(500);

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env("STACKSPY_LOG").or_else(|_| EnvFilter::try_new("info"))?;
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let opt = Opt::parse();
    let registry = registry::install(registry::builtin()?.build())?;

    match opt.command {
        Commands::Profilers {} => {
            for name in registry.names() {
                println!("{name}");
            }
        }
        Commands::Sample { config, profiler, pid, command, blocking, rate, count, format, labels } => {
            let mut config = match config {
                Some(path) => StackSpyConfig::from_path(path)?,
                None => StackSpyConfig::new()?,
            };
            // command line wins over the file
            if let Some(profiler) = profiler {
                config.target.profiler = profiler;
            }
            if pid.is_some() || command.is_some() {
                config.target.pid = pid;
                config.target.command = command;
            }
            config.target.blocking |= blocking;
            if let Some(rate) = rate {
                config.target.sample_rate = rate;
            }
            for (key, value) in labels {
                config.target.labels.insert(key, value);
            }
            config.validate()?;

            let stats = sample(registry, &config, format, count).await?;
            info!(
                "Processed: {} stacks, {} undecodable, {} failed snapshots.",
                stats.delivered, stats.dropped, stats.snapshot_errors
            );
        }
    }

    Ok(())
}

async fn sample(registry: &Registry, config: &StackSpyConfig, format: Format, count: Option<u64>) -> Result<LoopStats> {
    // resolve the profiler before launching anything
    let factory = registry.lookup(&config.target.profiler)?;

    let (pid, child) = match (config.target.pid, &config.target.command) {
        (Some(pid), _) => (Pid(pid), None),
        (None, Some(command)) => {
            let child = processes::launch(command)?;
            (Pid::try_from(child.id())?, Some(child))
        }
        (None, None) => bail!("no target: supply a pid or a command"),
    };
    info!(
        %pid,
        comm = processes::describe(pid).as_deref().unwrap_or("?"),
        profiler = %config.target.profiler,
        "attaching"
    );

    let result = sample_pid(factory, config, pid, format, count).await;

    if let Some(child) = child {
        if let Err(e) = processes::terminate(child) {
            warn!(%pid, error = %e, "unable to stop child process");
        }
    }
    result
}

async fn sample_pid(
    factory: Factory,
    config: &StackSpyConfig,
    pid: Pid,
    format: Format,
    count: Option<u64>,
) -> Result<LoopStats> {
    let params = config.init_params(pid);
    let session = tokio::task::block_in_place(|| factory(params))?;

    let (halt_tx, halt_rx) = watch::channel(());
    let watcher = spawn_halt_watcher(pid, halt_tx);

    let stdout = io::stdout();
    let sink: Box<dyn Sink> = match format {
        Format::Folded => Box::new(FoldedSink::new(stdout)),
        Format::Json => Box::new(JsonLinesSink::new(stdout)),
    };
    let sink = WithLabels::new(sink, config.target.labels.clone());

    let mut sampling = SamplingLoop::new(session, sink, config.target.sample_rate);
    if let Some(n) = count {
        sampling = sampling.with_max_cycles(n);
    }
    let result = sampling.run(halt_rx).await;
    watcher.abort();

    let (stats, _) = result?;
    Ok(stats)
}

/// Halts sampling on Ctrl-C or once the target is gone.
fn spawn_halt_watcher(pid: Pid, halt_tx: watch::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut liveness = tokio::time::interval(LIVENESS_PERIOD);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("exiting");
                    break;
                }
                _ = liveness.tick() => {
                    if !processes::is_running(pid) {
                        info!(%pid, "target exited");
                        break;
                    }
                }
            }
        }
        let _ = halt_tx.send(());
    })
}
