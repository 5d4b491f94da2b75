use std::env::args;
use std::io;
use std::time::Duration;

use anyhow::{bail, Result};
use stackspy::processes;
use stackspy::registry::{self, MOCK};
use stackspy::run::SamplingLoop;
use stackspy::sink::{sink_fn, FoldedSink};
use stackspy::{InitParams, Pid, SnapshotOutcome, SpyError};
use tokio::sync::watch;

const MISSING_PID: i32 = 999_999_999;

fn params(pid: Pid) -> InitParams {
    InitParams::new(pid).with_settle_delay(Duration::ZERO)
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(test) = args().nth(1) else {
        bail!("no input");
    };
    let registry = registry::builtin()?.build();

    match test.as_str() {
        "live" => {
            let child = processes::launch("sleep 30")?;
            let pid = Pid::try_from(child.id())?;
            let session = registry.start(MOCK, params(pid))?;

            let (mut delivered, mut errors) = (0, 0);
            let mut first = None;
            let mut sink = sink_fn(|_, sample, weight| {
                first.get_or_insert_with(|| format!("{} {}", sample.folded(), weight));
                Ok(())
            });
            for _ in 0..100 {
                match session.snapshot(&mut sink) {
                    Ok(SnapshotOutcome::Delivered) => delivered += 1,
                    Ok(SnapshotOutcome::Dropped(_)) | Err(_) => errors += 1,
                }
            }
            drop(sink);
            println!("first: {}", first.unwrap_or_default());
            println!("delivered: {delivered}, errors: {errors}");

            session.stop()?;
            match session.stop() {
                Err(SpyError::Usage { op, state }) => println!("second stop: usage error ({op} while {state:?})"),
                other => bail!("second stop: {other:?}"),
            }
            processes::terminate(child)?;
        }
        "exited" => {
            let child = processes::launch("sleep 30")?;
            let pid = Pid::try_from(child.id())?;
            let session = registry.start(MOCK, params(pid))?;
            processes::terminate(child)?;

            match session.snapshot(&mut sink_fn(|_, _, _| Ok(()))) {
                Err(e @ SpyError::Snapshot { .. }) => println!("snapshot error: {e}"),
                other => bail!("snapshot after exit: {other:?}"),
            }
            // a failed snapshot leaves the session attached
            session.stop()?;
            println!("stopped: {:?}", session.state());
        }
        "sampling" => {
            let child = processes::launch("sleep 30")?;
            let pid = Pid::try_from(child.id())?;
            let session = registry.start(MOCK, params(pid))?;

            let (_halt_tx, halt_rx) = watch::channel(());
            let (stats, _) = SamplingLoop::new(session, FoldedSink::new(io::stdout()), 1000)
                .with_max_cycles(20)
                .run(halt_rx)
                .await?;
            eprintln!("Processed: {} stacks.", stats.delivered);
            processes::terminate(child)?;
        }
        "missing" => match registry.start(MOCK, params(Pid(MISSING_PID))) {
            Err(e @ SpyError::Attach { .. }) => println!("attach error: {e}"),
            other => bail!("attach to missing pid: {other:?}"),
        },
        "unknown" => match registry.lookup("no-such-profiler") {
            Err(e @ SpyError::NotFound(_)) => println!("{e}"),
            Err(e) => bail!("lookup: {e}"),
            Ok(_) => bail!("lookup found a factory"),
        },
        _ => {
            bail!("unknown test `{test}`");
        }
    }

    Ok(())
}
