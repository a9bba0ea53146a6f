//! # integrity run
//!
//! Drives the fill loop on a blocking task while a signal task waits for
//! SIGINT or SIGTERM and cancels it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use integrity_config::{log_cli_info, log_cli_warn, Config};
use integrity_core::{
    is_directory, CancellationToken, CappedVolume, FillLoop, LoopOptions, Materializer,
    RunOutcome, SizePolicy, Statvfs, StopReason, VolumeStats,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory to run the test in
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// Stop after this many verify/delete cycles
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Seed for the file size sequence, makes a run repeatable
    #[arg(short, long)]
    seed: Option<u64>,

    /// Create files with shared, dedup-friendly content
    #[arg(long)]
    duplicate: bool,

    /// Exit once the reserve floor is reached instead of verifying
    #[arg(long)]
    quit_on_full: bool,

    /// Treat the directory as a volume of this many bytes
    #[arg(long, value_name = "BYTES")]
    capacity: Option<u64>,
}

pub fn cmd_run(config: &Config, args: RunArgs) -> Result<ExitCode> {
    if !is_directory(&args.directory) {
        println!("{} is not a directory!", args.directory.display());
        return Ok(ExitCode::from(1));
    }

    let mut fill = config.fill.clone();
    fill.duplicate |= args.duplicate;
    fill.quit_on_full |= args.quit_on_full;

    let policy = SizePolicy::from(&fill);
    let options = LoopOptions {
        max_cycles: args.cycles.or(config.run.max_cycles),
        quit_on_full: fill.quit_on_full,
    };
    let seed = args.seed.or(config.run.seed);

    let outcome = match args.capacity {
        Some(capacity) => drive(
            &args.directory,
            CappedVolume::new(capacity),
            policy,
            seed,
            options,
        )?,
        None => drive(&args.directory, Statvfs, policy, seed, options)?,
    };
    Ok(report(&outcome))
}

fn drive<V: VolumeStats + 'static>(
    directory: &Path,
    volume: V,
    policy: SizePolicy,
    seed: Option<u64>,
    options: LoopOptions,
) -> Result<RunOutcome> {
    log_cli_info!(
        "Starting run",
        directory = directory.display().to_string().as_str(),
        volume = volume.name(),
    );

    let materializer = match seed {
        Some(seed) => Materializer::with_seed(volume, policy, seed),
        None => Materializer::new(volume, policy),
    };
    let mut fill_loop = FillLoop::new(directory, materializer, options)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    runtime.block_on(async move {
        let token = CancellationToken::new();
        listen_for_shutdown(token.clone());

        let outcome = tokio::task::spawn_blocking(move || fill_loop.run(&token))
            .await
            .context("Fill loop task failed")??;
        Ok::<_, anyhow::Error>(outcome)
    })
}

/// Cancel `token` on the first SIGINT or SIGTERM. Handlers are registered
/// before this returns; must be called inside the runtime.
#[cfg(unix)]
fn listen_for_shutdown(token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut interrupt, mut terminate) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
        (Err(err), _) | (_, Err(err)) => {
            log_cli_warn!(
                "Unable to listen for shutdown signals",
                error = err.to_string().as_str(),
            );
            return;
        }
    };

    tokio::spawn(async move {
        let received = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        log_cli_info!("Stopping before the next file", signal = received);
        token.cancel();
    });
}

#[cfg(not(unix))]
fn listen_for_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log_cli_info!("Stopping before the next file", signal = "ctrl-c");
                token.cancel();
            }
            Err(err) => {
                log_cli_warn!(
                    "Unable to listen for shutdown signals",
                    error = err.to_string().as_str(),
                );
            }
        }
    });
}

fn report(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Stopped { reason, summary } => {
            match reason {
                StopReason::Cancelled => println!("Exiting: {summary}"),
                StopReason::Full => println!("Exiting on full request: {summary}"),
                StopReason::Stalled => {
                    println!("Exiting, nothing left to reclaim at the floor: {summary}")
                }
                StopReason::CycleLimit => {
                    println!("Completed {} cycles: {summary}", summary.cycles)
                }
            }
            ExitCode::SUCCESS
        }
        RunOutcome::Corrupt {
            path,
            corruption,
            summary,
        } => {
            println!("{corruption}");
            println!("File {} not validating!", path.display());
            println!("{summary}");
            ExitCode::from(1)
        }
    }
}
