use anyhow::{bail, Context};
use chunksync::commands::sync::{self, SyncEvent};
use chunksync::config::Cli;
use chunksync::ui::ProgressReporter;
use chunksync::{Config, ControlFlags, RunSummary};
use clap::Parser;
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DRAIN_TICK: Duration = Duration::from_millis(50);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Convert CLI args + config file to Config - this validates immediately
    let config = Config::try_from(&cli)?;

    if cli.save_config {
        let path = cli.config_path();
        config
            .to_file()
            .save(&path)
            .with_context(|| format!("saving config to {}", path.display()))?;
    }

    println!("chunksync v{}", chunksync::VERSION);
    println!("  Source: {}", config.source.display());
    println!("  Target: {}", config.destination.display());
    println!("  Mode:   {}", config.detection_mode);
    println!("Controls: p = pause, r = resume, s = stop (then Enter); Ctrl-C stops");

    let control = Arc::new(ControlFlags::new());
    // The run clears stale flags while being prepared, so controls go live only after.
    let (worker, events) = sync::spawn(config, Arc::clone(&control))?;
    {
        let control = Arc::clone(&control);
        ctrlc::set_handler(move || control.signal_stop()).context("installing Ctrl-C handler")?;
    }
    spawn_stdin_controls(Arc::clone(&control));

    let mut reporter = ProgressReporter::new();
    let ticker = crossbeam_channel::tick(DRAIN_TICK);

    let summary: RunSummary = loop {
        ticker.recv()?;

        if reporter.is_paused() != control.is_paused() {
            reporter.set_paused(control.is_paused());
        }

        let mut finished = None;
        for event in events.try_iter() {
            reporter.handle(&event);
            if let SyncEvent::RunComplete { summary } = event {
                finished = Some(summary);
            }
        }
        if let Some(summary) = finished {
            break summary;
        }

        if worker.is_finished() && events.is_empty() {
            bail!("sync worker exited without reporting completion");
        }
    };

    if worker.join().is_err() {
        bail!("sync worker panicked");
    }

    if summary.counters.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read single-letter commands from stdin and translate them into flags.
fn spawn_stdin_controls(control: Arc<ControlFlags>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "p" | "pause" => control.set_paused(true),
                "r" | "resume" => control.set_paused(false),
                "s" | "stop" => {
                    control.signal_stop();
                    break;
                }
                _ => {}
            }
        }
    });
}
