//! # cqt-live - Live Constant-Q Spectrum Analyzer
//!
//! Captures audio from the default input device, computes a constant-Q power spectrum
//! for every block and prints the strongest note to the terminal.
//!
//! ## Architecture
//! - **Main Thread**: Renders spectra and handles commands
//! - **Analysis Thread**: Audio capture and constant-Q transform (`cqt_core::worker`)
//! - **Input Thread**: Reads commands from stdin
//! - **Communication**: Crossbeam channels between all three
//!
//! ## Commands
//! - `p` + Enter: pause or resume the analysis
//! - `q` + Enter: quit

mod display;

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, select};
use log::{error, info, warn};
use std::{io::BufRead, path::PathBuf, thread};

use cqt_core::{
    AnalysisConfig, AnalysisEvent, AnalysisWorker, ChannelSink, audio::CpalSource,
};
use display::SpectrumDisplay;

const USAGE: &str = "usage: cqt-live [--config PATH] [--paused] [--write-config PATH]";

/// Command-line options.
#[derive(Debug, Default, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    start_paused: bool,
    /// Write the default configuration here and exit.
    write_config: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                options.config_path = Some(path.into());
            }
            "--write-config" => {
                let path = args.next().context("--write-config needs a path")?;
                options.write_config = Some(path.into());
            }
            "--paused" => options.start_paused = true,
            other => bail!("unexpected argument `{other}`\n{USAGE}"),
        }
    }
    Ok(options)
}

/// User commands read from stdin.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    TogglePause,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "p" | "pause" => Some(Command::TogglePause),
        "q" | "quit" => Some(Command::Quit),
        _ => None,
    }
}

/// Forwards stdin commands until EOF.
fn spawn_command_reader() -> Result<Receiver<Command>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!("Unknown command `{}` (use `p` or `q`)", line.trim()),
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args(std::env::args().skip(1))?;

    if let Some(path) = options.write_config {
        AnalysisConfig::default()
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = match &options.config_path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    info!("Starting cqt-live with {:?}", config);

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let preferred_rate = config.sample_rate;
    let worker = AnalysisWorker::spawn(
        config,
        options.start_paused,
        move || CpalSource::open_default(preferred_rate),
        ChannelSink::new(event_tx),
    )?;
    if options.start_paused {
        info!("Analysis paused; enter `p` to start");
    }

    let command_rx = spawn_command_reader()?;
    let no_commands = crossbeam_channel::never();
    let mut stdin_open = true;
    let mut display = SpectrumDisplay::default();

    loop {
        let commands = if stdin_open { &command_rx } else { &no_commands };
        select! {
            recv(event_rx) -> msg => match msg {
                Ok(AnalysisEvent::Configured { ratio, min_frequency }) => {
                    display.configure(ratio, min_frequency);
                }
                Ok(AnalysisEvent::Spectrum(frame)) => {
                    if let Some(line) = display.describe(&frame) {
                        println!("{line}");
                    }
                }
                Ok(AnalysisEvent::SourceFailed(message)) => {
                    error!("Audio capture failed: {message}");
                }
                Err(_) => {
                    info!("Analysis worker finished");
                    break;
                }
            },
            recv(commands) -> command => match command {
                Ok(Command::TogglePause) => {
                    let paused = worker.toggle_paused();
                    info!("Analysis {}", if paused { "paused" } else { "resumed" });
                }
                Ok(Command::Quit) => break,
                Err(_) => {
                    // stdin closed; keep running until the worker stops.
                    stdin_open = false;
                }
            },
        }
    }

    info!("Shutting down analysis worker...");
    worker.cancel();
    worker.join()
}
