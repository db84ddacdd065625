//! `soundshelf play`: stream one track with keyboard controls on stdin.
//!
//! Controls (one per line):
//! - Enter or `p`: pause/resume
//! - `s <seconds>`: seek
//! - `j <percent>`: jump to a point of the track
//! - `v <0..1>`: volume
//! - `q`: quit

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, Sender, select};
use soundshelf_player::{
    AudioDevice, OutputDevice, PlayOutcome, PlayRecorder, PlaybackCoordinator,
};
use soundshelf_types::{PlaybackPhase, PlaybackSnapshot, TrackSummary};

use crate::config::{Settings, check_volume};
use crate::format::{format_clock, progress_bar};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Control {
    Toggle,
    Seek(f64),
    /// Fraction of the track in `[0, 1]`.
    Jump(f64),
    Volume(f32),
    Quit,
}

/// Parse one line typed by the user.
pub fn parse_control(line: &str) -> Result<Control> {
    let line = line.trim();
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, Some(arg.trim())),
        None => (line, None),
    };
    let number = |what: &str| -> Result<f64> {
        let raw = arg.ok_or_else(|| anyhow!("{what} needs a value"))?;
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| anyhow!("{what}: not a number: {raw:?}"))
    };
    match cmd {
        "" | "p" => Ok(Control::Toggle),
        "q" => Ok(Control::Quit),
        "s" => {
            let secs = number("seek")?;
            if secs < 0.0 {
                bail!("seek: position must not be negative");
            }
            Ok(Control::Seek(secs))
        }
        "j" => {
            let pct = number("jump")?;
            if !(0.0..=100.0).contains(&pct) {
                bail!("jump: percent must be between 0 and 100");
            }
            Ok(Control::Jump(pct / 100.0))
        }
        "v" => Ok(Control::Volume(check_volume(number("volume")? as f32)?)),
        other => bail!("unknown control {other:?} (p, s <secs>, j <pct>, v <0-1>, q)"),
    }
}

/// One-line rendering of the player state.
pub fn status_line(snapshot: &PlaybackSnapshot) -> String {
    let Some(track) = &snapshot.current_track else {
        return "stopped".to_string();
    };
    let state = match snapshot.phase {
        PlaybackPhase::Playing => "playing",
        PlaybackPhase::Paused => "paused ",
        PlaybackPhase::Idle => "stopped",
    };
    let duration = if snapshot.duration > 0.0 {
        snapshot.duration
    } else {
        track.duration
    };
    let artist = track
        .artist()
        .map(|a| format!(" - {a}"))
        .unwrap_or_default();
    format!(
        "[{state}] {}{artist}  {} / {} [{}] vol {:.0}%",
        track.title,
        format_clock(snapshot.current_time),
        format_clock(duration),
        progress_bar(snapshot.progress, 24),
        snapshot.volume * 100.0,
    )
}

/// Options from the command line.
#[derive(Clone, Debug, Default)]
pub struct PlayOptions {
    pub volume: Option<f32>,
    /// Start offset in seconds.
    pub start: Option<f64>,
}

/// Play `track` on the configured output until it ends or the user quits.
pub fn run(
    track: &TrackSummary,
    settings: &Settings,
    recorder: Arc<dyn PlayRecorder>,
    options: &PlayOptions,
) -> Result<()> {
    let device = OutputDevice::spawn(settings.output.clone())?;
    let mut coordinator = PlaybackCoordinator::new(device, recorder);

    let (controls_tx, controls_rx) = crossbeam_channel::bounded(16);
    let quit_tx = controls_tx.clone();
    let _ = ctrlc::set_handler(move || {
        let _ = quit_tx.try_send(Control::Quit);
    });
    spawn_stdin_reader(controls_tx)?;

    let volume = options.volume.or(settings.volume);
    let mut stderr = io::stderr();
    let result = drive(
        &mut coordinator,
        track,
        volume,
        options.start,
        &controls_rx,
        settings.output.tick,
        &mut stderr,
    );
    coordinator.shutdown();
    let _ = writeln!(stderr);
    result
}

fn spawn_stdin_reader(controls: Sender<Control>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-controls".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match parse_control(&line) {
                    Ok(control) => {
                        if controls.send(control).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("\n{e}"),
                }
            }
        })
        .context("spawn stdin reader")?;
    Ok(())
}

/// Run the playback loop on `coordinator` until the track ends, fails or `Quit` arrives.
fn drive<D: AudioDevice>(
    coordinator: &mut PlaybackCoordinator<D>,
    track: &TrackSummary,
    volume: Option<f32>,
    start: Option<f64>,
    controls: &Receiver<Control>,
    tick: Duration,
    out: &mut impl Write,
) -> Result<()> {
    let updates = coordinator.subscribe();
    if let Some(volume) = volume {
        coordinator.set_volume(volume);
    }
    if coordinator.play(track) == PlayOutcome::NoSource {
        bail!("track {} has no playable audio", track.id);
    }
    if let Some(start) = start {
        coordinator.seek(start);
    }

    let mut user_paused = false;
    let mut latest = coordinator.snapshot();
    loop {
        select! {
            recv(controls) -> control => match control {
                Ok(Control::Quit) | Err(_) => return Ok(()),
                Ok(Control::Toggle) => {
                    coordinator.toggle_play();
                    user_paused = !coordinator.is_playing();
                }
                Ok(Control::Seek(secs)) => coordinator.seek(secs),
                Ok(Control::Jump(fraction)) => coordinator.seek_fraction(fraction),
                Ok(Control::Volume(level)) => coordinator.set_volume(level),
            },
            default(tick) => {}
        }
        coordinator.poll_device();

        while let Ok(snapshot) = updates.try_recv() {
            latest = snapshot;
        }
        let _ = write!(out, "\r{}\x1b[K", status_line(&latest));
        let _ = out.flush();

        if let Some(message) = &latest.last_error {
            bail!("playback failed: {message}");
        }
        if !latest.is_playing && !user_paused {
            tracing::debug!(track_id = %track.id, "playback finished");
            return Ok(());
        }
    }
}
