//! Local audio output.
//!
//! [`OutputDevice`] forwards [`AudioDevice`] calls to a worker thread that owns the current
//! playback session (HTTP range source -> Symphonia -> Rubato -> CPAL) and reports
//! position, duration, end and failures back as [`DeviceEvent`]s.

mod decode;
mod http_source;
mod queue;
mod resample;
mod select;
mod session;
mod stream;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::OutputConfig;
use crate::device::{AudioDevice, DeviceEvent, DeviceEventKind};
use session::{SessionHandle, SessionSpec};
use stream::SharedVolume;

pub use select::{OutputInfo, list_output_devices};

#[derive(Debug, Clone, PartialEq)]
enum DeviceCommand {
    Load { generation: u64, url: String },
    Play,
    Pause,
    Seek { position: f64 },
    SetVolume(f32),
    Release,
}

/// [`AudioDevice`] backed by the system audio output.
pub struct OutputDevice {
    cmd_tx: Sender<DeviceCommand>,
    events_rx: Receiver<DeviceEvent>,
    worker: Option<JoinHandle<()>>,
}

impl OutputDevice {
    /// Start the output worker. No audio device is opened until the first `play`.
    pub fn spawn(config: OutputConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let worker = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || Worker::new(config, events_tx).run(&cmd_rx))
            .context("spawn audio output worker")?;
        Ok(Self {
            cmd_tx,
            events_rx,
            worker: Some(worker),
        })
    }

    fn send(&self, cmd: DeviceCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::debug!("audio output worker is gone");
        }
    }
}

impl AudioDevice for OutputDevice {
    fn load(&mut self, generation: u64, url: &str) {
        self.send(DeviceCommand::Load {
            generation,
            url: url.to_string(),
        });
    }

    fn play(&mut self) {
        self.send(DeviceCommand::Play);
    }

    fn pause(&mut self) {
        self.send(DeviceCommand::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.send(DeviceCommand::Seek { position });
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(DeviceCommand::SetVolume(volume));
    }

    fn events(&self) -> Receiver<DeviceEvent> {
        self.events_rx.clone()
    }

    fn release(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.send(DeviceCommand::Release);
        if worker.join().is_err() {
            tracing::warn!("audio output worker panicked");
        }
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.release();
    }
}

/// State owned by the worker thread.
struct Worker {
    config: OutputConfig,
    events: Sender<DeviceEvent>,
    volume: Arc<SharedVolume>,
    generation: u64,
    url: Option<String>,
    /// Where the next session starts.
    resume_at: f64,
    playing: bool,
    session: Option<SessionHandle>,
}

impl Worker {
    fn new(config: OutputConfig, events: Sender<DeviceEvent>) -> Self {
        Self {
            config,
            events,
            volume: Arc::new(SharedVolume::new(1.0)),
            generation: 0,
            url: None,
            resume_at: 0.0,
            playing: false,
            session: None,
        }
    }

    fn run(mut self, commands: &Receiver<DeviceCommand>) {
        loop {
            match commands.recv_timeout(self.config.tick) {
                Ok(DeviceCommand::Release) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => self.tick(),
            }
        }
        if let Some(session) = self.session.take() {
            session.cancel_and_join();
        }
        tracing::debug!("audio output worker stopped");
    }

    fn handle(&mut self, cmd: DeviceCommand) {
        match cmd {
            DeviceCommand::Load { generation, url } => {
                self.stop_session();
                tracing::debug!(generation, url = %url, "source assigned");
                self.generation = generation;
                self.url = Some(url);
                self.resume_at = 0.0;
                self.playing = false;
            }
            DeviceCommand::Play => self.play(),
            DeviceCommand::Pause => {
                self.playing = false;
                if let Some(session) = &self.session {
                    session.set_paused(true);
                }
            }
            DeviceCommand::Seek { position } => self.seek(position),
            DeviceCommand::SetVolume(level) => self.volume.set(level),
            DeviceCommand::Release => {}
        }
    }

    fn play(&mut self) {
        self.playing = true;
        if let Some(session) = &self.session {
            if !session.is_finished() {
                session.set_paused(false);
                return;
            }
            // Replay from the top after a natural end, otherwise continue where the
            // failed session stopped.
            self.resume_at = if session.reached_end() {
                0.0
            } else {
                session.position()
            };
        }
        self.start_session(false);
    }

    fn seek(&mut self, position: f64) {
        self.resume_at = position.max(0.0);
        let running = self.session.as_ref().is_some_and(|s| !s.is_finished());
        if running || self.playing {
            self.start_session(!self.playing);
        } else {
            self.stop_session();
        }
    }

    /// Replace any session with one starting at `resume_at`.
    fn start_session(&mut self, paused: bool) {
        self.stop_session();
        let Some(url) = self.url.clone() else {
            tracing::debug!("no source assigned; ignoring");
            self.playing = false;
            return;
        };
        let spec = SessionSpec {
            generation: self.generation,
            url,
            start_at: self.resume_at,
            paused,
        };
        match session::start_session(spec, &self.config, &self.volume, &self.events) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                self.playing = false;
                self.emit(DeviceEventKind::Error {
                    message: format!("{e:#}"),
                });
            }
        }
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if session.is_finished() {
            self.playing = false;
            return;
        }
        let position = session.position();
        self.emit(DeviceEventKind::TimeUpdate { position });
    }

    fn emit(&self, kind: DeviceEventKind) {
        let _ = self.events.send(DeviceEvent::new(self.generation, kind));
    }
}
