//! Playback coordinator.
//!
//! Single source of truth for "what is playing". The coordinator owns the one
//! [`AudioDevice`], applies every playback command to it, mirrors device events into
//! [`PlaybackState`], and publishes a full [`PlaybackSnapshot`] to subscribers after each
//! change.
//!
//! It is driven from one thread of control: commands are `&mut self` calls and device
//! events are applied only when the owner calls [`PlaybackCoordinator::poll_device`], so
//! commands and events never interleave.

use std::sync::Arc;
use crossbeam_channel::{Receiver, Sender};
use soundshelf_types::{PlaybackPhase, PlaybackSnapshot, TrackSummary};

use crate::device::{AudioDevice, DeviceEvent, DeviceEventKind};
use crate::notify::{PlayRecorder, dispatch_record_play};

/// Volume applied when the coordinator is created.
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Result of [`PlaybackCoordinator::play`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A different track became current and playback was requested from the start.
    Started,
    /// The track was already current; playback was requested from the current position.
    Resumed,
    /// The track has no playable source; nothing changed.
    NoSource,
}

#[derive(Clone, Debug)]
struct PlaybackState {
    current_track: Option<TrackSummary>,
    is_playing: bool,
    current_time: f64,
    /// `0.0` while unknown.
    duration: f64,
    volume: f32,
    last_error: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            last_error: None,
        }
    }
}

impl PlaybackState {
    fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            self.current_time / self.duration * 100.0
        } else {
            0.0
        }
    }

    fn phase(&self) -> PlaybackPhase {
        match (&self.current_track, self.is_playing) {
            (None, _) => PlaybackPhase::Idle,
            (Some(_), true) => PlaybackPhase::Playing,
            (Some(_), false) => PlaybackPhase::Paused,
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_track: self.current_track.clone(),
            is_playing: self.is_playing,
            current_time: self.current_time,
            duration: self.duration,
            progress: self.progress(),
            volume: self.volume,
            phase: self.phase(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Owner of the playback state and the audio device.
pub struct PlaybackCoordinator<D: AudioDevice> {
    device: D,
    device_events: Receiver<DeviceEvent>,
    recorder: Arc<dyn PlayRecorder>,
    state: PlaybackState,
    /// Generation of the most recent `load`; events tagged otherwise are stale.
    generation: u64,
    subscribers: Vec<Sender<PlaybackSnapshot>>,
    released: bool,
}

impl<D: AudioDevice> PlaybackCoordinator<D> {
    /// Take ownership of `device` and apply the default volume to it.
    pub fn new(mut device: D, recorder: Arc<dyn PlayRecorder>) -> Self {
        let device_events = device.events();
        device.set_volume(DEFAULT_VOLUME);
        Self {
            device,
            device_events,
            recorder,
            state: PlaybackState::default(),
            generation: 0,
            subscribers: Vec::new(),
            released: false,
        }
    }

    /// Make `track` current (if it is not already) and request playback.
    ///
    /// Switching tracks loads the new source, resets position, and fires a play-count
    /// notification without waiting for it. Replaying the current track resumes from
    /// where it is. `is_playing` flips to `true` as soon as playback is requested; a
    /// refusal from the device arrives later as an error event.
    pub fn play(&mut self, track: &TrackSummary) -> PlayOutcome {
        let Some(url) = track.playable_url() else {
            tracing::warn!(track_id = %track.id, "track has no playable source; ignoring play");
            return PlayOutcome::NoSource;
        };

        let switching = self
            .state
            .current_track
            .as_ref()
            .is_none_or(|current| current.id != track.id);

        if switching {
            self.generation += 1;
            tracing::info!(
                track_id = %track.id,
                title = %track.title,
                generation = self.generation,
                "loading track"
            );
            self.device.load(self.generation, url);
            self.state.current_track = Some(track.clone());
            self.state.current_time = 0.0;
            self.state.duration = 0.0;
            dispatch_record_play(Arc::clone(&self.recorder), track.id.clone());
        }

        self.state.last_error = None;
        self.device.play();
        self.state.is_playing = true;
        self.publish();

        if switching {
            PlayOutcome::Started
        } else {
            PlayOutcome::Resumed
        }
    }

    /// Stop producing audio. Calling it while paused changes nothing.
    pub fn pause(&mut self) {
        self.device.pause();
        if self.state.is_playing {
            self.state.is_playing = false;
            self.publish();
        }
    }

    /// Pause when playing, resume when paused with a current track, otherwise do nothing.
    pub fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else if self.state.current_track.is_some() {
            self.device.play();
            self.state.is_playing = true;
            self.state.last_error = None;
            self.publish();
        }
    }

    /// Move to `time` seconds. The new position is reflected immediately; range
    /// handling is left to the device.
    pub fn seek(&mut self, time: f64) {
        self.device.seek(time);
        self.state.current_time = time;
        self.publish();
    }

    /// Seek to a fraction of the track, as a waveform click does.
    ///
    /// Uses the catalog duration while the device has not reported one.
    pub fn seek_fraction(&mut self, fraction: f64) {
        let Some(track) = self.state.current_track.as_ref() else {
            return;
        };
        let duration = if self.state.duration > 0.0 {
            self.state.duration
        } else {
            track.duration
        };
        self.seek(fraction * duration);
    }

    /// Set output gain. Callers keep `level` within `[0, 1]`.
    pub fn set_volume(&mut self, level: f32) {
        self.device.set_volume(level);
        self.state.volume = level;
        self.publish();
    }

    /// Apply all pending device events without blocking. Returns how many were applied.
    pub fn poll_device(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.device_events.try_recv() {
            if self.apply_device_event(event) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_device_event(&mut self, event: DeviceEvent) -> bool {
        if event.generation != self.generation || self.state.current_track.is_none() {
            tracing::trace!(
                generation = event.generation,
                current = self.generation,
                "dropping stale device event"
            );
            return false;
        }

        match event.kind {
            DeviceEventKind::TimeUpdate { position } => {
                self.state.current_time = position;
            }
            DeviceEventKind::LoadedMetadata { duration } => {
                tracing::debug!(duration, "track metadata loaded");
                self.state.duration = duration;
            }
            DeviceEventKind::Ended => {
                tracing::info!(generation = self.generation, "track ended");
                self.state.is_playing = false;
            }
            DeviceEventKind::Error { message } => {
                tracing::warn!(generation = self.generation, "playback failed: {message}");
                self.state.is_playing = false;
                self.state.last_error = Some(message);
            }
        }
        self.publish();
        true
    }

    /// Current state as one consistent copy.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.snapshot()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    /// Receive a snapshot now and after every subsequent state change.
    pub fn subscribe(&mut self) -> Receiver<PlaybackSnapshot> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _ = tx.send(self.state.snapshot());
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.state.snapshot();
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    /// Release the device. Further commands reach a released device and have no audible
    /// effect.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        tracing::info!("releasing audio device");
        self.device.release();
        self.released = true;
        if self.state.is_playing {
            self.state.is_playing = false;
            self.publish();
        }
    }
}

impl<D: AudioDevice> Drop for PlaybackCoordinator<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Load(u64, String),
        Play,
        Pause,
        Seek(f64),
        Volume(f32),
        Release,
    }

    struct FakeDevice {
        calls: Arc<Mutex<Vec<Call>>>,
        events_rx: Receiver<DeviceEvent>,
    }

    impl FakeDevice {
        fn new() -> (Self, Sender<DeviceEvent>, Arc<Mutex<Vec<Call>>>) {
            let (tx, rx) = crossbeam_channel::unbounded();
            let calls = Arc::new(Mutex::new(Vec::new()));
            let device = FakeDevice {
                calls: Arc::clone(&calls),
                events_rx: rx,
            };
            (device, tx, calls)
        }

        fn log(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl AudioDevice for FakeDevice {
        fn load(&mut self, generation: u64, url: &str) {
            self.log(Call::Load(generation, url.to_string()));
        }
        fn play(&mut self) {
            self.log(Call::Play);
        }
        fn pause(&mut self) {
            self.log(Call::Pause);
        }
        fn seek(&mut self, position: f64) {
            self.log(Call::Seek(position));
        }
        fn set_volume(&mut self, volume: f32) {
            self.log(Call::Volume(volume));
        }
        fn events(&self) -> Receiver<DeviceEvent> {
            self.events_rx.clone()
        }
        fn release(&mut self) {
            self.log(Call::Release);
        }
    }

    struct ChannelRecorder {
        tx: Sender<String>,
        fail: bool,
    }

    impl PlayRecorder for ChannelRecorder {
        fn record_play(&self, track_id: &str) -> anyhow::Result<()> {
            let _ = self.tx.send(track_id.to_string());
            if self.fail {
                anyhow::bail!("counter unavailable");
            }
            Ok(())
        }
    }

    struct Harness {
        coord: PlaybackCoordinator<FakeDevice>,
        feed: Sender<DeviceEvent>,
        calls: Arc<Mutex<Vec<Call>>>,
        plays: Receiver<String>,
    }

    fn harness_with(fail_recorder: bool) -> Harness {
        let (device, feed, calls) = FakeDevice::new();
        let (tx, plays) = crossbeam_channel::unbounded();
        let recorder = Arc::new(ChannelRecorder {
            tx,
            fail: fail_recorder,
        });
        Harness {
            coord: PlaybackCoordinator::new(device, recorder),
            feed,
            calls,
            plays,
        }
    }

    fn harness() -> Harness {
        harness_with(false)
    }

    fn track(id: &str, url: Option<&str>) -> TrackSummary {
        TrackSummary {
            id: id.to_string(),
            title: format!("Track {id}"),
            duration: 120.0,
            audio_url: url.map(str::to_string),
            ..Default::default()
        }
    }

    fn loads(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
        calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Load(..)))
            .cloned()
            .collect()
    }

    fn last_call(calls: &Arc<Mutex<Vec<Call>>>) -> Option<Call> {
        calls.lock().unwrap().last().cloned()
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn new_coordinator_is_idle_with_default_volume() {
        let h = harness();
        let snap = h.coord.snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Idle);
        assert!(snap.current_track.is_none());
        assert!(!snap.is_playing);
        assert_eq!(snap.volume, DEFAULT_VOLUME);
        assert_eq!(*h.calls.lock().unwrap(), vec![Call::Volume(DEFAULT_VOLUME)]);
    }

    #[test]
    fn play_new_track_loads_starts_and_records_play() {
        let mut h = harness();
        let outcome = h.coord.play(&track("t1", Some("a.mp3")));

        assert_eq!(outcome, PlayOutcome::Started);
        let snap = h.coord.snapshot();
        assert_eq!(snap.current_track.as_ref().map(|t| t.id.as_str()), Some("t1"));
        assert!(snap.is_playing);
        assert_eq!(snap.current_time, 0.0);
        assert_eq!(snap.phase, PlaybackPhase::Playing);
        assert_eq!(loads(&h.calls), vec![Call::Load(1, "a.mp3".to_string())]);
        assert_eq!(last_call(&h.calls), Some(Call::Play));
        assert_eq!(h.plays.recv_timeout(WAIT).unwrap(), "t1");
    }

    #[test]
    fn seek_updates_position_before_device_confirms() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.seek(60.0);

        assert_eq!(h.coord.snapshot().current_time, 60.0);
        assert_eq!(last_call(&h.calls), Some(Call::Seek(60.0)));
    }

    #[test]
    fn seek_is_not_clamped_to_duration() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::LoadedMetadata { duration: 120.0 }))
            .unwrap();
        h.coord.poll_device();
        h.coord.seek(500.0);
        assert_eq!(h.coord.snapshot().current_time, 500.0);
        assert_eq!(last_call(&h.calls), Some(Call::Seek(500.0)));
    }

    #[test]
    fn play_without_source_leaves_state_untouched() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        let before = h.calls.lock().unwrap().len();

        let outcome = h.coord.play(&track("t2", None));

        assert_eq!(outcome, PlayOutcome::NoSource);
        let snap = h.coord.snapshot();
        assert_eq!(snap.current_track.as_ref().map(|t| t.id.as_str()), Some("t1"));
        assert!(snap.is_playing);
        assert_eq!(h.calls.lock().unwrap().len(), before);
    }

    #[test]
    fn play_without_source_when_idle_stays_idle() {
        let mut h = harness();
        assert_eq!(h.coord.play(&track("t1", None)), PlayOutcome::NoSource);
        assert_eq!(h.coord.snapshot().phase, PlaybackPhase::Idle);
        assert!(h.plays.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn pause_then_toggle_resumes_from_same_position() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::TimeUpdate { position: 42.5 }))
            .unwrap();
        h.coord.poll_device();

        h.coord.pause();
        assert!(!h.coord.is_playing());
        assert_eq!(last_call(&h.calls), Some(Call::Pause));

        h.coord.toggle_play();
        let snap = h.coord.snapshot();
        assert!(snap.is_playing);
        assert_eq!(snap.current_time, 42.5);
        assert_eq!(snap.current_track.as_ref().map(|t| t.id.as_str()), Some("t1"));
        assert_eq!(last_call(&h.calls), Some(Call::Play));
        assert_eq!(loads(&h.calls).len(), 1);
    }

    #[test]
    fn toggle_while_playing_pauses() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.toggle_play();
        assert!(!h.coord.is_playing());
        assert_eq!(h.coord.snapshot().phase, PlaybackPhase::Paused);
    }

    #[test]
    fn toggle_without_track_does_nothing() {
        let mut h = harness();
        h.coord.toggle_play();
        assert!(!h.coord.is_playing());
        assert_eq!(*h.calls.lock().unwrap(), vec![Call::Volume(DEFAULT_VOLUME)]);
    }

    #[test]
    fn pause_is_idempotent() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        let rx = h.coord.subscribe();
        let _initial = rx.recv().unwrap();

        h.coord.pause();
        h.coord.pause();

        assert!(!h.coord.is_playing());
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn replaying_current_track_keeps_position_and_skips_notification() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        assert_eq!(h.plays.recv_timeout(WAIT).unwrap(), "t1");
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::TimeUpdate { position: 30.0 }))
            .unwrap();
        h.coord.poll_device();
        h.coord.pause();

        let outcome = h.coord.play(&track("t1", Some("a.mp3")));

        assert_eq!(outcome, PlayOutcome::Resumed);
        assert!(h.coord.is_playing());
        assert_eq!(h.coord.snapshot().current_time, 30.0);
        assert_eq!(loads(&h.calls).len(), 1);
        assert!(h.plays.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn switching_tracks_resets_position_and_progress() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::LoadedMetadata { duration: 120.0 }))
            .unwrap();
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::TimeUpdate { position: 60.0 }))
            .unwrap();
        assert_eq!(h.coord.poll_device(), 2);
        assert_eq!(h.coord.snapshot().progress, 50.0);
        h.coord.pause();

        let outcome = h.coord.play(&track("t2", Some("b.mp3")));

        assert_eq!(outcome, PlayOutcome::Started);
        let snap = h.coord.snapshot();
        assert_eq!(snap.current_track.as_ref().map(|t| t.id.as_str()), Some("t2"));
        assert_eq!(snap.current_time, 0.0);
        assert_eq!(snap.progress, 0.0);
        assert!(snap.is_playing);
        assert_eq!(
            loads(&h.calls),
            vec![
                Call::Load(1, "a.mp3".to_string()),
                Call::Load(2, "b.mp3".to_string())
            ]
        );
        assert_eq!(h.plays.recv_timeout(WAIT).unwrap(), "t1");
        assert_eq!(h.plays.recv_timeout(WAIT).unwrap(), "t2");
    }

    #[test]
    fn volume_survives_track_changes() {
        let mut h = harness();
        h.coord.set_volume(0.35);
        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.play(&track("t2", Some("b.mp3")));

        assert_eq!(h.coord.snapshot().volume, 0.35);
        assert_eq!(h.coord.snapshot().volume, 0.35);
        let volume_calls: Vec<Call> = h
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Volume(_)))
            .cloned()
            .collect();
        assert_eq!(volume_calls, vec![Call::Volume(DEFAULT_VOLUME), Call::Volume(0.35)]);
    }

    #[test]
    fn set_volume_passes_out_of_range_values_through() {
        let mut h = harness();
        h.coord.set_volume(1.5);
        assert_eq!(h.coord.snapshot().volume, 1.5);
        assert_eq!(last_call(&h.calls), Some(Call::Volume(1.5)));
    }

    #[test]
    fn ended_stops_playback_but_keeps_track_and_position() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::TimeUpdate { position: 119.9 }))
            .unwrap();
        h.feed.send(DeviceEvent::new(1, DeviceEventKind::Ended)).unwrap();
        h.coord.poll_device();

        let snap = h.coord.snapshot();
        assert!(!snap.is_playing);
        assert_eq!(snap.current_time, 119.9);
        assert_eq!(snap.current_track.as_ref().map(|t| t.id.as_str()), Some("t1"));
        assert_eq!(snap.phase, PlaybackPhase::Paused);
    }

    #[test]
    fn events_from_superseded_load_are_dropped() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.play(&track("t2", Some("b.mp3")));

        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::TimeUpdate { position: 99.0 }))
            .unwrap();
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::LoadedMetadata { duration: 300.0 }))
            .unwrap();
        h.feed.send(DeviceEvent::new(1, DeviceEventKind::Ended)).unwrap();
        h.feed
            .send(DeviceEvent::new(2, DeviceEventKind::TimeUpdate { position: 1.0 }))
            .unwrap();

        assert_eq!(h.coord.poll_device(), 1);
        let snap = h.coord.snapshot();
        assert!(snap.is_playing);
        assert_eq!(snap.current_time, 1.0);
        assert_eq!(snap.duration, 0.0);
    }

    #[test]
    fn device_error_reconciles_playing_flag() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.feed
            .send(DeviceEvent::new(
                1,
                DeviceEventKind::Error {
                    message: "decode failed".to_string(),
                },
            ))
            .unwrap();
        h.coord.poll_device();

        let snap = h.coord.snapshot();
        assert!(!snap.is_playing);
        assert_eq!(snap.last_error.as_deref(), Some("decode failed"));
        assert_eq!(snap.current_track.as_ref().map(|t| t.id.as_str()), Some("t1"));

        h.coord.toggle_play();
        assert!(h.coord.is_playing());
        assert!(h.coord.snapshot().last_error.is_none());
    }

    #[test]
    fn failed_play_notification_does_not_affect_playback() {
        let mut h = harness_with(true);
        let outcome = h.coord.play(&track("t1", Some("a.mp3")));
        assert_eq!(outcome, PlayOutcome::Started);
        assert_eq!(h.plays.recv_timeout(WAIT).unwrap(), "t1");
        assert!(h.coord.is_playing());
    }

    #[test]
    fn progress_is_derived_from_time_and_duration() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::TimeUpdate { position: 30.0 }))
            .unwrap();
        h.coord.poll_device();
        assert_eq!(h.coord.snapshot().progress, 0.0);

        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::LoadedMetadata { duration: 120.0 }))
            .unwrap();
        h.coord.poll_device();
        assert_eq!(h.coord.snapshot().progress, 25.0);
    }

    #[test]
    fn seek_fraction_falls_back_to_catalog_duration() {
        let mut h = harness();
        h.coord.seek_fraction(0.5);
        assert_eq!(*h.calls.lock().unwrap(), vec![Call::Volume(DEFAULT_VOLUME)]);

        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.seek_fraction(0.5);
        assert_eq!(h.coord.snapshot().current_time, 60.0);

        h.feed
            .send(DeviceEvent::new(1, DeviceEventKind::LoadedMetadata { duration: 200.0 }))
            .unwrap();
        h.coord.poll_device();
        h.coord.seek_fraction(0.25);
        assert_eq!(h.coord.snapshot().current_time, 50.0);
    }

    #[test]
    fn subscribers_observe_identical_snapshots() {
        let mut h = harness();
        let first = h.coord.subscribe();
        let second = h.coord.subscribe();

        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.seek(12.0);

        let a: Vec<PlaybackSnapshot> = first.try_iter().collect();
        let b: Vec<PlaybackSnapshot> = second.try_iter().collect();
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
        assert_eq!(a[0].phase, PlaybackPhase::Idle);
        assert!(a[1].is_playing);
        assert_eq!(a[2].current_time, 12.0);
        assert_eq!(a[2], h.coord.snapshot());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut h = harness();
        let kept = h.coord.subscribe();
        let gone = h.coord.subscribe();
        drop(gone);

        h.coord.set_volume(0.5);

        assert_eq!(h.coord.subscribers.len(), 1);
        assert_eq!(kept.try_iter().last().map(|s| s.volume), Some(0.5));
    }

    #[test]
    fn playing_flag_follows_last_state_changing_call() {
        let mut h = harness();
        let t1 = track("t1", Some("a.mp3"));
        let t2 = track("t2", Some("b.mp3"));

        let steps: Vec<(&str, bool)> = vec![
            ("toggle", false),
            ("play1", true),
            ("pause", false),
            ("pause", false),
            ("toggle", true),
            ("toggle", false),
            ("play2", true),
            ("ended", false),
            ("toggle", true),
            ("play1", true),
        ];

        for (step, expected) in steps {
            match step {
                "play1" => {
                    h.coord.play(&t1);
                }
                "play2" => {
                    h.coord.play(&t2);
                }
                "pause" => h.coord.pause(),
                "toggle" => h.coord.toggle_play(),
                "ended" => {
                    h.feed
                        .send(DeviceEvent::new(h.coord.generation, DeviceEventKind::Ended))
                        .unwrap();
                    h.coord.poll_device();
                }
                _ => unreachable!(),
            }
            assert_eq!(h.coord.is_playing(), expected, "after {step}");
        }
    }

    #[test]
    fn shutdown_releases_device_once() {
        let mut h = harness();
        h.coord.play(&track("t1", Some("a.mp3")));
        h.coord.shutdown();
        assert!(!h.coord.is_playing());
        let calls = Arc::clone(&h.calls);
        drop(h);

        let releases = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == Call::Release)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn dropping_coordinator_releases_device() {
        let h = harness();
        let calls = Arc::clone(&h.calls);
        drop(h);
        assert_eq!(last_call(&calls), Some(Call::Release));
    }
}
