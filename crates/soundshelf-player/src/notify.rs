//! Play-count notification.

use std::sync::Arc;
use std::thread;

use anyhow::Result;

/// Remote counter told about every newly started track.
pub trait PlayRecorder: Send + Sync {
    fn record_play(&self, track_id: &str) -> Result<()>;
}

/// Recorder that does nothing, for offline use.
pub struct NoopRecorder;

impl PlayRecorder for NoopRecorder {
    fn record_play(&self, _track_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Notify `recorder` on a detached thread.
///
/// The result is never awaited: a failed notification is logged and dropped, and
/// playback does not depend on it.
pub fn dispatch_record_play(recorder: Arc<dyn PlayRecorder>, track_id: String) {
    let spawned = thread::Builder::new()
        .name("record-play".to_string())
        .spawn(move || {
            if let Err(e) = recorder.record_play(&track_id) {
                tracing::debug!(track_id = %track_id, "play count not recorded (ignored): {e:#}");
            }
        });
    if let Err(e) = spawned {
        tracing::debug!("play count thread not started (ignored): {e}");
    }
}
