//! Audio device seam.
//!
//! The coordinator only talks to [`AudioDevice`]. Requests return immediately; outcomes
//! arrive later as [`DeviceEvent`]s on the channel returned by [`AudioDevice::events`].

use crossbeam_channel::Receiver;

/// Event emitted by a device, tagged with the load it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceEvent {
    /// Generation passed to the [`AudioDevice::load`] call this event stems from.
    pub generation: u64,
    pub kind: DeviceEventKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEventKind {
    /// Playback position in seconds.
    TimeUpdate { position: f64 },
    /// Total source duration in seconds, once known.
    LoadedMetadata { duration: f64 },
    /// The source played to its end.
    Ended,
    /// Load, decode, or output failed; playback is not progressing.
    Error { message: String },
}

impl DeviceEvent {
    pub fn new(generation: u64, kind: DeviceEventKind) -> Self {
        Self { generation, kind }
    }
}

/// One audio output owned exclusively by the playback coordinator.
pub trait AudioDevice {
    /// Assign a new source. Any load in flight is abandoned; events for older
    /// generations may still be delivered and must be ignored by the caller.
    fn load(&mut self, generation: u64, url: &str);
    /// Start or resume producing audio from the current position.
    fn play(&mut self);
    /// Stop producing audio, keeping the position.
    fn pause(&mut self);
    /// Move the position to `position` seconds. Range handling is up to the device.
    fn seek(&mut self, position: f64);
    /// Set output gain; nominal range is `[0, 1]`.
    fn set_volume(&mut self, volume: f32);
    /// Subscription channel for position, metadata, end and error events.
    fn events(&self) -> Receiver<DeviceEvent>;
    /// Stop output and free the underlying resources.
    fn release(&mut self);
}
