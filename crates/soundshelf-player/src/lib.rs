//! Playback for the SoundShelf client.
//!
//! [`coordinator::PlaybackCoordinator`] is the single owner of "what is playing". It drives
//! one [`device::AudioDevice`] and fans state changes out to subscribers. The production
//! device lives in [`output`] (HTTP range source -> Symphonia -> Rubato -> CPAL).

pub mod config;
pub mod coordinator;
pub mod device;
pub mod notify;
pub mod output;

pub use config::{OutputConfig, PlaybackConfig};
pub use coordinator::{PlayOutcome, PlaybackCoordinator};
pub use device::{AudioDevice, DeviceEvent, DeviceEventKind};
pub use notify::{NoopRecorder, PlayRecorder};
pub use output::{OutputDevice, OutputInfo, list_output_devices};
