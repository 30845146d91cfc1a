//! Audio subsystem module

pub mod capture;
pub mod device;
pub mod frame;
pub mod output;

pub use capture::{CaptureStream, CpalMicrophone, Microphone};
pub use frame::AudioFrame;
pub use output::{CpalSpeaker, OutputSink, PlaybackUnit, ScheduledHandle, Speaker};
