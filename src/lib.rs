//! # Verb Shadowing
//!
//! Low-latency duplex voice client for real-time language shadowing
//! practice with a remote speech tutor.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  f32 blocks   ┌───────────────────────────────┐
//! │  Microphone  ├──────────────▶│       Session event loop      │
//! │ (16kHz mono) │  CaptureBlock │  (single thread, one event    │
//! └──────────────┘               │   at a time, arrival order)   │
//!                                │                               │
//! ┌──────────────┐  audio /      │  CaptureBlock ─▶ PCM16+base64 │──▶ channel
//! │Remote channel├──────────────▶│  InboundAudio ─▶ scheduler    │
//! │ (duplex)     │  interrupt /  │  Interrupted  ─▶ cancel all   │
//! └──────────────┘  lifecycle    │  Error/Closed ─▶ teardown     │
//!                                └───────────────┬───────────────┘
//!                                                │ gapless schedule
//!                                ┌───────────────▼───────────────┐
//!                                │   Output mixer (24kHz mono)   │
//!                                └───────────────────────────────┘
//! ```
//!
//! The engine is event driven: capture callbacks, channel callbacks and
//! user stop requests all funnel into one bounded queue consumed by the
//! [`session::Session`] loop, so the playback timeline and the active
//! handle set are only ever touched from a single logical flow.

pub mod audio;
pub mod channel;
pub mod codec;
pub mod config;
pub mod content;
pub mod error;
pub mod playback;
pub mod session;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate the microphone is captured at
    pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

    /// Sample rate the tutor's synthesized audio is played at
    pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

    /// Both directions are mono
    pub const CHANNELS: u16 = 1;

    /// Samples per capture block pushed to the outbound channel
    pub const CAPTURE_BLOCK_SIZE: usize = 4096;

    /// MIME tag attached to outbound microphone chunks
    pub const CAPTURE_MIME: &str = "audio/pcm;rate=16000";

    /// MIME tag expected on inbound synthesized chunks
    pub const PLAYBACK_MIME: &str = "audio/pcm;rate=24000";

    /// Prebuilt synthetic voice requested from the tutor service
    pub const DEFAULT_VOICE: &str = "Puck";

    /// Capacity of the session event queue; capture blocks arriving
    /// while the queue is full are dropped, not buffered
    pub const EVENT_QUEUE_CAPACITY: usize = 256;
}
