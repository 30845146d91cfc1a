//! Remote channel abstraction
//!
//! The tutor service is reached over a bidirectional event channel:
//! microphone chunks and prompt text go out, synthesized audio and
//! interrupt/lifecycle events come back. The transport itself is a
//! collaborator behind [`Connector`]; this crate only defines the seam
//! and an offline [`loopback`] implementation for demos and tests.

pub mod loopback;

use crossbeam_channel::Sender;

use crate::codec::EncodedChunk;
use crate::error::ChannelError;
use crate::session::SessionEvent;

/// Fixed configuration a session connects with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prebuilt synthetic voice the tutor should speak with
    pub voice: String,
    /// System instruction parameterizing the tutor for the selected lesson
    pub system_instruction: String,
    /// Text prompt sent once on open to elicit the first utterance
    pub greeting: String,
}

/// Inbound events delivered by the channel, in arrival order.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel is open; duplex streaming may begin
    Opened,
    /// A chunk of synthesized tutor audio
    Audio(EncodedChunk),
    /// The remote agent detected the user speaking over it
    Interrupted,
    /// The channel failed; the session must stop
    Error(String),
    /// Clean remote close
    Closed,
}

/// Opens channels to the tutor service.
pub trait Connector: Send {
    /// Open a channel. Lifecycle and inbound events are delivered as
    /// [`SessionEvent::Channel`] values through `events`; the returned
    /// handle carries the outbound direction.
    fn connect(
        &mut self,
        config: &SessionConfig,
        events: Sender<SessionEvent>,
    ) -> Result<Box<dyn ChannelHandle>, ChannelError>;
}

/// Outbound half of an open channel.
pub trait ChannelHandle: Send {
    /// Stream one encoded microphone chunk. Best effort: failures mean
    /// the chunk is lost, not retried.
    fn send_audio(&mut self, chunk: EncodedChunk) -> Result<(), ChannelError>;

    /// Send a text prompt
    fn send_text(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Close the channel. Idempotent.
    fn close(&mut self);
}
