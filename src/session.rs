//! Session state machine and event loop
//!
//! One `Session` instance covers one conversation with the tutor, from
//! start request to close. Capture callbacks, channel callbacks and the
//! user's stop request all feed a single bounded queue; the loop in
//! [`Session::run`] handles one event at a time in arrival order, which
//! is what keeps the playback timeline and active-handle set free of
//! concurrent mutation without any locking.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::capture::{CaptureStream, Microphone};
use crate::audio::frame::AudioFrame;
use crate::audio::output::{HandleId, Speaker};
use crate::channel::{ChannelEvent, ChannelHandle, Connector, SessionConfig};
use crate::codec;
use crate::constants::EVENT_QUEUE_CAPACITY;
use crate::error::{Error, Result};
use crate::playback::PlaybackScheduler;

/// Externally visible session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Error,
    Closed,
}

/// Everything the event loop reacts to, tagged by source.
#[derive(Debug)]
pub enum SessionEvent {
    /// A fixed-size block from the capture device
    CaptureBlock(AudioFrame),
    /// An inbound channel event
    Channel(ChannelEvent),
    /// A scheduled unit finished playing naturally
    PlaybackFinished(HandleId),
    /// A capture or output stream failed mid-session
    DeviceError(String),
    /// User-initiated stop
    StopRequested,
}

/// What the session currently holds, following the lifecycle.
enum Phase {
    NoSession,
    /// Channel opening; microphone acquired but not yet streaming
    Connecting {
        channel: Box<dyn ChannelHandle>,
        capture: Box<dyn CaptureStream>,
    },
    /// Duplex streaming in progress
    Active {
        channel: Box<dyn ChannelHandle>,
        capture: Box<dyn CaptureStream>,
    },
}

/// Callback receiving state transitions and human-readable status text.
pub type StatusCallback = Box<dyn FnMut(SessionState, &str) + Send>;

/// Handle the UI layer keeps to request a stop.
#[derive(Clone)]
pub struct SessionControl {
    events: Sender<SessionEvent>,
}

impl SessionControl {
    pub fn stop(&self) {
        let _ = self.events.send(SessionEvent::StopRequested);
    }
}

/// One tutoring session instance.
///
/// `Closed` is terminal: to practice again, build a fresh `Session`.
pub struct Session {
    state: SessionState,
    phase: Phase,
    scheduler: Option<PlaybackScheduler>,
    config: SessionConfig,
    connector: Box<dyn Connector>,
    microphone: Box<dyn Microphone>,
    speaker: Box<dyn Speaker>,
    status: StatusCallback,
    events: Receiver<SessionEvent>,
    event_tx: Sender<SessionEvent>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        connector: Box<dyn Connector>,
        microphone: Box<dyn Microphone>,
        speaker: Box<dyn Speaker>,
        status: StatusCallback,
    ) -> (Self, SessionControl) {
        let (event_tx, events) = bounded(EVENT_QUEUE_CAPACITY);
        let control = SessionControl {
            events: event_tx.clone(),
        };
        (
            Self {
                state: SessionState::Idle,
                phase: Phase::NoSession,
                scheduler: None,
                config,
                connector,
                microphone,
                speaker,
                status,
                events,
                event_tx,
            },
            control,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Acquire both audio devices and open the channel.
    ///
    /// On success the session is `Connecting`; feed it with [`run`].
    /// A refused microphone never reaches `Connecting`: the permission
    /// message is reported and the error returned, with nothing left
    /// half-open.
    ///
    /// [`run`]: Session::run
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::Session(format!(
                "start requested in state {:?}",
                self.state
            )));
        }

        let sink = self.speaker.open(self.event_tx.clone())?;
        self.scheduler = Some(PlaybackScheduler::new(sink));

        let capture = match self.microphone.open(self.event_tx.clone()) {
            Ok(capture) => capture,
            Err(e) => {
                self.scheduler = None;
                self.notify_current("Microphone access is required.");
                return Err(e.into());
            }
        };

        let channel = match self.connector.connect(&self.config, self.event_tx.clone()) {
            Ok(channel) => channel,
            Err(e) => {
                // Nothing half-acquired on a failed start
                self.scheduler = None;
                return Err(e.into());
            }
        };

        self.phase = Phase::Connecting { channel, capture };
        self.set_state(SessionState::Connecting, "Connecting to your tutor...");
        Ok(())
    }

    /// Run the event loop to completion and return the final state.
    pub fn run(mut self) -> SessionState {
        while self.state != SessionState::Closed {
            match self.events.recv() {
                Ok(event) => self.handle(event),
                Err(_) => break,
            }
        }
        self.state
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::CaptureBlock(frame) => self.on_capture_block(frame),
            SessionEvent::Channel(ChannelEvent::Opened) => self.on_channel_opened(),
            SessionEvent::Channel(ChannelEvent::Audio(chunk)) => self.on_inbound_audio(&chunk),
            SessionEvent::Channel(ChannelEvent::Interrupted) => self.on_interrupted(),
            SessionEvent::Channel(ChannelEvent::Error(message)) => self.on_fault(&message),
            SessionEvent::Channel(ChannelEvent::Closed) => {
                tracing::info!("channel closed by remote");
                self.shutdown("The session has ended.");
            }
            SessionEvent::PlaybackFinished(id) => {
                if let Some(scheduler) = &mut self.scheduler {
                    scheduler.on_finished(id);
                }
            }
            SessionEvent::DeviceError(message) => self.on_fault(&message),
            SessionEvent::StopRequested => self.shutdown("Practice finished."),
        }
    }

    /// Encode-then-send, synchronously, one block at a time. Blocks that
    /// arrive before the session is active, or that the channel refuses,
    /// are dropped rather than buffered.
    fn on_capture_block(&mut self, frame: AudioFrame) {
        if let Phase::Active { channel, .. } = &mut self.phase {
            let chunk = codec::to_transport(&frame);
            if let Err(e) = channel.send_audio(chunk) {
                tracing::trace!("outbound chunk dropped: {}", e);
            }
        } else {
            tracing::trace!("capture block before active, dropped");
        }
    }

    fn on_channel_opened(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::NoSession) {
            Phase::Connecting {
                mut channel,
                mut capture,
            } => {
                if let Err(e) = capture.start() {
                    tracing::error!("failed to start capture: {}", e);
                    self.phase = Phase::Connecting { channel, capture };
                    self.on_fault(&e.to_string());
                    return;
                }
                if let Err(e) = channel.send_text(&self.config.greeting) {
                    tracing::warn!("greeting not delivered: {}", e);
                }
                self.phase = Phase::Active { channel, capture };
                self.set_state(
                    SessionState::Active,
                    "Your tutor is connected. Listen closely and repeat out loud!",
                );
            }
            other => {
                tracing::debug!("ignoring open event outside Connecting");
                self.phase = other;
            }
        }
    }

    fn on_inbound_audio(&mut self, chunk: &codec::EncodedChunk) {
        if self.state != SessionState::Active {
            tracing::debug!("inbound audio outside Active, dropped");
            return;
        }
        if let Some(scheduler) = &mut self.scheduler {
            if let Err(e) = scheduler.enqueue(chunk) {
                // Chunk-local: drop it and keep the session going
                tracing::warn!("inbound chunk dropped: {}", e);
            }
        }
    }

    fn on_interrupted(&mut self) {
        tracing::debug!("barge-in: cancelling scheduled playback");
        if let Some(scheduler) = &mut self.scheduler {
            scheduler.cancel_all();
        }
    }

    fn on_fault(&mut self, message: &str) {
        tracing::error!("session fault: {}", message);
        self.set_state(SessionState::Error, "Something went wrong. Please try again.");
        self.shutdown("The session has ended.");
    }

    /// Tear the whole session down as one step: stop and clear playback,
    /// close the channel, release the capture device. No observable
    /// state where only part of that has happened.
    fn shutdown(&mut self, message: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(scheduler) = &mut self.scheduler {
            scheduler.cancel_all();
        }
        match std::mem::replace(&mut self.phase, Phase::NoSession) {
            Phase::Connecting { mut channel, capture } | Phase::Active { mut channel, capture } => {
                channel.close();
                drop(capture);
            }
            Phase::NoSession => {}
        }
        self.set_state(SessionState::Closed, message);
    }

    fn set_state(&mut self, state: SessionState, message: &str) {
        tracing::info!(from = ?self.state, to = ?state, "session transition");
        self.state = state;
        (self.status)(state, message);
    }

    fn notify_current(&mut self, message: &str) {
        (self.status)(self.state, message);
    }

    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> Option<&PlaybackScheduler> {
        self.scheduler.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn handle_event(&mut self, event: SessionEvent) {
        self.handle(event);
    }
}
