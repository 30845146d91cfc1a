//! Offline loopback agent
//!
//! A [`Connector`] that stands in for the remote tutor so the duplex
//! engine can be exercised end to end without the real service: it
//! answers the greeting with a short tone, echoes each detected user
//! utterance back at the playback rate, and raises `Interrupted` when
//! the user talks over it. Useful for demos and for soak-testing the
//! barge-in path.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::thread;
use std::time::Duration;

use crate::channel::{ChannelEvent, ChannelHandle, Connector, SessionConfig};
use crate::codec::{decode_chunk, encode_samples, EncodedChunk};
use crate::constants::{CAPTURE_SAMPLE_RATE, CHANNELS, PLAYBACK_MIME, PLAYBACK_SAMPLE_RATE};
use crate::error::ChannelError;
use crate::session::SessionEvent;

/// RMS level above which a capture block counts as speech
const SPEECH_RMS: f32 = 0.02;

/// Quiet blocks marking the end of an utterance (one block ~ 256ms)
const END_OF_UTTERANCE_BLOCKS: usize = 2;

/// Seconds of agent audio per emitted chunk
const CHUNK_SECS: f64 = 0.2;

enum Outbound {
    Audio(EncodedChunk),
    Text,
    Close,
}

/// Echoes the user back as if it were the remote tutor.
#[derive(Default)]
pub struct EchoAgent;

impl EchoAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for EchoAgent {
    fn connect(
        &mut self,
        config: &SessionConfig,
        events: Sender<SessionEvent>,
    ) -> Result<Box<dyn ChannelHandle>, ChannelError> {
        tracing::info!(voice = %config.voice, "loopback agent connected");
        let (outbound_tx, outbound_rx) = bounded::<Outbound>(64);

        thread::Builder::new()
            .name("loopback-agent".to_string())
            .spawn(move || agent_loop(&outbound_rx, &events))
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Box::new(LoopbackHandle { tx: outbound_tx }))
    }
}

struct LoopbackHandle {
    tx: Sender<Outbound>,
}

impl ChannelHandle for LoopbackHandle {
    fn send_audio(&mut self, chunk: EncodedChunk) -> Result<(), ChannelError> {
        match self.tx.try_send(Outbound::Audio(chunk)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ChannelError::NotReady),
            Err(TrySendError::Disconnected(_)) => Err(ChannelError::Closed),
        }
    }

    fn send_text(&mut self, _text: &str) -> Result<(), ChannelError> {
        self.tx
            .try_send(Outbound::Text)
            .map_err(|_| ChannelError::Closed)
    }

    fn close(&mut self) {
        let _ = self.tx.try_send(Outbound::Close);
    }
}

fn agent_loop(outbound: &Receiver<Outbound>, events: &Sender<SessionEvent>) {
    let _ = events.send(SessionEvent::Channel(ChannelEvent::Opened));

    let mut collected: Vec<f32> = Vec::new();
    let mut quiet_blocks = 0usize;

    loop {
        match outbound.recv() {
            Ok(Outbound::Text) => {
                // The greeting elicits the agent's first utterance
                if speak(&tone(0.8), outbound, events).is_break() {
                    break;
                }
            }
            Ok(Outbound::Audio(chunk)) => {
                let Ok(channels) = decode_chunk(&chunk, CHANNELS) else {
                    continue;
                };
                let block = &channels[0];
                if rms(block) >= SPEECH_RMS {
                    quiet_blocks = 0;
                    collected.extend_from_slice(block);
                } else if !collected.is_empty() {
                    quiet_blocks += 1;
                    if quiet_blocks >= END_OF_UTTERANCE_BLOCKS {
                        let utterance =
                            resample(&collected, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE);
                        collected.clear();
                        quiet_blocks = 0;
                        if speak(&utterance, outbound, events).is_break() {
                            break;
                        }
                    }
                }
            }
            Ok(Outbound::Close) | Err(_) => break,
        }
    }

    let _ = events.send(SessionEvent::Channel(ChannelEvent::Closed));
    tracing::debug!("loopback agent finished");
}

/// Emit an utterance as paced chunks, watching for the user talking
/// over it. Returns `Break` when the channel closed mid-utterance.
fn speak(
    samples: &[f32],
    outbound: &Receiver<Outbound>,
    events: &Sender<SessionEvent>,
) -> std::ops::ControlFlow<()> {
    let chunk_len = (CHUNK_SECS * f64::from(PLAYBACK_SAMPLE_RATE)) as usize;

    for chunk in samples.chunks(chunk_len.max(1)) {
        // Barge-in check between chunks
        while let Ok(item) = outbound.try_recv() {
            match item {
                Outbound::Audio(incoming) => {
                    if let Ok(channels) = decode_chunk(&incoming, CHANNELS) {
                        if rms(&channels[0]) >= SPEECH_RMS {
                            tracing::debug!("user spoke over the agent, interrupting");
                            let _ = events.send(SessionEvent::Channel(ChannelEvent::Interrupted));
                            return std::ops::ControlFlow::Continue(());
                        }
                    }
                }
                Outbound::Text => {}
                Outbound::Close => return std::ops::ControlFlow::Break(()),
            }
        }

        let encoded = encode_samples(chunk, PLAYBACK_MIME);
        if events
            .send(SessionEvent::Channel(ChannelEvent::Audio(encoded)))
            .is_err()
        {
            return std::ops::ControlFlow::Break(());
        }
        thread::sleep(Duration::from_secs_f64(
            chunk.len() as f64 / f64::from(PLAYBACK_SAMPLE_RATE),
        ));
    }

    std::ops::ControlFlow::Continue(())
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// A soft 440Hz tone with short fades, the agent's stand-in voice
fn tone(seconds: f64) -> Vec<f32> {
    let rate = f64::from(PLAYBACK_SAMPLE_RATE);
    let len = (seconds * rate) as usize;
    let fade = (0.01 * rate) as usize;
    (0..len)
        .map(|i| {
            let t = i as f64 / rate;
            let mut v = (t * 440.0 * std::f64::consts::TAU).sin() * 0.2;
            if i < fade {
                v *= i as f64 / fade as f64;
            }
            let from_end = len - i;
            if from_end < fade {
                v *= from_end as f64 / fade as f64;
            }
            v as f32
        })
        .collect()
}

/// Linear-interpolation resample, good enough for an echo stub
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == to_rate {
        return samples.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / ratio) as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CAPTURE_BLOCK_SIZE, CAPTURE_MIME};

    fn loud_block() -> EncodedChunk {
        let samples: Vec<f32> = (0..CAPTURE_BLOCK_SIZE)
            .map(|i| (i as f32 * 0.3).sin() * 0.5)
            .collect();
        encode_samples(&samples, CAPTURE_MIME)
    }

    fn quiet_block() -> EncodedChunk {
        encode_samples(&vec![0.0; CAPTURE_BLOCK_SIZE], CAPTURE_MIME)
    }

    fn recv_channel_event(
        events: &Receiver<SessionEvent>,
        timeout: Duration,
    ) -> Option<ChannelEvent> {
        let deadline = std::time::Instant::now() + timeout;
        while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
            match events.recv_timeout(remaining) {
                Ok(SessionEvent::Channel(event)) => return Some(event),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        None
    }

    fn connect() -> (Box<dyn ChannelHandle>, Receiver<SessionEvent>) {
        let (tx, rx) = bounded(256);
        let config = SessionConfig {
            voice: "Puck".to_string(),
            system_instruction: String::new(),
            greeting: "hi".to_string(),
        };
        let handle = EchoAgent::new().connect(&config, tx).unwrap();
        (handle, rx)
    }

    #[test]
    fn opens_echoes_and_closes() {
        let (mut handle, rx) = connect();

        assert!(matches!(
            recv_channel_event(&rx, Duration::from_secs(1)),
            Some(ChannelEvent::Opened)
        ));

        // One utterance followed by silence comes back as agent audio
        for _ in 0..3 {
            handle.send_audio(loud_block()).unwrap();
        }
        for _ in 0..END_OF_UTTERANCE_BLOCKS {
            handle.send_audio(quiet_block()).unwrap();
        }
        match recv_channel_event(&rx, Duration::from_secs(2)) {
            Some(ChannelEvent::Audio(chunk)) => assert_eq!(chunk.mime_type, PLAYBACK_MIME),
            other => panic!("expected echoed audio, got {other:?}"),
        }

        handle.close();
        let mut saw_closed = false;
        while let Some(event) = recv_channel_event(&rx, Duration::from_secs(2)) {
            if matches!(event, ChannelEvent::Closed) {
                saw_closed = true;
                break;
            }
        }
        assert!(saw_closed);
    }

    #[test]
    fn speaking_over_the_agent_interrupts() {
        let (mut handle, rx) = connect();
        assert!(matches!(
            recv_channel_event(&rx, Duration::from_secs(1)),
            Some(ChannelEvent::Opened)
        ));

        // The greeting elicits a paced multi-chunk utterance
        handle.send_text("hello").unwrap();
        assert!(matches!(
            recv_channel_event(&rx, Duration::from_secs(2)),
            Some(ChannelEvent::Audio(_))
        ));

        // Talk over it
        handle.send_audio(loud_block()).unwrap();

        let mut saw_interrupt = false;
        while let Some(event) = recv_channel_event(&rx, Duration::from_secs(2)) {
            match event {
                ChannelEvent::Interrupted => {
                    saw_interrupt = true;
                    break;
                }
                ChannelEvent::Audio(_) => {}
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(saw_interrupt);

        handle.close();
    }

    #[test]
    fn resample_preserves_duration() {
        let one_second = vec![0.5f32; CAPTURE_SAMPLE_RATE as usize];
        let out = resample(&one_second, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE);
        assert_eq!(out.len(), PLAYBACK_SAMPLE_RATE as usize);
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0; 64]), 0.0);
        assert!(rms(&[]) == 0.0);
    }
}
