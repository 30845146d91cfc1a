//! Output device abstraction and cpal-backed playback mixer
//!
//! The playback scheduler talks to the output device through
//! [`OutputSink`]: a monotonic clock plus "play this buffer at time T".
//! The cpal implementation keeps a sample-counter clock and sums any
//! scheduled buffers that overlap the callback window, so back-to-back
//! units scheduled by the engine come out gapless.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{default_output_device, map_build_error};
use crate::constants::PLAYBACK_SAMPLE_RATE;
use crate::error::AudioError;
use crate::session::SessionEvent;

/// Identifier for a scheduled playback unit
pub type HandleId = u64;

/// A decoded audio buffer ready for scheduling, one f32 vector per
/// channel at the output sample rate.
#[derive(Debug, Clone)]
pub struct PlaybackUnit {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl PlaybackUnit {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Unit duration in seconds
    pub fn duration_secs(&self) -> f64 {
        let frames = self.channels.first().map_or(0, Vec::len);
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Collapse to a mono buffer for the single-channel output device
    fn mixdown(mut self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels.remove(0),
            n => {
                let frames = self.channels[0].len();
                let mut mono = vec![0.0f32; frames];
                for channel in &self.channels {
                    for (acc, &s) in mono.iter_mut().zip(channel) {
                        *acc += s;
                    }
                }
                for s in &mut mono {
                    *s /= n as f32;
                }
                mono
            }
        }
    }
}

/// Scheduled-playback output device.
pub trait OutputSink: Send {
    /// Current position of the device clock, in seconds
    fn now(&self) -> f64;

    /// Schedule a unit to begin at `start_at` on the device clock.
    /// A `start_at` already in the past plays immediately.
    fn schedule(
        &mut self,
        unit: PlaybackUnit,
        start_at: f64,
    ) -> Result<Box<dyn ScheduledHandle>, AudioError>;
}

/// Live reference to a unit that will play or is playing.
pub trait ScheduledHandle: Send {
    fn id(&self) -> HandleId;

    /// Hard-stop the unit and discard whatever has not played yet
    fn stop(&self);
}

/// Source of output sinks; the session opens one per instance.
pub trait Speaker: Send {
    fn open(&mut self, events: Sender<SessionEvent>) -> Result<Box<dyn OutputSink>, AudioError>;
}

/// Shared state between the scheduler side and the device callback
struct Mixer {
    /// Samples rendered since the sink opened; the device clock
    clock_samples: u64,
    next_id: HandleId,
    entries: Vec<Entry>,
    /// Units that completed naturally since the last callback drain
    finished: Vec<HandleId>,
}

struct Entry {
    id: HandleId,
    start_sample: u64,
    samples: Vec<f32>,
}

impl Mixer {
    fn new() -> Self {
        Self {
            clock_samples: 0,
            next_id: 1,
            entries: Vec::new(),
            finished: Vec::new(),
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let window_start = self.clock_samples;
        let window_end = window_start + out.len() as u64;

        for entry in &self.entries {
            let entry_end = entry.start_sample + entry.samples.len() as u64;
            let lo = entry.start_sample.max(window_start);
            let hi = entry_end.min(window_end);
            for t in lo..hi {
                out[(t - window_start) as usize] += entry.samples[(t - entry.start_sample) as usize];
            }
        }

        self.clock_samples = window_end;
        let finished = &mut self.finished;
        self.entries.retain(|e| {
            let done = e.start_sample + e.samples.len() as u64 <= window_end;
            if done {
                finished.push(e.id);
            }
            !done
        });
    }

    fn schedule(&mut self, samples: Vec<f32>, start_at: f64, sample_rate: u32) -> HandleId {
        let requested = (start_at * f64::from(sample_rate)).round().max(0.0) as u64;
        let start_sample = requested.max(self.clock_samples);
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            start_sample,
            samples,
        });
        id
    }
}

/// Speaker backed by the default cpal output device.
pub struct CpalSpeaker {
    config: StreamConfig,
}

impl CpalSpeaker {
    pub fn new() -> Self {
        Self {
            config: StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(PLAYBACK_SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            },
        }
    }
}

impl Default for CpalSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Speaker for CpalSpeaker {
    fn open(&mut self, events: Sender<SessionEvent>) -> Result<Box<dyn OutputSink>, AudioError> {
        let device = default_output_device()?;
        let config = self.config.clone();
        let mixer = Arc::new(Mutex::new(Mixer::new()));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_mixer = mixer.clone();
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let callback_mixer = thread_mixer;
                let error_events = events.clone();

                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut mixer = callback_mixer.lock();
                        mixer.render(data);
                        for id in mixer.finished.drain(..) {
                            let _ = events.try_send(SessionEvent::PlaybackFinished(id));
                        }
                    },
                    move |err| {
                        let _ = error_events
                            .try_send(SessionEvent::DeviceError(format!("output: {err}")));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(map_build_error(e)));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    tracing::error!("Failed to start output stream: {}", e);
                    return;
                }

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream dropped here, releasing the device
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalSink {
                mixer,
                sample_rate: PLAYBACK_SAMPLE_RATE,
                running,
                thread_handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamError(
                    "output thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }
}

struct CpalSink {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl OutputSink for CpalSink {
    fn now(&self) -> f64 {
        self.mixer.lock().clock_samples as f64 / f64::from(self.sample_rate)
    }

    fn schedule(
        &mut self,
        unit: PlaybackUnit,
        start_at: f64,
    ) -> Result<Box<dyn ScheduledHandle>, AudioError> {
        let samples = unit.mixdown();
        let id = self.mixer.lock().schedule(samples, start_at, self.sample_rate);
        Ok(Box::new(CpalScheduledHandle {
            id,
            mixer: self.mixer.clone(),
        }))
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

struct CpalScheduledHandle {
    id: HandleId,
    mixer: Arc<Mutex<Mixer>>,
}

impl ScheduledHandle for CpalScheduledHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn stop(&self) {
        self.mixer.lock().entries.retain(|e| e.id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_renders_scheduled_samples_at_their_start() {
        let mut mixer = Mixer::new();
        let id = mixer.schedule(vec![0.5; 4], 0.0, 8);
        assert_eq!(id, 1);

        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(&out[..4], &[0.5; 4]);
        assert_eq!(&out[4..], &[0.0; 4]);
        assert_eq!(mixer.finished, vec![1]);
        assert!(mixer.entries.is_empty());
    }

    #[test]
    fn mixer_never_schedules_in_the_past() {
        let mut mixer = Mixer::new();
        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out); // clock now at 8

        mixer.schedule(vec![1.0; 2], 0.0, 8); // asked for t=0, long gone
        let mut out = vec![0.0f32; 4];
        mixer.render(&mut out);
        // Plays immediately at the clock instead of being lost
        assert_eq!(&out[..2], &[1.0; 2]);
    }

    #[test]
    fn mixer_spans_callback_windows() {
        let mut mixer = Mixer::new();
        mixer.schedule(vec![0.25; 6], 0.0, 8);

        let mut first = vec![0.0f32; 4];
        mixer.render(&mut first);
        assert_eq!(&first[..], &[0.25; 4]);
        assert!(mixer.finished.is_empty());

        let mut second = vec![0.0f32; 4];
        mixer.render(&mut second);
        assert_eq!(&second[..2], &[0.25; 2]);
        assert_eq!(&second[2..], &[0.0; 2]);
        assert_eq!(mixer.finished.len(), 1);
    }

    #[test]
    fn mixdown_averages_channels() {
        let unit = PlaybackUnit::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 24_000);
        assert_eq!(unit.mixdown(), vec![0.5, 0.5]);
    }
}
