//! Microphone capture pipeline
//!
//! Pulls fixed-size mono blocks from the input device and forwards each
//! one into the session event queue. cpal streams are not `Send`, so the
//! stream lives on a dedicated thread for the lifetime of the capture,
//! with atomics steering start/stop.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{default_input_device, map_build_error};
use crate::audio::frame::AudioFrame;
use crate::constants::{CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE, CHANNELS};
use crate::error::AudioError;
use crate::session::SessionEvent;

/// Source of microphone capture streams.
///
/// The session acquires the device through this seam when it starts, so
/// tests can substitute a fake without an audio device present.
pub trait Microphone: Send {
    /// Acquire the capture device and prepare a stream that will push
    /// [`SessionEvent::CaptureBlock`] events once started.
    fn open(&mut self, events: Sender<SessionEvent>) -> Result<Box<dyn CaptureStream>, AudioError>;
}

/// A prepared capture stream. Dropping it releases the device.
pub trait CaptureStream: Send {
    /// Begin delivering capture blocks. Called once, when the session
    /// goes active; there is no pause/resume.
    fn start(&mut self) -> Result<(), AudioError>;
}

/// Microphone backed by the default cpal input device.
pub struct CpalMicrophone {
    config: StreamConfig,
}

impl CpalMicrophone {
    pub fn new() -> Self {
        Self {
            config: StreamConfig {
                channels: CHANNELS,
                sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            },
        }
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

impl Microphone for CpalMicrophone {
    fn open(&mut self, events: Sender<SessionEvent>) -> Result<Box<dyn CaptureStream>, AudioError> {
        let device = default_input_device()?;
        let config = self.config.clone();

        let running = Arc::new(AtomicBool::new(true));
        let started = Arc::new(AtomicBool::new(false));
        // The stream is built on its owning thread; surface the build
        // result synchronously so permission failures show up before the
        // session ever reports Connecting.
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_running = running.clone();
        let thread_started = started.clone();
        let handle = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let error_events = events.clone();
                let mut pending: Vec<f32> = Vec::with_capacity(CAPTURE_BLOCK_SIZE * 2);

                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        pending.extend_from_slice(data);
                        while pending.len() >= CAPTURE_BLOCK_SIZE {
                            let block: Vec<f32> = pending.drain(..CAPTURE_BLOCK_SIZE).collect();
                            let frame = AudioFrame::new(block, CAPTURE_SAMPLE_RATE, CHANNELS);
                            match events.try_send(SessionEvent::CaptureBlock(frame)) {
                                Ok(()) => {}
                                Err(TrySendError::Full(_)) => {
                                    tracing::trace!("event queue full, capture block dropped");
                                }
                                Err(TrySendError::Disconnected(_)) => {}
                            }
                        }
                    },
                    move |err| {
                        let _ = error_events
                            .try_send(SessionEvent::DeviceError(format!("capture: {err}")));
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

                let mut playing = false;
                while thread_running.load(Ordering::Relaxed) {
                    if !playing && thread_started.load(Ordering::Relaxed) {
                        if let Err(e) = stream.play() {
                            tracing::error!("Failed to start capture stream: {}", e);
                            return;
                        }
                        playing = true;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream dropped here, releasing the device
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalCaptureStream {
                running,
                started,
                thread_handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamError(
                    "capture thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }
}

struct CpalCaptureStream {
    running: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CaptureStream for CpalCaptureStream {
    fn start(&mut self) -> Result<(), AudioError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}
