//! Captured audio frames

/// A block of interleaved f32 samples from the capture device.
///
/// Frames are ephemeral: the capture pipeline owns one until it is
/// encoded for transport, after which it is dropped.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate the block was captured at
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Samples per channel
    pub fn samples_per_channel(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Frame duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples_per_channel() as f64 / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_accounts_for_channels() {
        let frame = AudioFrame::new(vec![0.0; 32_000], 16_000, 2);
        assert_eq!(frame.samples_per_channel(), 16_000);
        assert!((frame.duration_secs() - 1.0).abs() < 1e-9);
    }
}
