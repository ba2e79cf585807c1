use crate::filter_bank::pot_log2;
use crate::model::{BlipError, BlipResult};

/// Construction parameters for a [`Blipper`](crate::Blipper).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlipConfig {
    /// Prototype taps per phase; the built bank has one more.
    pub taps: usize,
    /// Fraction of the output Nyquist frequency, in (0, 1).
    pub cutoff: f64,
    /// Kaiser beta. Higher trades transition width for stopband attenuation.
    pub beta: f64,
    /// Input clocks per output sample. Power of two.
    pub decimation: usize,
    /// Output samples that may pile up between reads.
    pub buffer_samples: usize,
}

impl Default for BlipConfig {
    fn default() -> Self {
        Self {
            taps: 64,
            cutoff: 0.85,
            beta: 8.0,
            decimation: 64,
            buffer_samples: 1024,
        }
    }
}

impl BlipConfig {
    pub fn new(taps: usize, cutoff: f64, beta: f64, decimation: usize, buffer_samples: usize) -> Self {
        Self {
            taps,
            cutoff,
            beta,
            decimation,
            buffer_samples,
        }
    }

    pub fn validate(&self) -> BlipResult<()> {
        if pot_log2(self.decimation).is_none() {
            return Err(BlipError::InvalidConfig(format!(
                "decimation factor must be a power of two, got {}",
                self.decimation
            )));
        }
        if self.taps == 0 {
            return Err(BlipError::InvalidConfig("taps must be at least 1".into()));
        }
        if !(self.cutoff > 0.0 && self.cutoff < 1.0) {
            return Err(BlipError::InvalidConfig(format!(
                "cutoff must lie in (0, 1), got {}",
                self.cutoff
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(BlipError::InvalidConfig(format!(
                "Kaiser beta must be finite and non-negative, got {}",
                self.beta
            )));
        }
        if self.buffer_samples == 0 {
            return Err(BlipError::InvalidConfig("buffer must hold at least one sample".into()));
        }
        Ok(())
    }

    /// Output rate for a given input rate.
    pub fn output_rate(&self, input_rate: u32) -> u32 {
        input_rate / self.decimation.max(1) as u32
    }
}
