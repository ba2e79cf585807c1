use std::sync::Arc;

use log::{debug, warn};

use crate::config::BlipConfig;
use crate::delta_buffer::DeltaBuffer;
use crate::filter_bank::FilterBank;
use crate::model::{BlipError, BlipResult};

/// Band-limited step synthesizer and power-of-two decimator for one channel.
///
/// Deltas are pushed on a high-rate clock (`decimation` clocks per output
/// sample). Each one adds a band-limited step response to an accumulation
/// buffer; reading integrates the buffer back into absolute sample values.
///
/// ```
/// use blipper::{BlipConfig, Blipper};
///
/// let mut blip = Blipper::new(&BlipConfig::default()).unwrap();
/// blip.push_delta(1.0, 0).unwrap();
/// blip.push_delta(-1.0, 64 * 8).unwrap();
///
/// let mut out = vec![0.0f32; blip.read_avail()];
/// blip.read(&mut out, 8, 1).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Blipper {
    bank: Arc<FilterBank>,
    buffer: DeltaBuffer,

    // Clock position relative to buffer cell 0. Can sit up to
    // `decimation - 1` below zero after reading a partly covered sample.
    phase: i64,
    phases: usize,
    phases_log2: u32,
    output_avail: usize,

    integrator: f32,
    amp: f32,
    ramp: f32,
    last_sample: f32,
}

impl Blipper {
    pub fn new(config: &BlipConfig) -> BlipResult<Self> {
        if let Err(e) = config.validate() {
            warn!("Rejecting blipper configuration: {}", e);
            return Err(e);
        }
        let bank = FilterBank::build(config.taps, config.cutoff, config.beta, config.decimation)?;
        Self::with_filter_bank(Arc::new(bank), config.buffer_samples)
    }

    /// Build around an existing bank, e.g. one shared by all channels of a
    /// stream.
    pub fn with_filter_bank(bank: Arc<FilterBank>, buffer_samples: usize) -> BlipResult<Self> {
        if buffer_samples == 0 {
            return Err(BlipError::InvalidConfig("buffer must hold at least one sample".into()));
        }
        let buffer = DeltaBuffer::new(buffer_samples, bank.taps())?;
        debug!(
            "Blipper ready: decimation {}, {} taps, {} buffered samples",
            bank.phases(),
            bank.taps(),
            buffer_samples
        );

        Ok(Self {
            phases: bank.phases(),
            phases_log2: bank.phases_log2(),
            amp: 1.0 / bank.phases() as f32,
            bank,
            buffer,
            phase: 0,
            output_avail: 0,
            integrator: 0.0,
            ramp: 0.0,
            last_sample: 0.0,
        })
    }

    pub fn filter_bank(&self) -> &Arc<FilterBank> {
        &self.bank
    }

    pub fn decimation(&self) -> usize {
        self.phases
    }

    pub fn taps(&self) -> usize {
        self.bank.taps()
    }

    /// Output samples that may be pending before a read is required.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn latency(&self) -> f64 {
        self.bank.latency()
    }

    /// High-rate clock position relative to the next unread output sample.
    pub fn phase(&self) -> i64 {
        self.phase
    }

    // ceil(phase / phases); phase + phases - 1 is never negative
    #[inline]
    fn target_for(&self, phase: i64) -> usize {
        ((phase + self.phases as i64 - 1) >> self.phases_log2) as usize
    }

    fn advanced(&self, clocks: usize) -> BlipResult<i64> {
        i64::try_from(clocks)
            .ok()
            .and_then(|c| self.phase.checked_add(c))
            .ok_or(BlipError::CapacityExceeded {
                needed: usize::MAX,
                capacity: self.buffer.capacity(),
            })
    }

    // Caller has checked that `target_for(phase)` fits.
    #[inline]
    fn add_delta(&mut self, delta: f32, phase: i64) {
        let target = self.target_for(phase);
        let filter_phase = ((target as i64) << self.phases_log2) - phase;
        let response = self.bank.phase(filter_phase as usize);
        self.buffer.add_response(target, delta, response);

        self.phase = phase;
        self.output_avail = target;
    }

    /// Add a step of `delta` that happens `clocks` high-rate clocks after
    /// the previous one.
    ///
    /// Fails with [`BlipError::CapacityExceeded`] if the step lands beyond
    /// the buffer; the stream is left untouched in that case.
    pub fn push_delta(&mut self, delta: f32, clocks: usize) -> BlipResult<()> {
        let phase = self.advanced(clocks)?;
        self.buffer.check_write(self.target_for(phase))?;
        self.add_delta(delta, phase);
        Ok(())
    }

    /// Feed `frames` absolute levels taken every `stride` elements of
    /// `data`, one per clock. Steps are derived from level changes; runs of
    /// equal values only advance the clock.
    pub fn push_samples(&mut self, data: &[f32], frames: usize, stride: usize) -> BlipResult<()> {
        if frames == 0 {
            return Ok(());
        }
        check_strided(data.len(), frames, stride)?;
        let end_phase = self.advanced(frames)?;
        // Every step lands at or before the final clock
        self.buffer.check_write(self.target_for(end_phase))?;

        let mut clocks_skip: i64 = 0;
        let mut last = self.last_sample;

        for &val in data.iter().step_by(stride).take(frames) {
            if val != last {
                let phase = self.phase + clocks_skip + 1;
                self.add_delta(val - last, phase);
                clocks_skip = 0;
                last = val;
            } else {
                clocks_skip += 1;
            }
        }

        self.phase += clocks_skip;
        self.output_avail = self.target_for(self.phase);
        self.last_sample = last;
        Ok(())
    }

    /// Output samples that are final and can be read.
    pub fn read_avail(&self) -> usize {
        self.output_avail
    }

    /// Write `count` output samples to every `stride`th element of `out`.
    pub fn read(&mut self, out: &mut [f32], count: usize, stride: usize) -> BlipResult<()> {
        if count > self.output_avail {
            return Err(BlipError::ReadUnderflow {
                requested: count,
                avail: self.output_avail,
            });
        }
        if count == 0 {
            return Ok(());
        }
        check_strided(out.len(), count, stride)?;

        let mut sum = self.integrator;
        for (dst, &cell) in out.iter_mut().step_by(stride).zip(self.buffer.head(count)) {
            sum += cell + self.ramp;
            *dst = self.amp * sum;
        }

        // No ring buffering; callers should drain most of the buffer per read
        self.buffer.consume(count, self.output_avail);
        self.output_avail -= count;
        self.phase -= (count as i64) << self.phases_log2;
        self.integrator = sum;
        Ok(())
    }

    /// Let the output rise by `delta` every `clocks` high-rate clocks on top
    /// of the pushed steps. `delta = 0` switches the ramp off.
    pub fn set_ramp(&mut self, delta: f32, clocks: usize) -> BlipResult<()> {
        if clocks == 0 {
            return Err(BlipError::InvalidConfig("ramp period must be at least one clock".into()));
        }
        let phases = self.phases as f64;
        self.ramp = (delta as f64 * phases * phases / clocks as f64) as f32;
        Ok(())
    }

    /// Back to silence at clock zero. The ramp setting is kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.phase = 0;
        self.output_avail = 0;
        self.integrator = 0.0;
        self.last_sample = 0.0;
    }
}

fn check_strided(len: usize, count: usize, stride: usize) -> BlipResult<()> {
    if stride == 0 {
        return Err(BlipError::InvalidStride);
    }
    let needed = (count - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(1))
        .unwrap_or(usize::MAX);
    if len < needed {
        return Err(BlipError::BufferTooShort { needed, len });
    }
    Ok(())
}
