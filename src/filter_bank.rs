// ============================================================================
// FilterBank
// Polyphase windowed-sinc table that is convolved with delta events rather
// than with samples. Built once, read-only afterwards.
//
// Deltas are a differentiated signal, D(z) = 1 - z^-1, and the read side
// integrates after decimating by D, 1 / (1 - z^-D). For a prototype S(z) the
// overall response would be S(z) * (1 - z^-1) / (1 - z^-D). The bank is
// therefore prefiltered with the inverse, (1 - z^-D) / (1 - z^-1), which is
// still finite: one extra tap per phase.
// ============================================================================

use log::{debug, warn};

use crate::kaiser::{kaiser_window, windowed_sinc};
use crate::model::{BlipError, BlipResult};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    phases: usize,
    phases_log2: u32,
    taps: usize,
    coefficients: Vec<f32>,
}

/// Zeroed vector whose allocation failure is reported instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize, what: &'static str) -> BlipResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| BlipError::Allocation { what, len })?;
    v.resize(len, T::default());
    Ok(v)
}

/// Exact log2 of a power of two, `None` for anything else (including 0).
pub fn pot_log2(value: usize) -> Option<u32> {
    if value.is_power_of_two() {
        Some(value.trailing_zeros())
    } else {
        None
    }
}

impl FilterBank {
    /// Design a bank for decimation by `phases`.
    ///
    /// `taps` is the prototype length per phase before the prefilter, so the
    /// resulting bank has `taps + 1` taps per phase. `cutoff` is relative to
    /// the output Nyquist and `beta` is the Kaiser shape parameter.
    pub fn build(taps: usize, cutoff: f64, beta: f64, phases: usize) -> BlipResult<Self> {
        let phases_log2 = match pot_log2(phases) {
            Some(l) => l,
            None => {
                warn!("Rejecting decimation factor {}", phases);
                return Err(BlipError::InvalidConfig(format!(
                    "decimation factor must be a power of two, got {}",
                    phases
                )));
            }
        };
        if taps == 0 {
            return Err(BlipError::InvalidConfig("taps must be at least 1".into()));
        }
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(BlipError::InvalidConfig(format!(
                "cutoff must lie in (0, 1), got {}",
                cutoff
            )));
        }
        if !beta.is_finite() || beta < 0.0 {
            return Err(BlipError::InvalidConfig(format!(
                "Kaiser beta must be finite and non-negative, got {}",
                beta
            )));
        }
        let filter_len = taps
            .checked_add(1)
            .and_then(|t| t.checked_mul(phases))
            .ok_or(BlipError::Allocation { what: "filter bank", len: usize::MAX })?;

        let prototype = create_sinc(phases, taps, cutoff, beta)?;
        let prefiltered = prefilter_sinc(&prototype, phases)?;
        drop(prototype);
        let coefficients = interleave_sinc(&prefiltered, phases, taps + 1)?;
        debug_assert_eq!(coefficients.len(), filter_len);

        debug!(
            "Built filter bank: {} phases x {} taps (cutoff {}, beta {})",
            phases,
            taps + 1,
            cutoff,
            beta
        );

        Ok(Self {
            phases,
            phases_log2,
            taps: taps + 1,
            coefficients,
        })
    }

    /// Decimation factor.
    pub fn phases(&self) -> usize {
        self.phases
    }

    pub fn phases_log2(&self) -> u32 {
        self.phases_log2
    }

    /// Taps per phase (requested taps + 1).
    pub fn taps(&self) -> usize {
        self.taps
    }

    /// Response for one fractional delay, `phase` in [0, phases).
    #[inline]
    pub fn phase(&self, phase: usize) -> &[f32] {
        let start = phase * self.taps;
        &self.coefficients[start..start + self.taps]
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Group delay in output samples: a step pushed at clock 0 reaches half
    /// height about this many samples later.
    pub fn latency(&self) -> f64 {
        (self.taps - 1) as f64 / 2.0
    }
}

// Prototype spanning [-taps/2, taps/2) sinc lobes, sampled phases * taps times
fn create_sinc(phases: usize, taps: usize, cutoff: f64, beta: f64) -> BlipResult<Vec<f64>> {
    let filter_len = phases * taps;
    let mut filter = Vec::new();
    filter
        .try_reserve_exact(filter_len)
        .map_err(|_| BlipError::Allocation { what: "sinc prototype", len: filter_len })?;

    let sidelobes = taps as f64 / 2.0;
    let window_mod = 1.0 / kaiser_window(0.0, beta);
    for i in 0..filter_len {
        let window_phase = i as f64 / filter_len as f64; // [0, 1)
        let window_phase = 2.0 * window_phase - 1.0; // [-1, 1)
        filter.push(windowed_sinc(window_phase, sidelobes, cutoff, beta, window_mod));
    }
    Ok(filter)
}

// Integrate, then differentiate with a lag of `phases`. Output is `phases`
// samples longer than the input.
fn prefilter_sinc(filter: &[f64], phases: usize) -> BlipResult<Vec<f64>> {
    let len = filter.len();
    let mut integrated: Vec<f64> = try_zeroed(len + phases, "integrated prototype")?;

    let mut sum = 0.0;
    for (acc, &s) in integrated.iter_mut().zip(filter) {
        sum += s;
        *acc = sum;
    }
    // Hold the final level through the padding
    for acc in &mut integrated[len..] {
        *acc = sum;
    }

    let mut out: Vec<f64> = try_zeroed(len + phases, "prefiltered prototype")?;
    out[..phases].copy_from_slice(&integrated[..phases]);
    for i in phases..len + phases {
        out[i] = integrated[i] - integrated[i - phases];
    }
    Ok(out)
}

// Tap-major to phase-major so each phase is one contiguous slice
fn interleave_sinc(filter: &[f64], phases: usize, taps: usize) -> BlipResult<Vec<f32>> {
    let mut bank: Vec<f32> = try_zeroed(phases * taps, "filter bank")?;
    for t in 0..taps {
        for p in 0..phases {
            bank[p * taps + t] = filter[t * phases + p] as f32;
        }
    }
    Ok(bank)
}
