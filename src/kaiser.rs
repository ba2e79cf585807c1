// Window math for the windowed-sinc prototype.

use std::f64::consts::PI;

const BESSEL_TERMS: usize = 18;

/// Modified Bessel function of the first kind, order zero.
///
/// Power series truncated after 18 terms. It converges quickly for the
/// Kaiser betas used in audio filters (up to ~15) but is not exact for
/// very large arguments.
pub fn bessel_i0(x: f64) -> f64 {
    let x_sqr = x * x;
    let mut sum = 0.0;
    let mut factorial = 1.0;
    let mut factorial_mult = 0.0;
    let mut x_pow = 1.0;
    let mut two_div_pow = 1.0;

    for _ in 0..BESSEL_TERMS {
        sum += x_pow * two_div_pow / (factorial * factorial);

        factorial_mult += 1.0;
        x_pow *= x_sqr;
        two_div_pow *= 0.25;
        factorial *= factorial_mult;
    }
    sum
}

/// Unnormalized Kaiser window at `index` in [-1, 1].
#[inline]
pub fn kaiser_window(index: f64, beta: f64) -> f64 {
    bessel_i0(beta * (1.0 - index * index).max(0.0).sqrt())
}

#[inline]
pub fn sinc(v: f64) -> f64 {
    if v.abs() < 0.00001 {
        1.0
    } else {
        v.sin() / v
    }
}

/// One sample of the normalized windowed-sinc low-pass.
/// `window_phase` in [-1, 1), `sidelobes` = taps / 2.
#[inline]
pub fn windowed_sinc(window_phase: f64, sidelobes: f64, cutoff: f64, beta: f64, window_mod: f64) -> f64 {
    let sinc_phase = window_phase * sidelobes;
    cutoff * sinc(PI * sinc_phase * cutoff) * kaiser_window(window_phase, beta) * window_mod
}
