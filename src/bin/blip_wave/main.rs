use std::error::Error;
use std::path::PathBuf;

use blipper::audio_file::{AudioFile, SampleFormat};
use blipper::dither::{Dither, DitherType};
use blipper::{BlipConfig, BlipResult, Blipper, ColorLogger, TermResult};
use clap::{Parser, ValueEnum};
use log::info;

const CHUNK: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Wave {
    Saw,
    Square,
    Triangle,
}

#[derive(Parser, Debug)]
#[command(
    name = "blip_wave",
    about = "Render alias-free test waveforms from band-limited steps",
    version
)]
struct Cli {
    /// Waveform to render
    #[arg(short = 'w', long = "wave", value_enum, default_value = "saw")]
    wave: Wave,

    /// Fundamental frequency in Hz
    #[arg(short = 'f', long = "freq", default_value = "200.0")]
    freq: f64,

    /// Output sample rate in Hz
    #[arg(short = 'r', long = "rate", default_value = "44100")]
    rate: u32,

    /// Length in seconds
    #[arg(short = 'l', long = "seconds", default_value = "2.0")]
    seconds: f64,

    /// Filter taps per phase
    #[arg(short = 't', long = "taps", default_value = "256")]
    taps: usize,

    /// Clocks per output sample (power of two)
    #[arg(short = 'd', long = "decimation", default_value = "64")]
    decimation: usize,

    /// Cutoff as a fraction of the output Nyquist frequency
    #[arg(short = 'c', long = "cutoff", default_value = "0.90")]
    cutoff: f64,

    /// Kaiser window beta
    #[arg(short = 'k', long = "beta", default_value = "10.0")]
    beta: f64,

    /// Output bit depth: 16 (integer) or 32 (float)
    #[arg(short = 'b', long = "bitdepth", default_value = "32")]
    bit_depth: u16,

    /// Print diagnostic messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Output WAV file
    #[arg(name = "OUT")]
    output: PathBuf,
}

fn main() -> TermResult {
    match run() {
        Ok(()) => TermResult(Ok(())),
        Err(e) => TermResult(Err(e.into())),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let logger = ColorLogger::new(false, cli.verbose);
    log::set_max_level(logger.max_level());
    log::set_boxed_logger(Box::new(logger))?;

    let format = SampleFormat::from_bit_depth(cli.bit_depth)
        .ok_or("Invalid bit depth; must be 16 or 32")?;
    if !(cli.freq > 0.0 && cli.freq < cli.rate as f64 / 2.0) {
        return Err("Frequency must lie between 0 and half the sample rate".into());
    }
    if !(cli.seconds > 0.0) {
        return Err("Length must be positive".into());
    }

    let half_period = (cli.rate as f64 * cli.decimation as f64 / (2.0 * cli.freq)) as usize;
    let half_period = half_period.max(1);
    // Room for one chunk plus one full period of pending steps
    let buffer_samples = CHUNK + 2 * half_period.div_ceil(cli.decimation.max(1)) + 1;
    let config = BlipConfig::new(cli.taps, cli.cutoff, cli.beta, cli.decimation, buffer_samples);
    let mut blip = Blipper::new(&config)?;

    let total = (cli.seconds * cli.rate as f64) as usize;
    let mut out = AudioFile::new(1, cli.rate, format);
    let samples = &mut out.samples[0];
    match cli.wave {
        Wave::Saw => render_saw(&mut blip, 2 * half_period, total, samples)?,
        Wave::Square => render_square(&mut blip, half_period, total, samples)?,
        Wave::Triangle => {
            let per_half = half_period as f64 / cli.decimation as f64;
            render_triangle(&mut blip, half_period, per_half, total, samples)?
        }
    }

    let mut dither = Dither::new(DitherType::Tpdf);
    out.save_wave(&cli.output, &mut dither)?;
    info!(
        "Wrote {:?} wave, {} Hz, {} samples to {}",
        cli.wave,
        cli.freq,
        out.num_frames(),
        cli.output.display()
    );
    Ok(())
}

// Pull `total` samples in chunks, calling `step` whenever more input is needed.
fn drain<F>(blip: &mut Blipper, total: usize, out: &mut Vec<f32>, mut step: F) -> BlipResult<()>
where
    F: FnMut(&mut Blipper) -> BlipResult<()>,
{
    while out.len() < total {
        while blip.read_avail() < CHUNK {
            step(blip)?;
        }
        let start = out.len();
        out.resize(start + CHUNK, 0.0);
        blip.read(&mut out[start..], CHUNK, 1)?;
    }
    out.truncate(total);
    Ok(())
}

// Ramp up by 2 over a period, drop by 2 at the end of it. The ramp is not
// delayed by the filter and sample n already carries n + 1 ramp steps, so
// the first step also cancels what the ramp gains in that time.
fn render_saw(blip: &mut Blipper, period: usize, total: usize, out: &mut Vec<f32>) -> BlipResult<()> {
    let slope = 2.0 * blip.decimation() as f64 / period as f64;
    blip.set_ramp(2.0, period)?;
    blip.push_delta((-1.0 - slope * (blip.latency() + 1.0)) as f32, 0)?;
    drain(blip, total, out, |b| b.push_delta(-2.0, period))
}

fn render_square(blip: &mut Blipper, half_period: usize, total: usize, out: &mut Vec<f32>) -> BlipResult<()> {
    blip.push_delta(-1.0, 0)?;
    let mut delta = 2.0f32;
    drain(blip, total, out, |b| {
        let res = b.push_delta(delta, half_period);
        delta = -delta;
        res
    })
}

// Leaky integration of a square wave. The square level is chosen so one
// half period climbs by 2.
fn render_triangle(
    blip: &mut Blipper,
    half_period: usize,
    samples_per_half: f64,
    total: usize,
    out: &mut Vec<f32>,
) -> BlipResult<()> {
    let level = (2.0 / samples_per_half) as f32;
    render_square(blip, half_period, total, out)?;
    let mut integrator = 1.0f32;
    for s in out.iter_mut() {
        integrator = *s * level + 0.9995 * integrator;
        *s = integrator;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blip(buffer: usize) -> Blipper {
        Blipper::new(&BlipConfig::new(64, 0.9, 10.0, 64, buffer)).unwrap()
    }

    #[test]
    fn saw_is_bounded_and_centered() {
        let period = 64 * 100;
        let mut b = blip(CHUNK + 2 * 100 + 1);
        let mut out = Vec::new();
        render_saw(&mut b, period, 2000, &mut out).unwrap();
        assert_eq!(out.len(), 2000);

        // Skip the filter's startup and look at whole periods
        let tail = &out[200..1800];
        assert!(tail.iter().all(|s| s.abs() < 1.25));
        let mean: f32 = tail.iter().sum::<f32>() / tail.len() as f32;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        // Mid-ramp value of a full-scale saw
        let peak = tail.iter().cloned().fold(f32::MIN, f32::max);
        assert!(peak > 0.9);
    }

    #[test]
    fn short_period_saw_has_no_dc() {
        // 10 samples per period, 0.2 per sample of slope
        let period = 64 * 10;
        let mut b = blip(CHUNK + 2 * 10 + 1);
        let mut out = Vec::new();
        render_saw(&mut b, period, 2000, &mut out).unwrap();

        let tail = &out[200..1800];
        let mean: f32 = tail.iter().sum::<f32>() / tail.len() as f32;
        assert!(mean.abs() < 0.02, "mean {}", mean);
        assert!(tail.iter().all(|s| s.abs() < 1.3));
        let peak = tail.iter().cloned().fold(f32::MIN, f32::max);
        assert!(peak > 0.5, "peak {}", peak);
    }

    #[test]
    fn triangle_is_bounded_and_centered() {
        let half = 64 * 50;
        let mut b = blip(CHUNK + 2 * 50 + 1);
        let mut out = Vec::new();
        render_triangle(&mut b, half, 50.0, 4000, &mut out).unwrap();
        assert_eq!(out.len(), 4000);

        // Eight whole periods past the startup
        let tail = &out[232..1832];
        let mean: f32 = tail.iter().sum::<f32>() / tail.len() as f32;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        let peak = tail.iter().cloned().fold(f32::MIN, f32::max);
        let trough = tail.iter().cloned().fold(f32::MAX, f32::min);
        assert!(peak > 0.9 && peak < 1.1, "peak {}", peak);
        assert!(trough < -0.9 && trough > -1.1, "trough {}", trough);
    }

    #[test]
    fn square_alternates() {
        let half = 64 * 50;
        let mut b = blip(CHUNK + 2 * 50 + 1);
        let mut out = Vec::new();
        render_square(&mut b, half, 1024, &mut out).unwrap();
        // Plateaus sit near -1 and +1, 50 samples each, ~32 samples of delay
        assert!((out[60] + 1.0).abs() < 0.05, "{}", out[60]);
        assert!((out[110] - 1.0).abs() < 0.05, "{}", out[110]);
    }
}
