/*
 This file is part of blipper

 blipper is free software: you can redistribute it and/or modify it
 under the terms of the GNU General Public License as published by the
 Free Software Foundation, either version 3 of the License, or
 (at your option) any later version.

 blipper is distributed in the hope that it will be useful, but
 WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 GNU General Public License for more details.
 You should have received a copy of the GNU General Public License
 along with blipper. If not, see <https://www.gnu.org/licenses/>.
*/

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::available_parallelism;
use std::time::Instant;

use blipper::audio_file::{AudioFile, SampleFormat, decode_f32_le};
use blipper::dither::{Dither, DitherType};
use blipper::{BlipConfig, BlipResult, Blipper, ColorLogger, TermResult};
use clap::Parser;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::{debug, info, trace, warn};
use rayon::prelude::*;

#[derive(Parser)]
#[command(
    name = "blipper",
    about = "Band-limited power-of-two decimation of raw interleaved f32 audio",
    version
)]
struct Cli {
    /// Decimation factor (power of two). Output rate is input rate / this.
    #[arg(short = 'd', long = "decimation", default_value = "64")]
    decimation: usize,

    /// Filter taps per phase
    #[arg(short = 't', long = "taps", default_value = "64")]
    taps: usize,

    /// Cutoff as a fraction of the output Nyquist frequency
    #[arg(short = 'c', long = "cutoff", default_value = "0.85")]
    cutoff: f64,

    /// Kaiser window beta
    #[arg(short = 'k', long = "beta", default_value = "8.0")]
    beta: f64,

    /// Input sample rate in Hz
    #[arg(short = 'r', long = "rate", default_value = "2822400")]
    input_rate: u32,

    /// Number of interleaved channels in the input
    #[arg(short = 'n', long = "channels", default_value = "2")]
    channels: usize,

    /// Output bit depth: 16 (integer) or 32 (float)
    #[arg(short = 'b', long = "bitdepth", default_value = "32")]
    bit_depth: u16,

    /// Dither for 16 bit output: T (TPDF), R (rectangular),
    /// S (noise shaped TPDF), X (none)
    #[arg(short = 'D', long = "dither", default_value = "T")]
    dither: char,

    /// Input frames per block. Only set this if you know
    /// what you're doing.
    #[arg(short = 's', long = "bs", default_value = "4096")]
    block_frames: usize,

    /// Output WAV file. Raw interleaved f32 goes to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print diagnostic messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Quiet mode: suppress all log output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Raw little-endian f32 input (use - for stdin)
    #[arg(name = "FILE", default_value = "-")]
    input: PathBuf,
}

fn main() -> TermResult {
    match run() {
        Ok(()) => TermResult(Ok(())),
        Err(e) => TermResult(Err(e.into())),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let logger = ColorLogger::new(cli.quiet, cli.verbose);
    let multi = MultiProgress::new();
    LogWrapper::new(multi.clone(), logger).try_init()?;

    if cli.channels == 0 {
        return Err("Channel count must be at least 1".into());
    }
    if cli.block_frames == 0 {
        return Err("Block size must be at least 1 frame".into());
    }
    let format = SampleFormat::from_bit_depth(cli.bit_depth)
        .ok_or("Invalid bit depth; must be 16 or 32")?;
    let dither_type = DitherType::from_char(cli.dither)
        .ok_or("Invalid dither type; must be T, R, S, or X")?;

    let config = BlipConfig::new(
        cli.taps,
        cli.cutoff,
        cli.beta,
        cli.decimation,
        cli.block_frames.div_ceil(cli.decimation.max(1)),
    );
    let mut blips = build_channels(&config, cli.channels)?;

    let avail_par = available_parallelism().map(|n| n.get()).unwrap_or(1);
    let thread_count = avail_par.min(cli.channels);
    // build_global can only be called once; ignore error if already set.
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build_global()
    {
        warn!(
            "Rayon pool initialization error ({} threads). Details: {:?}",
            thread_count, e
        );
    } else {
        trace!("Configured Rayon pool with {} threads", thread_count);
    }

    let output_rate = config.output_rate(cli.input_rate);
    let mut out = AudioFile::new(cli.channels, output_rate, format);

    let (reader, progress): (Box<dyn Read>, Option<ProgressBar>) =
        if cli.input == PathBuf::from("-") {
            (Box::new(io::stdin().lock()), None)
        } else {
            let file = File::open(&cli.input)?;
            let len = file.metadata()?.len();
            let pg = if cli.output.is_some() {
                let style = ProgressStyle::with_template(
                    "{prefix} {bar:20.cyan/blue} {percent}{msg}",
                )?;
                let name = cli
                    .input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some(
                    multi
                        .add(ProgressBar::new(len))
                        .with_style(style)
                        .with_prefix(format!("{} {}", "[Decimating]".bold(), name.bold()))
                        .with_message("%"),
                )
            } else {
                None
            };
            (Box::new(BufReader::new(file)), pg)
        };

    info!(
        "Decimating {} channel(s) by {}: {} Hz -> {} Hz",
        cli.channels, cli.decimation, cli.input_rate, output_rate
    );

    let start = Instant::now();
    let frames_in = match &cli.output {
        Some(_) => decimate_stream(reader, &mut blips, &mut out, None, cli.block_frames, progress.as_ref())?,
        None => {
            let mut stdout = io::stdout().lock();
            let frames = decimate_stream(
                reader,
                &mut blips,
                &mut out,
                Some(&mut stdout as &mut dyn Write),
                cli.block_frames,
                progress.as_ref(),
            )?;
            stdout.flush()?;
            frames
        }
    };
    let elapsed = start.elapsed().as_secs_f64();
    if let Some(pg) = progress {
        pg.finish();
    }

    info!(
        "Processed {:.3} seconds of input in {:.3} seconds",
        frames_in as f64 / cli.input_rate.max(1) as f64,
        elapsed
    );

    if let Some(path) = &cli.output {
        let mut dither = Dither::new(dither_type);
        out.save_wave(path, &mut dither)?;
        info!(
            "Wrote {} frames at {} Hz to {}",
            out.num_frames(),
            out.sample_rate(),
            path.display()
        );
    }
    Ok(())
}

/// One instance per channel, all sharing the first one's filter bank.
fn build_channels(config: &BlipConfig, channels: usize) -> BlipResult<Vec<Blipper>> {
    let first = Blipper::new(config)?;
    let bank = Arc::clone(first.filter_bank());
    let mut blips = Vec::with_capacity(channels);
    blips.push(first);
    for _ in 1..channels {
        blips.push(Blipper::with_filter_bank(Arc::clone(&bank), config.buffer_samples)?);
    }
    Ok(blips)
}

/// Push every block into all channels, then drain the count channel 0
/// reports from each of them. With a raw sink each block is written as
/// interleaved f32 and dropped from `out`; otherwise `out` keeps the whole
/// stream. Returns the number of input frames consumed.
fn decimate_stream(
    mut reader: Box<dyn Read>,
    blips: &mut [Blipper],
    out: &mut AudioFile,
    mut raw_sink: Option<&mut dyn Write>,
    block_frames: usize,
    progress: Option<&ProgressBar>,
) -> Result<u64, Box<dyn Error>> {
    let channels = blips.len();
    let block_bytes = block_frames * channels * 4;
    let mut raw = vec![0u8; block_bytes];
    let mut input: Vec<f32> = Vec::with_capacity(block_frames * channels);
    let mut total_frames = 0u64;

    loop {
        let got = read_block(&mut reader, &mut raw)?;
        if got == 0 {
            break;
        }
        if let Some(pg) = progress {
            pg.inc(got as u64);
        }
        decode_f32_le(&raw[..got], &mut input);
        let frames = input.len() / channels;
        if frames == 0 {
            debug!("Dropping {} trailing bytes", got);
            break;
        }
        total_frames += frames as u64;

        let input = &input;
        blips
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(c, blip)| blip.push_samples(&input[c..], frames, channels))?;

        let avail = blips[0].read_avail();
        blips
            .par_iter_mut()
            .zip(out.samples.par_iter_mut())
            .try_for_each(|(blip, dst)| {
                let start = dst.len();
                dst.resize(start + avail, 0.0);
                blip.read(&mut dst[start..], avail, 1)
            })?;
        trace!("Block of {} frames -> {} samples", frames, avail);

        if let Some(w) = raw_sink.as_mut() {
            out.write_raw(w)?;
            w.flush()?;
            out.clear();
        }

        if got < block_bytes {
            break;
        }
    }
    Ok(total_frames)
}

// Fill `buf` unless the reader runs dry first
fn read_block<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
