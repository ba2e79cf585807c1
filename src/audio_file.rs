// Minimal WAV / raw float sink for the command line tools.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::dither::Dither;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Pcm16,
    Float32,
}

impl SampleFormat {
    pub fn from_bit_depth(bits: u16) -> Option<Self> {
        match bits {
            16 => Some(SampleFormat::Pcm16),
            32 => Some(SampleFormat::Float32),
            _ => None,
        }
    }

    fn bytes(self) -> u16 {
        match self {
            SampleFormat::Pcm16 => 2,
            SampleFormat::Float32 => 4,
        }
    }
}

/// Planar float audio held in memory until saved.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub samples: Vec<Vec<f32>>,
    sample_rate: u32,
    format: SampleFormat,
}

impl AudioFile {
    pub fn new(channels: usize, sample_rate: u32, format: SampleFormat) -> Self {
        Self {
            samples: vec![Vec::new(); channels],
            sample_rate,
            format,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_frames(&self) -> usize {
        self.samples.first().map_or(0, |channel| channel.len())
    }

    /// Drop the held samples, keeping the channel layout.
    pub fn clear(&mut self) {
        for channel in &mut self.samples {
            channel.clear();
        }
    }

    pub fn save_wave<P: AsRef<Path>>(&self, path: P, dither: &mut Dither) -> io::Result<()> {
        let file = File::create(path)?;
        let mut w = BufWriter::with_capacity(1 << 20, file);
        self.write_wave(&mut w, dither)?;
        w.flush()
    }

    pub fn write_wave<W: Write>(&self, w: &mut W, dither: &mut Dither) -> io::Result<()> {
        let channels = self.num_channels() as u16;
        if channels == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "No channels"));
        }
        let bytes_per_sample = self.format.bytes();
        let block_align = channels * bytes_per_sample;
        let frames = self.num_frames();
        let data_size = u32::try_from(frames * block_align as usize)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Too much audio for WAV"))?;

        // RIFF header
        w.write_all(b"RIFF")?;
        w.write_all(&(data_size + 36).to_le_bytes())?;
        w.write_all(b"WAVE")?;

        // fmt chunk
        w.write_all(b"fmt ")?;
        w.write_all(&16u32.to_le_bytes())?;
        let format_tag: u16 = match self.format {
            SampleFormat::Pcm16 => 1,
            SampleFormat::Float32 => 3,
        };
        w.write_all(&format_tag.to_le_bytes())?;
        w.write_all(&channels.to_le_bytes())?;
        w.write_all(&self.sample_rate.to_le_bytes())?;
        let byte_rate = self.sample_rate * block_align as u32;
        w.write_all(&byte_rate.to_le_bytes())?;
        w.write_all(&block_align.to_le_bytes())?;
        w.write_all(&(bytes_per_sample * 8).to_le_bytes())?;

        // data chunk
        w.write_all(b"data")?;
        w.write_all(&data_size.to_le_bytes())?;

        const FRAME_BLOCK: usize = 16_384;
        let mut buf: Vec<u8> = Vec::with_capacity(FRAME_BLOCK * block_align as usize);
        for base in (0..frames).step_by(FRAME_BLOCK) {
            buf.clear();
            let end = (base + FRAME_BLOCK).min(frames);
            for i in base..end {
                for (ch, channel) in self.samples.iter().enumerate() {
                    let s = channel[i];
                    match self.format {
                        SampleFormat::Float32 => buf.extend_from_slice(&s.to_le_bytes()),
                        SampleFormat::Pcm16 => {
                            buf.extend_from_slice(&to_i16(s, ch, dither).to_le_bytes())
                        }
                    }
                }
            }
            w.write_all(&buf)?;
        }
        Ok(())
    }

    /// Interleaved little-endian f32, no header.
    pub fn write_raw<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let frames = self.num_frames();
        let mut buf: Vec<u8> = Vec::with_capacity(frames * self.num_channels() * 4);
        for i in 0..frames {
            for channel in &self.samples {
                buf.extend_from_slice(&channel[i].to_le_bytes());
            }
        }
        w.write_all(&buf)
    }
}

fn to_i16(sample: f32, chan: usize, dither: &mut Dither) -> i16 {
    let mut scaled = sample as f64 * 32767.0;
    dither.process_samp(&mut scaled, chan);
    scaled.round().clamp(-32768.0, 32767.0) as i16
}

/// Decode interleaved little-endian f32. Trailing partial samples are ignored.
pub fn decode_f32_le(bytes: &[u8], out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
}
