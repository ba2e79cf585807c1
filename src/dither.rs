use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherType {
    Tpdf,
    Rectangular,
    /// TPDF with first-order error feedback per channel.
    Shaped,
    None,
}

impl DitherType {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            't' => Some(DitherType::Tpdf),
            'r' => Some(DitherType::Rectangular),
            's' => Some(DitherType::Shaped),
            'x' => Some(DitherType::None),
            _ => None,
        }
    }
}

/// Dither for integer output. Samples are expected pre-scaled so that
/// 1.0 is one LSB.
#[derive(Debug, Clone)]
pub struct Dither {
    dither_type: DitherType,
    noise_shaping: Vec<f64>, // quantization error per channel
}

impl Dither {
    pub fn new(dither_type: DitherType) -> Self {
        Self {
            dither_type,
            noise_shaping: Vec::new(),
        }
    }

    pub fn process_samp(&mut self, sample: &mut f64, chan: usize) {
        match self.dither_type {
            DitherType::Tpdf => *sample += tpdf(),
            DitherType::Rectangular => *sample += rpdf(),
            DitherType::Shaped => self.shaped(sample, chan),
            DitherType::None => (),
        }
    }

    fn shaped(&mut self, sample: &mut f64, chan: usize) {
        if self.noise_shaping.len() <= chan {
            self.noise_shaping.resize(chan + 1, 0.0);
        }
        let wanted = *sample - self.noise_shaping[chan];
        let dithered = wanted + tpdf();
        // Error of the value that will actually be stored
        self.noise_shaping[chan] = dithered.round() - wanted;
        *sample = dithered;
    }
}

// Triangular PDF, 1 LSB peak to peak
fn tpdf() -> f64 {
    let mut rng = rand::thread_rng();
    let r1: f64 = rng.gen_range(0.0..1.0);
    let r2: f64 = rng.gen_range(0.0..1.0);
    (r1 - r2) * 0.5
}

fn rpdf() -> f64 {
    rand::thread_rng().gen_range(-0.5..0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_transparent() {
        let mut d = Dither::new(DitherType::None);
        let mut s = 123.25;
        d.process_samp(&mut s, 0);
        assert_eq!(s, 123.25);
    }

    #[test]
    fn noise_stays_within_one_lsb() {
        for kind in [DitherType::Tpdf, DitherType::Rectangular] {
            let mut d = Dither::new(kind);
            for _ in 0..1000 {
                let mut s = 10.0;
                d.process_samp(&mut s, 0);
                assert!((s - 10.0).abs() <= 0.5, "{:?} gave {}", kind, s);
            }
        }
    }

    #[test]
    fn shaped_error_averages_out() {
        let mut d = Dither::new(DitherType::Shaped);
        let n = 20_000;
        let mut total = 0.0;
        for _ in 0..n {
            let mut s = 0.3;
            d.process_samp(&mut s, 1);
            total += s.round();
        }
        assert!((total / n as f64 - 0.3).abs() < 0.01);
    }

    #[test]
    fn parses_cli_letters() {
        assert_eq!(DitherType::from_char('T'), Some(DitherType::Tpdf));
        assert_eq!(DitherType::from_char('x'), Some(DitherType::None));
        assert_eq!(DitherType::from_char('q'), None);
    }
}
