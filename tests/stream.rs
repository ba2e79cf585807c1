// End-to-end behaviour of the public streaming API.

use std::sync::Arc;

use blipper::{BlipConfig, BlipError, Blipper, FilterBank};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Reference overlap-add in f64 straight from the bank, no sliding buffer.
fn reference(bank: &FilterBank, deltas: &[(f64, u64)], outputs: usize) -> Vec<f64> {
    let phases = bank.phases() as u64;
    let taps = bank.taps();
    let mut acc = vec![0.0f64; outputs + taps];
    for &(delta, clock) in deltas {
        let target = clock.div_ceil(phases);
        let sub = (target * phases - clock) as usize;
        for (i, &c) in bank.phase(sub).iter().enumerate() {
            acc[target as usize + i] += delta * c as f64;
        }
    }
    let mut sum = 0.0;
    acc[..outputs]
        .iter()
        .map(|&v| {
            sum += v;
            sum / phases as f64
        })
        .collect()
}

// Random held levels: (level, run length) pairs flattened to one per clock
fn held_levels(rng: &mut StdRng, clocks: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(clocks);
    while out.len() < clocks {
        let level: f32 = rng.gen_range(-1.0..1.0);
        let run = rng.gen_range(1..40usize);
        out.extend(std::iter::repeat(level).take(run));
    }
    out.truncate(clocks);
    out
}

#[test]
fn sample_stream_matches_explicit_overlap_add() {
    let cfg = BlipConfig::new(16, 0.85, 8.0, 8, 512);
    let mut blip = Blipper::new(&cfg).unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let levels = held_levels(&mut rng, 8 * 300);

    // Clock i carries levels[i]; a change at clock i is a delta at i + 1
    let mut deltas = Vec::new();
    let mut last = 0.0f32;
    for (i, &v) in levels.iter().enumerate() {
        if v != last {
            deltas.push(((v - last) as f64, i as u64 + 1));
            last = v;
        }
    }

    let mut got = Vec::new();
    for block in levels.chunks(8 * 50) {
        blip.push_samples(block, block.len(), 1).unwrap();
        let avail = blip.read_avail();
        let start = got.len();
        got.resize(start + avail, 0.0f32);
        blip.read(&mut got[start..], avail, 1).unwrap();
    }
    assert_eq!(got.len(), 300);

    let want = reference(blip.filter_bank(), &deltas, got.len());
    for (n, (g, w)) in got.iter().zip(&want).enumerate() {
        assert!((*g as f64 - w).abs() < 1e-3, "sample {}: {} vs {}", n, g, w);
    }
}

#[test]
fn avail_tracks_the_clock() {
    let cfg = BlipConfig::new(8, 0.9, 6.0, 16, 256);
    let mut blip = Blipper::new(&cfg).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let mut out = vec![0.0f32; 256];

    for _ in 0..50 {
        let mut prev = blip.read_avail();
        for _ in 0..rng.gen_range(1..20) {
            let clocks = rng.gen_range(0..40usize);
            blip.push_delta(rng.gen_range(-1.0..1.0), clocks).unwrap();
            let avail = blip.read_avail();
            assert!(avail >= prev);
            let phase = blip.phase();
            assert_eq!(avail as i64, (phase + 15).div_euclid(16));
            prev = avail;
        }
        let n = rng.gen_range(prev / 2..=prev);
        blip.read(&mut out, n, 1).unwrap();
        assert_eq!(blip.read_avail(), prev - n);
    }
}

#[test]
fn hardened_contract_violations() {
    let cfg = BlipConfig::new(8, 0.9, 6.0, 4, 16);
    let mut blip = Blipper::new(&cfg).unwrap();
    assert_eq!(blip.capacity(), 16);

    // Exactly at capacity is fine, one past is not
    blip.push_delta(1.0, 4 * 16).unwrap();
    assert_eq!(blip.read_avail(), 16);
    match blip.push_delta(1.0, 1) {
        Err(BlipError::CapacityExceeded { capacity: 16, .. }) => {}
        other => panic!("unexpected {:?}", other),
    }

    let mut out = [0.0f32; 32];
    assert!(matches!(
        blip.read(&mut out, 17, 1),
        Err(BlipError::ReadUnderflow { requested: 17, avail: 16 })
    ));
    blip.read(&mut out, 16, 2).unwrap();
    assert_eq!(blip.read_avail(), 0);

    // Short source slice
    assert!(matches!(
        blip.push_samples(&[0.0; 4], 3, 2),
        Err(BlipError::BufferTooShort { needed: 5, len: 4 })
    ));
}

#[test]
fn channels_share_one_bank_and_stay_aligned() {
    let cfg = BlipConfig::new(32, 0.85, 8.0, 16, 128);
    let bank = Arc::new(FilterBank::build(cfg.taps, cfg.cutoff, cfg.beta, cfg.decimation).unwrap());
    let mut left = Blipper::with_filter_bank(Arc::clone(&bank), cfg.buffer_samples).unwrap();
    let mut right = Blipper::with_filter_bank(Arc::clone(&bank), cfg.buffer_samples).unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let l = held_levels(&mut rng, 16 * 100);
    let r = held_levels(&mut rng, 16 * 100);
    let interleaved: Vec<f32> = l.iter().zip(&r).flat_map(|(&a, &b)| [a, b]).collect();

    let frames = l.len();
    left.push_samples(&interleaved, frames, 2).unwrap();
    right.push_samples(&interleaved[1..], frames, 2).unwrap();
    assert_eq!(left.read_avail(), right.read_avail());

    let avail = left.read_avail();
    let mut out = vec![0.0f32; avail * 2];
    left.read(&mut out, avail, 2).unwrap();
    right.read(&mut out[1..], avail, 2).unwrap();

    // Same as running the right channel alone
    let mut solo = Blipper::with_filter_bank(bank, cfg.buffer_samples).unwrap();
    solo.push_samples(&r, frames, 1).unwrap();
    let mut solo_out = vec![0.0f32; avail];
    solo.read(&mut solo_out, avail, 1).unwrap();
    for (i, s) in solo_out.iter().enumerate() {
        assert_eq!(out[2 * i + 1], *s);
    }
}

#[test]
fn many_decimation_factors_reconstruct_dc() {
    for shift in 0..8 {
        let d = 1usize << shift;
        let cfg = BlipConfig::new(32, 0.85, 8.0, d, 128);
        let mut blip = Blipper::new(&cfg).unwrap();
        blip.push_delta(-0.75, 0).unwrap();
        blip.push_delta(0.0, d * 100).unwrap();
        let mut out = vec![0.0f32; 100];
        blip.read(&mut out, 100, 1).unwrap();
        assert!((out[99] + 0.75).abs() < 1e-3, "decimation {}: {}", d, out[99]);
    }
}
