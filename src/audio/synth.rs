/// Oscillator and noise rendering into in-memory WAV buffers.
use std::f32::consts::TAU;
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_RATE: u32 = 22_050;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
}

impl Waveform {
    /// One sample at phase `p` in [0, 1).
    fn sample(self, p: f32) -> f32 {
        match self {
            Waveform::Sine => (p * TAU).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        }
    }
}

/// MIDI note number to frequency in Hz.
pub fn midi_to_hz(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

fn frames(secs: f32) -> usize {
    (secs * SAMPLE_RATE as f32).round() as usize
}

/// Short linear attack and release so notes don't click.
fn envelope(i: usize, len: usize) -> f32 {
    let ramp = frames(0.01).max(1);
    let attack = (i as f32 / ramp as f32).min(1.0);
    let release = ((len - i) as f32 / ramp as f32).min(1.0);
    attack.min(release)
}

/// A fixed-frequency tone.
pub fn tone(waveform: Waveform, hz: f32, secs: f32, gain: f32) -> Vec<f32> {
    let len = frames(secs);
    (0..len)
        .map(|i| {
            let p = (i as f32 * hz / SAMPLE_RATE as f32).fract();
            waveform.sample(p) * envelope(i, len) * gain
        })
        .collect()
}

/// A tone whose pitch glides linearly from `from` to `to`.
pub fn sweep(waveform: Waveform, from: f32, to: f32, secs: f32, gain: f32) -> Vec<f32> {
    let len = frames(secs);
    let mut phase = 0.0f32;
    (0..len)
        .map(|i| {
            let hz = from + (to - from) * i as f32 / len as f32;
            phase = (phase + hz / SAMPLE_RATE as f32).fract();
            waveform.sample(phase) * envelope(i, len) * gain
        })
        .collect()
}

/// White noise with exponential decay.
pub fn noise_burst(secs: f32, decay: f32, gain: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = frames(secs);
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            rng.random_range(-1.0..1.0) * (-t * decay).exp() * gain
        })
        .collect()
}

/// Notes as `(midi note or rest, beats)`.
pub fn melody(waveform: Waveform, notes: &[(Option<u8>, f32)], bpm: f32, gain: f32) -> Vec<f32> {
    let beat = 60.0 / bpm;
    let mut out = Vec::new();
    for &(note, beats) in notes {
        let secs = beats * beat;
        match note {
            // Slight gap between notes keeps repeated pitches distinct.
            Some(note) => {
                out.extend(tone(waveform, midi_to_hz(note), secs * 0.9, gain));
                out.extend(silence(secs * 0.1));
            }
            None => out.extend(silence(secs)),
        }
    }
    out
}

pub fn silence(secs: f32) -> Vec<f32> {
    vec![0.0; frames(secs)]
}

/// Mix `other` into `base` starting at `offset` seconds.
pub fn mix_at(base: &mut Vec<f32>, other: &[f32], offset: f32) {
    let start = frames(offset);
    if base.len() < start + other.len() {
        base.resize(start + other.len(), 0.0);
    }
    for (dst, src) in base[start..].iter_mut().zip(other) {
        *dst += src;
    }
}

/// Encode mono samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

pub fn click() -> Vec<f32> {
    sweep(Waveform::Square, 1_200.0, 600.0, 0.05, 0.25)
}

pub fn siren() -> Vec<f32> {
    let mut out = sweep(Waveform::Triangle, 600.0, 1_100.0, 0.25, 0.3);
    out.extend(sweep(Waveform::Triangle, 1_100.0, 600.0, 0.25, 0.3));
    out
}

pub fn glitch() -> Vec<f32> {
    let mut out = noise_burst(0.48, 4.0, 0.35, 0x6117);
    mix_at(&mut out, &tone(Waveform::Square, 90.0, 0.48, 0.15), 0.0);
    out
}

pub fn chime() -> Vec<f32> {
    let mut out = Vec::new();
    for (i, note) in [72u8, 76, 79, 84].into_iter().enumerate() {
        mix_at(
            &mut out,
            &tone(Waveform::Sine, midi_to_hz(note), 0.4, 0.2),
            i as f32 * 0.08,
        );
    }
    out
}

/// Three hand claps, each a short decaying noise burst.
pub fn clap() -> Vec<f32> {
    let mut out = silence(0.6);
    for (i, offset) in [0.0, 0.18, 0.36].into_iter().enumerate() {
        mix_at(&mut out, &noise_burst(0.12, 30.0, 0.5, 0xC1A9 + i as u64), offset);
    }
    out
}

/// Chiptune loop for the arcade.
pub fn game_loop() -> Vec<f32> {
    const C4: u8 = 60;
    let bar = |root: u8| -> [(Option<u8>, f32); 8] {
        [
            (Some(root), 0.5),
            (Some(root + 4), 0.5),
            (Some(root + 7), 0.5),
            (Some(root + 12), 0.5),
            (Some(root + 7), 0.5),
            (Some(root + 4), 0.5),
            (Some(root), 0.5),
            (None, 0.5),
        ]
    };
    let notes: Vec<_> = [C4, C4 + 5, C4 + 7, C4 + 5]
        .into_iter()
        .flat_map(bar)
        .collect();
    melody(Waveform::Square, &notes, 140.0, 0.12)
}

/// Happy birthday, once through, then a rest before looping.
pub fn happy_loop() -> Vec<f32> {
    const G4: u8 = 67;
    let notes = [
        (Some(G4), 0.75),
        (Some(G4), 0.25),
        (Some(G4 + 2), 1.0),
        (Some(G4), 1.0),
        (Some(G4 + 5), 1.0),
        (Some(G4 + 4), 2.0),
        (Some(G4), 0.75),
        (Some(G4), 0.25),
        (Some(G4 + 2), 1.0),
        (Some(G4), 1.0),
        (Some(G4 + 7), 1.0),
        (Some(G4 + 5), 2.0),
        (Some(G4), 0.75),
        (Some(G4), 0.25),
        (Some(G4 + 12), 1.0),
        (Some(G4 + 9), 1.0),
        (Some(G4 + 5), 1.0),
        (Some(G4 + 4), 1.0),
        (Some(G4 + 2), 2.0),
        (Some(G4 + 10), 0.75),
        (Some(G4 + 10), 0.25),
        (Some(G4 + 9), 1.0),
        (Some(G4 + 5), 1.0),
        (Some(G4 + 7), 1.0),
        (Some(G4 + 5), 2.0),
        (None, 2.0),
    ];
    melody(Waveform::Triangle, &notes, 120.0, 0.25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert!((midi_to_hz(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_hz(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn wav_reads_back_as_mono_pcm() {
        let samples = tone(Waveform::Sine, 440.0, 0.1, 0.5);
        let wav = encode_wav(&samples).expect("encode");

        let mut reader = hound::WavReader::new(Cursor::new(wav)).expect("valid wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len() as usize, samples.len());

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
        let peak = decoded.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > i16::MAX as u16 / 3 && peak <= i16::MAX as u16 / 2 + 1);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let wav = encode_wav(&[2.0, -2.0]).expect("encode");
        let mut reader = hound::WavReader::new(Cursor::new(wav)).expect("valid wav");
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
        assert_eq!(decoded, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn rendered_sounds_stay_in_range() {
        for samples in [click(), siren(), glitch(), chime(), clap(), game_loop(), happy_loop()] {
            assert!(!samples.is_empty());
            assert!(samples.iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn melody_length_follows_tempo() {
        let notes = [(Some(60), 1.0), (None, 1.0)];
        let samples = melody(Waveform::Square, &notes, 60.0, 0.1);
        let expected = 2 * SAMPLE_RATE as usize;
        assert!(samples.len().abs_diff(expected) <= 2);
    }

    #[test]
    fn noise_is_seeded() {
        assert_eq!(noise_burst(0.05, 10.0, 0.5, 7), noise_burst(0.05, 10.0, 0.5, 7));
    }
}
