//! PCM fingerprinting: decode, normalize, digest.
//!
//! The audio stream is decoded with symphonia, downmixed to mono, resampled
//! to a fixed 44.1 kHz rate and quantized to signed 16-bit little-endian
//! samples before hashing. Normalizing the format this way makes the digest
//! independent of container, codec and tag differences: two files that
//! decode to the same audio produce the same fingerprint.
//!
//! Every step is deterministic for identical input bytes, so fingerprints
//! are stable across runs and machines.

use std::fs::File;
use std::path::{Path, PathBuf};

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fixed sample rate of the normalized fingerprint stream.
pub const FINGERPRINT_SAMPLE_RATE: u32 = 44_100;

/// Tracks shorter than this are not PCM-hashed (pseudo-audio guard).
pub const MIN_AUDIO_DURATION_SECS: f64 = 0.5;

/// Input chunk size fed to the resampler.
const RESAMPLE_CHUNK: usize = 1024;

/// Why a PCM fingerprint could not be computed.
///
/// All variants are recoverable: the caller falls back to byte hashing.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt container: {0}")]
    Unsupported(String),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("audio shorter than the minimum fingerprint duration")]
    TooShort,

    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Compute a BLAKE3 digest over the normalized PCM stream of an audio file.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the file cannot be decoded; the caller is
/// expected to fall back to [`super::byte::byte_digest`].
pub fn pcm_digest(path: &Path) -> Result<[u8; 32], DecodeError> {
    let (samples, sample_rate) = decode_mono(path)?;

    let duration = samples.len() as f64 / f64::from(sample_rate);
    if duration < MIN_AUDIO_DURATION_SECS {
        return Err(DecodeError::TooShort);
    }

    let samples = if sample_rate == FINGERPRINT_SAMPLE_RATE {
        samples
    } else {
        resample(&samples, sample_rate)?
    };

    let mut hasher = blake3::Hasher::new();
    for sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        hasher.update(&quantized.to_le_bytes());
    }
    Ok(*hasher.finalize().as_bytes())
}

/// Decode an audio file into mono f32 samples at its native sample rate.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), DecodeError> {
    let file = File::open(path).map_err(|e| DecodeError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint the format registry with the file extension.
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut format = probed.format;
    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .unwrap_or(FINGERPRINT_SAMPLE_RATE);
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped deterministically.
            Err(SymphoniaError::DecodeError(e)) => {
                log::trace!("skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        append_mono(&decoded, &mut samples);
    }

    if samples.is_empty() {
        return Err(DecodeError::TooShort);
    }

    Ok((samples, sample_rate))
}

/// Downmix a decoded buffer to mono and append it to `out`.
///
/// Signed integer samples use symmetric scaling (divide by 2^(N-1)) so the
/// [-1.0, 1.0] range is symmetric; unsigned samples are re-centered.
fn append_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => push_mono(buf, |s| s.clamp(-1.0, 1.0), out),
        AudioBufferRef::F64(buf) => push_mono(buf, |s| (s as f32).clamp(-1.0, 1.0), out),
        AudioBufferRef::S32(buf) => push_mono(buf, |s| s as f32 / 2_147_483_648.0, out),
        AudioBufferRef::S24(buf) => push_mono(buf, |s| s.inner() as f32 / 8_388_608.0, out),
        AudioBufferRef::S16(buf) => push_mono(buf, |s| f32::from(s) / 32_768.0, out),
        AudioBufferRef::S8(buf) => push_mono(buf, |s| f32::from(s) / 128.0, out),
        AudioBufferRef::U32(buf) => {
            push_mono(buf, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0, out);
        }
        AudioBufferRef::U24(buf) => {
            push_mono(buf, |s| (s.inner() as f32 / 16_777_215.0) * 2.0 - 1.0, out);
        }
        AudioBufferRef::U16(buf) => {
            push_mono(buf, |s| (f32::from(s) / f32::from(u16::MAX)) * 2.0 - 1.0, out);
        }
        AudioBufferRef::U8(buf) => {
            push_mono(buf, |s| (f32::from(s) / f32::from(u8::MAX)) * 2.0 - 1.0, out);
        }
    }
}

/// Average all channels of a frame into one mono sample.
fn push_mono<T, F>(
    buf: &symphonia::core::audio::AudioBuffer<T>,
    normalize: F,
    out: &mut Vec<f32>,
) where
    T: symphonia::core::sample::Sample + Copy,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    if channels == 0 || frames == 0 {
        return;
    }

    out.reserve(frames);
    if channels == 1 {
        let chan = buf.chan(0);
        out.extend(chan[..frames].iter().map(|&s| normalize(s)));
        return;
    }

    let scale = 1.0 / channels as f32;
    for i in 0..frames {
        let mut acc = 0.0f32;
        for ch in 0..channels {
            acc += normalize(buf.chan(ch)[i]);
        }
        out.push(acc * scale);
    }
}

/// Resample mono samples from `from_rate` to [`FINGERPRINT_SAMPLE_RATE`].
///
/// The final partial chunk is zero-padded by the resampler; the padding is
/// deterministic, which is all the fingerprint needs.
fn resample(samples: &[f32], from_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        FINGERPRINT_SAMPLE_RATE as usize,
        RESAMPLE_CHUNK,
        2,
        1,
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let estimated =
        samples.len() as f64 * f64::from(FINGERPRINT_SAMPLE_RATE) / f64::from(from_rate);
    let mut out = Vec::with_capacity(estimated as usize + RESAMPLE_CHUNK);

    let mut pos = 0;
    while samples.len() - pos >= RESAMPLE_CHUNK {
        let chunk = [&samples[pos..pos + RESAMPLE_CHUNK]];
        let mut frames = resampler
            .process(&chunk, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out.append(&mut frames[0]);
        pos += RESAMPLE_CHUNK;
    }

    if pos < samples.len() {
        let tail = [&samples[pos..]];
        let mut frames = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out.append(&mut frames[0]);
    }

    // Drain the resampler's internal delay line.
    let mut frames = resampler
        .process_partial(None::<&[&[f32]]>, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    out.append(&mut frames[0]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Minimal 16-bit mono WAV file with the given samples.
    fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(b"RIFF").unwrap();
        f.write_all(&(36 + data_len).to_le_bytes()).unwrap();
        f.write_all(b"WAVE").unwrap();
        f.write_all(b"fmt ").unwrap();
        f.write_all(&16u32.to_le_bytes()).unwrap();
        f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
        f.write_all(&1u16.to_le_bytes()).unwrap(); // mono
        f.write_all(&sample_rate.to_le_bytes()).unwrap();
        f.write_all(&(sample_rate * 2).to_le_bytes()).unwrap();
        f.write_all(&2u16.to_le_bytes()).unwrap();
        f.write_all(&16u16.to_le_bytes()).unwrap();
        f.write_all(b"data").unwrap();
        f.write_all(&data_len.to_le_bytes()).unwrap();
        for s in samples {
            f.write_all(&s.to_le_bytes()).unwrap();
        }
    }

    fn sine(sample_rate: u32, secs: f64) -> Vec<i16> {
        let count = (f64::from(sample_rate) * secs) as usize;
        (0..count)
            .map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                ((t * 440.0 * std::f64::consts::TAU).sin() * 12000.0) as i16
            })
            .collect()
    }

    #[test]
    fn test_pcm_digest_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44_100, &sine(44_100, 1.0));

        let a = pcm_digest(&path).unwrap();
        let b = pcm_digest(&path).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pcm_digest_ignores_file_name_and_copy() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("one.wav");
        let b = dir.path().join("two.wav");
        let samples = sine(44_100, 1.0);
        write_wav(&a, 44_100, &samples);
        write_wav(&b, 44_100, &samples);

        assert_eq!(pcm_digest(&a).unwrap(), pcm_digest(&b).unwrap());
    }

    #[test]
    fn test_pcm_digest_differs_for_different_audio() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_wav(&a, 44_100, &sine(44_100, 1.0));
        let mut other = sine(44_100, 1.0);
        other[1000] = other[1000].wrapping_add(100);
        write_wav(&b, 44_100, &other);

        assert_ne!(pcm_digest(&a).unwrap(), pcm_digest(&b).unwrap());
    }

    #[test]
    fn test_pcm_digest_rejects_short_audio() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blip.wav");
        write_wav(&path, 44_100, &sine(44_100, 0.1));

        assert!(matches!(pcm_digest(&path), Err(DecodeError::TooShort)));
    }

    #[test]
    fn test_pcm_digest_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, vec![0x13u8; 4096]).unwrap();

        assert!(pcm_digest(&path).is_err());
    }

    #[test]
    fn test_resample_preserves_rough_duration() {
        let input: Vec<f32> = (0..48_000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let output = resample(&input, 48_000).unwrap();
        // One second of input should give about one second of output.
        let expected = FINGERPRINT_SAMPLE_RATE as f64;
        let actual = output.len() as f64;
        assert!(
            (actual - expected).abs() / expected < 0.1,
            "expected ~{expected} samples, got {actual}"
        );
    }

    #[test]
    fn test_resample_is_deterministic() {
        let input: Vec<f32> = (0..10_000).map(|i| (i as f32 * 0.3).cos() * 0.2).collect();
        let a = resample(&input, 22_050).unwrap();
        let b = resample(&input, 22_050).unwrap();
        assert_eq!(a, b);
    }
}
