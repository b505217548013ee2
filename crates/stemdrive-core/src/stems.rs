//! Stem file loading and validation
//!
//! A mix is built from one audio file per stem role. All stems must decode
//! to the same frame count and sample rate - that shared length is what
//! lets the transport wrap a single cursor and keep every stem phase-locked
//! through the loop seam. Violations are load-time errors; playback is
//! never attempted on a mismatched set.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Sample, StemRole, StereoBuffer, StereoSample, NUM_STEMS};

/// Errors raised while loading a stem set
///
/// All of these are fatal: they surface before the transport ever enters
/// `Playing`, and no audio device is acquired on the failure path.
#[derive(Error, Debug)]
pub enum LoadError {
    /// No stem files supplied
    #[error("stem set is empty - need one file per role (bass, drums, other, vocals)")]
    EmptyStemSet,

    /// Wrong number of stem files for the fixed role set
    #[error("stem set has {found} files, expected {expected} (one per role)")]
    WrongStemCount { expected: usize, found: usize },

    /// File missing, unreadable, or not a valid WAV
    #[error("failed to read stem {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// More than two channels
    #[error("unsupported channel count in {path}: {channels} (expected mono or stereo)")]
    UnsupportedChannels { path: PathBuf, channels: u16 },

    /// Integer bit depth outside 16/24/32
    #[error("unsupported bit depth in {path}: {bits}")]
    UnsupportedBitDepth { path: PathBuf, bits: u16 },

    /// Stem decoded to a different sample rate than the first stem
    #[error("sample rate mismatch: {path} is {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// Stem decoded to a different length than the first stem
    #[error("length mismatch: {path} is {found} frames, expected {expected}")]
    LengthMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// A stem decoded to zero frames
    #[error("stem {path} contains no audio")]
    Empty { path: PathBuf },
}

/// A validated set of decoded stems, one per role
///
/// Invariants held by construction: exactly [`NUM_STEMS`] buffers, all the
/// same non-zero length and sample rate, in [`StemRole`] order.
#[derive(Debug)]
pub struct StemSet {
    buffers: [StereoBuffer; NUM_STEMS],
    sample_rate: u32,
    frames: usize,
}

impl StemSet {
    /// Load one WAV file per role, in role order
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, LoadError> {
        if paths.is_empty() {
            return Err(LoadError::EmptyStemSet);
        }
        if paths.len() != NUM_STEMS {
            return Err(LoadError::WrongStemCount {
                expected: NUM_STEMS,
                found: paths.len(),
            });
        }

        let mut decoded = Vec::with_capacity(NUM_STEMS);
        let mut sample_rate = 0u32;
        let mut frames = 0usize;

        for (idx, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let (buffer, rate) = read_stem_file(path)?;

            if buffer.is_empty() {
                return Err(LoadError::Empty { path: path.to_path_buf() });
            }

            if idx == 0 {
                sample_rate = rate;
                frames = buffer.len();
            } else {
                if rate != sample_rate {
                    return Err(LoadError::SampleRateMismatch {
                        path: path.to_path_buf(),
                        expected: sample_rate,
                        found: rate,
                    });
                }
                if buffer.len() != frames {
                    return Err(LoadError::LengthMismatch {
                        path: path.to_path_buf(),
                        expected: frames,
                        found: buffer.len(),
                    });
                }
            }

            log::debug!(
                "loaded stem {} from {}: {} frames @ {} Hz",
                StemRole::ALL[idx].name(),
                path.display(),
                buffer.len(),
                rate
            );
            decoded.push(buffer);
        }

        let buffers: [StereoBuffer; NUM_STEMS] = decoded
            .try_into()
            .unwrap_or_else(|_| unreachable!("stem count validated above"));

        log::info!(
            "stem set loaded: {} frames @ {} Hz ({:.1}s loop)",
            frames,
            sample_rate,
            frames as f64 / sample_rate as f64
        );

        Ok(Self {
            buffers,
            sample_rate,
            frames,
        })
    }

    /// Load stems from a directory using the conventional file names
    /// (`bass.wav`, `drums.wav`, `other.wav`, `vocals.wav`)
    pub fn load_dir(dir: &Path) -> Result<Self, LoadError> {
        let paths: Vec<PathBuf> = StemRole::ALL.iter().map(|r| dir.join(r.file_name())).collect();
        Self::load(&paths)
    }

    /// Build a set from in-memory buffers (synthetic stems, tests)
    pub fn from_buffers(
        buffers: [StereoBuffer; NUM_STEMS],
        sample_rate: u32,
    ) -> Result<Self, LoadError> {
        let frames = buffers[0].len();
        if frames == 0 {
            return Err(LoadError::Empty { path: PathBuf::from("<memory>") });
        }
        for buffer in &buffers[1..] {
            if buffer.len() != frames {
                return Err(LoadError::LengthMismatch {
                    path: PathBuf::from("<memory>"),
                    expected: frames,
                    found: buffer.len(),
                });
            }
        }
        Ok(Self {
            buffers,
            sample_rate,
            frames,
        })
    }

    /// Shared loop length in frames (identical for every stem)
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer(&self, role: StemRole) -> &StereoBuffer {
        &self.buffers[role as usize]
    }

    /// Consume the set, yielding the buffers in role order
    pub fn into_buffers(self) -> [StereoBuffer; NUM_STEMS] {
        self.buffers
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Decode a mono or stereo WAV file into a stereo buffer
///
/// Mono sources are duplicated into both channels. Integer samples are
/// normalized to [-1, 1]; 32-bit float files pass through.
fn read_stem_file(path: &Path) -> Result<(StereoBuffer, u32), LoadError> {
    let reader = hound::WavReader::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.channels > 2 {
        return Err(LoadError::UnsupportedChannels {
            path: path.to_path_buf(),
            channels: spec.channels,
        });
    }

    let samples: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?,
        hound::SampleFormat::Int => {
            if !matches!(spec.bits_per_sample, 16 | 24 | 32) {
                return Err(LoadError::UnsupportedBitDepth {
                    path: path.to_path_buf(),
                    bits: spec.bits_per_sample,
                });
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as Sample;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as Sample * scale))
                .collect::<Result<_, _>>()
                .map_err(|source| LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
        }
    };

    let frames = if spec.channels == 2 {
        samples
            .chunks_exact(2)
            .map(|lr| StereoSample::new(lr[0], lr[1]))
            .collect()
    } else {
        samples.iter().map(|&v| StereoSample::mono(v)).collect()
    };

    Ok((StereoBuffer::from_vec(frames), spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, frames: usize, channels: u16, sample_rate: u32, value: f32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as usize {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn role_paths(dir: &Path) -> Vec<PathBuf> {
        StemRole::ALL.iter().map(|r| dir.join(r.file_name())).collect()
    }

    #[test]
    fn test_load_matching_set() {
        let dir = tempfile::tempdir().unwrap();
        for path in role_paths(dir.path()) {
            write_wav(&path, 480, 2, 48000, 0.25);
        }

        let set = StemSet::load_dir(dir.path()).unwrap();
        assert_eq!(set.frames(), 480);
        assert_eq!(set.sample_rate(), 48000);
        assert_eq!(set.buffer(StemRole::Bass)[0].left, 0.25);
    }

    #[test]
    fn test_mono_duplicated_to_both_channels() {
        let dir = tempfile::tempdir().unwrap();
        let paths = role_paths(dir.path());
        write_wav(&paths[0], 100, 1, 44100, 0.5);
        for path in &paths[1..] {
            write_wav(path, 100, 2, 44100, 0.0);
        }

        let set = StemSet::load(&paths).unwrap();
        let bass = set.buffer(StemRole::Bass);
        assert_eq!(bass[0].left, 0.5);
        assert_eq!(bass[0].right, 0.5);
    }

    #[test]
    fn test_int16_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bass.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(i16::MAX).unwrap();
            writer.write_sample(i16::MIN).unwrap();
        }
        writer.finalize().unwrap();

        let (buffer, rate) = read_stem_file(&path).unwrap();
        assert_eq!(rate, 44100);
        assert!((buffer[0].left - 1.0).abs() < 1e-3);
        assert!((buffer[0].right + 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_set_rejected() {
        let paths: Vec<PathBuf> = Vec::new();
        assert!(matches!(StemSet::load(&paths), Err(LoadError::EmptyStemSet)));
    }

    #[test]
    fn test_wrong_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bass.wav");
        write_wav(&path, 100, 2, 48000, 0.0);
        let err = StemSet::load(&[&path, &path]).unwrap_err();
        assert!(matches!(err, LoadError::WrongStemCount { expected: 4, found: 2 }));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = role_paths(dir.path());
        write_wav(&paths[0], 480, 2, 48000, 0.0);
        write_wav(&paths[1], 480, 2, 48000, 0.0);
        write_wav(&paths[2], 400, 2, 48000, 0.0);
        write_wav(&paths[3], 480, 2, 48000, 0.0);

        let err = StemSet::load(&paths).unwrap_err();
        assert!(matches!(
            err,
            LoadError::LengthMismatch { expected: 480, found: 400, .. }
        ));
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = role_paths(dir.path());
        write_wav(&paths[0], 480, 2, 48000, 0.0);
        write_wav(&paths[1], 480, 2, 44100, 0.0);
        write_wav(&paths[2], 480, 2, 48000, 0.0);
        write_wav(&paths[3], 480, 2, 48000, 0.0);

        let err = StemSet::load(&paths).unwrap_err();
        assert!(matches!(
            err,
            LoadError::SampleRateMismatch { expected: 48000, found: 44100, .. }
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = StemSet::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
