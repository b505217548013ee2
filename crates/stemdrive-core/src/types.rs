//! Common types for Stemdrive
//!
//! Fundamental audio types shared by the mix engine and the audio backend:
//! stereo sample/buffer handling and the fixed stem role set.

use std::ops::{Index, IndexMut};

/// Number of stems in a mix (Bass, Drums, Other, Vocals)
pub const NUM_STEMS: usize = 4;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Stem role identifiers, in the fixed mix ordering
///
/// The ordering is load-bearing: gain vectors are indexed by
/// `role as usize`, and stem files are supplied in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum StemRole {
    Bass = 0,
    Drums = 1,
    Other = 2,
    Vocals = 3,
}

impl StemRole {
    /// All roles in mix order
    pub const ALL: [StemRole; NUM_STEMS] =
        [StemRole::Bass, StemRole::Drums, StemRole::Other, StemRole::Vocals];

    /// Convert from index (0-3) to role
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(StemRole::Bass),
            1 => Some(StemRole::Drums),
            2 => Some(StemRole::Other),
            3 => Some(StemRole::Vocals),
            _ => None,
        }
    }

    /// Display name of this role
    pub fn name(&self) -> &'static str {
        match self {
            StemRole::Bass => "Bass",
            StemRole::Drums => "Drums",
            StemRole::Other => "Other",
            StemRole::Vocals => "Vocals",
        }
    }

    /// Conventional stem file name for this role
    pub fn file_name(&self) -> &'static str {
        match self {
            StemRole::Bass => "bass.wav",
            StemRole::Drums => "drums.wav",
            StemRole::Other => "other.wav",
            StemRole::Vocals => "vocals.wav",
        }
    }
}

/// Transport state
///
/// `Stopped` is terminal: a stopped session releases the audio device and
/// never re-enters `Playing`. There is deliberately no `Paused` state -
/// silence is reached through gain alone, so the transport clock never
/// stops and the stems stay phase-locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,
    Playing,
    Stopped,
}

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` guarantees the [left, right] layout, enabling zero-copy
/// conversion between `&[StereoSample]` and interleaved `&[f32]` via
/// bytemuck when handing frames to the audio device.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// A silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// A mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// The primary audio buffer type. Pre-allocate at full capacity with
/// [`StereoBuffer::silence`] and resize with [`set_len_from_capacity`]
/// inside the audio callback - that path never allocates.
///
/// [`set_len_from_capacity`]: StereoBuffer::set_len_from_capacity
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from an existing Vec of StereoSamples
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Number of stereo frames in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Panics in debug builds if `new_len > capacity`. Newly exposed
    /// frames are silenced; shrinking never deallocates.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let current_len = self.samples.len();
        if new_len > current_len {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy view of the frames as interleaved f32 [L, R, L, R, ...]
    ///
    /// Zero-cost thanks to `#[repr(C)]` on StereoSample. Used for copying
    /// straight into the device's interleaved output slice.
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

impl Default for StereoBuffer {
    fn default() -> Self {
        Self { samples: Vec::new() }
    }
}
