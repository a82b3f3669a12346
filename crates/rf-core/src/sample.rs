//! Sample types and audio buffer definitions

use serde::{Deserialize, Serialize};

use crate::error::{RfError, RfResult};
use crate::linear_to_db;

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Channel layout of an [`AudioBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Single channel, shape `[N]`
    Mono,
    /// Two channels, shape `[N, 2]`
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Number of channels
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Whole-buffer audio, stored channel-planar.
///
/// All channels always have the same length. Constructors pad shorter
/// channels with zeros instead of rejecting them.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::empty_stereo()
    }
}

impl AudioBuffer {
    /// Mono buffer from samples
    pub fn mono(samples: Vec<Sample>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    /// Stereo buffer from left/right, zero-padding the shorter side
    pub fn stereo(mut left: Vec<Sample>, mut right: Vec<Sample>) -> Self {
        let len = left.len().max(right.len());
        left.resize(len, 0.0);
        right.resize(len, 0.0);
        Self {
            channels: vec![left, right],
        }
    }

    /// Silent buffer of the given layout and length
    pub fn silent(layout: ChannelLayout, len: usize) -> Self {
        Self {
            channels: vec![vec![0.0; len]; layout.channels()],
        }
    }

    /// Zero-length stereo buffer, shape `(0, 2)`
    pub fn empty_stereo() -> Self {
        Self::silent(ChannelLayout::Stereo, 0)
    }

    /// Build from interleaved samples
    pub fn from_interleaved(data: &[Sample], num_channels: usize) -> RfResult<Self> {
        match num_channels {
            1 => Ok(Self::mono(data.to_vec())),
            2 => {
                let left = data.iter().step_by(2).copied().collect();
                let right = data.iter().skip(1).step_by(2).copied().collect();
                Ok(Self::stereo(left, right))
            }
            other => Err(RfError::ChannelMismatch {
                expected: 2,
                got: other,
            }),
        }
    }

    /// Interleave channels frame by frame
    pub fn interleaved(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(self.len() * self.num_channels());
        for i in 0..self.len() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Frames per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// `(frames, channels)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.num_channels())
    }

    pub fn layout(&self) -> ChannelLayout {
        if self.channels.len() == 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Stereo
        }
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        self.layout() == ChannelLayout::Stereo
    }

    /// Channel slice; panics if `index` is out of range
    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[Sample]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [Sample]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Duplicate mono into both channels; stereo is returned as-is
    pub fn to_stereo(&self) -> Self {
        match self.layout() {
            ChannelLayout::Stereo => self.clone(),
            ChannelLayout::Mono => Self {
                channels: vec![self.channels[0].clone(), self.channels[0].clone()],
            },
        }
    }

    /// Average channels down to mono
    pub fn to_mono(&self) -> Self {
        if self.layout() == ChannelLayout::Mono {
            return self.clone();
        }
        let scale = 1.0 / self.num_channels() as Sample;
        let samples = (0..self.len())
            .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<Sample>() * scale)
            .collect();
        Self::mono(samples)
    }

    /// Zero-pad or truncate every channel to `len`
    pub fn resize(&mut self, len: usize) {
        for ch in &mut self.channels {
            ch.resize(len, 0.0);
        }
    }

    /// Sum `other * gain` into this buffer.
    ///
    /// The result is as long as the longer of the two. A mono source is
    /// spread to both channels of a stereo destination; a stereo source
    /// upmixes a mono destination first.
    pub fn mix_in(&mut self, other: &AudioBuffer, gain: Sample) {
        if other.is_stereo() && !self.is_stereo() {
            *self = self.to_stereo();
        }
        let len = self.len().max(other.len());
        self.resize(len);

        let src_channels = other.num_channels();
        for (c, dst) in self.channels.iter_mut().enumerate() {
            let src = &other.channels[c.min(src_channels - 1)];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s * gain;
            }
        }
    }

    pub fn apply_gain(&mut self, gain: Sample) {
        for ch in &mut self.channels {
            for s in ch.iter_mut() {
                *s *= gain;
            }
        }
    }

    /// Absolute sample peak across channels (0 for empty)
    pub fn peak(&self) -> Sample {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0, |acc: Sample, s| acc.max(s.abs()))
    }

    /// Sample peak in dBFS; `-inf` for an empty or silent buffer
    pub fn peak_db(&self) -> Sample {
        linear_to_db(self.peak())
    }

    /// RMS over all channels and frames
    pub fn rms(&self) -> Sample {
        let count = self.len() * self.num_channels();
        if count == 0 {
            return 0.0;
        }
        let sum: Sample = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s * s)
            .sum();
        (sum / count as Sample).sqrt()
    }

    pub fn rms_db(&self) -> Sample {
        linear_to_db(self.rms())
    }

    pub fn is_finite(&self) -> bool {
        self.channels
            .iter()
            .all(|ch| ch.iter().all(|s| s.is_finite()))
    }

    /// Replace NaN/Inf samples with silence, returning how many were replaced
    pub fn sanitize(&mut self) -> usize {
        let mut replaced = 0;
        for ch in &mut self.channels {
            for s in ch.iter_mut() {
                if !s.is_finite() {
                    *s = 0.0;
                    replaced += 1;
                }
            }
        }
        replaced
    }

    /// Apply `f` to every channel, keeping the layout
    pub fn map_channels<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[Sample]) -> Vec<Sample>,
    {
        Self {
            channels: self.channels.iter().map(|ch| f(ch)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_pads_shorter_channel() {
        let buf = AudioBuffer::stereo(vec![1.0, 2.0, 3.0], vec![1.0]);
        assert_eq!(buf.shape(), (3, 2));
        assert_eq!(buf.channel(1), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_stereo_shape() {
        let buf = AudioBuffer::empty_stereo();
        assert_eq!(buf.shape(), (0, 2));
        assert!(buf.is_empty());
        assert_eq!(buf.peak_db(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_mix_in_pads_and_sums() {
        let mut dst = AudioBuffer::stereo(vec![0.5; 2], vec![0.5; 2]);
        let src = AudioBuffer::mono(vec![0.25; 4]);
        dst.mix_in(&src, 2.0);

        assert_eq!(dst.len(), 4);
        assert_eq!(dst.channel(0), &[1.0, 1.0, 0.5, 0.5]);
        assert_eq!(dst.channel(1), &[1.0, 1.0, 0.5, 0.5]);
    }

    #[test]
    fn test_mix_in_upmixes_mono_destination() {
        let mut dst = AudioBuffer::mono(vec![0.1; 3]);
        let src = AudioBuffer::stereo(vec![0.2; 3], vec![0.0; 3]);
        dst.mix_in(&src, 1.0);

        assert!(dst.is_stereo());
        assert!((dst.channel(0)[0] - 0.3).abs() < 1e-12);
        assert!((dst.channel(1)[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_interleave() {
        let buf = AudioBuffer::from_interleaved(&[1.0, -1.0, 2.0, -2.0], 2).unwrap();
        assert_eq!(buf.channel(0), &[1.0, 2.0]);
        assert_eq!(buf.channel(1), &[-1.0, -2.0]);
        assert_eq!(buf.interleaved(), vec![1.0, -1.0, 2.0, -2.0]);

        assert!(AudioBuffer::from_interleaved(&[0.0; 6], 3).is_err());
    }

    #[test]
    fn test_sanitize() {
        let mut buf = AudioBuffer::stereo(vec![f64::NAN, 0.5], vec![f64::INFINITY, -0.5]);
        assert!(!buf.is_finite());
        assert_eq!(buf.sanitize(), 2);
        assert!(buf.is_finite());
        assert_eq!(buf.peak(), 0.5);
    }

    #[test]
    fn test_to_mono_averages() {
        let buf = AudioBuffer::stereo(vec![1.0, 0.0], vec![0.0, 1.0]);
        assert_eq!(buf.to_mono().channel(0), &[0.5, 0.5]);
    }
}
