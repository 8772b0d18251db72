//! Sampler parameters and groups of (texture, sampler) pairs that are bound together.

use smallvec::SmallVec;

use super::pipeline::Comparison;
use super::texture::TextureHandle;

impl_handle!(SamplerGroupHandle);

/// Maximum number of samplers in a `SamplerGroup`, which also bounds the number of
/// texture units tracked by the driver.
pub const MAX_SAMPLER_COUNT: usize = 16;

/// Sets the wrap parameter for texture.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SamplerWrapMode {
    /// Samples at coord x + 1 map to coord 1.
    ClampToEdge = 0,
    /// Samples at coord x + 1 map to coord x.
    Repeat = 1,
    /// Samples at coord x + 1 map to coord 1 - x.
    MirroredRepeat = 2,
}

/// Specify how the texture is used whenever the pixel being sampled.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SamplerMinFilter {
    Nearest = 0,
    Linear = 1,
    NearestMipmapNearest = 2,
    LinearMipmapNearest = 3,
    NearestMipmapLinear = 4,
    LinearMipmapLinear = 5,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SamplerMagFilter {
    Nearest = 0,
    Linear = 1,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SamplerCompareMode {
    None = 0,
    CompareToTexture = 1,
}

/// The value-equal description of a native sampler object.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct SamplerParams {
    pub mag: SamplerMagFilter,
    pub min: SamplerMinFilter,
    pub wrap_s: SamplerWrapMode,
    pub wrap_t: SamplerWrapMode,
    pub wrap_r: SamplerWrapMode,
    /// Log2 of the maximum anisotropy, up to 7.
    pub anisotropy_log2: u8,
    pub compare_mode: SamplerCompareMode,
    pub compare_func: Comparison,
}

impl Default for SamplerParams {
    fn default() -> Self {
        SamplerParams {
            mag: SamplerMagFilter::Nearest,
            min: SamplerMinFilter::Nearest,
            wrap_s: SamplerWrapMode::ClampToEdge,
            wrap_t: SamplerWrapMode::ClampToEdge,
            wrap_r: SamplerWrapMode::ClampToEdge,
            anisotropy_log2: 0,
            compare_mode: SamplerCompareMode::None,
            compare_func: Comparison::LessOrEqual,
        }
    }
}

impl SamplerParams {
    /// Packs the parameters into 32 bits. Two parameters are equal if and only if
    /// their packed bits are equal.
    pub fn bits(&self) -> u32 {
        (self.mag as u32)
            | (self.min as u32) << 1
            | (self.wrap_s as u32) << 4
            | (self.wrap_t as u32) << 6
            | (self.wrap_r as u32) << 8
            | (u32::from(self.anisotropy_log2) & 0x7) << 10
            | (self.compare_mode as u32) << 13
            | (self.compare_func as u32) << 14
    }

    /// Returns true if this sampler reads from the mipmap chain.
    pub fn is_mipmapped(&self) -> bool {
        match self.min {
            SamplerMinFilter::Nearest | SamplerMinFilter::Linear => false,
            _ => true,
        }
    }
}

/// One entry of a sampler group.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SamplerEntry {
    pub texture: TextureHandle,
    pub params: SamplerParams,
}

/// The content of a sampler group. Empty entries leave their unit untouched.
#[derive(Debug, Clone, Default)]
pub struct SamplerGroupDescriptor {
    pub entries: SmallVec<[Option<SamplerEntry>; MAX_SAMPLER_COUNT]>,
}

impl SamplerGroupDescriptor {
    pub fn new(size: usize) -> Self {
        assert!(size <= MAX_SAMPLER_COUNT);

        let mut entries = SmallVec::new();
        entries.resize(size, None);
        SamplerGroupDescriptor { entries }
    }

    pub fn set(&mut self, index: usize, texture: TextureHandle, params: SamplerParams) {
        self.entries[index] = Some(SamplerEntry { texture, params });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bits() {
        let a = SamplerParams::default();
        let mut b = a;
        assert_eq!(a.bits(), b.bits());

        b.wrap_t = SamplerWrapMode::Repeat;
        assert_ne!(a.bits(), b.bits());

        b = a;
        b.compare_func = Comparison::Never;
        assert_ne!(a.bits(), b.bits());

        b = a;
        b.min = SamplerMinFilter::LinearMipmapLinear;
        assert!(b.is_mipmapped());
        assert!(!a.is_mipmapped());
    }

    #[test]
    fn descriptor() {
        let mut desc = SamplerGroupDescriptor::new(4);
        assert_eq!(desc.len(), 4);
        desc.set(2, TextureHandle::default(), SamplerParams::default());
        assert!(desc.entries[2].is_some());
        assert!(desc.entries[0].is_none());
    }
}
