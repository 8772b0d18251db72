//! Textures, the formats they could be allocated with and the ways they could be sampled.

impl_handle!(TextureHandle);

/// Maximum number of mipmap levels of a texture.
pub const MAX_TEXTURE_LEVELS: u8 = 16;

bitflags! {
    /// Describes how a texture is going to be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u8 {
        /// The texture could be used as color attachment of a render target.
        const COLOR_ATTACHMENT = 0x01;
        /// The texture could be used as depth attachment of a render target.
        const DEPTH_ATTACHMENT = 0x02;
        /// The texture could be used as stencil attachment of a render target.
        const STENCIL_ATTACHMENT = 0x04;
        /// Data could be uploaded into this texture.
        const UPLOADABLE = 0x08;
        /// The texture could be sampled from shaders.
        const SAMPLEABLE = 0x10;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        TextureUsage::UPLOADABLE | TextureUsage::SAMPLEABLE
    }
}

/// The kind of sampler a texture is accessed with, which decides its native target.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SamplerType {
    Sampler2D,
    Sampler2DArray,
    SamplerCubemap,
    SamplerExternal,
    Sampler3D,
}

/// Faces of a cubemap, in the order of the native cubemap targets.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TextureCubemapFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

/// Byte offsets of each face inside a buffer holding all six faces of a cubemap level.
pub type FaceOffsets = [usize; 6];

/// List of all the possible internal formats of a texture.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TextureFormat {
    R8,
    R8UI,
    R16F,
    R32F,
    RG8,
    RG16F,
    RG32F,
    RGB8,
    SRGB8,
    RGB565,
    RGB16F,
    RGB32F,
    R11FG11FB10F,
    RGBA8,
    SRGB8A8,
    RGBA8UI,
    RGBA4,
    RGB5A1,
    RGB10A2,
    RGBA16F,
    RGBA32F,
    Depth16,
    Depth24,
    Depth32F,
    Depth24Stencil8,
    Depth32FStencil8,
    Stencil8,
    Etc2RGB8,
    Etc2SRGB8,
    Etc2RGBA8,
    Etc2SRGB8A8,
    DxtRGB,
    DxtRGBA,
    PvrtcRGB4BPP,
    PvrtcRGBA4BPP,
    AstcRGBA4x4,
    AstcRGBA8x8,
}

/// Families of compressed formats, each gated by its own extension.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureCompression {
    ETC2,
    S3TC,
    PVRTC,
    ASTC,
}

impl TextureFormat {
    /// Returns the compression family of this format, `None` if uncompressed.
    pub fn compression(self) -> Option<TextureCompression> {
        match self {
            TextureFormat::Etc2RGB8
            | TextureFormat::Etc2SRGB8
            | TextureFormat::Etc2RGBA8
            | TextureFormat::Etc2SRGB8A8 => Some(TextureCompression::ETC2),
            TextureFormat::DxtRGB | TextureFormat::DxtRGBA => Some(TextureCompression::S3TC),
            TextureFormat::PvrtcRGB4BPP | TextureFormat::PvrtcRGBA4BPP => {
                Some(TextureCompression::PVRTC)
            }
            TextureFormat::AstcRGBA4x4 | TextureFormat::AstcRGBA8x8 => {
                Some(TextureCompression::ASTC)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_compressed(self) -> bool {
        self.compression().is_some()
    }

    /// Returns the uncompressed format with the same channels, which is used when
    /// the compressed one is not available.
    pub fn uncompressed(self) -> TextureFormat {
        match self {
            TextureFormat::Etc2RGB8 | TextureFormat::DxtRGB | TextureFormat::PvrtcRGB4BPP => {
                TextureFormat::RGB8
            }
            TextureFormat::Etc2SRGB8 => TextureFormat::SRGB8,
            TextureFormat::Etc2SRGB8A8 => TextureFormat::SRGB8A8,
            TextureFormat::Etc2RGBA8
            | TextureFormat::DxtRGBA
            | TextureFormat::PvrtcRGBA4BPP
            | TextureFormat::AstcRGBA4x4
            | TextureFormat::AstcRGBA8x8 => TextureFormat::RGBA8,
            v => v,
        }
    }

    pub fn is_depth(self) -> bool {
        match self {
            TextureFormat::Depth16
            | TextureFormat::Depth24
            | TextureFormat::Depth32F
            | TextureFormat::Depth24Stencil8
            | TextureFormat::Depth32FStencil8 => true,
            _ => false,
        }
    }

    pub fn is_stencil(self) -> bool {
        match self {
            TextureFormat::Stencil8
            | TextureFormat::Depth24Stencil8
            | TextureFormat::Depth32FStencil8 => true,
            _ => false,
        }
    }

    /// Returns the size in bytes of a texel, `None` for compressed formats.
    pub fn size(self) -> Option<usize> {
        let v = match self {
            TextureFormat::R8 | TextureFormat::R8UI | TextureFormat::Stencil8 => 1,
            TextureFormat::R16F
            | TextureFormat::RG8
            | TextureFormat::RGB565
            | TextureFormat::RGBA4
            | TextureFormat::RGB5A1
            | TextureFormat::Depth16 => 2,
            TextureFormat::RGB8 | TextureFormat::SRGB8 | TextureFormat::Depth24 => 3,
            TextureFormat::R32F
            | TextureFormat::RG16F
            | TextureFormat::R11FG11FB10F
            | TextureFormat::RGBA8
            | TextureFormat::SRGB8A8
            | TextureFormat::RGBA8UI
            | TextureFormat::RGB10A2
            | TextureFormat::Depth32F
            | TextureFormat::Depth24Stencil8 => 4,
            TextureFormat::RGB16F => 6,
            TextureFormat::RG32F | TextureFormat::RGBA16F | TextureFormat::Depth32FStencil8 => 8,
            TextureFormat::RGB32F => 12,
            TextureFormat::RGBA32F => 16,
            _ => return None,
        };

        Some(v)
    }
}

/// The parameters of a texture object.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureParams {
    pub sampler: SamplerType,
    /// Number of mipmap levels, at least 1.
    pub levels: u8,
    pub format: TextureFormat,
    /// Number of samples, 1 for plain textures.
    pub samples: u8,
    pub width: u32,
    pub height: u32,
    /// The depth of 3D textures, or number of layers of array textures.
    pub depth: u32,
    pub usage: TextureUsage,
}

impl Default for TextureParams {
    fn default() -> Self {
        TextureParams {
            sampler: SamplerType::Sampler2D,
            levels: 1,
            format: TextureFormat::RGBA8,
            samples: 1,
            width: 0,
            height: 0,
            depth: 1,
            usage: TextureUsage::default(),
        }
    }
}

impl TextureParams {
    /// Returns the dimensions of mipmap `level`.
    pub fn level_dimensions(&self, level: u8) -> (u32, u32, u32) {
        let w = (self.width >> level).max(1);
        let h = (self.height >> level).max(1);
        let d = match self.sampler {
            SamplerType::Sampler3D => (self.depth >> level).max(1),
            _ => self.depth,
        };

        (w, h, d)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compression() {
        assert_eq!(
            TextureFormat::Etc2RGBA8.compression(),
            Some(TextureCompression::ETC2)
        );
        assert_eq!(TextureFormat::Etc2RGBA8.uncompressed(), TextureFormat::RGBA8);
        assert_eq!(TextureFormat::RGBA8.uncompressed(), TextureFormat::RGBA8);
        assert!(TextureFormat::Etc2RGBA8.size().is_none());
        assert_eq!(TextureFormat::RGBA8.size(), Some(4));
        assert!(TextureFormat::Depth24Stencil8.is_depth());
        assert!(TextureFormat::Depth24Stencil8.is_stencil());
    }

    #[test]
    fn levels() {
        let params = TextureParams {
            width: 16,
            height: 4,
            levels: 5,
            ..TextureParams::default()
        };

        assert_eq!(params.level_dimensions(0), (16, 4, 1));
        assert_eq!(params.level_dimensions(3), (2, 1, 1));
        assert_eq!(params.level_dimensions(4), (1, 1, 1));
    }
}
