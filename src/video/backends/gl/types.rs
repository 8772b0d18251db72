//! Conversions from the abstract enums into native GL ones. Every function here is
//! pure and could be called from any thread.

use gl;
use gl::types::*;

use super::capabilities::Capabilities;
use crate::video::assets::prelude::*;

pub const TEXTURE_EXTERNAL_OES: GLenum = 0x8D65;
pub const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: GLenum = 0x8CD9;
pub const TEXTURE_MAX_ANISOTROPY_EXT: GLenum = 0x84FE;
pub const COMPRESSED_RGB_S3TC_DXT1_EXT: GLenum = 0x83F0;
pub const COMPRESSED_RGBA_S3TC_DXT5_EXT: GLenum = 0x83F3;
pub const COMPRESSED_RGB_PVRTC_4BPPV1_IMG: GLenum = 0x8C00;
pub const COMPRESSED_RGBA_PVRTC_4BPPV1_IMG: GLenum = 0x8C02;
pub const COMPRESSED_RGBA_ASTC_4X4_KHR: GLenum = 0x93B0;
pub const COMPRESSED_RGBA_ASTC_8X8_KHR: GLenum = 0x93B7;

impl From<BufferUsage> for GLenum {
    fn from(usage: BufferUsage) -> Self {
        match usage {
            BufferUsage::Static => gl::STATIC_DRAW,
            BufferUsage::Dynamic => gl::DYNAMIC_DRAW,
            BufferUsage::Stream => gl::STREAM_DRAW,
        }
    }
}

impl From<Comparison> for GLenum {
    fn from(cmp: Comparison) -> Self {
        match cmp {
            Comparison::Never => gl::NEVER,
            Comparison::Less => gl::LESS,
            Comparison::LessOrEqual => gl::LEQUAL,
            Comparison::Greater => gl::GREATER,
            Comparison::GreaterOrEqual => gl::GEQUAL,
            Comparison::Equal => gl::EQUAL,
            Comparison::NotEqual => gl::NOTEQUAL,
            Comparison::Always => gl::ALWAYS,
        }
    }
}

impl From<Equation> for GLenum {
    fn from(eq: Equation) -> Self {
        match eq {
            Equation::Add => gl::FUNC_ADD,
            Equation::Subtract => gl::FUNC_SUBTRACT,
            Equation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
            Equation::Min => gl::MIN,
            Equation::Max => gl::MAX,
        }
    }
}

impl From<BlendFactor> for GLenum {
    fn from(factor: BlendFactor) -> Self {
        match factor {
            BlendFactor::Zero => gl::ZERO,
            BlendFactor::One => gl::ONE,
            BlendFactor::Value(BlendValue::SourceColor) => gl::SRC_COLOR,
            BlendFactor::Value(BlendValue::SourceAlpha) => gl::SRC_ALPHA,
            BlendFactor::Value(BlendValue::DestinationColor) => gl::DST_COLOR,
            BlendFactor::Value(BlendValue::DestinationAlpha) => gl::DST_ALPHA,
            BlendFactor::OneMinusValue(BlendValue::SourceColor) => gl::ONE_MINUS_SRC_COLOR,
            BlendFactor::OneMinusValue(BlendValue::SourceAlpha) => gl::ONE_MINUS_SRC_ALPHA,
            BlendFactor::OneMinusValue(BlendValue::DestinationColor) => gl::ONE_MINUS_DST_COLOR,
            BlendFactor::OneMinusValue(BlendValue::DestinationAlpha) => gl::ONE_MINUS_DST_ALPHA,
            BlendFactor::SourceAlphaSaturate => gl::SRC_ALPHA_SATURATE,
        }
    }
}

impl From<FrontFaceOrder> for GLenum {
    fn from(order: FrontFaceOrder) -> Self {
        match order {
            FrontFaceOrder::Clockwise => gl::CW,
            FrontFaceOrder::CounterClockwise => gl::CCW,
        }
    }
}

/// Returns the face to cull, `None` if culling is disabled.
pub fn culling(mode: CullingMode) -> Option<GLenum> {
    match mode {
        CullingMode::Nothing => None,
        CullingMode::Front => Some(gl::FRONT),
        CullingMode::Back => Some(gl::BACK),
        CullingMode::FrontAndBack => Some(gl::FRONT_AND_BACK),
    }
}

impl From<PrimitiveType> for GLenum {
    fn from(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Points => gl::POINTS,
            PrimitiveType::Lines => gl::LINES,
            PrimitiveType::LineStrip => gl::LINE_STRIP,
            PrimitiveType::Triangles => gl::TRIANGLES,
            PrimitiveType::TriangleStrip => gl::TRIANGLE_STRIP,
        }
    }
}

impl From<IndexFormat> for GLenum {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::U16 => gl::UNSIGNED_SHORT,
            IndexFormat::U32 => gl::UNSIGNED_INT,
        }
    }
}

/// Returns the native component type of a vertex element.
pub fn element_type(element: ElementType) -> GLenum {
    use crate::video::assets::buffer::ElementType::*;

    match element {
        Byte | Byte2 | Byte3 | Byte4 => gl::BYTE,
        UByte | UByte2 | UByte3 | UByte4 => gl::UNSIGNED_BYTE,
        Short | Short2 | Short3 | Short4 => gl::SHORT,
        UShort | UShort2 | UShort3 | UShort4 => gl::UNSIGNED_SHORT,
        Int => gl::INT,
        UInt => gl::UNSIGNED_INT,
        Float | Float2 | Float3 | Float4 => gl::FLOAT,
        Half | Half2 | Half3 | Half4 => gl::HALF_FLOAT,
    }
}

impl From<SamplerWrapMode> for GLenum {
    fn from(wrap: SamplerWrapMode) -> Self {
        match wrap {
            SamplerWrapMode::ClampToEdge => gl::CLAMP_TO_EDGE,
            SamplerWrapMode::Repeat => gl::REPEAT,
            SamplerWrapMode::MirroredRepeat => gl::MIRRORED_REPEAT,
        }
    }
}

impl From<SamplerMinFilter> for GLenum {
    fn from(filter: SamplerMinFilter) -> Self {
        match filter {
            SamplerMinFilter::Nearest => gl::NEAREST,
            SamplerMinFilter::Linear => gl::LINEAR,
            SamplerMinFilter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
            SamplerMinFilter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
            SamplerMinFilter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
            SamplerMinFilter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
        }
    }
}

impl From<SamplerMagFilter> for GLenum {
    fn from(filter: SamplerMagFilter) -> Self {
        match filter {
            SamplerMagFilter::Nearest => gl::NEAREST,
            SamplerMagFilter::Linear => gl::LINEAR,
        }
    }
}

impl From<SamplerCompareMode> for GLenum {
    fn from(mode: SamplerCompareMode) -> Self {
        match mode {
            SamplerCompareMode::None => gl::NONE,
            SamplerCompareMode::CompareToTexture => gl::COMPARE_REF_TO_TEXTURE,
        }
    }
}

impl From<PixelDataFormat> for GLenum {
    fn from(format: PixelDataFormat) -> Self {
        match format {
            PixelDataFormat::R => gl::RED,
            PixelDataFormat::RInteger => gl::RED_INTEGER,
            PixelDataFormat::RG => gl::RG,
            PixelDataFormat::RGInteger => gl::RG_INTEGER,
            PixelDataFormat::RGB => gl::RGB,
            PixelDataFormat::RGBInteger => gl::RGB_INTEGER,
            PixelDataFormat::RGBA => gl::RGBA,
            PixelDataFormat::RGBAInteger => gl::RGBA_INTEGER,
            PixelDataFormat::DepthComponent => gl::DEPTH_COMPONENT,
            PixelDataFormat::DepthStencil => gl::DEPTH_STENCIL,
            PixelDataFormat::Alpha => gl::ALPHA,
        }
    }
}

impl From<PixelDataType> for GLenum {
    fn from(ty: PixelDataType) -> Self {
        match ty {
            PixelDataType::UByte => gl::UNSIGNED_BYTE,
            PixelDataType::Byte => gl::BYTE,
            PixelDataType::UShort => gl::UNSIGNED_SHORT,
            PixelDataType::Short => gl::SHORT,
            PixelDataType::UInt => gl::UNSIGNED_INT,
            PixelDataType::Int => gl::INT,
            PixelDataType::Half => gl::HALF_FLOAT,
            PixelDataType::Float => gl::FLOAT,
            PixelDataType::UShort565 => gl::UNSIGNED_SHORT_5_6_5,
            PixelDataType::UInt10F11F11FRev => gl::UNSIGNED_INT_10F_11F_11F_REV,
        }
    }
}

/// Returns the native texture target of `sampler`.
pub fn texture_target(sampler: SamplerType, samples: u8) -> GLenum {
    match sampler {
        SamplerType::Sampler2D if samples > 1 => gl::TEXTURE_2D_MULTISAMPLE,
        SamplerType::Sampler2D => gl::TEXTURE_2D,
        SamplerType::Sampler2DArray => gl::TEXTURE_2D_ARRAY,
        SamplerType::SamplerCubemap => gl::TEXTURE_CUBE_MAP,
        SamplerType::SamplerExternal => TEXTURE_EXTERNAL_OES,
        SamplerType::Sampler3D => gl::TEXTURE_3D,
    }
}

/// Returns the native target of a cubemap face.
pub fn cubemap_face_target(face: TextureCubemapFace) -> GLenum {
    gl::TEXTURE_CUBE_MAP_POSITIVE_X + face as GLenum
}

/// Returns the sized internal format of `format`.
///
/// Compressed formats the context does not support map to 0, check them with
/// `is_texture_format_supported` first.
pub fn internal_format(format: TextureFormat, caps: &Capabilities) -> GLenum {
    if !is_texture_format_supported(format, caps) {
        return 0;
    }

    match format {
        TextureFormat::R8 => gl::R8,
        TextureFormat::R8UI => gl::R8UI,
        TextureFormat::R16F => gl::R16F,
        TextureFormat::R32F => gl::R32F,
        TextureFormat::RG8 => gl::RG8,
        TextureFormat::RG16F => gl::RG16F,
        TextureFormat::RG32F => gl::RG32F,
        TextureFormat::RGB8 => gl::RGB8,
        TextureFormat::SRGB8 => gl::SRGB8,
        TextureFormat::RGB565 => gl::RGB565,
        TextureFormat::RGB16F => gl::RGB16F,
        TextureFormat::RGB32F => gl::RGB32F,
        TextureFormat::R11FG11FB10F => gl::R11F_G11F_B10F,
        TextureFormat::RGBA8 => gl::RGBA8,
        TextureFormat::SRGB8A8 => gl::SRGB8_ALPHA8,
        TextureFormat::RGBA8UI => gl::RGBA8UI,
        TextureFormat::RGBA4 => gl::RGBA4,
        TextureFormat::RGB5A1 => gl::RGB5_A1,
        TextureFormat::RGB10A2 => gl::RGB10_A2,
        TextureFormat::RGBA16F => gl::RGBA16F,
        TextureFormat::RGBA32F => gl::RGBA32F,
        TextureFormat::Depth16 => gl::DEPTH_COMPONENT16,
        TextureFormat::Depth24 => gl::DEPTH_COMPONENT24,
        TextureFormat::Depth32F => gl::DEPTH_COMPONENT32F,
        TextureFormat::Depth24Stencil8 => gl::DEPTH24_STENCIL8,
        TextureFormat::Depth32FStencil8 => gl::DEPTH32F_STENCIL8,
        TextureFormat::Stencil8 => gl::STENCIL_INDEX8,
        TextureFormat::Etc2RGB8 => gl::COMPRESSED_RGB8_ETC2,
        TextureFormat::Etc2SRGB8 => gl::COMPRESSED_SRGB8_ETC2,
        TextureFormat::Etc2RGBA8 => gl::COMPRESSED_RGBA8_ETC2_EAC,
        TextureFormat::Etc2SRGB8A8 => gl::COMPRESSED_SRGB8_ALPHA8_ETC2_EAC,
        TextureFormat::DxtRGB => COMPRESSED_RGB_S3TC_DXT1_EXT,
        TextureFormat::DxtRGBA => COMPRESSED_RGBA_S3TC_DXT5_EXT,
        TextureFormat::PvrtcRGB4BPP => COMPRESSED_RGB_PVRTC_4BPPV1_IMG,
        TextureFormat::PvrtcRGBA4BPP => COMPRESSED_RGBA_PVRTC_4BPPV1_IMG,
        TextureFormat::AstcRGBA4x4 => COMPRESSED_RGBA_ASTC_4X4_KHR,
        TextureFormat::AstcRGBA8x8 => COMPRESSED_RGBA_ASTC_8X8_KHR,
    }
}

pub fn is_texture_format_supported(format: TextureFormat, caps: &Capabilities) -> bool {
    match format.compression() {
        Some(v) => caps.has_compression(v),
        None => true,
    }
}

pub fn is_render_target_format_supported(format: TextureFormat, caps: &Capabilities) -> bool {
    match format {
        TextureFormat::R8
        | TextureFormat::R8UI
        | TextureFormat::RG8
        | TextureFormat::RGB8
        | TextureFormat::RGB565
        | TextureFormat::RGBA8
        | TextureFormat::SRGB8A8
        | TextureFormat::RGBA8UI
        | TextureFormat::RGBA4
        | TextureFormat::RGB5A1
        | TextureFormat::RGB10A2
        | TextureFormat::Depth16
        | TextureFormat::Depth24
        | TextureFormat::Depth32F
        | TextureFormat::Depth24Stencil8
        | TextureFormat::Depth32FStencil8
        | TextureFormat::Stencil8 => true,
        // Float color attachments are core on desktop GL only.
        TextureFormat::R16F
        | TextureFormat::RG16F
        | TextureFormat::RGBA16F
        | TextureFormat::R32F
        | TextureFormat::RG32F
        | TextureFormat::RGBA32F
        | TextureFormat::R11FG11FB10F => !caps.version.is_es(),
        _ => false,
    }
}

/// Returns the framebuffer attachment point(s) of a texture `format`.
pub fn attachment_point(format: TextureFormat) -> GLenum {
    if format.is_depth() && format.is_stencil() {
        gl::DEPTH_STENCIL_ATTACHMENT
    } else if format.is_depth() {
        gl::DEPTH_ATTACHMENT
    } else if format.is_stencil() {
        gl::STENCIL_ATTACHMENT
    } else {
        gl::COLOR_ATTACHMENT0
    }
}

/// Returns the buffer bits of `flags`.
pub fn buffer_bits(flags: TargetBufferFlags) -> GLbitfield {
    let mut bits = 0;
    if flags.contains(TargetBufferFlags::COLOR) {
        bits |= gl::COLOR_BUFFER_BIT;
    }

    if flags.contains(TargetBufferFlags::DEPTH) {
        bits |= gl::DEPTH_BUFFER_BIT;
    }

    if flags.contains(TargetBufferFlags::STENCIL) {
        bits |= gl::STENCIL_BUFFER_BIT;
    }

    bits
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::video::backends::gl::capabilities::*;

    fn caps(version: Version, extensions: Extensions) -> Capabilities {
        Capabilities {
            version,
            vendor: String::new(),
            renderer: String::new(),
            extensions,
            limits: Limits {
                max_combined_texture_image_units: 16,
                max_uniform_buffer_bindings: 24,
                uniform_buffer_offset_alignment: 256,
                max_samples: 4,
                max_renderbuffer_size: 4096,
                max_color_attachments: 4,
            },
            bugs: Bugs::default(),
        }
    }

    #[test]
    fn compressed_fallback() {
        let caps = caps(Version::ES(3, 0), Extensions::default());

        assert!(!is_texture_format_supported(TextureFormat::DxtRGBA, &caps));
        assert_eq!(internal_format(TextureFormat::DxtRGBA, &caps), 0);
        assert_eq!(internal_format(TextureFormat::PvrtcRGB4BPP, &caps), 0);
        assert_eq!(internal_format(TextureFormat::AstcRGBA4x4, &caps), 0);

        assert!(is_texture_format_supported(TextureFormat::Etc2RGBA8, &caps));
        assert_eq!(
            internal_format(TextureFormat::Etc2RGBA8, &caps),
            gl::COMPRESSED_RGBA8_ETC2_EAC
        );
        assert_eq!(internal_format(TextureFormat::RGBA8, &caps), gl::RGBA8);
    }

    #[test]
    fn compressed_extensions() {
        let mut exts = Extensions::default();
        exts.gl_ext_texture_compression_s3tc = true;

        let caps = caps(Version::GL(4, 1), exts);
        assert!(!is_texture_format_supported(TextureFormat::Etc2RGB8, &caps));
        assert_eq!(
            internal_format(TextureFormat::DxtRGB, &caps),
            COMPRESSED_RGB_S3TC_DXT1_EXT
        );
    }

    #[test]
    fn render_target_formats() {
        let es = caps(Version::ES(3, 0), Extensions::default());
        let desktop = caps(Version::GL(4, 1), Extensions::default());

        assert!(is_render_target_format_supported(TextureFormat::RGBA8, &es));
        assert!(!is_render_target_format_supported(TextureFormat::RGBA16F, &es));
        assert!(is_render_target_format_supported(TextureFormat::RGBA16F, &desktop));
        assert!(!is_render_target_format_supported(TextureFormat::Etc2RGB8, &desktop));
    }

    #[test]
    fn enums() {
        assert_eq!(GLenum::from(Comparison::LessOrEqual), gl::LEQUAL);
        assert_eq!(texture_target(SamplerType::Sampler2D, 4), gl::TEXTURE_2D_MULTISAMPLE);
        assert_eq!(texture_target(SamplerType::SamplerExternal, 1), TEXTURE_EXTERNAL_OES);
        assert_eq!(
            cubemap_face_target(TextureCubemapFace::NegativeZ),
            gl::TEXTURE_CUBE_MAP_NEGATIVE_Z
        );
        assert_eq!(attachment_point(TextureFormat::Depth24Stencil8), gl::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(
            buffer_bits(TargetBufferFlags::COLOR_AND_DEPTH),
            gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT
        );
    }
}
