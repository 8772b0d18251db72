use std::cmp;

use gl;
use gl::types::*;

use crate::errors::*;
use crate::utils::hash::FastHashSet;
use crate::utils::strings;
use crate::video::assets::prelude::*;
use crate::video::backends::GL;

/// Describes a version.
///
/// A version can only be compared to another version if they belong to the same API.
/// For example, both `Version::GL(3, 0) >= Version::ES(3, 0)` and `Version::ES(3, 0) >=
/// Version::GL(3, 0)` return `false`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    /// Regular OpenGL.
    GL(u8, u8),
    /// OpenGL embedded system.
    ES(u8, u8),
}

impl PartialOrd for Version {
    #[inline]
    fn partial_cmp(&self, other: &Version) -> Option<cmp::Ordering> {
        let (es1, major1, minor1) = match *self {
            Version::GL(major, minor) => (false, major, minor),
            Version::ES(major, minor) => (true, major, minor),
        };

        let (es2, major2, minor2) = match *other {
            Version::GL(major, minor) => (false, major, minor),
            Version::ES(major, minor) => (true, major, minor),
        };

        if es1 != es2 {
            None
        } else {
            match major1.cmp(&major2) {
                cmp::Ordering::Equal => Some(minor1.cmp(&minor2)),
                v => Some(v),
            }
        }
    }
}

impl Version {
    /// Parses the string returned by `glGetString(GL_VERSION)`.
    pub fn parse(desc: &str) -> Result<Version> {
        let (es, desc) = if desc.starts_with("OpenGL ES-") {
            // OpenGL ES-CM 1.1 / OpenGL ES-CL 1.1
            (true, desc.get(13..).unwrap_or(""))
        } else if desc.starts_with("OpenGL ES ") {
            (true, &desc[10..])
        } else {
            (false, desc)
        };

        let desc = desc.split(' ').next().unwrap_or("");
        let mut iter = desc.split('.');

        let major = iter.next().and_then(|v| v.parse().ok());
        let minor = iter.next().and_then(|v| v.parse().ok());

        match (major, minor) {
            (Some(major), Some(minor)) if es => Ok(Version::ES(major, minor)),
            (Some(major), Some(minor)) => Ok(Version::GL(major, minor)),
            _ => Err(Error::Backend(format!("[GL] Version {:?} is unformaled.", desc))),
        }
    }

    #[inline]
    pub fn is_es(self) -> bool {
        match self {
            Version::ES(_, _) => true,
            Version::GL(_, _) => false,
        }
    }
}

macro_rules! extensions {
    ($($string:expr => $field:ident,)+) => {
        /// Contains data about the list of extensions.
        #[derive(Debug, Clone, Copy, Default)]
        pub struct Extensions {
            $(
                pub $field: bool,
            )+
        }

        impl Extensions {
            /// Picks the extensions the driver knows about from `strings`.
            pub fn parse<'a, T>(strings: T) -> Extensions
            where
                T: IntoIterator<Item = &'a String>,
            {
                let mut extensions = Extensions::default();

                for extension in strings {
                    match &extension[..] {
                        $(
                            $string => extensions.$field = true,
                        )+
                        _ => ()
                    }
                }

                extensions
            }
        }
    }
}

extensions! {
    "GL_ARB_ES3_compatibility" => gl_arb_es3_compatibility,
    "GL_ARB_texture_multisample" => gl_arb_texture_multisample,
    "GL_ARB_invalidate_subdata" => gl_arb_invalidate_subdata,
    "GL_EXT_texture_compression_s3tc" => gl_ext_texture_compression_s3tc,
    "GL_EXT_texture_filter_anisotropic" => gl_ext_texture_filter_anisotropic,
    "GL_EXT_multisampled_render_to_texture" => gl_ext_multisampled_render_to_texture,
    "GL_EXT_discard_framebuffer" => gl_ext_discard_framebuffer,
    "GL_EXT_debug_marker" => gl_ext_debug_marker,
    "GL_OES_EGL_image_external" => gl_oes_egl_image_external,
    "GL_OES_EGL_image_external_essl3" => gl_oes_egl_image_external_essl3,
    "GL_OES_compressed_ETC2_RGB8_texture" => gl_oes_compressed_etc2_rgb8_texture,
    "GL_OES_compressed_ETC2_RGBA8_texture" => gl_oes_compressed_etc2_rgba8_texture,
    "GL_IMG_texture_compression_pvrtc" => gl_img_texture_compression_pvrtc,
    "GL_KHR_texture_compression_astc_ldr" => gl_khr_texture_compression_astc_ldr,
    "GL_KHR_debug" => gl_khr_debug,
}

/// Limits of the context.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum number of textures that can be bound to a program.
    pub max_combined_texture_image_units: u32,
    /// Number of available buffer bind points for `GL_UNIFORM_BUFFER`.
    pub max_uniform_buffer_bindings: u32,
    pub uniform_buffer_offset_alignment: u32,
    pub max_samples: u32,
    pub max_renderbuffer_size: u32,
    pub max_color_attachments: u32,
}

/// Workarounds of driver bugs, decided once when the driver starts up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bugs {
    /// `glClear` is slow, clears are done by drawing a full screen triangle.
    pub clears_hurt_performance: bool,
    /// The element array buffer binding is not saved in the VAO, it must be rebound
    /// every time the VAO is.
    pub vao_doesnt_store_element_array_buffer_binding: bool,
    /// `glInvalidateFramebuffer` is broken or slow.
    pub disable_invalidate_framebuffer: bool,
    /// External textures must be rebound after their image got updated.
    pub texture_external_needs_rebind: bool,
}

impl Bugs {
    /// Decides the workarounds from the vendor and renderer strings.
    pub fn detect(vendor: &str, renderer: &str) -> Bugs {
        let mut bugs = Bugs::default();

        if renderer.contains("Adreno") {
            bugs.clears_hurt_performance = true;
            bugs.vao_doesnt_store_element_array_buffer_binding = true;
            bugs.disable_invalidate_framebuffer = true;
        } else if renderer.contains("Mali") {
            bugs.vao_doesnt_store_element_array_buffer_binding = true;
            bugs.texture_external_needs_rebind = true;
        } else if renderer.contains("PowerVR") {
            bugs.clears_hurt_performance = true;
        } else if renderer.contains("Intel") || vendor.contains("Intel") {
            bugs.vao_doesnt_store_element_array_buffer_binding = true;
        } else if renderer.contains("Mesa") || renderer.contains("llvmpipe") {
            bugs.disable_invalidate_framebuffer = true;
        }

        bugs
    }
}

/// Represents the capabilities of the context.
///
/// Contrary to the state, these values never change.
#[derive(Debug)]
pub struct Capabilities {
    /// Returns a version or release number. Vendor-specific information may follow the version
    /// number.
    pub version: Version,
    /// The company responsible for this GL implementation.
    pub vendor: String,
    /// The name of the renderer. This name is typically specific to a particular
    /// configuration of a hardware platform.
    pub renderer: String,
    /// The list of OpenGL extensions support by this implementation.
    pub extensions: Extensions,
    pub limits: Limits,
    pub bugs: Bugs,
}

impl Capabilities {
    pub fn parse(gl: &dyn GL) -> Result<Capabilities> {
        let version = Version::parse(&gl.get_string(gl::VERSION))?;

        let strings: FastHashSet<String> = if version >= Version::GL(3, 0) || version.is_es() {
            let num = gl.get_integer_v(gl::NUM_EXTENSIONS).max(0) as GLuint;
            (0..num)
                .map(|i| gl.get_string_i(gl::EXTENSIONS, i))
                .collect()
        } else {
            strings::split_to_set(&gl.get_string(gl::EXTENSIONS))
        };

        let extensions = Extensions::parse(&strings);
        let vendor = gl.get_string(gl::VENDOR);
        let renderer = gl.get_string(gl::RENDERER);

        let limits = Limits {
            max_combined_texture_image_units: Capabilities::parse_u32(
                gl,
                gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
            ),
            max_uniform_buffer_bindings: Capabilities::parse_u32(
                gl,
                gl::MAX_UNIFORM_BUFFER_BINDINGS,
            ),
            uniform_buffer_offset_alignment: Capabilities::parse_u32(
                gl,
                gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT,
            )
            .max(1),
            max_samples: Capabilities::parse_u32(gl, gl::MAX_SAMPLES).max(1),
            max_renderbuffer_size: Capabilities::parse_u32(gl, gl::MAX_RENDERBUFFER_SIZE),
            max_color_attachments: Capabilities::parse_u32(gl, gl::MAX_COLOR_ATTACHMENTS).max(1),
        };

        let bugs = Bugs::detect(&vendor, &renderer);

        Ok(Capabilities {
            version,
            vendor,
            renderer,
            extensions,
            limits,
            bugs,
        })
    }

    /// Checks the minimum requirements of the driver: OpenGL 4.1 or OpenGL ES 3.0.
    pub fn check(&self) -> Result<()> {
        if self.version < Version::GL(4, 1) && self.version < Version::ES(3, 0) {
            return Err(Error::Requirement(format!(
                "{:?} (OpenGL 4.1 or OpenGL ES 3.0 is required)",
                self.version
            )));
        }

        Ok(())
    }

    pub fn has_compression(&self, compression: TextureCompression) -> bool {
        let exts = &self.extensions;
        match compression {
            TextureCompression::ETC2 => {
                self.version >= Version::ES(3, 0)
                    || self.version >= Version::GL(4, 3)
                    || exts.gl_arb_es3_compatibility
                    || (exts.gl_oes_compressed_etc2_rgb8_texture
                        && exts.gl_oes_compressed_etc2_rgba8_texture)
            }
            TextureCompression::S3TC => exts.gl_ext_texture_compression_s3tc,
            TextureCompression::PVRTC => exts.gl_img_texture_compression_pvrtc,
            TextureCompression::ASTC => exts.gl_khr_texture_compression_astc_ldr,
        }
    }

    /// Multisample textures (`GL_TEXTURE_2D_MULTISAMPLE`), which could be sampled with
    /// `sampler2DMS`.
    pub fn has_multisample_texture(&self) -> bool {
        self.version >= Version::ES(3, 1)
            || self.version >= Version::GL(3, 2)
            || self.extensions.gl_arb_texture_multisample
    }

    /// Framebuffers with multisampled attachments that are resolved implicitly into
    /// single-sampled textures.
    pub fn has_multisampled_render_to_texture(&self) -> bool {
        self.extensions.gl_ext_multisampled_render_to_texture
    }

    pub fn has_external_texture(&self) -> bool {
        self.extensions.gl_oes_egl_image_external_essl3
            || self.extensions.gl_oes_egl_image_external
    }

    pub fn has_invalidate_framebuffer(&self) -> bool {
        self.version >= Version::ES(3, 0)
            || self.version >= Version::GL(4, 3)
            || self.extensions.gl_arb_invalidate_subdata
    }

    /// Desktop contexts can't draw with vertex array object 0.
    #[inline]
    pub fn needs_default_vao(&self) -> bool {
        !self.version.is_es()
    }

    #[inline]
    fn parse_u32(gl: &dyn GL, name: GLenum) -> u32 {
        gl.get_integer_v(name).max(0) as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version() {
        assert_eq!(
            Version::parse("OpenGL ES 3.2 v1.r26p0").unwrap(),
            Version::ES(3, 2)
        );
        assert_eq!(
            Version::parse("4.1 Metal - 76.3").unwrap(),
            Version::GL(4, 1)
        );
        assert_eq!(
            Version::parse("OpenGL ES-CM 1.1").unwrap(),
            Version::ES(1, 1)
        );
        assert!(Version::parse("OpenGL ES").is_err());

        assert!(Version::GL(4, 5) > Version::GL(4, 1));
        assert!(Version::ES(3, 0) >= Version::ES(3, 0));
        assert!(!(Version::GL(4, 5) >= Version::ES(3, 0)));
        assert!(!(Version::ES(3, 0) >= Version::GL(3, 0)));
    }

    #[test]
    fn extensions() {
        let strings = strings::split_to_set(
            "GL_EXT_texture_compression_s3tc GL_KHR_debug GL_UNKNOWN_extension",
        );

        let exts = Extensions::parse(&strings);
        assert!(exts.gl_ext_texture_compression_s3tc);
        assert!(exts.gl_khr_debug);
        assert!(!exts.gl_img_texture_compression_pvrtc);
    }

    #[test]
    fn bugs() {
        let bugs = Bugs::detect("Qualcomm", "Adreno (TM) 530");
        assert!(bugs.clears_hurt_performance);
        assert!(bugs.vao_doesnt_store_element_array_buffer_binding);

        let bugs = Bugs::detect("ARM", "Mali-G72");
        assert!(!bugs.clears_hurt_performance);
        assert!(bugs.texture_external_needs_rebind);

        let bugs = Bugs::detect("NVIDIA Corporation", "GeForce GTX 1080");
        assert!(!bugs.clears_hurt_performance);
        assert!(!bugs.disable_invalidate_framebuffer);
    }
}
