//! The object store of the headless GL server, shared by all of its contexts.

use gl;
use gl::types::*;

use crate::utils::hash::FastHashMap;

pub type ImageId = u64;

/// A 2D image, rows stored from the bottom up like GL does.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel, 0 for compressed images whose content isn't kept.
    pub bpp: usize,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, bpp: usize) -> Image {
        Image {
            width,
            height,
            bpp,
            data: vec![0; width as usize * height as usize * bpp],
        }
    }

    #[inline]
    pub fn row_size(&self) -> usize {
        self.width as usize * self.bpp
    }
}

#[derive(Debug, Default)]
pub struct Buffer {
    pub data: Vec<u8>,
    pub usage: GLenum,
    /// The range being mapped, and its staging memory.
    pub mapped: Option<(usize, Vec<u8>)>,
}

#[derive(Debug, Default)]
pub struct Texture {
    /// 0 until the name got bound once.
    pub target: GLenum,
    pub internal_format: GLenum,
    pub levels: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub samples: u32,
    pub immutable: bool,
    /// Images keyed by (level, layer or face).
    pub images: FastHashMap<(u32, u32), ImageId>,
    pub parameters: FastHashMap<GLenum, GLint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Texture { name: GLuint, level: u32, layer: u32 },
    Renderbuffer(GLuint),
}

#[derive(Debug, Default)]
pub struct Framebuffer {
    pub attachments: FastHashMap<GLenum, Attachment>,
}

#[derive(Debug, Default)]
pub struct Renderbuffer {
    pub internal_format: GLenum,
    pub samples: u32,
    pub image: Option<ImageId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexAttrib {
    pub enabled: bool,
    pub buffer: GLuint,
    pub size: GLint,
    pub ty: GLenum,
    pub normalized: bool,
    pub integer: bool,
    pub stride: GLsizei,
    pub offset: GLuint,
}

#[derive(Debug, Default)]
pub struct VertexArray {
    pub element_array: GLuint,
    pub attributes: [VertexAttrib; 16],
}

#[derive(Debug, Default)]
pub struct Program {
    pub shaders: Vec<GLuint>,
    pub linked: bool,
    pub locations: FastHashMap<String, GLint>,
    pub uniforms: FastHashMap<GLint, [f32; 4]>,
}

/// The strings and limits the server reports.
#[derive(Debug, Clone)]
pub struct Profile {
    pub version: String,
    pub vendor: String,
    pub renderer: String,
    pub extensions: Vec<String>,
    pub es: bool,
    pub multisample_texture: bool,
    pub max_samples: GLint,
    pub max_texture_units: GLint,
}

impl Profile {
    #[inline]
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|v| v == name)
    }
}

#[derive(Debug)]
pub struct Server {
    pub profile: Profile,
    next_name: GLuint,
    next_image: ImageId,

    pub images: FastHashMap<ImageId, Image>,
    pub buffers: FastHashMap<GLuint, Buffer>,
    pub textures: FastHashMap<GLuint, Texture>,
    pub framebuffers: FastHashMap<GLuint, Framebuffer>,
    pub renderbuffers: FastHashMap<GLuint, Renderbuffer>,
    pub vertex_arrays: FastHashMap<GLuint, VertexArray>,
    pub samplers: FastHashMap<GLuint, FastHashMap<GLenum, f32>>,
    pub shaders: FastHashMap<GLuint, GLenum>,
    pub programs: FastHashMap<GLuint, Program>,

    pub calls: FastHashMap<&'static str, usize>,
    /// Every error raised, in order. Unlike the error flags of the contexts, this is
    /// never drained.
    pub errors: Vec<GLenum>,
    pub fail_next_unmap: bool,
}

impl Server {
    pub fn new(profile: Profile) -> Server {
        Server {
            profile,
            next_name: 1,
            next_image: 1,
            images: FastHashMap::default(),
            buffers: FastHashMap::default(),
            textures: FastHashMap::default(),
            framebuffers: FastHashMap::default(),
            renderbuffers: FastHashMap::default(),
            vertex_arrays: FastHashMap::default(),
            samplers: FastHashMap::default(),
            shaders: FastHashMap::default(),
            programs: FastHashMap::default(),
            calls: FastHashMap::default(),
            errors: Vec::new(),
            fail_next_unmap: false,
        }
    }

    /// Names are unique across object kinds.
    pub fn gen_name(&mut self) -> GLuint {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    pub fn create_image(&mut self, image: Image) -> ImageId {
        let id = self.next_image;
        self.next_image += 1;
        self.images.insert(id, image);
        id
    }

    /// Releases an image unless some texture level or renderbuffer still aliases it.
    pub fn release_image(&mut self, id: ImageId) {
        let used = self
            .textures
            .values()
            .any(|v| v.images.values().any(|&i| i == id))
            || self.renderbuffers.values().any(|v| v.image == Some(id));

        if !used {
            self.images.remove(&id);
        }
    }

    pub fn release_texture(&mut self, texture: Texture) {
        for &id in texture.images.values() {
            self.release_image(id);
        }
    }

    pub fn count(&mut self, call: &'static str) {
        *self.calls.entry(call).or_insert(0) += 1;
    }

    /// The image attached at `attachment` of framebuffer `fbo`.
    pub fn attachment_image(&self, fbo: GLuint, attachment: GLenum) -> Option<ImageId> {
        let fb = self.framebuffers.get(&fbo)?;
        match fb.attachments.get(&attachment)? {
            Attachment::Texture { name, level, layer } => self
                .textures
                .get(name)
                .and_then(|v| v.images.get(&(*level, *layer)).cloned()),
            Attachment::Renderbuffer(name) => self.renderbuffers.get(name).and_then(|v| v.image),
        }
    }
}

/// The parameters of `glPixelStorei` of one direction.
#[derive(Debug, Clone, Copy)]
pub struct PixelStore {
    pub alignment: usize,
    pub row_length: usize,
    pub skip_pixels: usize,
    pub skip_rows: usize,
}

impl Default for PixelStore {
    fn default() -> Self {
        PixelStore {
            alignment: 4,
            row_length: 0,
            skip_pixels: 0,
            skip_rows: 0,
        }
    }
}

impl PixelStore {
    /// Returns the (offset of the first pixel, row stride) of a client memory region.
    pub fn layout(&self, width: usize, psize: usize) -> (usize, usize) {
        let row = if self.row_length > 0 {
            self.row_length
        } else {
            width
        };

        let stride = align(row * psize, self.alignment.max(1));
        (self.skip_rows * stride + self.skip_pixels * psize, stride)
    }
}

#[inline]
pub fn align(v: usize, alignment: usize) -> usize {
    (v + alignment - 1) / alignment * alignment
}

/// Bytes per pixel of a sized internal format, 0 for compressed formats.
pub fn internal_size(internal: GLenum) -> usize {
    match internal {
        gl::R8 | gl::R8UI | gl::STENCIL_INDEX8 => 1,
        gl::RG8 | gl::R16F | gl::RGB565 | gl::RGBA4 | gl::RGB5_A1 | gl::DEPTH_COMPONENT16 => 2,
        gl::RGB8 | gl::SRGB8 => 3,
        gl::RGBA8
        | gl::SRGB8_ALPHA8
        | gl::RGBA8UI
        | gl::RGB10_A2
        | gl::R32F
        | gl::RG16F
        | gl::R11F_G11F_B10F
        | gl::DEPTH_COMPONENT24
        | gl::DEPTH_COMPONENT32F
        | gl::DEPTH24_STENCIL8 => 4,
        gl::RGB16F => 6,
        gl::RG32F | gl::RGBA16F | gl::DEPTH32F_STENCIL8 => 8,
        gl::RGB32F => 12,
        gl::RGBA32F => 16,
        _ => 0,
    }
}

/// Bytes per pixel of client memory in `format` and `ty`.
pub fn transfer_size(format: GLenum, ty: GLenum) -> usize {
    match ty {
        gl::UNSIGNED_SHORT_5_6_5 | gl::UNSIGNED_SHORT_4_4_4_4 | gl::UNSIGNED_SHORT_5_5_5_1 => {
            return 2
        }
        gl::UNSIGNED_INT_2_10_10_10_REV
        | gl::UNSIGNED_INT_10F_11F_11F_REV
        | gl::UNSIGNED_INT_24_8
        | gl::FLOAT_32_UNSIGNED_INT_24_8_REV => return 4,
        _ => {}
    }

    let components = match format {
        gl::RED | gl::RED_INTEGER | gl::DEPTH_COMPONENT | gl::STENCIL_INDEX => 1,
        gl::RG | gl::RG_INTEGER | gl::DEPTH_STENCIL => 2,
        gl::RGB | gl::RGB_INTEGER => 3,
        _ => 4,
    };

    let size = match ty {
        gl::UNSIGNED_BYTE | gl::BYTE => 1,
        gl::UNSIGNED_SHORT | gl::SHORT | gl::HALF_FLOAT => 2,
        _ => 4,
    };

    components * size
}

/// Copies a `width x height` region of client memory into `image` at (x, y).
#[allow(clippy::too_many_arguments)]
pub fn unpack(
    image: &mut Image,
    store: &PixelStore,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    psize: usize,
    src: &[u8],
) -> bool {
    if psize != image.bpp || x + width > image.width as usize || y + height > image.height as usize
    {
        return false;
    }

    let (start, stride) = store.layout(width, psize);
    let row_size = image.row_size();
    for row in 0..height {
        let from = start + row * stride;
        let to = (y + row) * row_size + x * psize;
        let len = width * psize;
        if from + len > src.len() {
            return false;
        }

        image.data[to..to + len].copy_from_slice(&src[from..from + len]);
    }

    true
}

/// Copies a `width x height` region of `image` at (x, y) into client memory.
#[allow(clippy::too_many_arguments)]
pub fn pack(
    image: &Image,
    store: &PixelStore,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    psize: usize,
    dst: &mut [u8],
) -> bool {
    if psize != image.bpp || x + width > image.width as usize || y + height > image.height as usize
    {
        return false;
    }

    let (start, stride) = store.layout(width, psize);
    let row_size = image.row_size();
    for row in 0..height {
        let from = (y + row) * row_size + x * psize;
        let to = start + row * stride;
        let len = width * psize;
        if to + len > dst.len() {
            return false;
        }

        dst[to..to + len].copy_from_slice(&image.data[from..from + len]);
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout() {
        let store = PixelStore::default();
        assert_eq!(store.layout(3, 1), (0, 4));
        assert_eq!(store.layout(4, 4), (0, 16));

        let store = PixelStore {
            alignment: 1,
            row_length: 8,
            skip_pixels: 2,
            skip_rows: 1,
        };
        assert_eq!(store.layout(4, 4), (32 + 8, 32));
    }

    #[test]
    fn unpack_and_pack() {
        let mut image = Image::new(4, 4, 1);
        let store = PixelStore {
            alignment: 1,
            ..PixelStore::default()
        };

        assert!(unpack(&mut image, &store, 1, 1, 2, 2, 1, &[1, 2, 3, 4]));
        assert_eq!(&image.data[4..8], &[0, 1, 2, 0]);
        assert_eq!(&image.data[8..12], &[0, 3, 4, 0]);

        let mut out = [0; 4];
        assert!(pack(&image, &store, 1, 1, 2, 2, 1, &mut out));
        assert_eq!(out, [1, 2, 3, 4]);

        assert!(!unpack(&mut image, &store, 3, 3, 2, 2, 1, &[0; 4]));
        assert!(!unpack(&mut image, &store, 0, 0, 2, 2, 4, &[0; 16]));
    }
}
