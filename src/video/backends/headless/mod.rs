//! A GL server emulated in memory.
//!
//! `HeadlessGL` keeps the objects of a share group (names, buffer stores, texture
//! images, framebuffer attachments, vertex arrays) in a `Server`, plus the binding
//! state of one context. Calls are validated roughly the way a conforming
//! implementation does, errors are raised into the context and recorded by the
//! server. Nothing is rasterized, but clears, blits, uploads and read-backs move
//! real bytes so the driver can be checked end to end.

pub mod platform;
pub mod server;

pub use self::platform::{HeadlessPlatform, PlatformObjects};
pub use self::server::{Attachment, Image, Profile};

use std::sync::Arc;

use gl;
use gl::types::*;
use spin::Mutex;

use self::server::*;
use super::gl::capabilities::Version;
use super::gl::types::{FRAMEBUFFER_INCOMPLETE_DIMENSIONS, TEXTURE_EXTERNAL_OES};
use super::GL;
use crate::utils::hash::{FastHashMap, FastHashSet};

#[derive(Debug)]
struct ContextState {
    active_unit: u32,
    textures: FastHashMap<(u32, GLenum), GLuint>,
    samplers: FastHashMap<u32, GLuint>,
    buffers: FastHashMap<GLenum, GLuint>,
    indexed: FastHashMap<(GLenum, GLuint), (GLuint, GLintptr, GLsizeiptr)>,
    vao: GLuint,
    // The state of vertex array object 0, which is not shared.
    vao0: VertexArray,
    draw_framebuffer: GLuint,
    read_framebuffer: GLuint,
    renderbuffer: GLuint,
    program: GLuint,
    enables: FastHashSet<GLenum>,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: GLint,
    viewport: [GLint; 4],
    scissor: [GLint; 4],
    pack: PixelStore,
    unpack: PixelStore,
    errors: Vec<GLenum>,
}

impl Default for ContextState {
    fn default() -> Self {
        let mut enables = FastHashSet::default();
        enables.insert(gl::DITHER);

        ContextState {
            active_unit: 0,
            textures: FastHashMap::default(),
            samplers: FastHashMap::default(),
            buffers: FastHashMap::default(),
            indexed: FastHashMap::default(),
            vao: 0,
            vao0: VertexArray::default(),
            draw_framebuffer: 0,
            read_framebuffer: 0,
            renderbuffer: 0,
            program: 0,
            enables,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            viewport: [0; 4],
            scissor: [0; 4],
            pack: PixelStore::default(),
            unpack: PixelStore::default(),
            errors: Vec::new(),
        }
    }
}

/// The number of live objects of each kind in a headless server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub buffers: usize,
    pub textures: usize,
    pub framebuffers: usize,
    pub renderbuffers: usize,
    pub vertex_arrays: usize,
    pub samplers: usize,
    pub programs: usize,
    pub images: usize,
}

/// One context of a headless GL server. Clones issue calls into the same context,
/// `share` creates another context of the share group.
#[derive(Clone)]
pub struct HeadlessGL {
    server: Arc<Mutex<Server>>,
    context: Arc<Mutex<ContextState>>,
}

impl Default for HeadlessGL {
    fn default() -> Self {
        HeadlessGL::es3()
    }
}

fn raise(server: &mut Server, ctx: &mut ContextState, code: GLenum) {
    trace!("[Headless] raised {:#x}.", code);
    server.errors.push(code);
    if !ctx.errors.contains(&code) {
        ctx.errors.push(code);
    }
}

/// The binding class of a texture target.
fn texture_class(target: GLenum) -> GLenum {
    if target >= gl::TEXTURE_CUBE_MAP_POSITIVE_X && target <= gl::TEXTURE_CUBE_MAP_NEGATIVE_Z {
        gl::TEXTURE_CUBE_MAP
    } else {
        target
    }
}

fn face_index(target: GLenum) -> u32 {
    if texture_class(target) == gl::TEXTURE_CUBE_MAP && target != gl::TEXTURE_CUBE_MAP {
        target - gl::TEXTURE_CUBE_MAP_POSITIVE_X
    } else {
        0
    }
}

fn is_texture_target(server: &Server, target: GLenum) -> bool {
    match target {
        gl::TEXTURE_2D | gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP | gl::TEXTURE_3D => true,
        gl::TEXTURE_2D_MULTISAMPLE => server.profile.multisample_texture,
        TEXTURE_EXTERNAL_OES => {
            server.profile.has_extension("GL_OES_EGL_image_external")
                || server.profile.has_extension("GL_OES_EGL_image_external_essl3")
        }
        _ => false,
    }
}

fn bound_texture(ctx: &ContextState, target: GLenum) -> GLuint {
    ctx.textures
        .get(&(ctx.active_unit, texture_class(target)))
        .cloned()
        .unwrap_or(0)
}

fn vao_mut<'a>(server: &'a mut Server, ctx: &'a mut ContextState) -> Option<&'a mut VertexArray> {
    if ctx.vao == 0 {
        Some(&mut ctx.vao0)
    } else {
        server.vertex_arrays.get_mut(&ctx.vao)
    }
}

fn vao_ref<'a>(server: &'a Server, ctx: &'a ContextState) -> Option<&'a VertexArray> {
    if ctx.vao == 0 {
        Some(&ctx.vao0)
    } else {
        server.vertex_arrays.get(&ctx.vao)
    }
}

fn bound_buffer(server: &Server, ctx: &ContextState, target: GLenum) -> GLuint {
    if target == gl::ELEMENT_ARRAY_BUFFER {
        vao_ref(server, ctx).map_or(0, |v| v.element_array)
    } else {
        ctx.buffers.get(&target).cloned().unwrap_or(0)
    }
}

fn bound_framebuffer(ctx: &ContextState, target: GLenum) -> GLuint {
    if target == gl::READ_FRAMEBUFFER {
        ctx.read_framebuffer
    } else {
        ctx.draw_framebuffer
    }
}

fn level_size(v: GLsizei, level: u32) -> u32 {
    ((v.max(1) as u32) >> level).max(1)
}

impl HeadlessGL {
    pub fn new(profile: Profile) -> HeadlessGL {
        HeadlessGL {
            server: Arc::new(Mutex::new(Server::new(profile))),
            context: Arc::new(Mutex::new(ContextState::default())),
        }
    }

    /// A server reporting `version`, `renderer` and `extensions`. Multisample textures
    /// are available from OpenGL ES 3.1 and OpenGL 3.2.
    pub fn with_profile(version: &str, renderer: &str, extensions: &[&str]) -> HeadlessGL {
        let parsed = Version::parse(version).unwrap_or(Version::ES(3, 0));
        let multisample_texture = parsed >= Version::ES(3, 1) || parsed >= Version::GL(3, 2);

        HeadlessGL::new(Profile {
            version: version.to_owned(),
            vendor: "crayon".to_owned(),
            renderer: renderer.to_owned(),
            extensions: extensions.iter().map(|v| (*v).to_owned()).collect(),
            es: parsed.is_es(),
            multisample_texture,
            max_samples: 4,
            max_texture_units: 16,
        })
    }

    /// OpenGL ES 3.0 with external textures, and without multisample textures.
    pub fn es3() -> HeadlessGL {
        HeadlessGL::with_profile(
            "OpenGL ES 3.0 Headless",
            "Headless",
            &[
                "GL_OES_EGL_image_external",
                "GL_OES_EGL_image_external_essl3",
                "GL_EXT_discard_framebuffer",
                "GL_KHR_debug",
            ],
        )
    }

    /// OpenGL 4.1 core profile.
    pub fn desktop() -> HeadlessGL {
        HeadlessGL::with_profile(
            "4.1 Headless",
            "Headless",
            &[
                "GL_EXT_texture_compression_s3tc",
                "GL_EXT_texture_filter_anisotropic",
                "GL_KHR_debug",
            ],
        )
    }

    /// Creates another context sharing objects with this one.
    pub fn share(&self) -> HeadlessGL {
        HeadlessGL {
            server: self.server.clone(),
            context: Arc::new(Mutex::new(ContextState::default())),
        }
    }

    pub(crate) fn server(&self) -> Arc<Mutex<Server>> {
        self.server.clone()
    }

    fn call<R, F>(&self, name: &'static str, f: F) -> R
    where
        F: FnOnce(&mut Server, &mut ContextState) -> R,
    {
        let mut server = self.server.lock();
        let mut ctx = self.context.lock();
        server.count(name);
        f(&mut server, &mut ctx)
    }

    fn gen<F>(&self, name: &'static str, n: GLsizei, mut insert: F) -> Vec<GLuint>
    where
        F: FnMut(&mut Server, GLuint),
    {
        self.call(name, |server, ctx| {
            if n < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
                return Vec::new();
            }

            (0..n)
                .map(|_| {
                    let v = server.gen_name();
                    insert(server, v);
                    v
                })
                .collect()
        })
    }

    // Inspection.

    /// Number of calls of the `GL` method `name` issued into the server.
    pub fn calls(&self, name: &str) -> usize {
        self.server.lock().calls.get(name).cloned().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.server.lock().calls.clear();
    }

    /// Every error raised so far, by any context.
    pub fn errors(&self) -> Vec<GLenum> {
        self.server.lock().errors.clone()
    }

    /// Makes the next `unmap_buffer` report corrupted content.
    pub fn set_fail_next_unmap(&self) {
        self.server.lock().fail_next_unmap = true;
    }

    pub fn live(&self) -> LiveObjects {
        let server = self.server.lock();
        LiveObjects {
            buffers: server.buffers.len(),
            textures: server.textures.len(),
            framebuffers: server.framebuffers.len(),
            renderbuffers: server.renderbuffers.len(),
            vertex_arrays: server.vertex_arrays.len(),
            samplers: server.samplers.len(),
            programs: server.programs.len(),
            images: server.images.len(),
        }
    }

    pub fn active_unit(&self) -> u32 {
        self.context.lock().active_unit
    }

    pub fn texture_binding(&self, unit: u32, target: GLenum) -> GLuint {
        let ctx = self.context.lock();
        ctx.textures.get(&(unit, target)).cloned().unwrap_or(0)
    }

    pub fn sampler_binding(&self, unit: u32) -> GLuint {
        self.context.lock().samplers.get(&unit).cloned().unwrap_or(0)
    }

    pub fn buffer_binding(&self, target: GLenum) -> GLuint {
        let server = self.server.lock();
        let ctx = self.context.lock();
        bound_buffer(&server, &ctx, target)
    }

    pub fn indexed_binding(&self, target: GLenum, index: GLuint) -> Option<(GLuint, GLintptr, GLsizeiptr)> {
        self.context.lock().indexed.get(&(target, index)).cloned()
    }

    pub fn vertex_array(&self) -> GLuint {
        self.context.lock().vao
    }

    /// The element array buffer recorded by `vao`, or by vertex array 0 of this context.
    pub fn vao_element_array(&self, vao: GLuint) -> Option<GLuint> {
        if vao == 0 {
            Some(self.context.lock().vao0.element_array)
        } else {
            self.server.lock().vertex_arrays.get(&vao).map(|v| v.element_array)
        }
    }

    pub fn vertex_attrib(&self, vao: GLuint, index: usize) -> Option<VertexAttrib> {
        if vao == 0 {
            Some(self.context.lock().vao0.attributes[index])
        } else {
            self.server.lock().vertex_arrays.get(&vao).map(|v| v.attributes[index])
        }
    }

    pub fn framebuffer(&self, target: GLenum) -> GLuint {
        bound_framebuffer(&self.context.lock(), target)
    }

    pub fn framebuffer_attachment(&self, fbo: GLuint, attachment: GLenum) -> Option<Attachment> {
        let server = self.server.lock();
        server
            .framebuffers
            .get(&fbo)
            .and_then(|v| v.attachments.get(&attachment).cloned())
    }

    pub fn renderbuffer_samples(&self, name: GLuint) -> Option<u32> {
        self.server.lock().renderbuffers.get(&name).map(|v| v.samples)
    }

    pub fn renderbuffer_format(&self, name: GLuint) -> Option<GLenum> {
        self.server.lock().renderbuffers.get(&name).map(|v| v.internal_format)
    }

    pub fn program(&self) -> GLuint {
        self.context.lock().program
    }

    pub fn uniform(&self, program: GLuint, location: GLint) -> Option<[f32; 4]> {
        let server = self.server.lock();
        server
            .programs
            .get(&program)
            .and_then(|v| v.uniforms.get(&location).cloned())
    }

    pub fn is_enabled(&self, cap: GLenum) -> bool {
        self.context.lock().enables.contains(&cap)
    }

    pub fn viewport(&self) -> [GLint; 4] {
        self.context.lock().viewport
    }

    pub fn scissor(&self) -> [GLint; 4] {
        self.context.lock().scissor
    }

    pub fn texture_exists(&self, name: GLuint) -> bool {
        self.server.lock().textures.contains_key(&name)
    }

    /// The (target, internal format, levels, samples) of texture `name`.
    pub fn texture_info(&self, name: GLuint) -> Option<(GLenum, GLenum, u32, u32)> {
        let server = self.server.lock();
        server
            .textures
            .get(&name)
            .map(|v| (v.target, v.internal_format, v.levels, v.samples))
    }

    pub fn texture_parameter(&self, name: GLuint, pname: GLenum) -> Option<GLint> {
        let server = self.server.lock();
        server
            .textures
            .get(&name)
            .and_then(|v| v.parameters.get(&pname).cloned())
    }

    /// A copy of the image of `level` and `layer` (or cubemap face) of texture `name`.
    pub fn texture_level(&self, name: GLuint, level: u32, layer: u32) -> Option<Image> {
        let server = self.server.lock();
        let id = server.textures.get(&name)?.images.get(&(level, layer))?;
        server.images.get(id).cloned()
    }

    /// Overwrites the image of `level` and `layer` of texture `name` with `data`.
    pub fn write_texture_level(&self, name: GLuint, level: u32, layer: u32, data: &[u8]) -> bool {
        let mut server = self.server.lock();
        let id = match server
            .textures
            .get(&name)
            .and_then(|v| v.images.get(&(level, layer)).cloned())
        {
            Some(v) => v,
            None => return false,
        };

        match server.images.get_mut(&id) {
            Some(image) if image.data.len() == data.len() => {
                image.data.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    pub fn buffer_data(&self, name: GLuint) -> Option<Vec<u8>> {
        self.server.lock().buffers.get(&name).map(|v| v.data.clone())
    }

    pub fn sampler_parameter(&self, sampler: GLuint, pname: GLenum) -> Option<f32> {
        let server = self.server.lock();
        server
            .samplers
            .get(&sampler)
            .and_then(|v| v.get(&pname).cloned())
    }

    // Shared by texture uploads.

    #[allow(clippy::too_many_arguments)]
    fn upload(
        server: &mut Server,
        ctx: &mut ContextState,
        target: GLenum,
        level: GLint,
        origin: (GLint, GLint, GLint),
        size: (GLsizei, GLsizei, GLsizei),
        psize: usize,
        data: &[u8],
    ) {
        let (x, y, z) = origin;
        let (width, height, depth) = size;
        if level < 0 || x < 0 || y < 0 || z < 0 || width < 0 || height < 0 || depth < 0 {
            raise(server, ctx, gl::INVALID_VALUE);
            return;
        }

        let name = bound_texture(ctx, target);
        let face = face_index(target);
        let store = ctx.unpack;

        for i in 0..depth as u32 {
            let layer = face + z as u32 + i;
            let id = match server
                .textures
                .get(&name)
                .and_then(|v| v.images.get(&(level as u32, layer)).cloned())
            {
                Some(v) => v,
                None => {
                    raise(server, ctx, gl::INVALID_OPERATION);
                    return;
                }
            };

            let (_, stride) = store.layout(width as usize, psize);
            let offset = i as usize * stride * height as usize;
            let src = data.get(offset..).unwrap_or(&[]);

            let result = match server.images.get_mut(&id) {
                Some(image) if image.bpp != psize => Err(gl::INVALID_OPERATION),
                Some(image) => {
                    if unpack(
                        image,
                        &store,
                        x as usize,
                        y as usize,
                        width as usize,
                        height as usize,
                        psize,
                        src,
                    ) {
                        Ok(())
                    } else {
                        Err(gl::INVALID_VALUE)
                    }
                }
                None => Err(gl::INVALID_OPERATION),
            };

            if let Err(code) = result {
                raise(server, ctx, code);
                return;
            }
        }
    }

    fn compressed_upload(
        server: &mut Server,
        ctx: &mut ContextState,
        target: GLenum,
        level: GLint,
        format: GLenum,
    ) {
        let name = bound_texture(ctx, target);
        let valid = match server.textures.get(&name) {
            Some(v) => v.internal_format == format && level >= 0 && (level as u32) < v.levels,
            None => false,
        };

        if !valid {
            raise(server, ctx, gl::INVALID_OPERATION);
        }
    }

    fn attach(
        server: &mut Server,
        ctx: &mut ContextState,
        target: GLenum,
        attachment: GLenum,
        value: Option<Attachment>,
    ) {
        let fbo = bound_framebuffer(ctx, target);
        if fbo == 0 || !server.framebuffers.contains_key(&fbo) {
            raise(server, ctx, gl::INVALID_OPERATION);
            return;
        }

        let points: &[GLenum] = if attachment == gl::DEPTH_STENCIL_ATTACHMENT {
            &[gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT]
        } else {
            &[attachment]
        };

        if let Some(fb) = server.framebuffers.get_mut(&fbo) {
            for &point in points {
                match value {
                    Some(v) => fb.attachments.insert(point, v),
                    None => fb.attachments.remove(&point),
                };
            }
        }
    }

    fn attach_texture(
        server: &mut Server,
        ctx: &mut ContextState,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: GLint,
        layer: u32,
    ) {
        if texture == 0 {
            HeadlessGL::attach(server, ctx, target, attachment, None);
            return;
        }

        let valid = server
            .textures
            .get(&texture)
            .map_or(false, |v| v.images.contains_key(&(level.max(0) as u32, layer)));

        if !valid || level < 0 {
            raise(server, ctx, gl::INVALID_OPERATION);
            return;
        }

        let value = Attachment::Texture {
            name: texture,
            level: level as u32,
            layer,
        };

        HeadlessGL::attach(server, ctx, target, attachment, Some(value));
    }

    /// Removes attachments of `matches` from the framebuffers bound to the context.
    fn detach_bound<F>(server: &mut Server, ctx: &ContextState, matches: F)
    where
        F: Fn(&Attachment) -> bool,
    {
        for &fbo in &[ctx.draw_framebuffer, ctx.read_framebuffer] {
            if let Some(fb) = server.framebuffers.get_mut(&fbo) {
                fb.attachments.retain(|_, v| !matches(v));
            }
        }
    }
}

impl GL for HeadlessGL {
    fn shared(&self) -> Box<dyn GL> {
        Box::new(self.share())
    }

    fn get_error(&self) -> GLenum {
        let mut ctx = self.context.lock();
        if ctx.errors.is_empty() {
            gl::NO_ERROR
        } else {
            ctx.errors.remove(0)
        }
    }

    fn get_string(&self, name: GLenum) -> String {
        self.call("get_string", |server, ctx| {
            let profile = &server.profile;
            match name {
                gl::VERSION => profile.version.clone(),
                gl::VENDOR => profile.vendor.clone(),
                gl::RENDERER => profile.renderer.clone(),
                gl::EXTENSIONS => profile.extensions.join(" "),
                gl::SHADING_LANGUAGE_VERSION => {
                    if profile.es {
                        "OpenGL ES GLSL ES 3.00".to_owned()
                    } else {
                        "4.10".to_owned()
                    }
                }
                _ => {
                    raise(server, ctx, gl::INVALID_ENUM);
                    String::new()
                }
            }
        })
    }

    fn get_string_i(&self, name: GLenum, index: GLuint) -> String {
        self.call("get_string_i", |server, ctx| {
            let extension = server.profile.extensions.get(index as usize).cloned();
            match extension {
                Some(v) if name == gl::EXTENSIONS => v,
                _ => {
                    raise(server, ctx, gl::INVALID_VALUE);
                    String::new()
                }
            }
        })
    }

    fn get_integer_v(&self, name: GLenum) -> GLint {
        self.call("get_integer_v", |server, ctx| {
            let v = match name {
                gl::NUM_EXTENSIONS => server.profile.extensions.len() as GLuint,
                gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS => server.profile.max_texture_units as GLuint,
                gl::MAX_UNIFORM_BUFFER_BINDINGS => 36,
                gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT => 256,
                gl::MAX_SAMPLES => server.profile.max_samples as GLuint,
                gl::MAX_RENDERBUFFER_SIZE => 8192,
                gl::MAX_COLOR_ATTACHMENTS => 4,
                gl::ACTIVE_TEXTURE => gl::TEXTURE0 + ctx.active_unit,
                gl::TEXTURE_BINDING_2D => bound_texture(ctx, gl::TEXTURE_2D),
                gl::TEXTURE_BINDING_CUBE_MAP => bound_texture(ctx, gl::TEXTURE_CUBE_MAP),
                gl::SAMPLER_BINDING => ctx.samplers.get(&ctx.active_unit).cloned().unwrap_or(0),
                gl::ARRAY_BUFFER_BINDING => bound_buffer(server, ctx, gl::ARRAY_BUFFER),
                gl::ELEMENT_ARRAY_BUFFER_BINDING => {
                    bound_buffer(server, ctx, gl::ELEMENT_ARRAY_BUFFER)
                }
                gl::UNIFORM_BUFFER_BINDING => bound_buffer(server, ctx, gl::UNIFORM_BUFFER),
                gl::VERTEX_ARRAY_BINDING => ctx.vao,
                gl::CURRENT_PROGRAM => ctx.program,
                gl::DRAW_FRAMEBUFFER_BINDING => ctx.draw_framebuffer,
                gl::READ_FRAMEBUFFER_BINDING => ctx.read_framebuffer,
                gl::RENDERBUFFER_BINDING => ctx.renderbuffer,
                gl::PACK_ALIGNMENT => ctx.pack.alignment as GLuint,
                gl::UNPACK_ALIGNMENT => ctx.unpack.alignment as GLuint,
                _ => {
                    raise(server, ctx, gl::INVALID_ENUM);
                    0
                }
            };

            v as GLint
        })
    }

    fn gen_buffers(&self, n: GLsizei) -> Vec<GLuint> {
        self.gen("gen_buffers", n, |server, v| {
            server.buffers.insert(v, Buffer::default());
        })
    }

    fn gen_textures(&self, n: GLsizei) -> Vec<GLuint> {
        self.gen("gen_textures", n, |server, v| {
            server.textures.insert(v, Texture::default());
        })
    }

    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint> {
        self.gen("gen_framebuffers", n, |server, v| {
            server.framebuffers.insert(v, Framebuffer::default());
        })
    }

    fn gen_renderbuffers(&self, n: GLsizei) -> Vec<GLuint> {
        self.gen("gen_renderbuffers", n, |server, v| {
            server.renderbuffers.insert(v, Renderbuffer::default());
        })
    }

    fn gen_vertex_arrays(&self, n: GLsizei) -> Vec<GLuint> {
        self.gen("gen_vertex_arrays", n, |server, v| {
            server.vertex_arrays.insert(v, VertexArray::default());
        })
    }

    fn gen_samplers(&self, n: GLsizei) -> Vec<GLuint> {
        self.gen("gen_samplers", n, |server, v| {
            server.samplers.insert(v, FastHashMap::default());
        })
    }

    fn delete_buffers(&self, names: &[GLuint]) {
        self.call("delete_buffers", |server, ctx| {
            for &name in names {
                if server.buffers.remove(&name).is_none() {
                    continue;
                }

                ctx.buffers.retain(|_, v| *v != name);
                ctx.indexed.retain(|_, v| v.0 != name);
                if let Some(vao) = vao_mut(server, ctx) {
                    if vao.element_array == name {
                        vao.element_array = 0;
                    }
                }
            }
        })
    }

    fn delete_textures(&self, names: &[GLuint]) {
        self.call("delete_textures", |server, ctx| {
            for &name in names {
                let texture = match server.textures.remove(&name) {
                    Some(v) => v,
                    None => continue,
                };

                server.release_texture(texture);
                ctx.textures.retain(|_, v| *v != name);
                HeadlessGL::detach_bound(server, ctx, |v| match v {
                    Attachment::Texture { name: n, .. } => *n == name,
                    _ => false,
                });
            }
        })
    }

    fn delete_framebuffers(&self, names: &[GLuint]) {
        self.call("delete_framebuffers", |server, ctx| {
            for &name in names {
                if name == 0 || server.framebuffers.remove(&name).is_none() {
                    continue;
                }

                if ctx.draw_framebuffer == name {
                    ctx.draw_framebuffer = 0;
                }

                if ctx.read_framebuffer == name {
                    ctx.read_framebuffer = 0;
                }
            }
        })
    }

    fn delete_renderbuffers(&self, names: &[GLuint]) {
        self.call("delete_renderbuffers", |server, ctx| {
            for &name in names {
                let rb = match server.renderbuffers.remove(&name) {
                    Some(v) => v,
                    None => continue,
                };

                if let Some(id) = rb.image {
                    server.release_image(id);
                }

                if ctx.renderbuffer == name {
                    ctx.renderbuffer = 0;
                }

                HeadlessGL::detach_bound(server, ctx, |v| *v == Attachment::Renderbuffer(name));
            }
        })
    }

    fn delete_vertex_arrays(&self, names: &[GLuint]) {
        self.call("delete_vertex_arrays", |server, ctx| {
            for &name in names {
                if name != 0 && server.vertex_arrays.remove(&name).is_some() && ctx.vao == name {
                    ctx.vao = 0;
                }
            }
        })
    }

    fn delete_samplers(&self, names: &[GLuint]) {
        self.call("delete_samplers", |server, ctx| {
            for &name in names {
                if server.samplers.remove(&name).is_some() {
                    ctx.samplers.retain(|_, v| *v != name);
                }
            }
        })
    }

    fn active_texture(&self, unit: GLenum) {
        self.call("active_texture", |server, ctx| {
            let index = unit.wrapping_sub(gl::TEXTURE0);
            if index >= server.profile.max_texture_units as GLuint {
                raise(server, ctx, gl::INVALID_ENUM);
            } else {
                ctx.active_unit = index;
            }
        })
    }

    fn bind_texture(&self, target: GLenum, name: GLuint) {
        self.call("bind_texture", |server, ctx| {
            if !is_texture_target(server, target) {
                raise(server, ctx, gl::INVALID_ENUM);
                return;
            }

            if name != 0 {
                let bound = server.textures.get(&name).map(|v| v.target);
                match bound {
                    Some(0) => {
                        if let Some(v) = server.textures.get_mut(&name) {
                            v.target = target;
                        }
                    }
                    Some(v) if v == target => {}
                    _ => {
                        raise(server, ctx, gl::INVALID_OPERATION);
                        return;
                    }
                }
            }

            ctx.textures.insert((ctx.active_unit, target), name);
        })
    }

    fn bind_sampler(&self, unit: GLuint, sampler: GLuint) {
        self.call("bind_sampler", |server, ctx| {
            if unit >= server.profile.max_texture_units as GLuint {
                raise(server, ctx, gl::INVALID_VALUE);
            } else if sampler != 0 && !server.samplers.contains_key(&sampler) {
                raise(server, ctx, gl::INVALID_OPERATION);
            } else {
                ctx.samplers.insert(unit, sampler);
            }
        })
    }

    fn bind_buffer(&self, target: GLenum, name: GLuint) {
        self.call("bind_buffer", |server, ctx| {
            if name != 0 && !server.buffers.contains_key(&name) {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            if target == gl::ELEMENT_ARRAY_BUFFER {
                if let Some(vao) = vao_mut(server, ctx) {
                    vao.element_array = name;
                }
            } else {
                ctx.buffers.insert(target, name);
            }
        })
    }

    fn bind_buffer_range(
        &self,
        target: GLenum,
        index: GLuint,
        name: GLuint,
        offset: GLintptr,
        size: GLsizeiptr,
    ) {
        self.call("bind_buffer_range", |server, ctx| {
            if name != 0 && !server.buffers.contains_key(&name) {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            if offset % 256 != 0 || (name != 0 && size <= 0) {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            ctx.indexed.insert((target, index), (name, offset, size));
            ctx.buffers.insert(target, name);
        })
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        self.call("bind_vertex_array", |server, ctx| {
            if vao != 0 && !server.vertex_arrays.contains_key(&vao) {
                raise(server, ctx, gl::INVALID_OPERATION);
            } else {
                ctx.vao = vao;
            }
        })
    }

    fn bind_framebuffer(&self, target: GLenum, name: GLuint) {
        self.call("bind_framebuffer", |server, ctx| {
            if name != 0 && !server.framebuffers.contains_key(&name) {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            match target {
                gl::FRAMEBUFFER => {
                    ctx.draw_framebuffer = name;
                    ctx.read_framebuffer = name;
                }
                gl::DRAW_FRAMEBUFFER => ctx.draw_framebuffer = name,
                gl::READ_FRAMEBUFFER => ctx.read_framebuffer = name,
                _ => raise(server, ctx, gl::INVALID_ENUM),
            }
        })
    }

    fn bind_renderbuffer(&self, target: GLenum, name: GLuint) {
        self.call("bind_renderbuffer", |server, ctx| {
            if target != gl::RENDERBUFFER {
                raise(server, ctx, gl::INVALID_ENUM);
            } else if name != 0 && !server.renderbuffers.contains_key(&name) {
                raise(server, ctx, gl::INVALID_OPERATION);
            } else {
                ctx.renderbuffer = name;
            }
        })
    }

    fn use_program(&self, program: GLuint) {
        self.call("use_program", |server, ctx| {
            if program != 0 && !server.programs.get(&program).map_or(false, |v| v.linked) {
                raise(server, ctx, gl::INVALID_OPERATION);
            } else {
                ctx.program = program;
            }
        })
    }

    fn enable(&self, cap: GLenum) {
        self.call("enable", |_, ctx| {
            ctx.enables.insert(cap);
        })
    }

    fn disable(&self, cap: GLenum) {
        self.call("disable", |_, ctx| {
            ctx.enables.remove(&cap);
        })
    }

    fn depth_func(&self, _: GLenum) {
        self.call("depth_func", |_, _| {})
    }

    fn depth_mask(&self, _: bool) {
        self.call("depth_mask", |_, _| {})
    }

    fn color_mask(&self, _: bool, _: bool, _: bool, _: bool) {
        self.call("color_mask", |_, _| {})
    }

    fn cull_face(&self, _: GLenum) {
        self.call("cull_face", |_, _| {})
    }

    fn front_face(&self, _: GLenum) {
        self.call("front_face", |_, _| {})
    }

    fn blend_equation_separate(&self, _: GLenum, _: GLenum) {
        self.call("blend_equation_separate", |_, _| {})
    }

    fn blend_func_separate(&self, _: GLenum, _: GLenum, _: GLenum, _: GLenum) {
        self.call("blend_func_separate", |_, _| {})
    }

    fn polygon_offset(&self, _: f32, _: f32) {
        self.call("polygon_offset", |_, _| {})
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.call("clear_color", |_, ctx| ctx.clear_color = [r, g, b, a])
    }

    fn clear_depth_f(&self, depth: f32) {
        self.call("clear_depth_f", |_, ctx| ctx.clear_depth = depth)
    }

    fn clear_stencil(&self, s: GLint) {
        self.call("clear_stencil", |_, ctx| ctx.clear_stencil = s)
    }

    fn clear(&self, mask: GLbitfield) {
        self.call("clear", |server, ctx| {
            if mask & gl::COLOR_BUFFER_BIT == 0 {
                return;
            }

            let id = match server.attachment_image(ctx.draw_framebuffer, gl::COLOR_ATTACHMENT0) {
                Some(v) => v,
                None => return,
            };

            let color = ctx.clear_color;
            let pixel: Vec<u8> = color
                .iter()
                .map(|v| (v.max(0.0).min(1.0) * 255.0).round() as u8)
                .collect();

            if let Some(image) = server.images.get_mut(&id) {
                if image.bpp == 0 {
                    return;
                }

                let (mut x0, mut y0) = (0, 0);
                let (mut x1, mut y1) = (image.width as i64, image.height as i64);
                if ctx.enables.contains(&gl::SCISSOR_TEST) {
                    let s = ctx.scissor;
                    x0 = i64::from(s[0]).max(0);
                    y0 = i64::from(s[1]).max(0);
                    x1 = x1.min(i64::from(s[0]) + i64::from(s[2]));
                    y1 = y1.min(i64::from(s[1]) + i64::from(s[3]));
                }

                let bpp = image.bpp;
                let row_size = image.row_size();
                for y in y0..y1.max(y0) {
                    for x in x0..x1.max(x0) {
                        let at = y as usize * row_size + x as usize * bpp;
                        for c in 0..bpp {
                            image.data[at + c] = pixel.get(c).cloned().unwrap_or(0);
                        }
                    }
                }
            }
        })
    }

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        self.call("viewport", |server, ctx| {
            if width < 0 || height < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
            } else {
                ctx.viewport = [x, y, width, height];
            }
        })
    }

    fn scissor(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        self.call("scissor", |server, ctx| {
            if width < 0 || height < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
            } else {
                ctx.scissor = [x, y, width, height];
            }
        })
    }

    fn pixel_store_i(&self, name: GLenum, param: GLint) {
        self.call("pixel_store_i", |server, ctx| {
            let alignment = name == gl::PACK_ALIGNMENT || name == gl::UNPACK_ALIGNMENT;
            if (alignment && ![1, 2, 4, 8].contains(&param)) || param < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let v = param as usize;
            match name {
                gl::PACK_ALIGNMENT => ctx.pack.alignment = v,
                gl::PACK_ROW_LENGTH => ctx.pack.row_length = v,
                gl::PACK_SKIP_PIXELS => ctx.pack.skip_pixels = v,
                gl::PACK_SKIP_ROWS => ctx.pack.skip_rows = v,
                gl::UNPACK_ALIGNMENT => ctx.unpack.alignment = v,
                gl::UNPACK_ROW_LENGTH => ctx.unpack.row_length = v,
                gl::UNPACK_SKIP_PIXELS => ctx.unpack.skip_pixels = v,
                gl::UNPACK_SKIP_ROWS => ctx.unpack.skip_rows = v,
                _ => raise(server, ctx, gl::INVALID_ENUM),
            }
        })
    }

    fn buffer_data(&self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>, usage: GLenum) {
        self.call("buffer_data", |server, ctx| {
            let name = bound_buffer(server, ctx, target);
            if size < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let size = size as usize;
            match server.buffers.get_mut(&name) {
                Some(buffer) if name != 0 => {
                    buffer.data = match data {
                        Some(v) => {
                            let mut bytes = v[..size.min(v.len())].to_vec();
                            bytes.resize(size, 0);
                            bytes
                        }
                        None => vec![0; size],
                    };

                    buffer.usage = usage;
                    buffer.mapped = None;
                }
                _ => raise(server, ctx, gl::INVALID_OPERATION),
            }
        })
    }

    fn buffer_sub_data(&self, target: GLenum, offset: GLintptr, data: &[u8]) {
        self.call("buffer_sub_data", |server, ctx| {
            let name = bound_buffer(server, ctx, target);
            let code = match server.buffers.get_mut(&name) {
                Some(buffer) if name != 0 && buffer.mapped.is_none() => {
                    let offset = offset.max(0) as usize;
                    if offset + data.len() > buffer.data.len() {
                        Some(gl::INVALID_VALUE)
                    } else {
                        buffer.data[offset..offset + data.len()].copy_from_slice(data);
                        None
                    }
                }
                _ => Some(gl::INVALID_OPERATION),
            };

            if let Some(code) = code {
                raise(server, ctx, code);
            }
        })
    }

    fn map_buffer_range(
        &self,
        target: GLenum,
        offset: GLintptr,
        length: GLsizeiptr,
        access: GLbitfield,
    ) -> *mut u8 {
        self.call("map_buffer_range", |server, ctx| {
            let name = bound_buffer(server, ctx, target);
            let result = match server.buffers.get_mut(&name) {
                Some(buffer) if name != 0 && buffer.mapped.is_none() => {
                    let len = buffer.data.len() as GLsizeiptr;
                    if offset < 0 || length <= 0 || offset + length > len {
                        Err(gl::INVALID_VALUE)
                    } else {
                        let range = offset as usize..(offset + length) as usize;
                        let staging = if access & gl::MAP_INVALIDATE_RANGE_BIT != 0
                            || access & gl::MAP_INVALIDATE_BUFFER_BIT != 0
                        {
                            vec![0; length as usize]
                        } else {
                            buffer.data[range].to_vec()
                        };

                        buffer.mapped = Some((offset as usize, staging));
                        match buffer.mapped {
                            Some((_, ref mut v)) => Ok(v.as_mut_ptr()),
                            None => Err(gl::INVALID_OPERATION),
                        }
                    }
                }
                _ => Err(gl::INVALID_OPERATION),
            };

            match result {
                Ok(ptr) => ptr,
                Err(code) => {
                    raise(server, ctx, code);
                    ::std::ptr::null_mut()
                }
            }
        })
    }

    fn unmap_buffer(&self, target: GLenum) -> bool {
        self.call("unmap_buffer", |server, ctx| {
            let name = bound_buffer(server, ctx, target);
            let fail = server.fail_next_unmap;
            let result = match server.buffers.get_mut(&name) {
                Some(buffer) if name != 0 => match buffer.mapped.take() {
                    Some((offset, staging)) => {
                        let range = offset..offset + staging.len();
                        if fail {
                            // The content of the range got lost.
                            for v in &mut buffer.data[range] {
                                *v = 0xCD;
                            }

                            Ok(false)
                        } else {
                            buffer.data[range].copy_from_slice(&staging);
                            Ok(true)
                        }
                    }
                    None => Err(gl::INVALID_OPERATION),
                },
                _ => Err(gl::INVALID_OPERATION),
            };

            match result {
                Ok(v) => {
                    if !v {
                        server.fail_next_unmap = false;
                    }

                    v
                }
                Err(code) => {
                    raise(server, ctx, code);
                    false
                }
            }
        })
    }

    fn tex_storage_2d(
        &self,
        target: GLenum,
        levels: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) {
        self.call("tex_storage_2d", |server, ctx| {
            let name = bound_texture(ctx, target);
            if levels < 1 || width < 1 || height < 1 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let faces = if target == gl::TEXTURE_CUBE_MAP { 6 } else { 1 };
            let bpp = internal_size(internal_format);

            let mut images = FastHashMap::default();
            for level in 0..levels as u32 {
                for face in 0..faces {
                    let image = Image::new(level_size(width, level), level_size(height, level), bpp);
                    images.insert((level, face), server.create_image(image));
                }
            }

            match server.textures.get_mut(&name) {
                Some(texture) if name != 0 && !texture.immutable => {
                    texture.internal_format = internal_format;
                    texture.levels = levels as u32;
                    texture.width = width as u32;
                    texture.height = height as u32;
                    texture.depth = 1;
                    texture.samples = 0;
                    texture.immutable = true;
                    texture.images = images;
                }
                _ => {
                    for (_, id) in images {
                        server.images.remove(&id);
                    }

                    raise(server, ctx, gl::INVALID_OPERATION);
                }
            }
        })
    }

    fn tex_storage_3d(
        &self,
        target: GLenum,
        levels: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
        depth: GLsizei,
    ) {
        self.call("tex_storage_3d", |server, ctx| {
            let name = bound_texture(ctx, target);
            if levels < 1 || width < 1 || height < 1 || depth < 1 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let bpp = internal_size(internal_format);
            let mut images = FastHashMap::default();
            for level in 0..levels as u32 {
                // Array layers don't shrink with levels, 3D slices do.
                let layers = if target == gl::TEXTURE_3D {
                    level_size(depth, level)
                } else {
                    depth as u32
                };

                for layer in 0..layers {
                    let image = Image::new(level_size(width, level), level_size(height, level), bpp);
                    images.insert((level, layer), server.create_image(image));
                }
            }

            match server.textures.get_mut(&name) {
                Some(texture) if name != 0 && !texture.immutable => {
                    texture.internal_format = internal_format;
                    texture.levels = levels as u32;
                    texture.width = width as u32;
                    texture.height = height as u32;
                    texture.depth = depth as u32;
                    texture.immutable = true;
                    texture.images = images;
                }
                _ => {
                    for (_, id) in images {
                        server.images.remove(&id);
                    }

                    raise(server, ctx, gl::INVALID_OPERATION);
                }
            }
        })
    }

    fn tex_storage_2d_multisample(
        &self,
        target: GLenum,
        samples: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) {
        self.call("tex_storage_2d_multisample", |server, ctx| {
            if target != gl::TEXTURE_2D_MULTISAMPLE || !server.profile.multisample_texture {
                raise(server, ctx, gl::INVALID_ENUM);
                return;
            }

            if samples < 1 || samples > server.profile.max_samples || width < 1 || height < 1 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let name = bound_texture(ctx, target);
            let image = Image::new(width as u32, height as u32, internal_size(internal_format));
            let id = server.create_image(image);

            match server.textures.get_mut(&name) {
                Some(texture) if name != 0 && !texture.immutable => {
                    texture.internal_format = internal_format;
                    texture.levels = 1;
                    texture.width = width as u32;
                    texture.height = height as u32;
                    texture.depth = 1;
                    texture.samples = samples as u32;
                    texture.immutable = true;
                    texture.images.insert((0, 0), id);
                }
                _ => {
                    server.images.remove(&id);
                    raise(server, ctx, gl::INVALID_OPERATION);
                }
            }
        })
    }

    fn tex_sub_image_2d(
        &self,
        target: GLenum,
        level: GLint,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    ) {
        self.call("tex_sub_image_2d", |server, ctx| {
            let psize = transfer_size(format, ty);
            HeadlessGL::upload(
                server,
                ctx,
                target,
                level,
                (x, y, 0),
                (width, height, 1),
                psize,
                data,
            );
        })
    }

    fn tex_sub_image_3d(
        &self,
        target: GLenum,
        level: GLint,
        x: GLint,
        y: GLint,
        z: GLint,
        width: GLsizei,
        height: GLsizei,
        depth: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    ) {
        self.call("tex_sub_image_3d", |server, ctx| {
            let psize = transfer_size(format, ty);
            HeadlessGL::upload(
                server,
                ctx,
                target,
                level,
                (x, y, z),
                (width, height, depth),
                psize,
                data,
            );
        })
    }

    fn compressed_tex_sub_image_2d(
        &self,
        target: GLenum,
        level: GLint,
        _: GLint,
        _: GLint,
        _: GLsizei,
        _: GLsizei,
        format: GLenum,
        _: &[u8],
    ) {
        self.call("compressed_tex_sub_image_2d", |server, ctx| {
            HeadlessGL::compressed_upload(server, ctx, target, level, format);
        })
    }

    fn compressed_tex_sub_image_3d(
        &self,
        target: GLenum,
        level: GLint,
        _: GLint,
        _: GLint,
        _: GLint,
        _: GLsizei,
        _: GLsizei,
        _: GLsizei,
        format: GLenum,
        _: &[u8],
    ) {
        self.call("compressed_tex_sub_image_3d", |server, ctx| {
            HeadlessGL::compressed_upload(server, ctx, target, level, format);
        })
    }

    fn tex_parameter_i(&self, target: GLenum, name: GLenum, param: GLint) {
        self.call("tex_parameter_i", |server, ctx| {
            let texture = bound_texture(ctx, target);
            match server.textures.get_mut(&texture) {
                Some(v) if texture != 0 => {
                    v.parameters.insert(name, param);
                }
                _ => raise(server, ctx, gl::INVALID_OPERATION),
            }
        })
    }

    fn generate_mipmap(&self, target: GLenum) {
        self.call("generate_mipmap", |server, ctx| {
            let name = bound_texture(ctx, target);
            let (levels, keys) = match server.textures.get(&name) {
                Some(v) if name != 0 && v.immutable && internal_size(v.internal_format) > 0 => {
                    let mut keys: Vec<_> = v.images.iter().map(|(k, id)| (*k, *id)).collect();
                    keys.sort();
                    (v.levels, keys)
                }
                _ => {
                    raise(server, ctx, gl::INVALID_OPERATION);
                    return;
                }
            };

            // Nearest filtered reduction of every layer.
            for level in 1..levels {
                for &((l, layer), id) in keys.iter().filter(|v| (v.0).0 == level) {
                    let parent = keys
                        .iter()
                        .find(|v| v.0 == (l - 1, layer))
                        .and_then(|v| server.images.get(&v.1).cloned());

                    if let (Some(parent), Some(image)) = (parent, server.images.get_mut(&id)) {
                        let bpp = image.bpp;
                        let row_size = image.row_size();
                        let parent_row_size = parent.row_size();
                        for y in 0..image.height as usize {
                            for x in 0..image.width as usize {
                                let py = (y * 2).min(parent.height as usize - 1);
                                let px = (x * 2).min(parent.width as usize - 1);
                                let from = py * parent_row_size + px * bpp;
                                let to = y * row_size + x * bpp;
                                image.data[to..to + bpp]
                                    .copy_from_slice(&parent.data[from..from + bpp]);
                            }
                        }
                    }
                }
            }
        })
    }

    fn sampler_parameter_i(&self, sampler: GLuint, name: GLenum, param: GLint) {
        self.call("sampler_parameter_i", |server, ctx| {
            match server.samplers.get_mut(&sampler) {
                Some(v) => {
                    v.insert(name, param as f32);
                }
                None => raise(server, ctx, gl::INVALID_OPERATION),
            }
        })
    }

    fn sampler_parameter_f(&self, sampler: GLuint, name: GLenum, param: f32) {
        self.call("sampler_parameter_f", |server, ctx| {
            match server.samplers.get_mut(&sampler) {
                Some(v) => {
                    v.insert(name, param);
                }
                None => raise(server, ctx, gl::INVALID_OPERATION),
            }
        })
    }

    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
    ) {
        self.call("framebuffer_texture_2d", |server, ctx| {
            // The texture target must match the class of `textarget`.
            let mismatch = texture != 0
                && server
                    .textures
                    .get(&texture)
                    .map_or(false, |v| v.target != texture_class(textarget));

            if mismatch {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            let layer = face_index(textarget);
            HeadlessGL::attach_texture(server, ctx, target, attachment, texture, level, layer);
        })
    }

    fn framebuffer_texture_layer(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: GLint,
        layer: GLint,
    ) {
        self.call("framebuffer_texture_layer", |server, ctx| {
            if layer < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            HeadlessGL::attach_texture(
                server,
                ctx,
                target,
                attachment,
                texture,
                level,
                layer as u32,
            );
        })
    }

    fn framebuffer_texture_2d_multisample(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
        samples: GLsizei,
    ) {
        self.call("framebuffer_texture_2d_multisample", |server, ctx| {
            if !server
                .profile
                .has_extension("GL_EXT_multisampled_render_to_texture")
            {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            if samples > server.profile.max_samples {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let layer = face_index(textarget);
            HeadlessGL::attach_texture(server, ctx, target, attachment, texture, level, layer);
        })
    }

    fn framebuffer_renderbuffer(
        &self,
        target: GLenum,
        attachment: GLenum,
        _: GLenum,
        renderbuffer: GLuint,
    ) {
        self.call("framebuffer_renderbuffer", |server, ctx| {
            if renderbuffer == 0 {
                HeadlessGL::attach(server, ctx, target, attachment, None);
            } else if !server.renderbuffers.contains_key(&renderbuffer) {
                raise(server, ctx, gl::INVALID_OPERATION);
            } else {
                let value = Attachment::Renderbuffer(renderbuffer);
                HeadlessGL::attach(server, ctx, target, attachment, Some(value));
            }
        })
    }

    fn renderbuffer_storage_multisample(
        &self,
        target: GLenum,
        samples: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) {
        self.call("renderbuffer_storage_multisample", |server, ctx| {
            if target != gl::RENDERBUFFER {
                raise(server, ctx, gl::INVALID_ENUM);
                return;
            }

            if samples < 0 || samples > server.profile.max_samples || width < 1 || height < 1 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let name = ctx.renderbuffer;
            if name == 0 || !server.renderbuffers.contains_key(&name) {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            let image = Image::new(width as u32, height as u32, internal_size(internal_format));
            let id = server.create_image(image);
            let previous = server.renderbuffers.get_mut(&name).and_then(|rb| {
                rb.internal_format = internal_format;
                rb.samples = samples as u32;
                rb.image.replace(id)
            });

            if let Some(v) = previous {
                server.release_image(v);
            }
        })
    }

    fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
        self.call("check_framebuffer_status", |server, ctx| {
            let fbo = bound_framebuffer(ctx, target);
            if fbo == 0 {
                return gl::FRAMEBUFFER_COMPLETE;
            }

            let attachments = match server.framebuffers.get(&fbo) {
                Some(v) => v.attachments.clone(),
                None => return gl::FRAMEBUFFER_UNDEFINED,
            };

            if attachments.is_empty() {
                return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
            }

            let mut dimensions = None;
            for &point in attachments.keys() {
                let image = match server
                    .attachment_image(fbo, point)
                    .and_then(|id| server.images.get(&id))
                {
                    Some(v) => v,
                    None => return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT,
                };

                match dimensions {
                    Some(v) if v != (image.width, image.height) => {
                        return FRAMEBUFFER_INCOMPLETE_DIMENSIONS
                    }
                    _ => dimensions = Some((image.width, image.height)),
                }
            }

            gl::FRAMEBUFFER_COMPLETE
        })
    }

    fn invalidate_framebuffer(&self, target: GLenum, _: &[GLenum]) {
        self.call("invalidate_framebuffer", |server, ctx| {
            if target != gl::FRAMEBUFFER
                && target != gl::DRAW_FRAMEBUFFER
                && target != gl::READ_FRAMEBUFFER
            {
                raise(server, ctx, gl::INVALID_ENUM);
            }
        })
    }

    fn blit_framebuffer(
        &self,
        src_x0: GLint,
        src_y0: GLint,
        src_x1: GLint,
        src_y1: GLint,
        dst_x0: GLint,
        dst_y0: GLint,
        dst_x1: GLint,
        dst_y1: GLint,
        mask: GLbitfield,
        _: GLenum,
    ) {
        self.call("blit_framebuffer", |server, ctx| {
            if ctx.read_framebuffer == ctx.draw_framebuffer {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            if mask & gl::COLOR_BUFFER_BIT == 0 {
                return;
            }

            let src = server
                .attachment_image(ctx.read_framebuffer, gl::COLOR_ATTACHMENT0)
                .and_then(|id| server.images.get(&id).cloned());
            let dst = server.attachment_image(ctx.draw_framebuffer, gl::COLOR_ATTACHMENT0);

            let (src, dst) = match (src, dst.and_then(|id| server.images.get_mut(&id))) {
                (Some(src), Some(dst)) => (src, dst),
                _ => return,
            };

            if src.bpp != dst.bpp || src.bpp == 0 {
                return;
            }

            let (sw, sh) = ((src_x1 - src_x0) as i64, (src_y1 - src_y0) as i64);
            let (dw, dh) = ((dst_x1 - dst_x0) as i64, (dst_y1 - dst_y0) as i64);
            if sw == 0 || sh == 0 || dw == 0 || dh == 0 {
                return;
            }

            let bpp = src.bpp;
            for dy in 0..dh.abs() {
                for dx in 0..dw.abs() {
                    let tx = i64::from(dst_x0) + dx * dw.signum();
                    let ty = i64::from(dst_y0) + dy * dh.signum();
                    let sx = i64::from(src_x0) + dx * sw / dw.abs();
                    let sy = i64::from(src_y0) + dy * sh / dh.abs();

                    let inside = |x: i64, y: i64, image: &Image| {
                        x >= 0 && y >= 0 && x < i64::from(image.width) && y < i64::from(image.height)
                    };

                    if inside(tx, ty, &*dst) && inside(sx, sy, &src) {
                        let from = sy as usize * src.row_size() + sx as usize * bpp;
                        let to = ty as usize * dst.row_size() + tx as usize * bpp;
                        dst.data[to..to + bpp].copy_from_slice(&src.data[from..from + bpp]);
                    }
                }
            }
        })
    }

    fn read_pixels(
        &self,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &mut [u8],
    ) {
        self.call("read_pixels", |server, ctx| {
            if x < 0 || y < 0 || width < 0 || height < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            let id = match server.attachment_image(ctx.read_framebuffer, gl::COLOR_ATTACHMENT0) {
                Some(v) => v,
                None => {
                    if ctx.read_framebuffer != 0 {
                        raise(server, ctx, gl::INVALID_OPERATION);
                    }

                    return;
                }
            };

            let psize = transfer_size(format, ty);
            let store = ctx.pack;
            let done = match server.images.get(&id) {
                Some(image) => pack(
                    image,
                    &store,
                    x as usize,
                    y as usize,
                    width as usize,
                    height as usize,
                    psize,
                    data,
                ),
                None => false,
            };

            if !done {
                raise(server, ctx, gl::INVALID_OPERATION);
            }
        })
    }

    fn enable_vertex_attrib_array(&self, index: GLuint) {
        self.call("enable_vertex_attrib_array", |server, ctx| {
            match vao_mut(server, ctx).and_then(|v| v.attributes.get_mut(index as usize)) {
                Some(attr) => attr.enabled = true,
                None => raise(server, ctx, gl::INVALID_VALUE),
            }
        })
    }

    fn disable_vertex_attrib_array(&self, index: GLuint) {
        self.call("disable_vertex_attrib_array", |server, ctx| {
            match vao_mut(server, ctx).and_then(|v| v.attributes.get_mut(index as usize)) {
                Some(attr) => attr.enabled = false,
                None => raise(server, ctx, gl::INVALID_VALUE),
            }
        })
    }

    fn vertex_attrib_pointer(
        &self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        normalized: bool,
        stride: GLsizei,
        offset: GLuint,
    ) {
        self.call("vertex_attrib_pointer", |server, ctx| {
            let buffer = bound_buffer(server, ctx, gl::ARRAY_BUFFER);
            if buffer == 0 || (!server.profile.es && ctx.vao == 0) {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            match vao_mut(server, ctx).and_then(|v| v.attributes.get_mut(index as usize)) {
                Some(attr) => {
                    attr.buffer = buffer;
                    attr.size = size;
                    attr.ty = ty;
                    attr.normalized = normalized;
                    attr.integer = false;
                    attr.stride = stride;
                    attr.offset = offset;
                }
                None => raise(server, ctx, gl::INVALID_VALUE),
            }
        })
    }

    fn vertex_attrib_i_pointer(
        &self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        stride: GLsizei,
        offset: GLuint,
    ) {
        self.call("vertex_attrib_i_pointer", |server, ctx| {
            let buffer = bound_buffer(server, ctx, gl::ARRAY_BUFFER);
            if buffer == 0 || (!server.profile.es && ctx.vao == 0) {
                raise(server, ctx, gl::INVALID_OPERATION);
                return;
            }

            match vao_mut(server, ctx).and_then(|v| v.attributes.get_mut(index as usize)) {
                Some(attr) => {
                    attr.buffer = buffer;
                    attr.size = size;
                    attr.ty = ty;
                    attr.normalized = false;
                    attr.integer = true;
                    attr.stride = stride;
                    attr.offset = offset;
                }
                None => raise(server, ctx, gl::INVALID_VALUE),
            }
        })
    }

    fn vertex_attrib_4f(&self, _: GLuint, _: f32, _: f32, _: f32, _: f32) {
        self.call("vertex_attrib_4f", |_, _| {})
    }

    fn draw_arrays(&self, _: GLenum, first: GLint, count: GLsizei) {
        self.call("draw_arrays", |server, ctx| {
            if first < 0 || count < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
            } else if ctx.program == 0 || (!server.profile.es && ctx.vao == 0) {
                raise(server, ctx, gl::INVALID_OPERATION);
            }
        })
    }

    fn draw_range_elements(
        &self,
        _: GLenum,
        start: GLuint,
        end: GLuint,
        count: GLsizei,
        _: GLenum,
        _: GLuint,
    ) {
        self.call("draw_range_elements", |server, ctx| {
            let element = bound_buffer(server, ctx, gl::ELEMENT_ARRAY_BUFFER);
            if end < start || count < 0 {
                raise(server, ctx, gl::INVALID_VALUE);
            } else if ctx.program == 0
                || (!server.profile.es && ctx.vao == 0)
                || element == 0
                || !server.buffers.contains_key(&element)
            {
                raise(server, ctx, gl::INVALID_OPERATION);
            }
        })
    }

    fn create_shader(&self, ty: GLenum) -> GLuint {
        self.call("create_shader", |server, _| {
            let name = server.gen_name();
            server.shaders.insert(name, ty);
            name
        })
    }

    fn shader_source(&self, shader: GLuint, _: &str) {
        self.call("shader_source", |server, ctx| {
            if !server.shaders.contains_key(&shader) {
                raise(server, ctx, gl::INVALID_VALUE);
            }
        })
    }

    fn compile_shader(&self, shader: GLuint) {
        self.call("compile_shader", |server, ctx| {
            if !server.shaders.contains_key(&shader) {
                raise(server, ctx, gl::INVALID_VALUE);
            }
        })
    }

    fn get_shader_iv(&self, shader: GLuint, name: GLenum) -> GLint {
        self.call("get_shader_iv", |server, ctx| {
            if !server.shaders.contains_key(&shader) {
                raise(server, ctx, gl::INVALID_VALUE);
                return 0;
            }

            match name {
                gl::COMPILE_STATUS => GLint::from(gl::TRUE),
                _ => 0,
            }
        })
    }

    fn get_shader_info_log(&self, _: GLuint) -> String {
        self.call("get_shader_info_log", |_, _| String::new())
    }

    fn delete_shader(&self, shader: GLuint) {
        self.call("delete_shader", |server, _| {
            server.shaders.remove(&shader);
        })
    }

    fn create_program(&self) -> GLuint {
        self.call("create_program", |server, _| {
            let name = server.gen_name();
            server.programs.insert(name, Program::default());
            name
        })
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        self.call("attach_shader", |server, ctx| {
            if !server.shaders.contains_key(&shader) {
                raise(server, ctx, gl::INVALID_VALUE);
                return;
            }

            match server.programs.get_mut(&program) {
                Some(v) => v.shaders.push(shader),
                None => raise(server, ctx, gl::INVALID_VALUE),
            }
        })
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        self.call("detach_shader", |server, ctx| {
            match server.programs.get_mut(&program) {
                Some(v) if v.shaders.contains(&shader) => v.shaders.retain(|&s| s != shader),
                _ => raise(server, ctx, gl::INVALID_OPERATION),
            }
        })
    }

    fn link_program(&self, program: GLuint) {
        self.call("link_program", |server, ctx| {
            match server.programs.get_mut(&program) {
                Some(v) => v.linked = true,
                None => raise(server, ctx, gl::INVALID_VALUE),
            }
        })
    }

    fn get_program_iv(&self, program: GLuint, name: GLenum) -> GLint {
        self.call("get_program_iv", |server, ctx| {
            match server.programs.get(&program) {
                Some(v) if name == gl::LINK_STATUS => GLint::from(v.linked),
                Some(_) => 0,
                None => {
                    raise(server, ctx, gl::INVALID_VALUE);
                    0
                }
            }
        })
    }

    fn get_program_info_log(&self, _: GLuint) -> String {
        self.call("get_program_info_log", |_, _| String::new())
    }

    fn delete_program(&self, program: GLuint) {
        self.call("delete_program", |server, _| {
            server.programs.remove(&program);
        })
    }

    fn get_attrib_location(&self, program: GLuint, name: &str) -> GLint {
        self.get_uniform_location(program, name)
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
        self.call("get_location", |server, ctx| {
            match server.programs.get_mut(&program) {
                Some(v) if v.linked => {
                    let next = v.locations.len() as GLint;
                    *v.locations.entry(name.to_owned()).or_insert(next)
                }
                _ => {
                    raise(server, ctx, gl::INVALID_OPERATION);
                    -1
                }
            }
        })
    }

    fn uniform_1i(&self, location: GLint, v: GLint) {
        self.uniform_4f(location, v as f32, 0.0, 0.0, 0.0)
    }

    fn uniform_4f(&self, location: GLint, x: f32, y: f32, z: f32, w: f32) {
        self.call("uniform", |server, ctx| {
            let program = ctx.program;
            match server.programs.get_mut(&program) {
                Some(v) if program != 0 => {
                    if location >= 0 {
                        v.uniforms.insert(location, [x, y, z, w]);
                    }
                }
                _ => raise(server, ctx, gl::INVALID_OPERATION),
            }
        })
    }

    fn flush(&self) {
        self.call("flush", |_, _| {})
    }

    fn finish(&self) {
        self.call("finish", |_, _| {})
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_and_bindings() {
        let gl = HeadlessGL::es3();
        let textures = gl.gen_textures(2);
        assert_eq!(textures.len(), 2);
        assert_ne!(textures[0], textures[1]);

        gl.active_texture(gl::TEXTURE0 + 3);
        gl.bind_texture(gl::TEXTURE_2D, textures[0]);
        assert_eq!(gl.texture_binding(3, gl::TEXTURE_2D), textures[0]);

        // A texture can't change its target.
        gl.bind_texture(gl::TEXTURE_CUBE_MAP, textures[0]);
        assert_eq!(gl.get_error(), gl::INVALID_OPERATION);
        assert_eq!(gl.get_error(), gl::NO_ERROR);

        gl.delete_textures(&textures);
        assert_eq!(gl.texture_binding(3, gl::TEXTURE_2D), 0);
        assert_eq!(gl.live().textures, 0);

        gl.bind_texture(gl::TEXTURE_2D, textures[0]);
        assert_eq!(gl.errors(), vec![gl::INVALID_OPERATION, gl::INVALID_OPERATION]);
    }

    #[test]
    fn vertex_array_element_binding() {
        let gl = HeadlessGL::es3();
        let vao = gl.gen_vertex_arrays(1)[0];
        let buffers = gl.gen_buffers(2);

        gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, buffers[0]);
        gl.bind_vertex_array(vao);
        assert_eq!(gl.buffer_binding(gl::ELEMENT_ARRAY_BUFFER), 0);

        gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, buffers[1]);
        gl.bind_vertex_array(0);
        assert_eq!(gl.buffer_binding(gl::ELEMENT_ARRAY_BUFFER), buffers[0]);
        assert_eq!(gl.vao_element_array(vao), Some(buffers[1]));
    }

    #[test]
    fn map_and_unmap() {
        let gl = HeadlessGL::es3();
        let buffer = gl.gen_buffers(1)[0];
        gl.bind_buffer(gl::ARRAY_BUFFER, buffer);
        GL::buffer_data(&gl, gl::ARRAY_BUFFER, 4, None, gl::STREAM_DRAW);

        let ptr = gl.map_buffer_range(gl::ARRAY_BUFFER, 1, 2, gl::MAP_WRITE_BIT);
        assert!(!ptr.is_null());
        unsafe {
            *ptr = 7;
            *ptr.add(1) = 8;
        }

        assert!(gl.unmap_buffer(gl::ARRAY_BUFFER));
        assert_eq!(gl.buffer_data(buffer), Some(vec![0, 7, 8, 0]));

        gl.set_fail_next_unmap();
        let ptr = gl.map_buffer_range(gl::ARRAY_BUFFER, 0, 4, gl::MAP_WRITE_BIT);
        assert!(!ptr.is_null());
        assert!(!gl.unmap_buffer(gl::ARRAY_BUFFER));
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn attachments_of_different_sizes() {
        let gl = HeadlessGL::es3();
        let textures = gl.gen_textures(2);
        for (&name, &size) in textures.iter().zip(&[4, 2]) {
            gl.bind_texture(gl::TEXTURE_2D, name);
            gl.tex_storage_2d(gl::TEXTURE_2D, 1, gl::RGBA8, size, size);
        }

        let fbo = gl.gen_framebuffers(1)[0];
        gl.bind_framebuffer(gl::FRAMEBUFFER, fbo);
        gl.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, textures[0], 0);
        assert_eq!(gl.check_framebuffer_status(gl::FRAMEBUFFER), gl::FRAMEBUFFER_COMPLETE);

        gl.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT1, gl::TEXTURE_2D, textures[1], 0);
        assert_eq!(
            gl.check_framebuffer_status(gl::FRAMEBUFFER),
            FRAMEBUFFER_INCOMPLETE_DIMENSIONS
        );
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn shared_contexts() {
        let gl = HeadlessGL::es3();
        let other = gl.share();

        let texture = gl.gen_textures(1)[0];
        other.bind_texture(gl::TEXTURE_2D, texture);
        assert_eq!(other.texture_binding(0, gl::TEXTURE_2D), texture);
        assert_eq!(gl.texture_binding(0, gl::TEXTURE_2D), 0);
        assert!(gl.errors().is_empty());
    }
}
