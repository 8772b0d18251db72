//! The OpenGL/ES driver. `GLDriver` owns every GPU object of the context, and executes
//! the abstract operations of the command stream on the GL thread.
//!
//! Objects are addressed by handles minted by the `HandleArena` on the producer side;
//! the driver constructs, resolves and destructs them. Every native state mutation
//! goes through the `GLState` cache, so calls that would not change anything never
//! reach the driver of the GPU.
//!
//! Once the driver is up, failures never propagate. Unsupported requests degrade into
//! the closest supported thing with a warning in the log, and native errors are
//! reported by `check_gl!` in debug builds.

use std::ptr;
use std::sync::Arc;

use gl;
use gl::types::*;
use smallvec::SmallVec;

use super::blitter::GeometryClear;
use super::capabilities::Capabilities;
use super::objects::*;
use super::state::{GLState, MAX_BUFFER_BINDINGS};
use super::stream::{StreamBlitter, StreamRing, StreamShared};
use super::types::{self, TEXTURE_EXTERNAL_OES, TEXTURE_MAX_ANISOTROPY_EXT};
use crate::errors::*;
use crate::utils::arena::{ArenaObject, HandleArena};
use crate::utils::handle::HandleLike;
use crate::utils::hash::FastHashMap;
use crate::video::assets::prelude::*;
use crate::video::backends::GL;
use crate::video::platform::*;
use crate::video::program::CompiledProgram;
use crate::video::settings::DriverSettings;

/// Number of binding points of sampler groups.
pub const MAX_SAMPLER_BINDINGS: usize = 8;

const CUBEMAP_FACES: [TextureCubemapFace; 6] = [
    TextureCubemapFace::PositiveX,
    TextureCubemapFace::NegativeX,
    TextureCubemapFace::PositiveY,
    TextureCubemapFace::NegativeY,
    TextureCubemapFace::PositiveZ,
    TextureCubemapFace::NegativeZ,
];

pub struct GLDriver {
    gl: Box<dyn GL>,
    platform: Arc<dyn Platform>,
    settings: DriverSettings,
    arena: Arc<HandleArena>,
    caps: Capabilities,
    state: GLState,
    context: PlatformContext,

    // Native sampler objects, keyed by the packed bits of their parameters.
    samplers: FastHashMap<u32, GLuint>,
    sampler_bindings: [SamplerGroupHandle; MAX_SAMPLER_BINDINGS],
    geometry_clear: Option<GeometryClear>,

    streams: Arc<StreamShared>,
    // Textures fed by a stream.
    external_streams: FastHashMap<TextureHandle, StreamHandle>,

    render_pass: Option<(RenderTargetHandle, RenderPassParams)>,
    terminated: bool,
}

impl GLDriver {
    /// Creates the context of the GL thread, makes it current on the calling thread and
    /// brings the driver up.
    pub fn new(
        gl: Box<dyn GL>,
        platform: Arc<dyn Platform>,
        settings: DriverSettings,
        arena: Arc<HandleArena>,
    ) -> Result<Self> {
        let context = match platform.create_context(false) {
            Ok(v) => v,
            Err(err) => {
                error!("Failed to create the context of the driver. {}", err);
                return Err(err);
            }
        };

        if !platform.make_current(context, PlatformSwapChain::NONE, PlatformSwapChain::NONE) {
            platform.destroy_context(context);
            return Err(Error::Context(
                "failed to make the driver context current.".into(),
            ));
        }

        let mut caps = match Capabilities::parse(&*gl).and_then(|v| v.check().map(|_| v)) {
            Ok(v) => v,
            Err(err) => {
                error!("{}", err);
                platform.destroy_context(context);
                return Err(err);
            }
        };

        if let Some(v) = settings.force_geometry_clear {
            caps.bugs.clears_hurt_performance = v;
        }

        if let Some(v) = settings.disable_invalidate_framebuffer {
            caps.bugs.disable_invalidate_framebuffer = v;
        }

        info!("OpenGL driver {:?}.", caps.version);
        info!("Vendor: {}, renderer: {}.", caps.vendor, caps.renderer);
        info!("{:#?}", caps.limits);
        debug!("{:#?}", caps.extensions);
        info!("{:?}", caps.bugs);

        let mut state = GLState::new(&*gl, &caps, settings.texture_units());
        let geometry_clear = if caps.bugs.clears_hurt_performance {
            match GeometryClear::new(&*gl, &mut state, &caps) {
                Ok(v) => Some(v),
                Err(err) => {
                    warn!("Clears fall back to glClear. {}", err);
                    None
                }
            }
        } else {
            None
        };

        check_gl!(&*gl);

        Ok(GLDriver {
            gl,
            platform,
            settings,
            arena,
            caps,
            state,
            context,
            samplers: FastHashMap::default(),
            sampler_bindings: [SamplerGroupHandle::nil(); MAX_SAMPLER_BINDINGS],
            geometry_clear,
            streams: Arc::new(StreamShared::default()),
            external_streams: FastHashMap::default(),
            render_pass: None,
            terminated: false,
        })
    }

    #[inline]
    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    pub fn state(&self) -> &GLState {
        &self.state
    }

    #[inline]
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    #[inline]
    pub fn arena(&self) -> &Arc<HandleArena> {
        &self.arena
    }

    /// The registry of software streams and their pending images.
    #[inline]
    pub fn streams(&self) -> &Arc<StreamShared> {
        &self.streams
    }

    /// Creates the blitter that copies the images of software streams. It must be
    /// moved to the producer thread, where it gets a context of its own.
    pub fn stream_blitter(&self) -> Result<StreamBlitter> {
        StreamBlitter::new(self.streams.clone(), self.platform.clone(), self.gl.shared())
    }

    /// Resolves a handle into the driver object it addresses.
    ///
    /// # Panics
    ///
    /// Debug builds panic if `handle` does not hold a live `T`.
    #[inline]
    pub fn object<T: ArenaObject>(&self, handle: T::Handle) -> &T {
        unsafe { self.arena.get::<T>(handle) }
    }

    /// Number of native sampler objects created so far.
    #[inline]
    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    // The unit textures are bound to while they are being modified.
    #[inline]
    fn dummy_unit(&self) -> usize {
        self.state.units() - 1
    }

    // Textures.

    pub fn create_texture(&mut self, h: TextureHandle, mut params: TextureParams) {
        if let Some(compression) = params.format.compression() {
            if !self.caps.has_compression(compression) {
                let fallback = params.format.uncompressed();
                warn!(
                    "Texture format {:?} is not supported, falls back to {:?}.",
                    params.format, fallback
                );

                params.format = fallback;
            }
        }

        if params.sampler == SamplerType::SamplerExternal && !self.caps.has_external_texture() {
            warn!("External textures are not supported, texture {} falls back to 2D.", h);
            params.sampler = SamplerType::Sampler2D;
        }

        let max_samples = self.caps.limits.max_samples.min(255) as u8;
        params.samples = params.samples.max(1).min(max_samples.max(1));
        params.levels = params.levels.max(1).min(MAX_TEXTURE_LEVELS);

        let internal_format = types::internal_format(params.format, &self.caps);
        let gl = &*self.gl;

        let attachments = TextureUsage::COLOR_ATTACHMENT
            | TextureUsage::DEPTH_ATTACHMENT
            | TextureUsage::STENCIL_ATTACHMENT;

        let renderbuffer = params.sampler == SamplerType::Sampler2D
            && params.usage.intersects(attachments)
            && !params.usage.contains(TextureUsage::SAMPLEABLE);

        let (name, target) = if renderbuffer {
            let name = gl.gen_renderbuffers(1)[0];
            self.state.bind_renderbuffer(gl, name);

            let samples = if params.samples > 1 { params.samples } else { 0 };
            gl.renderbuffer_storage_multisample(
                gl::RENDERBUFFER,
                GLsizei::from(samples),
                internal_format,
                params.width as GLsizei,
                params.height as GLsizei,
            );

            (name, gl::RENDERBUFFER)
        } else {
            if params.samples > 1
                && (params.sampler != SamplerType::Sampler2D || !self.caps.has_multisample_texture())
            {
                warn!(
                    "Multisample textures are not supported, texture {} gets 1 sample.",
                    h
                );

                params.samples = 1;
            }

            let target = types::texture_target(params.sampler, params.samples);
            let name = gl.gen_textures(1)[0];
            let unit = self.dummy_unit();
            self.state.bind_texture(gl, unit, target, name);

            let levels = GLsizei::from(params.levels);
            let (w, h, d) = (
                params.width as GLsizei,
                params.height as GLsizei,
                params.depth as GLsizei,
            );

            match target {
                gl::TEXTURE_2D | gl::TEXTURE_CUBE_MAP => {
                    gl.tex_storage_2d(target, levels, internal_format, w, h);
                }
                gl::TEXTURE_2D_ARRAY | gl::TEXTURE_3D => {
                    gl.tex_storage_3d(target, levels, internal_format, w, h, d);
                }
                gl::TEXTURE_2D_MULTISAMPLE => {
                    gl.tex_storage_2d_multisample(
                        target,
                        GLsizei::from(params.samples),
                        internal_format,
                        w,
                        h,
                    );
                }
                // The storage of external textures is provided by their streams.
                _ => {}
            }

            if target != gl::TEXTURE_2D_MULTISAMPLE && target != TEXTURE_EXTERNAL_OES {
                gl.tex_parameter_i(target, gl::TEXTURE_BASE_LEVEL, 0);
                gl.tex_parameter_i(target, gl::TEXTURE_MAX_LEVEL, levels - 1);
            }

            (name, target)
        };

        debug!(
            "Texture {} created as {} ({:#x}) with {:?}.",
            h, name, target, params
        );

        unsafe {
            self.arena.construct(
                h,
                GLTexture {
                    name,
                    target,
                    internal_format,
                    params,
                    renderbuffer,
                    base_level: 0,
                    max_level: params.levels - 1,
                    stream: StreamHandle::nil(),
                    fence: None,
                },
            );
        }

        check_gl!(gl);
    }

    /// Uploads a `width x height` image into `level` of a 2D texture, at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn update_2d_image(
        &mut self,
        h: TextureHandle,
        level: u8,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        desc: PixelBufferDescriptor,
    ) {
        let t = unsafe { self.arena.get::<GLTexture>(h) };
        if t.target != gl::TEXTURE_2D {
            warn!("Texture {} ({:#x}) can't be updated as a 2D image.", h, t.target);
            return;
        }

        if !check_upload(h, t, &desc, width, height, 1) {
            return;
        }

        let gl = &*self.gl;
        let unit = self.dummy_unit();
        self.state.bind_texture(gl, unit, t.target, t.name);
        set_unpack_store(gl, &mut self.state, &desc);

        let (level, x, y) = (GLint::from(level), x as GLint, y as GLint);
        let (w, ht) = (width as GLsizei, height as GLsizei);
        if desc.compressed.is_some() {
            gl.compressed_tex_sub_image_2d(
                t.target,
                level,
                x,
                y,
                w,
                ht,
                t.internal_format,
                &desc.buffer,
            );
        } else {
            gl.tex_sub_image_2d(
                t.target,
                level,
                x,
                y,
                w,
                ht,
                desc.format.into(),
                desc.ty.into(),
                &desc.buffer,
            );
        }

        check_gl!(gl);
    }

    /// Uploads a `width x height x depth` image into `level` of an array or 3D
    /// texture, at `(x, y, z)`.
    #[allow(clippy::too_many_arguments)]
    pub fn update_3d_image(
        &mut self,
        h: TextureHandle,
        level: u8,
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        desc: PixelBufferDescriptor,
    ) {
        let t = unsafe { self.arena.get::<GLTexture>(h) };
        if t.target != gl::TEXTURE_2D_ARRAY && t.target != gl::TEXTURE_3D {
            warn!("Texture {} ({:#x}) can't be updated as a 3D image.", h, t.target);
            return;
        }

        if !check_upload(h, t, &desc, width, height, depth) {
            return;
        }

        let gl = &*self.gl;
        let unit = self.dummy_unit();
        self.state.bind_texture(gl, unit, t.target, t.name);
        set_unpack_store(gl, &mut self.state, &desc);

        let (level, x, y, z) = (GLint::from(level), x as GLint, y as GLint, z as GLint);
        let (w, ht, d) = (width as GLsizei, height as GLsizei, depth as GLsizei);
        if desc.compressed.is_some() {
            gl.compressed_tex_sub_image_3d(
                t.target,
                level,
                x,
                y,
                z,
                w,
                ht,
                d,
                t.internal_format,
                &desc.buffer,
            );
        } else {
            gl.tex_sub_image_3d(
                t.target,
                level,
                x,
                y,
                z,
                w,
                ht,
                d,
                desc.format.into(),
                desc.ty.into(),
                &desc.buffer,
            );
        }

        check_gl!(gl);
    }

    /// Uploads the six faces of `level` of a cubemap. Face `i` starts at byte
    /// `offsets[i]` of the buffer.
    pub fn update_cube_image(
        &mut self,
        h: TextureHandle,
        level: u8,
        desc: PixelBufferDescriptor,
        offsets: FaceOffsets,
    ) {
        let t = unsafe { self.arena.get::<GLTexture>(h) };
        if t.target != gl::TEXTURE_CUBE_MAP {
            warn!("Texture {} ({:#x}) is not a cubemap.", h, t.target);
            return;
        }

        let (width, height, _) = t.params.level_dimensions(level);
        let gl = &*self.gl;
        let unit = self.dummy_unit();
        self.state.bind_texture(gl, unit, t.target, t.name);
        set_unpack_store(gl, &mut self.state, &desc);

        for (&face, &offset) in CUBEMAP_FACES.iter().zip(offsets.iter()) {
            let data = match desc.buffer.get(offset..) {
                Some(v) => v,
                None => {
                    warn!("Face {:?} of cubemap {} is out of its buffer.", face, h);
                    return;
                }
            };

            let target = types::cubemap_face_target(face);
            let (w, ht) = (width as GLsizei, height as GLsizei);
            if desc.compressed.is_some() {
                gl.compressed_tex_sub_image_2d(
                    target,
                    GLint::from(level),
                    0,
                    0,
                    w,
                    ht,
                    t.internal_format,
                    data,
                );
            } else {
                gl.tex_sub_image_2d(
                    target,
                    GLint::from(level),
                    0,
                    0,
                    w,
                    ht,
                    desc.format.into(),
                    desc.ty.into(),
                    data,
                );
            }
        }

        check_gl!(gl);
    }

    pub fn generate_mipmaps(&mut self, h: TextureHandle) {
        let t = unsafe { self.arena.get::<GLTexture>(h) };
        let mipmappable = !t.renderbuffer
            && !t.params.format.is_compressed()
            && t.target != TEXTURE_EXTERNAL_OES
            && t.target != gl::TEXTURE_2D_MULTISAMPLE;

        if !mipmappable {
            warn!("Mipmaps of texture {} ({:#x}) can't be generated.", h, t.target);
            return;
        }

        let gl = &*self.gl;
        let unit = self.dummy_unit();
        self.state.bind_texture(gl, unit, t.target, t.name);
        gl.generate_mipmap(t.target);
        check_gl!(gl);
    }

    /// Restricts sampling to the levels `[min, max]`.
    pub fn set_min_max_level(&mut self, h: TextureHandle, min: u8, max: u8) {
        let t = unsafe { self.arena.get_mut::<GLTexture>(h) };
        if t.renderbuffer || t.target == TEXTURE_EXTERNAL_OES || t.target == gl::TEXTURE_2D_MULTISAMPLE {
            warn!("Levels of texture {} ({:#x}) can't be restricted.", h, t.target);
            return;
        }

        let gl = &*self.gl;
        let unit = self.dummy_unit();
        self.state.bind_texture(gl, unit, t.target, t.name);
        gl.tex_parameter_i(t.target, gl::TEXTURE_BASE_LEVEL, GLint::from(min));
        gl.tex_parameter_i(t.target, gl::TEXTURE_MAX_LEVEL, GLint::from(max));

        t.base_level = min;
        t.max_level = max;
        check_gl!(gl);
    }

    #[inline]
    pub fn can_generate_mipmaps(&self) -> bool {
        true
    }

    #[inline]
    pub fn is_texture_format_supported(&self, format: TextureFormat) -> bool {
        types::is_texture_format_supported(format, &self.caps)
    }

    #[inline]
    pub fn is_render_target_format_supported(&self, format: TextureFormat) -> bool {
        types::is_render_target_format_supported(format, &self.caps)
    }

    pub fn destroy_texture(&mut self, h: TextureHandle) {
        if self.external_streams.contains_key(&h) {
            self.detach_stream(h);
        }

        let gl = &*self.gl;
        let t = unsafe { self.arena.get_mut::<GLTexture>(h) };
        if t.renderbuffer {
            self.state.delete_renderbuffer(gl, t.name);
        } else {
            self.state.delete_textures(gl, &[t.name]);
        }

        if let Some(fence) = t.fence.take() {
            self.platform.destroy_fence(fence);
        }

        debug!("Texture {} destroyed.", h);
        unsafe { self.arena.destruct::<GLTexture>(h) };
        check_gl!(gl);
    }

    // Render targets.

    /// Creates the render target of the default framebuffer, the one of the current
    /// swap chain.
    pub fn create_default_render_target(&mut self, h: RenderTargetHandle) {
        unsafe {
            self.arena.construct(
                h,
                GLRenderTarget {
                    fbo: 0,
                    width: 0,
                    height: 0,
                    samples: 1,
                    targets: TargetBufferFlags::COLOR_AND_DEPTH,
                    color: GLAttachment::default(),
                    depth: GLAttachment::default(),
                    stencil: GLAttachment::default(),
                },
            );
        }
    }

    pub fn create_render_target(&mut self, h: RenderTargetHandle, params: RenderTargetParams) {
        let fbo = self.gl.gen_framebuffers(1)[0];
        self.state.bind_framebuffer(&*self.gl, gl::FRAMEBUFFER, fbo);

        let max_samples = self.caps.limits.max_samples.min(255) as u8;
        let mut samples = params.samples.max(1).min(max_samples.max(1));

        // Multisampling into single-sampled textures needs an implicit resolve.
        if samples > 1 && !self.caps.has_multisampled_render_to_texture() {
            let arena = &self.arena;
            let plain = [
                (TargetBufferFlags::COLOR, params.color),
                (TargetBufferFlags::DEPTH, params.depth),
                (TargetBufferFlags::STENCIL, params.stencil),
            ]
            .iter()
            .filter(|(flag, info)| params.targets.contains(*flag) && info.handle.is_valid())
            .any(|(_, info)| {
                let t = unsafe { arena.get::<GLTexture>(info.handle) };
                !t.renderbuffer && t.params.samples <= 1
            });

            if plain {
                warn!(
                    "Render target {} can't be multisampled into plain textures, it gets 1 sample.",
                    h
                );

                samples = 1;
            }
        }

        let (width, height) = (params.width, params.height);
        let mut color = GLAttachment::default();
        let mut depth = GLAttachment::default();
        let mut stencil = GLAttachment::default();

        if params.targets.contains(TargetBufferFlags::COLOR) {
            color = self.attach(
                gl::COLOR_ATTACHMENT0,
                params.color,
                TextureFormat::RGBA8,
                samples,
                width,
                height,
            );
        }

        let depth_stencil = params.targets.contains(TargetBufferFlags::DEPTH_AND_STENCIL);
        if depth_stencil && !params.depth.handle.is_valid() && !params.stencil.handle.is_valid() {
            // A packed buffer, as separated depth and stencil renderbuffers are not
            // supported by most implementations.
            depth = self.attach(
                gl::DEPTH_STENCIL_ATTACHMENT,
                params.depth,
                TextureFormat::Depth24Stencil8,
                samples,
                width,
                height,
            );

            stencil = depth;
        } else if depth_stencil && params.depth.handle == params.stencil.handle {
            depth = self.attach(
                gl::DEPTH_STENCIL_ATTACHMENT,
                params.depth,
                TextureFormat::Depth24Stencil8,
                samples,
                width,
                height,
            );

            stencil = depth;
        } else {
            if params.targets.contains(TargetBufferFlags::DEPTH) {
                depth = self.attach(
                    gl::DEPTH_ATTACHMENT,
                    params.depth,
                    TextureFormat::Depth24,
                    samples,
                    width,
                    height,
                );
            }

            if params.targets.contains(TargetBufferFlags::STENCIL) {
                stencil = self.attach(
                    gl::STENCIL_ATTACHMENT,
                    params.stencil,
                    TextureFormat::Stencil8,
                    samples,
                    width,
                    height,
                );
            }
        }

        let status = self.gl.check_framebuffer_status(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            let err = Error::FramebufferIncomplete(format!("status {:#x}", status));
            error!("Render target {} is not usable. {}", h, err);
        }

        debug!(
            "Render target {} created as {} with {} samples.",
            h, fbo, samples
        );

        unsafe {
            self.arena.construct(
                h,
                GLRenderTarget {
                    fbo,
                    width,
                    height,
                    samples,
                    targets: params.targets,
                    color,
                    depth,
                    stencil,
                },
            );
        }

        check_gl!(&*self.gl);
    }

    // Attaches `info` to the framebuffer bound to `GL_FRAMEBUFFER`. A nil texture gets
    // a renderbuffer of `format`, owned by the render target.
    fn attach(
        &mut self,
        attachment: GLenum,
        info: TargetBufferInfo,
        format: TextureFormat,
        samples: u8,
        width: u32,
        height: u32,
    ) -> GLAttachment {
        if !info.handle.is_valid() {
            let renderbuffer = self.gen_renderbuffer(format, samples, width, height);
            self.gl.framebuffer_renderbuffer(
                gl::FRAMEBUFFER,
                attachment,
                gl::RENDERBUFFER,
                renderbuffer,
            );

            return GLAttachment {
                texture: TextureHandle::nil(),
                renderbuffer,
                level: 0,
                layer: 0,
            };
        }

        let gl = &*self.gl;
        let t = unsafe { self.arena.get::<GLTexture>(info.handle) };
        let level = GLint::from(info.level);

        if t.renderbuffer {
            gl.framebuffer_renderbuffer(gl::FRAMEBUFFER, attachment, gl::RENDERBUFFER, t.name);
        } else {
            match t.target {
                gl::TEXTURE_2D if samples > 1 => {
                    gl.framebuffer_texture_2d_multisample(
                        gl::FRAMEBUFFER,
                        attachment,
                        gl::TEXTURE_2D,
                        t.name,
                        level,
                        GLsizei::from(samples),
                    );
                }
                gl::TEXTURE_2D | gl::TEXTURE_2D_MULTISAMPLE => {
                    gl.framebuffer_texture_2d(gl::FRAMEBUFFER, attachment, t.target, t.name, level);
                }
                gl::TEXTURE_CUBE_MAP => {
                    let face = gl::TEXTURE_CUBE_MAP_POSITIVE_X + GLenum::from(info.layer.min(5));
                    gl.framebuffer_texture_2d(gl::FRAMEBUFFER, attachment, face, t.name, level);
                }
                gl::TEXTURE_2D_ARRAY | gl::TEXTURE_3D => {
                    gl.framebuffer_texture_layer(
                        gl::FRAMEBUFFER,
                        attachment,
                        t.name,
                        level,
                        GLint::from(info.layer),
                    );
                }
                _ => warn!(
                    "Texture {} ({:#x}) can't be attached to a render target.",
                    info.handle, t.target
                ),
            }
        }

        GLAttachment {
            texture: info.handle,
            renderbuffer: 0,
            level: info.level,
            layer: info.layer,
        }
    }

    fn gen_renderbuffer(&mut self, format: TextureFormat, samples: u8, width: u32, height: u32) -> GLuint {
        let gl = &*self.gl;
        let name = gl.gen_renderbuffers(1)[0];
        self.state.bind_renderbuffer(gl, name);

        let samples = if samples > 1 { samples } else { 0 };
        gl.renderbuffer_storage_multisample(
            gl::RENDERBUFFER,
            GLsizei::from(samples),
            types::internal_format(format, &self.caps),
            width as GLsizei,
            height as GLsizei,
        );

        name
    }

    pub fn destroy_render_target(&mut self, h: RenderTargetHandle) {
        let gl = &*self.gl;
        let rt = unsafe { self.arena.get::<GLRenderTarget>(h) };

        if rt.fbo != 0 {
            if rt.color.renderbuffer != 0 {
                self.state.delete_renderbuffer(gl, rt.color.renderbuffer);
            }

            if rt.depth.renderbuffer != 0 {
                self.state.delete_renderbuffer(gl, rt.depth.renderbuffer);
            }

            if rt.stencil.renderbuffer != 0 && rt.stencil.renderbuffer != rt.depth.renderbuffer {
                self.state.delete_renderbuffer(gl, rt.stencil.renderbuffer);
            }

            self.state.delete_framebuffer(gl, rt.fbo);
        }

        if let Some((current, _)) = self.render_pass {
            if current == h {
                self.render_pass = None;
            }
        }

        debug!("Render target {} destroyed.", h);
        unsafe { self.arena.destruct::<GLRenderTarget>(h) };
        check_gl!(gl);
    }

    // Buffers.

    pub fn create_vertex_buffer(&mut self, h: VertexBufferHandle, params: VertexBufferParams) {
        let gl = &*self.gl;
        let count = (params.buffer_count as usize).min(MAX_VERTEX_BUFFERS);
        let mut buffers = [0; MAX_VERTEX_BUFFERS];

        if count > 0 {
            for (i, &name) in gl.gen_buffers(count as GLsizei).iter().enumerate() {
                buffers[i] = name;
                self.state.bind_buffer(gl, gl::ARRAY_BUFFER, name);
                gl.buffer_data(
                    gl::ARRAY_BUFFER,
                    params.buffer_size(i as u8) as GLsizeiptr,
                    None,
                    params.usage.into(),
                );
            }
        }

        unsafe {
            self.arena.construct(h, GLVertexBuffer { params, buffers });
        }

        check_gl!(gl);
    }

    /// Writes `desc` into the native buffer `index` of a vertex buffer, starting at
    /// byte `offset`.
    pub fn update_vertex_buffer(
        &mut self,
        h: VertexBufferHandle,
        index: usize,
        desc: BufferDescriptor,
        offset: u32,
    ) {
        let vb = unsafe { self.arena.get::<GLVertexBuffer>(h) };
        if index >= (vb.params.buffer_count as usize).min(MAX_VERTEX_BUFFERS) {
            warn!("Vertex buffer {} has no buffer {}.", h, index);
            return;
        }

        let gl = &*self.gl;
        update_buffer(
            gl,
            &mut self.state,
            gl::ARRAY_BUFFER,
            vb.buffers[index],
            vb.params.buffer_size(index as u8),
            vb.params.usage,
            &desc.data,
            offset as usize,
        );

        check_gl!(gl);
    }

    pub fn destroy_vertex_buffer(&mut self, h: VertexBufferHandle) {
        let gl = &*self.gl;
        let vb = unsafe { self.arena.get::<GLVertexBuffer>(h) };
        for &name in vb.buffers.iter().filter(|&&v| v != 0) {
            self.state.delete_buffer(gl, name, gl::ARRAY_BUFFER);
        }

        unsafe { self.arena.destruct::<GLVertexBuffer>(h) };
        check_gl!(gl);
    }

    pub fn create_index_buffer(
        &mut self,
        h: IndexBufferHandle,
        format: IndexFormat,
        count: u32,
        usage: BufferUsage,
    ) {
        let gl = &*self.gl;
        let buffer = gl.gen_buffers(1)[0];

        // Keeps the vertex array objects of primitives away from the binding.
        self.state.bind_vertex_array(gl, None);
        self.state.bind_buffer(gl, gl::ELEMENT_ARRAY_BUFFER, buffer);
        gl.buffer_data(
            gl::ELEMENT_ARRAY_BUFFER,
            (count as usize * format.size()) as GLsizeiptr,
            None,
            usage.into(),
        );

        unsafe {
            self.arena.construct(
                h,
                GLIndexBuffer {
                    buffer,
                    format,
                    count,
                    usage,
                },
            );
        }

        check_gl!(gl);
    }

    pub fn update_index_buffer(&mut self, h: IndexBufferHandle, desc: BufferDescriptor, offset: u32) {
        let ib = unsafe { self.arena.get::<GLIndexBuffer>(h) };
        let gl = &*self.gl;
        update_buffer(
            gl,
            &mut self.state,
            gl::ELEMENT_ARRAY_BUFFER,
            ib.buffer,
            ib.count as usize * ib.format.size(),
            ib.usage,
            &desc.data,
            offset as usize,
        );

        check_gl!(gl);
    }

    pub fn destroy_index_buffer(&mut self, h: IndexBufferHandle) {
        let gl = &*self.gl;
        let ib = unsafe { self.arena.get::<GLIndexBuffer>(h) };
        self.state.delete_buffer(gl, ib.buffer, gl::ELEMENT_ARRAY_BUFFER);

        unsafe { self.arena.destruct::<GLIndexBuffer>(h) };
        check_gl!(gl);
    }

    pub fn create_uniform_buffer(&mut self, h: UniformBufferHandle, size: u32, usage: BufferUsage) {
        let gl = &*self.gl;
        let buffer = gl.gen_buffers(1)[0];
        self.state.bind_buffer(gl, gl::UNIFORM_BUFFER, buffer);
        gl.buffer_data(gl::UNIFORM_BUFFER, size as GLsizeiptr, None, usage.into());

        unsafe {
            self.arena.construct(h, GLUniformBuffer { buffer, size, usage });
        }

        check_gl!(gl);
    }

    /// Replaces the content of a uniform buffer, from its start.
    pub fn load_uniform_buffer(&mut self, h: UniformBufferHandle, desc: BufferDescriptor) {
        let ub = unsafe { self.arena.get::<GLUniformBuffer>(h) };
        let gl = &*self.gl;
        update_buffer(
            gl,
            &mut self.state,
            gl::UNIFORM_BUFFER,
            ub.buffer,
            ub.size as usize,
            ub.usage,
            &desc.data,
            0,
        );

        check_gl!(gl);
    }

    fn uniform_binding_point(&self, index: usize) -> bool {
        let max = (self.caps.limits.max_uniform_buffer_bindings as usize).min(MAX_BUFFER_BINDINGS);
        if index >= max {
            warn!("Uniform buffer binding point {} is out of [0, {}).", index, max);
            false
        } else {
            true
        }
    }

    /// Binds the whole uniform buffer to binding point `index`.
    pub fn bind_uniform_buffer(&mut self, index: usize, h: UniformBufferHandle) {
        if !self.uniform_binding_point(index) {
            return;
        }

        let ub = unsafe { self.arena.get::<GLUniformBuffer>(h) };
        self.state.bind_buffer_range(
            &*self.gl,
            gl::UNIFORM_BUFFER,
            index,
            ub.buffer,
            0,
            ub.size as GLsizeiptr,
        );
    }

    /// Binds `size` bytes of the uniform buffer starting at `offset` to binding point
    /// `index`. `offset` must be a multiple of the offset alignment of the context.
    pub fn bind_uniform_buffer_range(
        &mut self,
        index: usize,
        h: UniformBufferHandle,
        offset: u32,
        size: u32,
    ) {
        if !self.uniform_binding_point(index) {
            return;
        }

        debug_assert!(offset % self.caps.limits.uniform_buffer_offset_alignment == 0);

        let ub = unsafe { self.arena.get::<GLUniformBuffer>(h) };
        self.state.bind_buffer_range(
            &*self.gl,
            gl::UNIFORM_BUFFER,
            index,
            ub.buffer,
            offset as GLintptr,
            size as GLsizeiptr,
        );
    }

    pub fn unbind_uniform_buffer(&mut self, index: usize) {
        if self.uniform_binding_point(index) {
            self.state.bind_buffer_range(&*self.gl, gl::UNIFORM_BUFFER, index, 0, 0, 0);
        }
    }

    pub fn destroy_uniform_buffer(&mut self, h: UniformBufferHandle) {
        let gl = &*self.gl;
        let ub = unsafe { self.arena.get::<GLUniformBuffer>(h) };
        self.state.delete_buffer(gl, ub.buffer, gl::UNIFORM_BUFFER);

        unsafe { self.arena.destruct::<GLUniformBuffer>(h) };
        check_gl!(gl);
    }

    // Render primitives.

    pub fn create_render_primitive(&mut self, h: RenderPrimitiveHandle) {
        let vao = self.state.gen_vertex_array(&*self.gl);

        unsafe {
            self.arena.construct(
                h,
                GLRenderPrimitive {
                    vao,
                    element_array: 0,
                    index_type: gl::UNSIGNED_SHORT,
                    index_size: 2,
                    primitive: gl::TRIANGLES,
                    offset: 0,
                    min_index: 0,
                    max_index: 0,
                    count: 0,
                    enabled: 0,
                },
            );
        }
    }

    /// Records the vertex attributes of `vb` and the indices of `ib` into the vertex
    /// array object of a primitive.
    pub fn set_render_primitive_buffer(
        &mut self,
        h: RenderPrimitiveHandle,
        vb: VertexBufferHandle,
        ib: IndexBufferHandle,
    ) {
        let gl = &*self.gl;
        let vb = unsafe { self.arena.get::<GLVertexBuffer>(vb) };
        let ib = unsafe { self.arena.get::<GLIndexBuffer>(ib) };
        let rp = unsafe { self.arena.get_mut::<GLRenderPrimitive>(h) };

        self.state.bind_vertex_array(gl, Some(rp.vao));

        let mut enabled = 0u8;
        for (i, attr) in vb.params.attributes.iter().enumerate() {
            let index = i as GLuint;
            let buffer = vb.buffers.get(attr.buffer as usize).cloned().unwrap_or(0);

            if attr.is_enabled() && buffer != 0 {
                self.state.bind_buffer(gl, gl::ARRAY_BUFFER, buffer);

                let size = GLint::from(attr.element.components());
                let ty = types::element_type(attr.element);
                let stride = GLsizei::from(attr.stride);
                if attr.flags.contains(AttributeFlags::INTEGER_TARGET) {
                    gl.vertex_attrib_i_pointer(index, size, ty, stride, attr.offset);
                } else {
                    let normalized = attr.flags.contains(AttributeFlags::NORMALIZED);
                    gl.vertex_attrib_pointer(index, size, ty, normalized, stride, attr.offset);
                }

                gl.enable_vertex_attrib_array(index);
                enabled |= 1 << i;
            } else if rp.enabled & (1 << i) != 0 {
                gl.disable_vertex_attrib_array(index);
                gl.vertex_attrib_4f(index, 0.0, 0.0, 0.0, 0.0);
            }
        }

        self.state.bind_buffer(gl, gl::ELEMENT_ARRAY_BUFFER, ib.buffer);

        rp.enabled = enabled;
        rp.element_array = ib.buffer;
        rp.index_type = ib.format.into();
        rp.index_size = ib.format.size() as u8;
        check_gl!(gl);
    }

    /// Sets the range of indices drawn. `offset` is counted in indices.
    pub fn set_render_primitive_range(
        &mut self,
        h: RenderPrimitiveHandle,
        primitive: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    ) {
        let rp = unsafe { self.arena.get_mut::<GLRenderPrimitive>(h) };
        rp.primitive = primitive.into();
        rp.offset = offset * u32::from(rp.index_size);
        rp.min_index = min_index;
        rp.max_index = max_index;
        rp.count = count;
    }

    pub fn destroy_render_primitive(&mut self, h: RenderPrimitiveHandle) {
        let rp = unsafe { self.arena.get::<GLRenderPrimitive>(h) };
        self.state.delete_vertex_array(&*self.gl, rp.vao);
        unsafe { self.arena.destruct::<GLRenderPrimitive>(h) };
    }

    // Samplers.

    // Returns the native sampler object of `params`, creating it on first use.
    fn sampler(&mut self, params: SamplerParams) -> GLuint {
        let bits = params.bits();
        if let Some(&v) = self.samplers.get(&bits) {
            return v;
        }

        let gl = &*self.gl;
        let sampler = gl.gen_samplers(1)[0];
        let set = |name: GLenum, v: GLenum| gl.sampler_parameter_i(sampler, name, v as GLint);

        set(gl::TEXTURE_MIN_FILTER, params.min.into());
        set(gl::TEXTURE_MAG_FILTER, params.mag.into());
        set(gl::TEXTURE_WRAP_S, params.wrap_s.into());
        set(gl::TEXTURE_WRAP_T, params.wrap_t.into());
        set(gl::TEXTURE_WRAP_R, params.wrap_r.into());
        set(gl::TEXTURE_COMPARE_MODE, params.compare_mode.into());
        set(gl::TEXTURE_COMPARE_FUNC, params.compare_func.into());

        if self.caps.extensions.gl_ext_texture_filter_anisotropic {
            let anisotropy = (1u32 << params.anisotropy_log2.min(7)) as f32;
            gl.sampler_parameter_f(sampler, TEXTURE_MAX_ANISOTROPY_EXT, anisotropy);
        }

        trace!("Sampler {} created for {:?}.", sampler, params);
        self.samplers.insert(bits, sampler);
        sampler
    }

    pub fn create_sampler_group(&mut self, h: SamplerGroupHandle, size: usize) {
        let entries = vec![None; size.min(MAX_SAMPLER_COUNT)];
        unsafe {
            self.arena.construct(h, GLSamplerGroup { entries });
        }
    }

    pub fn update_sampler_group(&mut self, h: SamplerGroupHandle, desc: SamplerGroupDescriptor) {
        let entries: Vec<_> = desc
            .entries
            .iter()
            .take(MAX_SAMPLER_COUNT)
            .map(|v| {
                v.map(|entry| GLSamplerBinding {
                    texture: entry.texture,
                    sampler: self.sampler(entry.params),
                })
            })
            .collect();

        unsafe { self.arena.get_mut::<GLSamplerGroup>(h) }.entries = entries;
        check_gl!(&*self.gl);
    }

    pub fn bind_sampler_group(&mut self, binding: usize, h: SamplerGroupHandle) {
        match self.sampler_bindings.get_mut(binding) {
            Some(v) => *v = h,
            None => warn!("Sampler group binding point {} is out of range.", binding),
        }
    }

    pub fn destroy_sampler_group(&mut self, h: SamplerGroupHandle) {
        for v in self.sampler_bindings.iter_mut().filter(|v| **v == h) {
            *v = SamplerGroupHandle::nil();
        }

        unsafe { self.arena.destruct::<GLSamplerGroup>(h) };
    }

    // Programs and draws.

    /// Binds texture `h` to `unit`. If the current image of a stream is still being
    /// produced, waits for it first.
    pub fn bind_texture(&mut self, unit: usize, h: TextureHandle) {
        let t = unsafe { self.arena.get_mut::<GLTexture>(h) };
        if t.renderbuffer {
            warn!("Texture {} is not sampleable.", h);
            return;
        }

        if let Some(fence) = t.fence {
            match self.platform.wait_fence(fence, self.settings.fence_timeout_ns) {
                FenceStatus::ConditionSatisfied => {
                    self.platform.destroy_fence(fence);
                    t.fence = None;
                }
                FenceStatus::TimeoutExpired => {
                    warn!("Texture {} is sampled before its stream image is ready.", h);
                }
                FenceStatus::Error => {
                    warn!("Fence of the stream image of texture {} failed.", h);
                    self.platform.destroy_fence(fence);
                    t.fence = None;
                }
            }
        }

        self.state.bind_texture(&*self.gl, unit, t.target, t.name);
    }

    /// Makes `program` current, and binds the textures and samplers of the sampler
    /// groups it reads from.
    pub fn use_program(&mut self, program: &dyn CompiledProgram) {
        self.state.use_program(&*self.gl, program.id());

        for slot in program.sampler_slots() {
            let group = match self.sampler_bindings.get(slot.binding as usize) {
                Some(v) if v.is_valid() => *v,
                _ => continue,
            };

            let entries = &unsafe { self.arena.get::<GLSamplerGroup>(group) }.entries;
            let entry = match entries.get(slot.index as usize) {
                Some(Some(v)) if v.texture.is_valid() => *v,
                _ => continue,
            };

            let unit = slot.unit as usize;
            if unit >= self.state.units() {
                warn!("Texture unit {} is out of range.", unit);
                continue;
            }

            self.bind_texture(unit, entry.texture);
            self.state.bind_sampler(&*self.gl, unit, entry.sampler);
        }
    }

    pub fn set_raster_state(&mut self, rs: &RasterState) {
        let gl = &*self.gl;
        let state = &mut self.state;

        match types::culling(rs.culling) {
            Some(mode) => {
                state.cull_face(gl, mode);
                state.enable(gl, gl::CULL_FACE);
            }
            None => state.disable(gl, gl::CULL_FACE),
        }

        state.front_face(gl, rs.front_face.into());

        if rs.has_blending() {
            state.enable(gl, gl::BLEND);
            state.blend_equation(
                gl,
                rs.blend_equation_rgb.into(),
                rs.blend_equation_alpha.into(),
            );

            state.blend_function(
                gl,
                rs.blend_src_rgb.into(),
                rs.blend_src_alpha.into(),
                rs.blend_dst_rgb.into(),
                rs.blend_dst_alpha.into(),
            );
        } else {
            state.disable(gl, gl::BLEND);
        }

        if rs.has_depth_test() {
            state.enable(gl, gl::DEPTH_TEST);
            state.depth_func(gl, rs.depth_func.into());
        } else {
            state.disable(gl, gl::DEPTH_TEST);
        }

        state.depth_mask(gl, rs.depth_write);
        state.color_mask(gl, rs.color_write);
        state.set_capability(gl, gl::SAMPLE_ALPHA_TO_COVERAGE, rs.alpha_to_coverage);
    }

    pub fn draw(&mut self, pipeline: &PipelineState, h: RenderPrimitiveHandle) {
        self.use_program(&*pipeline.program);
        self.set_raster_state(&pipeline.raster);

        let gl = &*self.gl;
        let offset = pipeline.polygon_offset;
        self.state.polygon_offset(gl, offset.slope, offset.constant);

        let rp = unsafe { self.arena.get::<GLRenderPrimitive>(h) };
        self.state.bind_vertex_array(gl, Some(rp.vao));

        if rp.count > 0 {
            gl.draw_range_elements(
                rp.primitive,
                rp.min_index,
                rp.max_index,
                rp.count as GLsizei,
                rp.index_type,
                rp.offset,
            );
        }

        check_gl!(gl);
    }

    // Render passes.

    pub fn begin_render_pass(&mut self, h: RenderTargetHandle, params: RenderPassParams) {
        let rt = unsafe { self.arena.get::<GLRenderTarget>(h) };
        let (fbo, targets) = (rt.fbo, rt.targets);

        let gl = &*self.gl;
        self.state.bind_framebuffer(gl, gl::FRAMEBUFFER, fbo);
        self.discard(fbo, params.flags.discard_start & targets);

        let vp = params.viewport;
        self.state.viewport(gl, vp.left, vp.bottom, vp.width as GLsizei, vp.height as GLsizei);

        let clear = params.flags.clear & targets;
        if !clear.is_empty() {
            let scissor = params.flags.ignore_scissor && self.state.is_enabled(gl::SCISSOR_TEST);
            if scissor {
                self.state.disable(gl, gl::SCISSOR_TEST);
            }

            let color = if clear.contains(TargetBufferFlags::COLOR) {
                Some(params.clear_color)
            } else {
                None
            };

            let depth = if clear.contains(TargetBufferFlags::DEPTH) {
                Some(params.clear_depth as f32)
            } else {
                None
            };

            match self.geometry_clear {
                Some(ref clearer)
                    if self.caps.bugs.clears_hurt_performance
                        && !clear.contains(TargetBufferFlags::STENCIL) =>
                {
                    clearer.clear(gl, &mut self.state, color, depth);
                }
                _ => {
                    let state = &mut self.state;
                    if let Some(v) = color {
                        state.clear_color(gl, v);
                        state.color_mask(gl, true);
                    }

                    if let Some(v) = depth {
                        state.clear_depth(gl, v);
                        state.depth_mask(gl, true);
                    }

                    if clear.contains(TargetBufferFlags::STENCIL) {
                        state.clear_stencil(gl, params.clear_stencil as GLint);
                    }

                    gl.clear(types::buffer_bits(clear));
                }
            }

            if scissor {
                self.state.enable(gl, gl::SCISSOR_TEST);
            }
        }

        self.render_pass = Some((h, params));
        check_gl!(gl);
    }

    pub fn end_render_pass(&mut self) {
        let (h, params) = match self.render_pass.take() {
            Some(v) => v,
            None => {
                warn!("No render pass to end.");
                return;
            }
        };

        let rt = unsafe { self.arena.get::<GLRenderTarget>(h) };
        let (fbo, targets) = (rt.fbo, rt.targets);

        self.state.bind_framebuffer(&*self.gl, gl::FRAMEBUFFER, fbo);
        self.discard(fbo, params.flags.discard_end & targets);
        check_gl!(&*self.gl);
    }

    // Invalidates the buffers of the framebuffer `fbo`, which must be bound.
    fn discard(&self, fbo: GLuint, buffers: TargetBufferFlags) {
        if buffers.is_empty()
            || !self.caps.has_invalidate_framebuffer()
            || self.caps.bugs.disable_invalidate_framebuffer
        {
            return;
        }

        let mut attachments: SmallVec<[GLenum; 3]> = SmallVec::new();
        if buffers.contains(TargetBufferFlags::COLOR) {
            attachments.push(if fbo == 0 { gl::COLOR } else { gl::COLOR_ATTACHMENT0 });
        }

        if buffers.contains(TargetBufferFlags::DEPTH) {
            attachments.push(if fbo == 0 { gl::DEPTH } else { gl::DEPTH_ATTACHMENT });
        }

        if buffers.contains(TargetBufferFlags::STENCIL) {
            attachments.push(if fbo == 0 { gl::STENCIL } else { gl::STENCIL_ATTACHMENT });
        }

        self.gl.invalidate_framebuffer(gl::FRAMEBUFFER, &attachments);
    }

    /// Restricts the following draws to `scissor`.
    pub fn set_viewport_scissor(&mut self, scissor: Viewport) {
        let gl = &*self.gl;
        self.state.enable(gl, gl::SCISSOR_TEST);
        self.state.scissor(
            gl,
            scissor.left,
            scissor.bottom,
            scissor.width as GLsizei,
            scissor.height as GLsizei,
        );
    }

    // Blits and read-backs.

    /// Copies the `buffers` of `src_rect` in `src` into `dst_rect` in `dst`.
    pub fn blit(
        &mut self,
        buffers: TargetBufferFlags,
        dst: RenderTargetHandle,
        dst_rect: Viewport,
        src: RenderTargetHandle,
        src_rect: Viewport,
        filter: SamplerMagFilter,
    ) {
        let src_fbo = unsafe { self.arena.get::<GLRenderTarget>(src) }.fbo;
        let dst_fbo = unsafe { self.arena.get::<GLRenderTarget>(dst) }.fbo;

        let gl = &*self.gl;
        self.state.bind_framebuffer(gl, gl::READ_FRAMEBUFFER, src_fbo);
        self.state.bind_framebuffer(gl, gl::DRAW_FRAMEBUFFER, dst_fbo);
        self.state.disable(gl, gl::SCISSOR_TEST);

        gl.blit_framebuffer(
            src_rect.left,
            src_rect.bottom,
            src_rect.right(),
            src_rect.top(),
            dst_rect.left,
            dst_rect.bottom,
            dst_rect.right(),
            dst_rect.top(),
            types::buffer_bits(buffers),
            filter.into(),
        );

        check_gl!(gl);
    }

    /// Reads the color buffer of a render target back into `desc`. The rows are
    /// returned top-down.
    pub fn read_pixels(
        &mut self,
        h: RenderTargetHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        desc: PixelBufferDescriptor,
    ) -> PixelBufferDescriptor {
        let fbo = unsafe { self.arena.get::<GLRenderTarget>(h) }.fbo;
        let gl = &*self.gl;
        self.state.bind_framebuffer(gl, gl::READ_FRAMEBUFFER, fbo);

        let desc = read_back(gl, &mut self.state, x, y, width, height, desc);
        check_gl!(gl);
        desc
    }

    /// Reads the image of a software stream the GL thread currently samples back
    /// into `desc`.
    #[allow(clippy::too_many_arguments)]
    pub fn read_stream_pixels(
        &mut self,
        h: StreamHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        desc: PixelBufferDescriptor,
    ) -> PixelBufferDescriptor {
        let ring = match unsafe { self.arena.get::<GLStream>(h) }.ring {
            Some(ref v) => v.clone(),
            None => {
                warn!("Stream {} is native, its images can't be read back.", h);
                return desc;
            }
        };

        if ring.bound_storage(ring.consumer_slot()).is_none() {
            warn!("Stream {} has no image to read back yet.", h);
            return desc;
        }

        // The read names are external textures, which can't be attached. The write
        // name of the sampled slot is a 2D view of the same storage.
        let gl = &*self.gl;
        let fbo = gl.gen_framebuffers(1)[0];
        self.state.bind_framebuffer(gl, gl::READ_FRAMEBUFFER, fbo);
        gl.framebuffer_texture_2d(
            gl::READ_FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            ring.consumer_write_name(),
            0,
        );

        let desc = read_back(gl, &mut self.state, x, y, width, height, desc);
        self.state.delete_framebuffer(gl, fbo);
        check_gl!(gl);
        desc
    }

    // Streams.

    /// Creates a stream. A stream is native if it wraps a platform stream supplied
    /// by the caller, and software otherwise.
    pub fn create_stream(&mut self, h: StreamHandle, native: Option<NativeStream>) {
        let stream = self.platform.create_stream(native);
        let (kind, ring) = match native {
            Some(_) => (StreamType::Native, None),
            None => {
                let ring = Arc::new(StreamRing::new(&*self.gl, stream));
                self.streams.register(h, ring.clone());
                (StreamType::Software, Some(ring))
            }
        };

        debug!("Stream {} created as {:?}.", h, kind);

        unsafe {
            self.arena.construct(
                h,
                GLStream {
                    stream,
                    kind,
                    ring,
                    timestamp: 0,
                },
            );
        }
    }

    /// Sets the size of the images produced by a software stream.
    pub fn set_stream_dimensions(&mut self, h: StreamHandle, width: u32, height: u32) {
        match unsafe { self.arena.get::<GLStream>(h) }.ring {
            Some(ref ring) => ring.set_dimensions(width, height),
            None => warn!("Stream {} is native, its images are sized by the platform.", h),
        }
    }

    /// The timestamp of the last image of the stream latched by the GL thread.
    pub fn get_stream_timestamp(&self, h: StreamHandle) -> i64 {
        unsafe { self.arena.get::<GLStream>(h) }.timestamp
    }

    /// Replaces the stream feeding texture `texture`, or detaches it if `stream` is
    /// `None`.
    pub fn set_external_stream(&mut self, texture: TextureHandle, stream: Option<StreamHandle>) {
        if self.external_streams.contains_key(&texture) {
            self.detach_stream(texture);
        }

        if let Some(stream) = stream {
            self.attach_stream(texture, stream);
        }

        check_gl!(&*self.gl);
    }

    fn attach_stream(&mut self, texture: TextureHandle, stream: StreamHandle) {
        let s = unsafe { self.arena.get::<GLStream>(stream) };
        let t = unsafe { self.arena.get_mut::<GLTexture>(texture) };

        let valid = match s.kind {
            StreamType::Native => t.target == TEXTURE_EXTERNAL_OES,
            StreamType::Software => t.target == TEXTURE_EXTERNAL_OES || t.target == gl::TEXTURE_2D,
        };

        if !valid || t.renderbuffer {
            warn!(
                "Texture {} ({:#x}) can't be fed by {:?} stream {}.",
                texture, t.target, s.kind, stream
            );

            return;
        }

        match s.ring {
            None => self.platform.attach(s.stream, t.name),
            Some(ref ring) => {
                // The texture samples the ring from now on.
                self.state.delete_textures(&*self.gl, &[t.name]);
                t.name = ring.consumer_name();
                ring.set_texture(texture);
            }
        }

        t.stream = stream;
        self.external_streams.insert(texture, stream);
        debug!("Stream {} attached to texture {}.", stream, texture);
    }

    fn detach_stream(&mut self, texture: TextureHandle) {
        let stream = match self.external_streams.remove(&texture) {
            Some(v) => v,
            None => return,
        };

        let gl = &*self.gl;
        let s = unsafe { self.arena.get::<GLStream>(stream) };
        let t = unsafe { self.arena.get_mut::<GLTexture>(texture) };

        self.state.unbind_texture(gl, t.target, t.name);
        match s.ring {
            // Detaching invalidates the texture name.
            None => self.platform.detach(s.stream),
            Some(ref ring) => ring.set_texture(TextureHandle::nil()),
        }

        t.name = gl.gen_textures(1)[0];
        t.stream = StreamHandle::nil();
        if let Some(fence) = t.fence.take() {
            self.platform.destroy_fence(fence);
        }

        debug!("Stream {} detached from texture {}.", stream, texture);
    }

    pub fn destroy_stream(&mut self, h: StreamHandle) {
        let textures: Vec<_> = self
            .external_streams
            .iter()
            .filter(|(_, &v)| v == h)
            .map(|(&k, _)| k)
            .collect();

        for texture in textures {
            self.detach_stream(texture);
        }

        let gl = &*self.gl;
        let s = unsafe { self.arena.get::<GLStream>(h) };
        if let Some(ref ring) = s.ring {
            self.streams.unregister(h);
            ring.destroy(gl, &mut self.state, &*self.platform);

            while let Some(message) = self.streams.take_pending(h) {
                self.platform.destroy_fence(message.fence);
            }
        }

        self.platform.destroy_stream(s.stream);

        debug!("Stream {} destroyed.", h);
        unsafe { self.arena.destruct::<GLStream>(h) };
        check_gl!(gl);
    }

    // Frames.

    /// Latches the images of every stream for the frame to come.
    pub fn begin_frame(&mut self, monotonic_ns: i64, frame_id: u32) {
        trace!("Frame {} begins at {}ns.", frame_id, monotonic_ns);

        let gl = &*self.gl;
        let unit = self.dummy_unit();
        let external = &self.external_streams;
        let messages = self
            .streams
            .drain(|v| external.get(&v.texture) == Some(&v.stream));

        for (message, accepted) in messages {
            if !accepted {
                warn!(
                    "Image of stream {} is dropped, texture {} is not fed by it anymore.",
                    message.stream, message.texture
                );

                self.platform.destroy_fence(message.fence);
                continue;
            }

            let t = unsafe { self.arena.get_mut::<GLTexture>(message.texture) };
            if let Some(ref ring) = unsafe { self.arena.get::<GLStream>(message.stream) }.ring {
                // Images of superseded messages may have left the slot on a new storage.
                if ring.bound_storage(message.slot) != ring.storage(message.slot) {
                    self.state.bind_texture(gl, unit, t.target, message.read_name);
                    ring.rebind(&*self.platform, t.target, message.slot);
                }
            }

            t.name = message.read_name;
            if let Some(fence) = t.fence.replace(message.fence) {
                self.platform.destroy_fence(fence);
            }

            unsafe { self.arena.get_mut::<GLStream>(message.stream) }.timestamp = message.timestamp;
        }

        for (&texture, &stream) in self.external_streams.iter() {
            let s = unsafe { self.arena.get_mut::<GLStream>(stream) };
            if s.kind == StreamType::Native {
                let t = unsafe { self.arena.get::<GLTexture>(texture) };
                self.state.bind_texture(gl, unit, t.target, t.name);
                s.timestamp = self.platform.update_tex_image(s.stream);
            }
        }

        check_gl!(gl);
    }

    pub fn end_frame(&mut self, frame_id: u32) {
        trace!("Frame {} ends.", frame_id);
        check_gl!(&*self.gl);
    }

    pub fn flush(&mut self) {
        self.gl.flush();
    }

    pub fn finish(&mut self) {
        self.gl.finish();
    }

    // Fences.

    pub fn create_fence(&mut self, h: FenceHandle) {
        let fence = self.platform.create_fence();
        unsafe {
            self.arena.construct(h, GLFence { fence: Some(fence) });
        }
    }

    pub fn wait_fence(&mut self, h: FenceHandle, timeout: u64) -> FenceStatus {
        match unsafe { self.arena.get::<GLFence>(h) }.fence {
            Some(v) => self.platform.wait_fence(v, timeout),
            None => FenceStatus::Error,
        }
    }

    pub fn destroy_fence(&mut self, h: FenceHandle) {
        if let Some(v) = unsafe { self.arena.get_mut::<GLFence>(h) }.fence.take() {
            self.platform.destroy_fence(v);
        }

        unsafe { self.arena.destruct::<GLFence>(h) };
    }

    // Swap chains.

    pub fn create_swap_chain(&mut self, h: SwapChainHandle, window: NativeWindow, flags: SwapChainFlags) {
        let swap_chain = self.platform.create_swap_chain(window, flags);
        unsafe {
            self.arena.construct(h, GLSwapChain { swap_chain, flags });
        }
    }

    pub fn create_headless_swap_chain(
        &mut self,
        h: SwapChainHandle,
        width: u32,
        height: u32,
        flags: SwapChainFlags,
    ) {
        let swap_chain = self.platform.create_headless_swap_chain(width, height, flags);
        unsafe {
            self.arena.construct(h, GLSwapChain { swap_chain, flags });
        }
    }

    pub fn destroy_swap_chain(&mut self, h: SwapChainHandle) {
        let swap_chain = unsafe { self.arena.get::<GLSwapChain>(h) }.swap_chain;
        self.platform.destroy_swap_chain(swap_chain);
        unsafe { self.arena.destruct::<GLSwapChain>(h) };
    }

    /// Makes the driver context current with the surfaces of `draw` and `read`.
    pub fn make_current(&mut self, draw: SwapChainHandle, read: SwapChainHandle) {
        let d = unsafe { self.arena.get::<GLSwapChain>(draw) }.swap_chain;
        let r = unsafe { self.arena.get::<GLSwapChain>(read) }.swap_chain;

        if !self.platform.make_current(self.context, d, r) {
            error!("Failed to make swap chains {} and {} current.", draw, read);
        }
    }

    /// Presents the content of a swap chain.
    pub fn commit(&mut self, h: SwapChainHandle) {
        let swap_chain = unsafe { self.arena.get::<GLSwapChain>(h) }.swap_chain;
        self.platform.commit(swap_chain);
    }

    /// Releases the objects owned by the driver itself and destroys its context.
    /// Objects created through handles must be destroyed before.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }

        let gl = &*self.gl;
        let samplers: Vec<_> = self.samplers.drain().map(|(_, v)| v).collect();
        if !samplers.is_empty() {
            self.state.delete_samplers(gl, &samplers);
        }

        if let Some(clearer) = self.geometry_clear.take() {
            clearer.terminate(gl, &mut self.state);
        }

        self.state.terminate(gl);
        check_gl!(gl);

        self.platform.destroy_context(self.context);
        self.terminated = true;
        info!("OpenGL driver terminated.");
    }
}

impl Drop for GLDriver {
    fn drop(&mut self) {
        if !self.terminated {
            warn!("GLDriver dropped without being terminated.");
        }
    }
}

// Rejects uploads whose data doesn't fit the texture, or is too short.
fn check_upload(
    h: TextureHandle,
    t: &GLTexture,
    desc: &PixelBufferDescriptor,
    width: u32,
    height: u32,
    depth: u32,
) -> bool {
    match desc.compressed {
        Some(format) if format != t.params.format => {
            warn!(
                "Compressed {:?} data can't be uploaded into {:?} texture {}.",
                format, t.params.format, h
            );

            false
        }
        Some(_) => true,
        None if t.params.format.is_compressed() => {
            warn!("Compressed texture {} only accepts compressed data.", h);
            false
        }
        None => {
            let layers = depth.max(1) as usize - 1;
            let required = desc.row_size(width) * height as usize * layers
                + desc.required_size(width, height);

            if desc.buffer.len() < required {
                warn!(
                    "Upload into texture {} needs {} bytes, but got {}.",
                    h,
                    required,
                    desc.buffer.len()
                );

                false
            } else {
                true
            }
        }
    }
}

fn set_unpack_store(gl: &dyn GL, state: &mut GLState, desc: &PixelBufferDescriptor) {
    state.pixel_store(gl, gl::UNPACK_ALIGNMENT, GLint::from(desc.alignment.max(1)));
    state.pixel_store(gl, gl::UNPACK_ROW_LENGTH, desc.stride as GLint);
    state.pixel_store(gl, gl::UNPACK_SKIP_PIXELS, desc.left as GLint);
    state.pixel_store(gl, gl::UNPACK_SKIP_ROWS, desc.top as GLint);
}

// Reads the framebuffer bound to `GL_READ_FRAMEBUFFER` into `desc`.
fn read_back(
    gl: &dyn GL,
    state: &mut GLState,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    mut desc: PixelBufferDescriptor,
) -> PixelBufferDescriptor {
    state.pixel_store(gl, gl::PACK_ALIGNMENT, GLint::from(desc.alignment.max(1)));
    state.pixel_store(gl, gl::PACK_ROW_LENGTH, desc.stride as GLint);
    state.pixel_store(gl, gl::PACK_SKIP_PIXELS, desc.left as GLint);
    state.pixel_store(gl, gl::PACK_SKIP_ROWS, desc.top as GLint);

    let required = desc.required_size(width, height);
    if desc.buffer.len() < required {
        warn!(
            "Read-back buffer of {} bytes is grown to {} bytes.",
            desc.buffer.len(),
            required
        );

        desc.buffer.resize(required, 0);
    }

    gl.read_pixels(
        x as GLint,
        y as GLint,
        width as GLsizei,
        height as GLsizei,
        desc.format.into(),
        desc.ty.into(),
        &mut desc.buffer,
    );

    flip_rows(&mut desc, width, height);
    desc
}

/// Flips the rows of the `width x height` image placed in `desc` upside down. GL
/// returns rows bottom-up.
pub fn flip_rows(desc: &mut PixelBufferDescriptor, width: u32, height: u32) {
    let bpp = PixelBufferDescriptor::pixel_size(desc.format, desc.ty);
    let bpr = desc.row_size(width);
    let start = desc.left as usize * bpp;
    let len = width as usize * bpp;
    let (top, height) = (desc.top as usize, height as usize);

    for i in 0..height / 2 {
        let a = (top + i) * bpr + start;
        let b = (top + height - 1 - i) * bpr + start;
        let (head, tail) = desc.buffer.split_at_mut(b);
        head[a..a + len].swap_with_slice(&mut tail[..len]);
    }
}

// Writes `data` at `offset` of the buffer `name`, whose store is `capacity` bytes.
#[allow(clippy::too_many_arguments)]
fn update_buffer(
    gl: &dyn GL,
    state: &mut GLState,
    target: GLenum,
    name: GLuint,
    capacity: usize,
    usage: BufferUsage,
    data: &[u8],
    offset: usize,
) {
    if data.is_empty() {
        return;
    }

    if offset + data.len() > capacity {
        warn!(
            "Update of {} bytes at {} overflows buffer {} of {} bytes.",
            data.len(),
            offset,
            name,
            capacity
        );

        return;
    }

    if target == gl::ELEMENT_ARRAY_BUFFER {
        state.bind_vertex_array(gl, None);
    }

    state.bind_buffer(gl, target, name);

    if offset == 0 && data.len() == capacity {
        // Orphans the previous store, which could still be in use by the GPU.
        gl.buffer_data(target, capacity as GLsizeiptr, Some(data), usage.into());
    } else if usage == BufferUsage::Stream {
        let access = gl::MAP_WRITE_BIT | gl::MAP_INVALIDATE_RANGE_BIT | gl::MAP_UNSYNCHRONIZED_BIT;
        loop {
            let mapped =
                gl.map_buffer_range(target, offset as GLintptr, data.len() as GLsizeiptr, access);

            if mapped.is_null() {
                debug!("Buffer {} can't be mapped, falls back to glBufferSubData.", name);
                gl.buffer_sub_data(target, offset as GLintptr, data);
                break;
            }

            unsafe { ptr::copy_nonoverlapping(data.as_ptr(), mapped, data.len()) };
            if gl.unmap_buffer(target) {
                break;
            }

            debug!("Content of buffer {} got corrupted while mapped, retries.", name);
        }
    } else {
        gl.buffer_sub_data(target, offset as GLintptr, data);
    }
}
