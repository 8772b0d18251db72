//! The command stream between the producer thread and the GL thread.
//!
//! The producer records commands through a `DriverApi`, which allocates the handles of
//! new objects from the shared arena right away, so they could be referenced by the
//! following commands before the GL thread ever sees them. `DriverApi::submit` hands
//! the recorded frame over to a `CommandQueue`, and the GL thread drains the queue
//! with `GLDriver::execute`, in FIFO order.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;

use spin::Mutex;

use super::assets::prelude::*;
use super::backends::gl::driver::GLDriver;
use super::backends::gl::objects::*;
use crate::utils::arena::HandleArena;

/// Receives the pixels of a read-back, rows top-down.
pub type ReadCallback = Box<dyn FnOnce(PixelBufferDescriptor) + Send>;

/// Where the pixels of a read-back come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    RenderTarget(RenderTargetHandle),
    Stream(StreamHandle),
}

pub struct Readback {
    pub source: ReadSource,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub desc: PixelBufferDescriptor,
    pub callback: ReadCallback,
}

impl fmt::Debug for Readback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Readback")
            .field("source", &self.source)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("desc", &self.desc)
            .finish()
    }
}

#[derive(Debug)]
pub enum Command {
    BeginFrame(i64, u32),
    EndFrame(u32),
    Flush,
    Finish,

    CreateTexture(Box<(TextureHandle, TextureParams)>),
    Update2DImage(Box<(TextureHandle, u8, [u32; 4], PixelBufferDescriptor)>),
    Update3DImage(Box<(TextureHandle, u8, [u32; 6], PixelBufferDescriptor)>),
    UpdateCubeImage(Box<(TextureHandle, u8, PixelBufferDescriptor, FaceOffsets)>),
    GenerateMipmaps(TextureHandle),
    SetMinMaxLevel(TextureHandle, u8, u8),
    DestroyTexture(TextureHandle),

    CreateDefaultRenderTarget(RenderTargetHandle),
    CreateRenderTarget(Box<(RenderTargetHandle, RenderTargetParams)>),
    DestroyRenderTarget(RenderTargetHandle),

    CreateVertexBuffer(Box<(VertexBufferHandle, VertexBufferParams)>),
    UpdateVertexBuffer(Box<(VertexBufferHandle, usize, BufferDescriptor, u32)>),
    DestroyVertexBuffer(VertexBufferHandle),

    CreateIndexBuffer(IndexBufferHandle, IndexFormat, u32, BufferUsage),
    UpdateIndexBuffer(Box<(IndexBufferHandle, BufferDescriptor, u32)>),
    DestroyIndexBuffer(IndexBufferHandle),

    CreateUniformBuffer(UniformBufferHandle, u32, BufferUsage),
    LoadUniformBuffer(UniformBufferHandle, BufferDescriptor),
    BindUniformBuffer(usize, UniformBufferHandle),
    BindUniformBufferRange(usize, UniformBufferHandle, u32, u32),
    UnbindUniformBuffer(usize),
    DestroyUniformBuffer(UniformBufferHandle),

    CreateRenderPrimitive(RenderPrimitiveHandle),
    SetRenderPrimitiveBuffer(RenderPrimitiveHandle, VertexBufferHandle, IndexBufferHandle),
    SetRenderPrimitiveRange(Box<(RenderPrimitiveHandle, PrimitiveType, [u32; 4])>),
    DestroyRenderPrimitive(RenderPrimitiveHandle),

    CreateSamplerGroup(SamplerGroupHandle, usize),
    UpdateSamplerGroup(SamplerGroupHandle, Box<SamplerGroupDescriptor>),
    BindSamplerGroup(usize, SamplerGroupHandle),
    DestroySamplerGroup(SamplerGroupHandle),

    BeginRenderPass(RenderTargetHandle, Box<RenderPassParams>),
    EndRenderPass,
    SetViewportScissor(Viewport),
    Draw(Box<(PipelineState, RenderPrimitiveHandle)>),
    Blit(Box<(TargetBufferFlags, RenderTargetHandle, Viewport, RenderTargetHandle, Viewport, SamplerMagFilter)>),
    ReadPixels(Box<Readback>),

    CreateStream(StreamHandle, Option<NativeStream>),
    SetStreamDimensions(StreamHandle, u32, u32),
    SetExternalStream(TextureHandle, Option<StreamHandle>),
    DestroyStream(StreamHandle),

    CreateFence(FenceHandle),
    DestroyFence(FenceHandle),

    CreateSwapChain(SwapChainHandle, NativeWindow, SwapChainFlags),
    CreateHeadlessSwapChain(SwapChainHandle, u32, u32, SwapChainFlags),
    DestroySwapChain(SwapChainHandle),
    MakeCurrent(SwapChainHandle, SwapChainHandle),
    Commit(SwapChainHandle),

    Terminate,
}

/// The commands recorded between two submits.
#[derive(Debug, Default)]
pub struct Frame {
    pub cmds: Vec<Command>,
}

impl Frame {
    #[inline]
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
}

/// The FIFO queue of submitted frames.
#[derive(Debug, Default)]
pub struct CommandQueue {
    frames: Mutex<VecDeque<Frame>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn submit(&self, frame: Frame) {
        self.frames.lock().push_back(frame);
    }

    /// Takes the oldest frame submitted.
    #[inline]
    pub fn pop(&self) -> Option<Frame> {
        self.frames.lock().pop_front()
    }

    /// Number of frames waiting for the GL thread.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

/// The producer side of the driver.
pub struct DriverApi {
    arena: Arc<HandleArena>,
    queue: Arc<CommandQueue>,
    frame: Frame,
}

impl DriverApi {
    pub fn new(arena: Arc<HandleArena>, queue: Arc<CommandQueue>) -> Self {
        DriverApi {
            arena,
            queue,
            frame: Frame::default(),
        }
    }

    #[inline]
    pub fn arena(&self) -> &Arc<HandleArena> {
        &self.arena
    }

    #[inline]
    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    #[inline]
    fn push(&mut self, cmd: Command) {
        self.frame.cmds.push(cmd);
    }

    /// Hands the commands recorded so far over to the GL thread. It's guaranteed that
    /// they will be executed one by one in order, after the ones submitted before.
    pub fn submit(&mut self) {
        if !self.frame.is_empty() {
            let frame = mem::replace(&mut self.frame, Frame::default());
            self.queue.submit(frame);
        }
    }

    #[inline]
    pub fn begin_frame(&mut self, monotonic_ns: i64, frame_id: u32) {
        self.push(Command::BeginFrame(monotonic_ns, frame_id));
    }

    #[inline]
    pub fn end_frame(&mut self, frame_id: u32) {
        self.push(Command::EndFrame(frame_id));
    }

    #[inline]
    pub fn flush(&mut self) {
        self.push(Command::Flush);
    }

    #[inline]
    pub fn finish(&mut self) {
        self.push(Command::Finish);
    }

    /// Creates a texture. Formats and sampler types the context doesn't support fall
    /// back to the closest supported ones.
    pub fn create_texture(&mut self, params: TextureParams) -> TextureHandle {
        let h = self.arena.allocate::<GLTexture>();
        self.push(Command::CreateTexture(Box::new((h, params))));
        h
    }

    /// Uploads a `width x height` image at `(x, y)` of `level` of a 2D texture.
    #[inline]
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
        let rect = [x, y, width, height];
        self.push(Command::Update2DImage(Box::new((h, level, rect, desc))));
    }

    /// Uploads a `width x height x depth` image at `(x, y, z)` of `level` of an array
    /// or 3D texture.
    #[inline]
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
        let region = [x, y, z, width, height, depth];
        self.push(Command::Update3DImage(Box::new((h, level, region, desc))));
    }

    #[inline]
    pub fn update_cube_image(
        &mut self,
        h: TextureHandle,
        level: u8,
        desc: PixelBufferDescriptor,
        offsets: FaceOffsets,
    ) {
        self.push(Command::UpdateCubeImage(Box::new((h, level, desc, offsets))));
    }

    #[inline]
    pub fn generate_mipmaps(&mut self, h: TextureHandle) {
        self.push(Command::GenerateMipmaps(h));
    }

    #[inline]
    pub fn set_min_max_level(&mut self, h: TextureHandle, min: u8, max: u8) {
        self.push(Command::SetMinMaxLevel(h, min, max));
    }

    #[inline]
    pub fn destroy_texture(&mut self, h: TextureHandle) {
        self.push(Command::DestroyTexture(h));
    }

    pub fn create_default_render_target(&mut self) -> RenderTargetHandle {
        let h = self.arena.allocate::<GLRenderTarget>();
        self.push(Command::CreateDefaultRenderTarget(h));
        h
    }

    pub fn create_render_target(&mut self, params: RenderTargetParams) -> RenderTargetHandle {
        let h = self.arena.allocate::<GLRenderTarget>();
        self.push(Command::CreateRenderTarget(Box::new((h, params))));
        h
    }

    #[inline]
    pub fn destroy_render_target(&mut self, h: RenderTargetHandle) {
        self.push(Command::DestroyRenderTarget(h));
    }

    pub fn create_vertex_buffer(&mut self, params: VertexBufferParams) -> VertexBufferHandle {
        let h = self.arena.allocate::<GLVertexBuffer>();
        self.push(Command::CreateVertexBuffer(Box::new((h, params))));
        h
    }

    #[inline]
    pub fn update_vertex_buffer(
        &mut self,
        h: VertexBufferHandle,
        index: usize,
        desc: BufferDescriptor,
        offset: u32,
    ) {
        self.push(Command::UpdateVertexBuffer(Box::new((h, index, desc, offset))));
    }

    #[inline]
    pub fn destroy_vertex_buffer(&mut self, h: VertexBufferHandle) {
        self.push(Command::DestroyVertexBuffer(h));
    }

    pub fn create_index_buffer(
        &mut self,
        format: IndexFormat,
        count: u32,
        usage: BufferUsage,
    ) -> IndexBufferHandle {
        let h = self.arena.allocate::<GLIndexBuffer>();
        self.push(Command::CreateIndexBuffer(h, format, count, usage));
        h
    }

    #[inline]
    pub fn update_index_buffer(&mut self, h: IndexBufferHandle, desc: BufferDescriptor, offset: u32) {
        self.push(Command::UpdateIndexBuffer(Box::new((h, desc, offset))));
    }

    #[inline]
    pub fn destroy_index_buffer(&mut self, h: IndexBufferHandle) {
        self.push(Command::DestroyIndexBuffer(h));
    }

    pub fn create_uniform_buffer(&mut self, size: u32, usage: BufferUsage) -> UniformBufferHandle {
        let h = self.arena.allocate::<GLUniformBuffer>();
        self.push(Command::CreateUniformBuffer(h, size, usage));
        h
    }

    #[inline]
    pub fn load_uniform_buffer(&mut self, h: UniformBufferHandle, desc: BufferDescriptor) {
        self.push(Command::LoadUniformBuffer(h, desc));
    }

    #[inline]
    pub fn bind_uniform_buffer(&mut self, index: usize, h: UniformBufferHandle) {
        self.push(Command::BindUniformBuffer(index, h));
    }

    #[inline]
    pub fn bind_uniform_buffer_range(
        &mut self,
        index: usize,
        h: UniformBufferHandle,
        offset: u32,
        size: u32,
    ) {
        self.push(Command::BindUniformBufferRange(index, h, offset, size));
    }

    #[inline]
    pub fn unbind_uniform_buffer(&mut self, index: usize) {
        self.push(Command::UnbindUniformBuffer(index));
    }

    #[inline]
    pub fn destroy_uniform_buffer(&mut self, h: UniformBufferHandle) {
        self.push(Command::DestroyUniformBuffer(h));
    }

    pub fn create_render_primitive(&mut self) -> RenderPrimitiveHandle {
        let h = self.arena.allocate::<GLRenderPrimitive>();
        self.push(Command::CreateRenderPrimitive(h));
        h
    }

    #[inline]
    pub fn set_render_primitive_buffer(
        &mut self,
        h: RenderPrimitiveHandle,
        vb: VertexBufferHandle,
        ib: IndexBufferHandle,
    ) {
        self.push(Command::SetRenderPrimitiveBuffer(h, vb, ib));
    }

    /// Sets the range of indices drawn. `offset` is counted in indices.
    #[inline]
    pub fn set_render_primitive_range(
        &mut self,
        h: RenderPrimitiveHandle,
        primitive: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    ) {
        let range = [offset, min_index, max_index, count];
        self.push(Command::SetRenderPrimitiveRange(Box::new((h, primitive, range))));
    }

    #[inline]
    pub fn destroy_render_primitive(&mut self, h: RenderPrimitiveHandle) {
        self.push(Command::DestroyRenderPrimitive(h));
    }

    pub fn create_sampler_group(&mut self, size: usize) -> SamplerGroupHandle {
        let h = self.arena.allocate::<GLSamplerGroup>();
        self.push(Command::CreateSamplerGroup(h, size));
        h
    }

    #[inline]
    pub fn update_sampler_group(&mut self, h: SamplerGroupHandle, desc: SamplerGroupDescriptor) {
        self.push(Command::UpdateSamplerGroup(h, Box::new(desc)));
    }

    #[inline]
    pub fn bind_sampler_group(&mut self, binding: usize, h: SamplerGroupHandle) {
        self.push(Command::BindSamplerGroup(binding, h));
    }

    #[inline]
    pub fn destroy_sampler_group(&mut self, h: SamplerGroupHandle) {
        self.push(Command::DestroySamplerGroup(h));
    }

    #[inline]
    pub fn begin_render_pass(&mut self, h: RenderTargetHandle, params: RenderPassParams) {
        self.push(Command::BeginRenderPass(h, Box::new(params)));
    }

    #[inline]
    pub fn end_render_pass(&mut self) {
        self.push(Command::EndRenderPass);
    }

    #[inline]
    pub fn set_viewport_scissor(&mut self, scissor: Viewport) {
        self.push(Command::SetViewportScissor(scissor));
    }

    #[inline]
    pub fn draw(&mut self, pipeline: PipelineState, h: RenderPrimitiveHandle) {
        self.push(Command::Draw(Box::new((pipeline, h))));
    }

    #[inline]
    pub fn blit(
        &mut self,
        buffers: TargetBufferFlags,
        dst: RenderTargetHandle,
        dst_rect: Viewport,
        src: RenderTargetHandle,
        src_rect: Viewport,
        filter: SamplerMagFilter,
    ) {
        let v = (buffers, dst, dst_rect, src, src_rect, filter);
        self.push(Command::Blit(Box::new(v)));
    }

    /// Reads pixels of the color buffer of a render target back. `callback` is invoked
    /// on the GL thread with the rows top-down.
    #[allow(clippy::too_many_arguments)]
    pub fn read_pixels<F>(
        &mut self,
        h: RenderTargetHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        desc: PixelBufferDescriptor,
        callback: F,
    ) where
        F: FnOnce(PixelBufferDescriptor) + Send + 'static,
    {
        let source = ReadSource::RenderTarget(h);
        self.read(source, x, y, width, height, desc, Box::new(callback));
    }

    /// Reads pixels of the image of a software stream back.
    #[allow(clippy::too_many_arguments)]
    pub fn read_stream_pixels<F>(
        &mut self,
        h: StreamHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        desc: PixelBufferDescriptor,
        callback: F,
    ) where
        F: FnOnce(PixelBufferDescriptor) + Send + 'static,
    {
        let source = ReadSource::Stream(h);
        self.read(source, x, y, width, height, desc, Box::new(callback));
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        source: ReadSource,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        desc: PixelBufferDescriptor,
        callback: ReadCallback,
    ) {
        self.push(Command::ReadPixels(Box::new(Readback {
            source,
            x,
            y,
            width,
            height,
            desc,
            callback,
        })));
    }

    /// Creates a stream, native if it wraps a `NativeStream`.
    pub fn create_stream(&mut self, native: Option<NativeStream>) -> StreamHandle {
        let h = self.arena.allocate::<GLStream>();
        self.push(Command::CreateStream(h, native));
        h
    }

    #[inline]
    pub fn set_stream_dimensions(&mut self, h: StreamHandle, width: u32, height: u32) {
        self.push(Command::SetStreamDimensions(h, width, height));
    }

    #[inline]
    pub fn set_external_stream(&mut self, texture: TextureHandle, stream: Option<StreamHandle>) {
        self.push(Command::SetExternalStream(texture, stream));
    }

    #[inline]
    pub fn destroy_stream(&mut self, h: StreamHandle) {
        self.push(Command::DestroyStream(h));
    }

    pub fn create_fence(&mut self) -> FenceHandle {
        let h = self.arena.allocate::<GLFence>();
        self.push(Command::CreateFence(h));
        h
    }

    #[inline]
    pub fn destroy_fence(&mut self, h: FenceHandle) {
        self.push(Command::DestroyFence(h));
    }

    pub fn create_swap_chain(&mut self, window: NativeWindow, flags: SwapChainFlags) -> SwapChainHandle {
        let h = self.arena.allocate::<GLSwapChain>();
        self.push(Command::CreateSwapChain(h, window, flags));
        h
    }

    pub fn create_headless_swap_chain(
        &mut self,
        width: u32,
        height: u32,
        flags: SwapChainFlags,
    ) -> SwapChainHandle {
        let h = self.arena.allocate::<GLSwapChain>();
        self.push(Command::CreateHeadlessSwapChain(h, width, height, flags));
        h
    }

    #[inline]
    pub fn destroy_swap_chain(&mut self, h: SwapChainHandle) {
        self.push(Command::DestroySwapChain(h));
    }

    #[inline]
    pub fn make_current(&mut self, draw: SwapChainHandle, read: SwapChainHandle) {
        self.push(Command::MakeCurrent(draw, read));
    }

    #[inline]
    pub fn commit(&mut self, h: SwapChainHandle) {
        self.push(Command::Commit(h));
    }

    #[inline]
    pub fn terminate(&mut self) {
        self.push(Command::Terminate);
    }
}

impl GLDriver {
    /// Executes every frame submitted into `queue`, oldest first. Returns the number
    /// of commands executed.
    pub fn execute(&mut self, queue: &CommandQueue) -> usize {
        let mut executed = 0;
        while let Some(mut frame) = queue.pop() {
            executed += frame.len();
            for v in frame.cmds.drain(..) {
                self.dispatch(v);
            }
        }

        executed
    }

    /// Executes one command.
    pub fn dispatch(&mut self, cmd: Command) {
        match cmd {
            Command::BeginFrame(monotonic_ns, frame_id) => {
                self.begin_frame(monotonic_ns, frame_id);
            }

            Command::EndFrame(frame_id) => {
                self.end_frame(frame_id);
            }

            Command::Flush => self.flush(),

            Command::Finish => self.finish(),

            Command::CreateTexture(v) => {
                self.create_texture(v.0, v.1);
            }

            Command::Update2DImage(v) => {
                let (h, level, r, desc) = *v;
                self.update_2d_image(h, level, r[0], r[1], r[2], r[3], desc);
            }

            Command::Update3DImage(v) => {
                let (h, level, r, desc) = *v;
                self.update_3d_image(h, level, r[0], r[1], r[2], r[3], r[4], r[5], desc);
            }

            Command::UpdateCubeImage(v) => {
                let (h, level, desc, offsets) = *v;
                self.update_cube_image(h, level, desc, offsets);
            }

            Command::GenerateMipmaps(h) => {
                self.generate_mipmaps(h);
            }

            Command::SetMinMaxLevel(h, min, max) => {
                self.set_min_max_level(h, min, max);
            }

            Command::DestroyTexture(h) => {
                self.destroy_texture(h);
            }

            Command::CreateDefaultRenderTarget(h) => {
                self.create_default_render_target(h);
            }

            Command::CreateRenderTarget(v) => {
                self.create_render_target(v.0, v.1);
            }

            Command::DestroyRenderTarget(h) => {
                self.destroy_render_target(h);
            }

            Command::CreateVertexBuffer(v) => {
                self.create_vertex_buffer(v.0, v.1);
            }

            Command::UpdateVertexBuffer(v) => {
                let (h, index, desc, offset) = *v;
                self.update_vertex_buffer(h, index, desc, offset);
            }

            Command::DestroyVertexBuffer(h) => {
                self.destroy_vertex_buffer(h);
            }

            Command::CreateIndexBuffer(h, format, count, usage) => {
                self.create_index_buffer(h, format, count, usage);
            }

            Command::UpdateIndexBuffer(v) => {
                let (h, desc, offset) = *v;
                self.update_index_buffer(h, desc, offset);
            }

            Command::DestroyIndexBuffer(h) => {
                self.destroy_index_buffer(h);
            }

            Command::CreateUniformBuffer(h, size, usage) => {
                self.create_uniform_buffer(h, size, usage);
            }

            Command::LoadUniformBuffer(h, desc) => {
                self.load_uniform_buffer(h, desc);
            }

            Command::BindUniformBuffer(index, h) => {
                self.bind_uniform_buffer(index, h);
            }

            Command::BindUniformBufferRange(index, h, offset, size) => {
                self.bind_uniform_buffer_range(index, h, offset, size);
            }

            Command::UnbindUniformBuffer(index) => {
                self.unbind_uniform_buffer(index);
            }

            Command::DestroyUniformBuffer(h) => {
                self.destroy_uniform_buffer(h);
            }

            Command::CreateRenderPrimitive(h) => {
                self.create_render_primitive(h);
            }

            Command::SetRenderPrimitiveBuffer(h, vb, ib) => {
                self.set_render_primitive_buffer(h, vb, ib);
            }

            Command::SetRenderPrimitiveRange(v) => {
                let (h, primitive, r) = *v;
                self.set_render_primitive_range(h, primitive, r[0], r[1], r[2], r[3]);
            }

            Command::DestroyRenderPrimitive(h) => {
                self.destroy_render_primitive(h);
            }

            Command::CreateSamplerGroup(h, size) => {
                self.create_sampler_group(h, size);
            }

            Command::UpdateSamplerGroup(h, desc) => {
                self.update_sampler_group(h, *desc);
            }

            Command::BindSamplerGroup(binding, h) => {
                self.bind_sampler_group(binding, h);
            }

            Command::DestroySamplerGroup(h) => {
                self.destroy_sampler_group(h);
            }

            Command::BeginRenderPass(h, params) => {
                self.begin_render_pass(h, *params);
            }

            Command::EndRenderPass => self.end_render_pass(),

            Command::SetViewportScissor(scissor) => {
                self.set_viewport_scissor(scissor);
            }

            Command::Draw(v) => {
                self.draw(&v.0, v.1);
            }

            Command::Blit(v) => {
                let (buffers, dst, dst_rect, src, src_rect, filter) = *v;
                self.blit(buffers, dst, dst_rect, src, src_rect, filter);
            }

            Command::ReadPixels(v) => {
                let Readback {
                    source,
                    x,
                    y,
                    width,
                    height,
                    desc,
                    callback,
                } = *v;

                let desc = match source {
                    ReadSource::RenderTarget(h) => self.read_pixels(h, x, y, width, height, desc),
                    ReadSource::Stream(h) => self.read_stream_pixels(h, x, y, width, height, desc),
                };

                callback(desc);
            }

            Command::CreateStream(h, native) => {
                self.create_stream(h, native);
            }

            Command::SetStreamDimensions(h, width, height) => {
                self.set_stream_dimensions(h, width, height);
            }

            Command::SetExternalStream(texture, stream) => {
                self.set_external_stream(texture, stream);
            }

            Command::DestroyStream(h) => {
                self.destroy_stream(h);
            }

            Command::CreateFence(h) => {
                self.create_fence(h);
            }

            Command::DestroyFence(h) => {
                self.destroy_fence(h);
            }

            Command::CreateSwapChain(h, window, flags) => {
                self.create_swap_chain(h, window, flags);
            }

            Command::CreateHeadlessSwapChain(h, width, height, flags) => {
                self.create_headless_swap_chain(h, width, height, flags);
            }

            Command::DestroySwapChain(h) => {
                self.destroy_swap_chain(h);
            }

            Command::MakeCurrent(draw, read) => {
                self.make_current(draw, read);
            }

            Command::Commit(h) => {
                self.commit(h);
            }

            Command::Terminate => self.terminate(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::handle::HandleLike;

    fn api() -> DriverApi {
        let arena = Arc::new(HandleArena::new(1024, 4096, 8192));
        DriverApi::new(arena, Arc::new(CommandQueue::new()))
    }

    #[test]
    fn handles_are_allocated_eagerly() {
        let mut api = api();
        let texture = api.create_texture(TextureParams::default());
        let stream = api.create_stream(None);

        assert!(texture.is_valid());
        assert!(stream.is_valid());
        assert_eq!(api.arena().lives().iter().sum::<usize>(), 2);
        assert_eq!(api.frame.len(), 2);
    }

    #[test]
    fn submit_is_fifo() {
        let mut api = api();
        api.begin_frame(0, 1);
        api.submit();
        api.end_frame(1);
        api.flush();
        api.submit();

        // Nothing recorded, nothing submitted.
        api.submit();

        let queue = api.queue().clone();
        assert_eq!(queue.len(), 2);

        let first = queue.pop().unwrap();
        match first.cmds[0] {
            Command::BeginFrame(0, 1) => {}
            ref v => panic!("unexpected {:?}", v),
        }

        let second = queue.pop().unwrap();
        assert_eq!(second.len(), 2);
        match second.cmds[1] {
            Command::Flush => {}
            ref v => panic!("unexpected {:?}", v),
        }

        assert!(queue.is_empty());
    }

    #[test]
    fn readback_callback_is_send() {
        fn is_send<T: Send>(_: &T) {}

        let mut api = api();
        let rt = api.create_default_render_target();
        let desc = PixelBufferDescriptor::new(Vec::new(), PixelDataFormat::RGBA, PixelDataType::UByte);
        api.read_pixels(rt, 0, 0, 1, 1, desc, |_| {});

        is_send(&api.frame);
        match api.frame.cmds[1] {
            Command::ReadPixels(ref v) => assert_eq!(v.source, ReadSource::RenderTarget(rt)),
            ref v => panic!("unexpected {:?}", v),
        }
    }
}
