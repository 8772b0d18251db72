//! The driver objects living in the `HandleArena`. Each one wraps the native names
//! it owns, plus the abstract metadata needed to use them later.

use std::sync::Arc;

use gl::types::*;

use super::stream::StreamRing;
use crate::utils::arena::{ArenaObject, ObjectKind};
use crate::utils::handle::HandleLike;
use crate::video::assets::prelude::*;
use crate::video::platform::{PlatformFence, PlatformStream, PlatformSwapChain};

macro_rules! impl_arena_object {
    ($name:ident, $kind:ident, $handle:ident) => {
        impl ArenaObject for $name {
            const KIND: ObjectKind = ObjectKind::$kind;
            type Handle = $handle;
        }
    };
}

#[derive(Debug)]
pub struct GLVertexBuffer {
    pub params: VertexBufferParams,
    pub buffers: [GLuint; MAX_VERTEX_BUFFERS],
}

impl_arena_object!(GLVertexBuffer, VertexBuffer, VertexBufferHandle);

#[derive(Debug)]
pub struct GLIndexBuffer {
    pub buffer: GLuint,
    pub format: IndexFormat,
    pub count: u32,
    pub usage: BufferUsage,
}

impl_arena_object!(GLIndexBuffer, IndexBuffer, IndexBufferHandle);

#[derive(Debug)]
pub struct GLRenderPrimitive {
    pub vao: GLuint,
    /// The element array buffer, owned by the index buffer.
    pub element_array: GLuint,
    pub index_type: GLenum,
    pub index_size: u8,
    pub primitive: GLenum,
    /// Byte offset of the first index.
    pub offset: u32,
    pub min_index: u32,
    pub max_index: u32,
    pub count: u32,
    /// Bitmask of the enabled vertex attributes.
    pub enabled: u8,
}

impl_arena_object!(GLRenderPrimitive, RenderPrimitive, RenderPrimitiveHandle);

#[derive(Debug)]
pub struct GLTexture {
    /// The texture name, or the renderbuffer name if `renderbuffer` is set.
    pub name: GLuint,
    pub target: GLenum,
    pub internal_format: GLenum,
    pub params: TextureParams,
    /// Textures that are never sampled are allocated as renderbuffers.
    pub renderbuffer: bool,
    pub base_level: u8,
    pub max_level: u8,
    /// The stream feeding this texture, nil if none.
    pub stream: StreamHandle,
    /// Signalled when the image of a software stream is ready to be sampled.
    pub fence: Option<PlatformFence>,
}

impl_arena_object!(GLTexture, Texture, TextureHandle);

/// One attachment of a render target.
#[derive(Debug, Default, Clone, Copy)]
pub struct GLAttachment {
    /// The texture attached, nil if backed by `renderbuffer`.
    pub texture: TextureHandle,
    /// Renderbuffer owned by the render target.
    pub renderbuffer: GLuint,
    pub level: u8,
    pub layer: u16,
}

impl GLAttachment {
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.texture.is_valid() || self.renderbuffer != 0
    }
}

#[derive(Debug)]
pub struct GLRenderTarget {
    /// 0 for the default framebuffer.
    pub fbo: GLuint,
    pub width: u32,
    pub height: u32,
    pub samples: u8,
    pub targets: TargetBufferFlags,
    pub color: GLAttachment,
    pub depth: GLAttachment,
    pub stencil: GLAttachment,
}

impl_arena_object!(GLRenderTarget, RenderTarget, RenderTargetHandle);

#[derive(Debug)]
pub struct GLUniformBuffer {
    pub buffer: GLuint,
    pub size: u32,
    pub usage: BufferUsage,
}

impl_arena_object!(GLUniformBuffer, UniformBuffer, UniformBufferHandle);

/// A texture and the native sampler object it's sampled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GLSamplerBinding {
    pub texture: TextureHandle,
    pub sampler: GLuint,
}

#[derive(Debug)]
pub struct GLSamplerGroup {
    pub entries: Vec<Option<GLSamplerBinding>>,
}

impl_arena_object!(GLSamplerGroup, SamplerGroup, SamplerGroupHandle);

#[derive(Debug)]
pub struct GLStream {
    pub stream: PlatformStream,
    pub kind: StreamType,
    /// The ring of software streams.
    pub ring: Option<Arc<StreamRing>>,
    /// Timestamp of the last image latched.
    pub timestamp: i64,
}

impl_arena_object!(GLStream, Stream, StreamHandle);

#[derive(Debug)]
pub struct GLFence {
    pub fence: Option<PlatformFence>,
}

impl_arena_object!(GLFence, Fence, FenceHandle);

#[derive(Debug)]
pub struct GLSwapChain {
    pub swap_chain: PlatformSwapChain,
    pub flags: SwapChainFlags,
}

impl_arena_object!(GLSwapChain, SwapChain, SwapChainHandle);
