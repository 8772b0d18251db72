//! The window-system integration the driver is built on (EGL, CGL, WGL, ...).
//!
//! Every object below is an opaque token minted by the platform. The driver never
//! interprets them, it only hands them back.

use gl::types::*;

use crate::errors::*;
use crate::video::assets::prelude::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct PlatformContext(pub u64);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct PlatformSwapChain(pub u64);

impl PlatformSwapChain {
    /// Makes a context current without any drawable surface.
    pub const NONE: PlatformSwapChain = PlatformSwapChain(0);
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct PlatformFence(pub u64);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct PlatformStream(pub u64);

/// Storage of an image that could be shared between contexts (e.g. `EGLImage`).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct ExternalStorage(pub u64);

pub trait Platform: Send + Sync {
    /// Creates a context. The first context created is the one of the GL thread, later
    /// ones share objects with it if `shared` is true.
    fn create_context(&self, shared: bool) -> Result<PlatformContext>;
    fn destroy_context(&self, context: PlatformContext);

    /// Makes `context` current on the calling thread.
    fn make_current(
        &self,
        context: PlatformContext,
        draw: PlatformSwapChain,
        read: PlatformSwapChain,
    ) -> bool;

    fn create_swap_chain(&self, window: NativeWindow, flags: SwapChainFlags) -> PlatformSwapChain;
    fn create_headless_swap_chain(
        &self,
        width: u32,
        height: u32,
        flags: SwapChainFlags,
    ) -> PlatformSwapChain;
    fn destroy_swap_chain(&self, swap_chain: PlatformSwapChain);
    /// Presents the content of the swap chain.
    fn commit(&self, swap_chain: PlatformSwapChain);

    /// Inserts a fence into the command stream of the current context.
    fn create_fence(&self) -> PlatformFence;
    fn destroy_fence(&self, fence: PlatformFence);
    /// Blocks until the GPU passes `fence`, or `timeout` nanoseconds elapsed.
    fn wait_fence(&self, fence: PlatformFence, timeout: u64) -> FenceStatus;

    /// Creates a platform stream, wrapping `native` if supplied.
    fn create_stream(&self, native: Option<NativeStream>) -> PlatformStream;
    fn destroy_stream(&self, stream: PlatformStream);
    /// Attaches the stream to the texture `name` of the current context.
    fn attach(&self, stream: PlatformStream, name: GLuint);
    /// Detaches the stream from its texture, which also invalidates the texture name.
    fn detach(&self, stream: PlatformStream);
    /// Latches the latest image of the stream into the attached texture, and returns its
    /// timestamp in nanoseconds.
    fn update_tex_image(&self, stream: PlatformStream) -> i64;

    fn create_external_storage(&self) -> ExternalStorage;
    /// Reallocates the storage to hold a `width x height` image of `format`. Returns
    /// the new storage, which replaces `storage`.
    fn reallocate_external_storage(
        &self,
        storage: ExternalStorage,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> ExternalStorage;
    fn destroy_external_storage(&self, storage: ExternalStorage);
    /// Binds the storage as the image of texture `name` of the current context. The
    /// driver binds `name` to `target` on the active unit before the call.
    fn set_external_storage(&self, storage: ExternalStorage, target: GLenum, name: GLuint);
}
