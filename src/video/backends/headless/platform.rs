//! The window-system side of the headless backend.

use std::sync::Arc;

use gl;
use gl::types::*;
use spin::Mutex;

use super::server::{Image, ImageId, Server};
use super::HeadlessGL;
use crate::errors::*;
use crate::utils::hash::FastHashMap;
use crate::video::assets::prelude::*;
use crate::video::platform::*;

/// The number of live objects of each kind in a headless platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformObjects {
    pub contexts: usize,
    pub swap_chains: usize,
    pub fences: usize,
    pub streams: usize,
    pub storages: usize,
}

#[derive(Debug, Clone, Copy)]
struct Storage {
    image: ImageId,
    internal_format: GLenum,
    width: u32,
    height: u32,
}

#[derive(Debug, Default)]
struct Stream {
    native: Option<NativeStream>,
    attached: Option<GLuint>,
    timestamp: i64,
}

#[derive(Debug, Default)]
struct PlatformState {
    next: u64,
    contexts: FastHashMap<u64, bool>,
    current: Option<u64>,
    swap_chains: FastHashMap<u64, (SwapChainFlags, usize)>,
    /// Fences and whether the GPU passed them.
    fences: FastHashMap<u64, bool>,
    hold_fences: bool,
    streams: FastHashMap<u64, Stream>,
    storages: FastHashMap<u64, Option<Storage>>,
    fail_context: bool,
}

impl PlatformState {
    fn mint(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// A `Platform` over the server of a `HeadlessGL`. Fences are signalled as soon as
/// they are created unless held, and external storages are plain server images.
pub struct HeadlessPlatform {
    server: Arc<Mutex<Server>>,
    state: Mutex<PlatformState>,
}

fn sized_format(format: TextureFormat) -> GLenum {
    match format {
        TextureFormat::R8 => gl::R8,
        TextureFormat::RG8 => gl::RG8,
        TextureFormat::RGB8 => gl::RGB8,
        TextureFormat::RGB565 => gl::RGB565,
        TextureFormat::SRGB8A8 => gl::SRGB8_ALPHA8,
        TextureFormat::RGBA16F => gl::RGBA16F,
        _ => gl::RGBA8,
    }
}

impl HeadlessPlatform {
    pub fn new(gl: &HeadlessGL) -> HeadlessPlatform {
        HeadlessPlatform {
            server: gl.server(),
            state: Mutex::new(PlatformState::default()),
        }
    }

    pub fn live(&self) -> PlatformObjects {
        let state = self.state.lock();
        PlatformObjects {
            contexts: state.contexts.len(),
            swap_chains: state.swap_chains.len(),
            fences: state.fences.len(),
            streams: state.streams.len(),
            storages: state.storages.len(),
        }
    }

    /// Number of times `swap_chain` got presented.
    pub fn commits(&self, swap_chain: PlatformSwapChain) -> usize {
        let state = self.state.lock();
        state.swap_chains.get(&swap_chain.0).map_or(0, |v| v.1)
    }

    /// Makes the creation of contexts fail from now on.
    pub fn set_fail_context(&self, fail: bool) {
        self.state.lock().fail_context = fail;
    }

    /// Fences created while held time out until `signal_fences` is called.
    pub fn hold_fences(&self, hold: bool) {
        self.state.lock().hold_fences = hold;
    }

    pub fn signal_fences(&self) {
        for v in self.state.lock().fences.values_mut() {
            *v = true;
        }
    }

    pub fn is_fence_alive(&self, fence: PlatformFence) -> bool {
        self.state.lock().fences.contains_key(&fence.0)
    }

    /// The texture name `stream` is attached to.
    pub fn stream_attachment(&self, stream: PlatformStream) -> Option<GLuint> {
        let state = self.state.lock();
        state.streams.get(&stream.0).and_then(|v| v.attached)
    }

    pub fn is_native_stream(&self, stream: PlatformStream) -> bool {
        let state = self.state.lock();
        state.streams.get(&stream.0).map_or(false, |v| v.native.is_some())
    }

    /// The image behind an external storage.
    pub fn storage_image(&self, storage: ExternalStorage) -> Option<Image> {
        let image = {
            let state = self.state.lock();
            state.storages.get(&storage.0).and_then(|v| v.map(|s| s.image))?
        };

        self.server.lock().images.get(&image).cloned()
    }
}

impl Platform for HeadlessPlatform {
    fn create_context(&self, shared: bool) -> Result<PlatformContext> {
        let mut state = self.state.lock();
        if state.fail_context {
            return Err(Error::Context("[Headless] context creation failed.".into()));
        }

        let id = state.mint();
        state.contexts.insert(id, shared);
        Ok(PlatformContext(id))
    }

    fn destroy_context(&self, context: PlatformContext) {
        let mut state = self.state.lock();
        state.contexts.remove(&context.0);
        if state.current == Some(context.0) {
            state.current = None;
        }
    }

    fn make_current(
        &self,
        context: PlatformContext,
        draw: PlatformSwapChain,
        read: PlatformSwapChain,
    ) -> bool {
        let mut state = self.state.lock();
        let valid = |v: PlatformSwapChain| {
            v == PlatformSwapChain::NONE || state.swap_chains.contains_key(&v.0)
        };

        if !state.contexts.contains_key(&context.0) || !valid(draw) || !valid(read) {
            return false;
        }

        state.current = Some(context.0);
        true
    }

    fn create_swap_chain(&self, _: NativeWindow, flags: SwapChainFlags) -> PlatformSwapChain {
        let mut state = self.state.lock();
        let id = state.mint();
        state.swap_chains.insert(id, (flags, 0));
        PlatformSwapChain(id)
    }

    fn create_headless_swap_chain(&self, _: u32, _: u32, flags: SwapChainFlags) -> PlatformSwapChain {
        self.create_swap_chain(NativeWindow(0), flags)
    }

    fn destroy_swap_chain(&self, swap_chain: PlatformSwapChain) {
        self.state.lock().swap_chains.remove(&swap_chain.0);
    }

    fn commit(&self, swap_chain: PlatformSwapChain) {
        if let Some(v) = self.state.lock().swap_chains.get_mut(&swap_chain.0) {
            v.1 += 1;
        }
    }

    fn create_fence(&self) -> PlatformFence {
        let mut state = self.state.lock();
        let id = state.mint();
        let signalled = !state.hold_fences;
        state.fences.insert(id, signalled);
        PlatformFence(id)
    }

    fn destroy_fence(&self, fence: PlatformFence) {
        self.state.lock().fences.remove(&fence.0);
    }

    fn wait_fence(&self, fence: PlatformFence, _: u64) -> FenceStatus {
        match self.state.lock().fences.get(&fence.0) {
            Some(true) => FenceStatus::ConditionSatisfied,
            Some(false) => FenceStatus::TimeoutExpired,
            None => FenceStatus::Error,
        }
    }

    fn create_stream(&self, native: Option<NativeStream>) -> PlatformStream {
        let mut state = self.state.lock();
        let id = state.mint();
        state.streams.insert(
            id,
            Stream {
                native,
                ..Stream::default()
            },
        );

        PlatformStream(id)
    }

    fn destroy_stream(&self, stream: PlatformStream) {
        self.state.lock().streams.remove(&stream.0);
    }

    fn attach(&self, stream: PlatformStream, name: GLuint) {
        if let Some(v) = self.state.lock().streams.get_mut(&stream.0) {
            v.attached = Some(name);
        }
    }

    fn detach(&self, stream: PlatformStream) {
        let name = match self.state.lock().streams.get_mut(&stream.0) {
            Some(v) => v.attached.take(),
            None => None,
        };

        // Detaching invalidates the name of the texture.
        if let Some(name) = name {
            let mut server = self.server.lock();
            if let Some(texture) = server.textures.remove(&name) {
                server.release_texture(texture);
            }
        }
    }

    fn update_tex_image(&self, stream: PlatformStream) -> i64 {
        match self.state.lock().streams.get_mut(&stream.0) {
            Some(v) => {
                v.timestamp += 1;
                v.timestamp
            }
            None => 0,
        }
    }

    fn create_external_storage(&self) -> ExternalStorage {
        let mut state = self.state.lock();
        let id = state.mint();
        state.storages.insert(id, None);
        ExternalStorage(id)
    }

    fn reallocate_external_storage(
        &self,
        storage: ExternalStorage,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> ExternalStorage {
        let image = Image::new(width, height, format.size().unwrap_or(0));
        let image = self.server.lock().create_image(image);

        let mut state = self.state.lock();
        if let Some(Some(previous)) = state.storages.remove(&storage.0) {
            self.server.lock().release_image(previous.image);
        }

        let id = state.mint();
        state.storages.insert(
            id,
            Some(Storage {
                image,
                internal_format: sized_format(format),
                width,
                height,
            }),
        );

        ExternalStorage(id)
    }

    fn destroy_external_storage(&self, storage: ExternalStorage) {
        let removed = self.state.lock().storages.remove(&storage.0);
        if let Some(Some(v)) = removed {
            self.server.lock().release_image(v.image);
        }
    }

    fn set_external_storage(&self, storage: ExternalStorage, target: GLenum, name: GLuint) {
        let storage = match self.state.lock().storages.get(&storage.0) {
            Some(Some(v)) => *v,
            _ => return,
        };

        let mut server = self.server.lock();
        let previous = match server.textures.get_mut(&name) {
            Some(texture) => {
                if texture.target == 0 {
                    texture.target = target;
                }

                texture.internal_format = storage.internal_format;
                texture.levels = 1;
                texture.width = storage.width;
                texture.height = storage.height;
                texture.depth = 1;
                texture.immutable = true;
                texture.images.insert((0, 0), storage.image)
            }
            None => return,
        };

        if let Some(v) = previous {
            if v != storage.image {
                server.release_image(v);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::video::backends::GL;

    #[test]
    fn contexts() {
        let gl = HeadlessGL::es3();
        let platform = HeadlessPlatform::new(&gl);

        let context = platform.create_context(false).unwrap();
        assert!(platform.make_current(context, PlatformSwapChain::NONE, PlatformSwapChain::NONE));
        assert!(!platform.make_current(context, PlatformSwapChain(99), PlatformSwapChain::NONE));

        platform.set_fail_context(true);
        assert!(platform.create_context(true).is_err());

        platform.destroy_context(context);
        assert_eq!(platform.live(), PlatformObjects::default());
    }

    #[test]
    fn fences() {
        let gl = HeadlessGL::es3();
        let platform = HeadlessPlatform::new(&gl);

        let fence = platform.create_fence();
        assert_eq!(platform.wait_fence(fence, 0), FenceStatus::ConditionSatisfied);

        platform.hold_fences(true);
        let held = platform.create_fence();
        assert_eq!(platform.wait_fence(held, 0), FenceStatus::TimeoutExpired);
        platform.signal_fences();
        assert_eq!(platform.wait_fence(held, 0), FenceStatus::ConditionSatisfied);

        platform.destroy_fence(fence);
        assert_eq!(platform.wait_fence(fence, 0), FenceStatus::Error);
    }

    #[test]
    fn external_storage() {
        let gl = HeadlessGL::es3();
        let platform = HeadlessPlatform::new(&gl);

        let storage = platform.create_external_storage();
        let storage = platform.reallocate_external_storage(storage, 2, 2, TextureFormat::RGBA8);
        assert_eq!(platform.storage_image(storage).map(|v| v.data.len()), Some(16));

        let name = gl.gen_textures(1)[0];
        gl.bind_texture(gl::TEXTURE_2D, name);
        platform.set_external_storage(storage, gl::TEXTURE_2D, name);
        assert_eq!(gl.texture_level(name, 0, 0).map(|v| v.width), Some(2));

        // The texture keeps the image alive.
        platform.destroy_external_storage(storage);
        assert_eq!(gl.live().images, 1);
        gl.delete_textures(&[name]);
        assert_eq!(gl.live().images, 0);
    }

    #[test]
    fn detach_invalidates_name() {
        let gl = HeadlessGL::es3();
        let platform = HeadlessPlatform::new(&gl);

        let stream = platform.create_stream(Some(NativeStream(1)));
        let name = gl.gen_textures(1)[0];
        platform.attach(stream, name);
        assert_eq!(platform.stream_attachment(stream), Some(name));
        assert_eq!(platform.update_tex_image(stream), 1);
        assert_eq!(platform.update_tex_image(stream), 2);

        platform.detach(stream);
        assert!(!gl.texture_exists(name));
        assert_eq!(platform.stream_attachment(stream), None);
    }
}
