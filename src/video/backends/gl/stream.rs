//! The external-texture streaming pipeline.
//!
//! A *native* stream hands GL-sharable images to the platform directly, and the
//! texture it feeds is updated in place on the GL thread by `update_tex_image`.
//!
//! A *software* stream can't be latched by the GL thread context. Its images are
//! latched by a `StreamBlitter` running on the producer thread with a context of its
//! own, which copies each image into one of the slots of a ring:
//!
//! ```text
//!   producer (blitter context)                 GL thread (driver context)
//!   update_tex_image(source)
//!   blit source -> write[slot]
//!   fence + flush
//!   push StreamMessage  ------------------->   begin_frame: drain messages
//!                                              texture.name = read[slot]
//!                                              texture.fence = fence
//! ```
//!
//! `read[slot]` and `write[slot]` alias the same external storage. The producer
//! attaches `write[slot]` when it reallocates a storage, the GL thread attaches
//! `read[slot]` when it accepts an image of a slot whose storage differs from the one
//! it bound last. A slot the GL thread is reading is never written, and at most one
//! unconsumed message exists per stream.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gl;
use gl::types::*;
use spin::Mutex;

use super::blitter::ExternalBlitter;
use super::capabilities::Capabilities;
use super::state::GLState;
use super::types::TEXTURE_EXTERNAL_OES;
use crate::errors::*;
use crate::utils::hash::FastHashMap;
use crate::video::assets::prelude::*;
use crate::video::backends::GL;
use crate::video::platform::*;

/// Number of slots in the ring of a software stream.
pub const STREAM_RING_SIZE: usize = 3;

/// The format of the images copied out of software streams.
pub const STREAM_FORMAT: TextureFormat = TextureFormat::RGBA8;

#[derive(Debug, Default)]
struct ProducerState {
    /// The slot written last.
    cur: usize,
    width: u32,
    height: u32,
    storages: [Option<ExternalStorage>; STREAM_RING_SIZE],
    dimensions: [(u32, u32); STREAM_RING_SIZE],
    /// The texture the stream is attached to, nil if none.
    texture: TextureHandle,
    attached: bool,
    destroyed: bool,
}

/// The ring of a software stream. Every native name of it is created and deleted by
/// the GL thread, the producer only writes into them.
pub struct StreamRing {
    pub stream: PlatformStream,
    pub read: [GLuint; STREAM_RING_SIZE],
    pub write: [GLuint; STREAM_RING_SIZE],
    /// The external texture the platform stream latches its images into.
    pub source: GLuint,
    consumer: AtomicUsize,
    producer: Mutex<ProducerState>,
    /// The storages the read names are attached to. Touched by the GL thread only.
    bound: Mutex<[Option<ExternalStorage>; STREAM_RING_SIZE]>,
}

impl fmt::Debug for StreamRing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StreamRing")
            .field("stream", &self.stream)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("consumer", &self.consumer_slot())
            .finish()
    }
}

impl StreamRing {
    /// Generates the native names of a ring. Must be called on the GL thread.
    pub fn new(gl: &dyn GL, stream: PlatformStream) -> StreamRing {
        let names = gl.gen_textures((STREAM_RING_SIZE * 2 + 1) as GLsizei);

        let mut read = [0; STREAM_RING_SIZE];
        let mut write = [0; STREAM_RING_SIZE];
        read.copy_from_slice(&names[0..STREAM_RING_SIZE]);
        write.copy_from_slice(&names[STREAM_RING_SIZE..STREAM_RING_SIZE * 2]);

        StreamRing {
            stream,
            read,
            write,
            source: names[STREAM_RING_SIZE * 2],
            consumer: AtomicUsize::new(0),
            producer: Mutex::new(ProducerState::default()),
            bound: Mutex::new([None; STREAM_RING_SIZE]),
        }
    }

    /// The slot whose read name the GL thread samples.
    #[inline]
    pub fn consumer_slot(&self) -> usize {
        self.consumer.load(Ordering::Acquire)
    }

    /// The read name of the slot the GL thread samples.
    #[inline]
    pub fn consumer_name(&self) -> GLuint {
        self.read[self.consumer_slot()]
    }

    /// The write name of the slot the GL thread samples. It's a 2D texture sharing the
    /// storage of `consumer_name`.
    #[inline]
    pub fn consumer_write_name(&self) -> GLuint {
        self.write[self.consumer_slot()]
    }

    /// The storage the read name of `slot` is attached to.
    pub fn bound_storage(&self, slot: usize) -> Option<ExternalStorage> {
        self.bound.lock()[slot]
    }

    /// The storage the producer wrote the image of `slot` into.
    pub fn storage(&self, slot: usize) -> Option<ExternalStorage> {
        self.producer.lock().storages[slot]
    }

    /// Attaches the read name of `slot` to the storage the producer wrote into, if it
    /// is not attached to it yet. Must be called on the GL thread, with the read name
    /// bound to `target` on the active unit.
    pub fn rebind(&self, platform: &dyn Platform, target: GLenum, slot: usize) -> bool {
        let storage = self.storage(slot);
        let mut bound = self.bound.lock();
        if bound[slot] == storage {
            return false;
        }

        if let Some(v) = storage {
            platform.set_external_storage(v, target, self.read[slot]);
        }

        bound[slot] = storage;
        true
    }

    /// The size of the images produced from now on.
    pub fn set_dimensions(&self, width: u32, height: u32) {
        let mut producer = self.producer.lock();
        producer.width = width;
        producer.height = height;
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let producer = self.producer.lock();
        (producer.width, producer.height)
    }

    pub fn set_texture(&self, texture: TextureHandle) {
        self.producer.lock().texture = texture;
    }

    /// Releases everything the ring owns, except the platform stream. Must be called
    /// on the GL thread after the ring was removed from the registry.
    pub fn destroy(&self, gl: &dyn GL, state: &mut GLState, platform: &dyn Platform) {
        // Waits for the producer to be done with the ring.
        let mut producer = self.producer.lock();
        producer.destroyed = true;

        for storage in producer.storages.iter_mut() {
            if let Some(v) = storage.take() {
                platform.destroy_external_storage(v);
            }
        }

        if producer.attached {
            platform.detach(self.stream);
            producer.attached = false;
        }

        for &name in self.read.iter().chain(self.write.iter()) {
            state.unbind_texture(gl, gl::TEXTURE_2D, name);
        }

        state.unbind_texture(gl, TEXTURE_EXTERNAL_OES, self.source);
        state.delete_textures(gl, &self.read);
        state.delete_textures(gl, &self.write);
        state.delete_textures(gl, &[self.source]);
    }
}

/// The handoff of one image of a software stream, from the producer to the GL thread.
#[derive(Debug)]
pub struct StreamMessage {
    pub texture: TextureHandle,
    pub stream: StreamHandle,
    /// Signalled once the copy into `read_name` is done.
    pub fence: PlatformFence,
    pub read_name: GLuint,
    pub slot: usize,
    pub timestamp: i64,
}

/// The state shared between the driver and the stream blitters.
#[derive(Default)]
pub struct StreamShared {
    rings: Mutex<FastHashMap<StreamHandle, Arc<StreamRing>>>,
    messages: Mutex<Vec<StreamMessage>>,
}

impl StreamShared {
    pub fn register(&self, handle: StreamHandle, ring: Arc<StreamRing>) {
        self.rings.lock().insert(handle, ring);
    }

    pub fn unregister(&self, handle: StreamHandle) -> Option<Arc<StreamRing>> {
        self.rings.lock().remove(&handle)
    }

    pub fn ring(&self, handle: StreamHandle) -> Option<Arc<StreamRing>> {
        self.rings.lock().get(&handle).cloned()
    }

    pub fn streams(&self) -> Vec<StreamHandle> {
        self.rings.lock().keys().cloned().collect()
    }

    /// Number of messages waiting for the GL thread.
    pub fn pending(&self) -> usize {
        self.messages.lock().len()
    }

    /// Removes the unconsumed message of `stream`, if any.
    pub fn take_pending(&self, stream: StreamHandle) -> Option<StreamMessage> {
        let mut messages = self.messages.lock();
        let index = messages.iter().position(|v| v.stream == stream)?;
        Some(messages.remove(index))
    }

    fn push(&self, message: StreamMessage) {
        self.messages.lock().push(message);
    }

    /// Takes every pending message. `accept` decides if a message is still valid; the
    /// ring slots of the accepted ones become the slots the GL thread samples before
    /// any producer could observe the queue again.
    pub fn drain<F>(&self, mut accept: F) -> Vec<(StreamMessage, bool)>
    where
        F: FnMut(&StreamMessage) -> bool,
    {
        let mut messages = self.messages.lock();
        let rings = self.rings.lock();

        messages
            .drain(..)
            .map(|v| {
                let accepted = match rings.get(&v.stream) {
                    Some(ring) if accept(&v) => {
                        ring.consumer.store(v.slot, Ordering::Release);
                        true
                    }
                    _ => false,
                };

                (v, accepted)
            })
            .collect()
    }
}

/// Copies the images of software streams into their rings. Lives on the producer
/// thread, with a context sharing objects with the one of the GL thread.
pub struct StreamBlitter {
    shared: Arc<StreamShared>,
    platform: Arc<dyn Platform>,
    context: PlatformContext,
    gl: Box<dyn GL>,
    state: GLState,
    blitter: Option<ExternalBlitter>,
}

impl StreamBlitter {
    /// Creates the context of the blitter and makes it current on the calling thread.
    pub fn new(
        shared: Arc<StreamShared>,
        platform: Arc<dyn Platform>,
        gl: Box<dyn GL>,
    ) -> Result<Self> {
        let context = platform.create_context(true)?;
        if !platform.make_current(context, PlatformSwapChain::NONE, PlatformSwapChain::NONE) {
            platform.destroy_context(context);
            return Err(Error::Context("failed to make the blitter context current.".into()));
        }

        let caps = Capabilities::parse(&*gl)?;
        let mut state = GLState::new(&*gl, &caps, 1);
        let blitter = match ExternalBlitter::new(&*gl, &mut state, &caps) {
            Ok(v) => v,
            Err(err) => {
                platform.destroy_context(context);
                return Err(err);
            }
        };

        Ok(StreamBlitter {
            shared,
            platform,
            context,
            gl,
            state,
            blitter: Some(blitter),
        })
    }

    /// Latches and copies the latest image of every software stream.
    pub fn update_streams(&mut self) {
        for handle in self.shared.streams() {
            self.update_stream(handle);
        }
    }

    /// Latches the latest image of `handle`, copies it into the next free slot of its
    /// ring, and hands the slot to the GL thread. Returns false if the stream is gone
    /// or has no size yet.
    pub fn update_stream(&mut self, handle: StreamHandle) -> bool {
        let ring = match self.shared.ring(handle) {
            Some(v) => v,
            None => return false,
        };

        let blitter = match self.blitter {
            Some(ref v) => v,
            None => return false,
        };

        let gl = &*self.gl;
        let platform = &*self.platform;
        let mut producer = ring.producer.lock();
        if producer.destroyed {
            return false;
        }

        if !producer.attached {
            platform.attach(ring.stream, ring.source);
            producer.attached = true;
        }

        let timestamp = platform.update_tex_image(ring.stream);
        let (width, height) = (producer.width, producer.height);
        if width == 0 || height == 0 {
            return false;
        }

        // An image the GL thread never got to see is superseded by this one. Once it's
        // gone the consumer slot can't change until the next push.
        if let Some(stale) = self.shared.take_pending(handle) {
            trace!("Stream {} dropped the image of slot {}.", handle, stale.slot);
            platform.destroy_fence(stale.fence);
        }

        let consumer = ring.consumer_slot();
        let mut slot = (producer.cur + 1) % STREAM_RING_SIZE;
        if slot == consumer {
            slot = (slot + 1) % STREAM_RING_SIZE;
        }

        producer.cur = slot;

        if producer.storages[slot].is_none() || producer.dimensions[slot] != (width, height) {
            let storage = match producer.storages[slot] {
                Some(v) => v,
                None => platform.create_external_storage(),
            };

            let storage =
                platform.reallocate_external_storage(storage, width, height, STREAM_FORMAT);

            self.state.bind_texture(gl, 0, gl::TEXTURE_2D, ring.write[slot]);
            platform.set_external_storage(storage, gl::TEXTURE_2D, ring.write[slot]);

            producer.storages[slot] = Some(storage);
            producer.dimensions[slot] = (width, height);
        }

        blitter.blit(gl, &mut self.state, ring.source, ring.write[slot], width, height);
        self.state.unbind_texture(gl, gl::TEXTURE_2D, ring.write[slot]);

        // The fence must reach the GPU before the GL thread waits on it.
        let fence = platform.create_fence();
        gl.flush();

        self.shared.push(StreamMessage {
            texture: producer.texture,
            stream: handle,
            fence,
            read_name: ring.read[slot],
            slot,
            timestamp,
        });

        true
    }

    pub fn terminate(mut self) {
        if let Some(blitter) = self.blitter.take() {
            blitter.terminate(&*self.gl, &mut self.state);
        }

        self.platform.destroy_context(self.context);
    }
}

impl Drop for StreamBlitter {
    fn drop(&mut self) {
        if self.blitter.is_some() {
            warn!("StreamBlitter dropped without being terminated.");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::handle::HandleLike;

    fn message(stream: u32, slot: usize) -> StreamMessage {
        StreamMessage {
            texture: TextureHandle::from_id(1 << 4),
            stream: StreamHandle::from_id(stream << 4),
            fence: PlatformFence(u64::from(stream)),
            read_name: slot as GLuint + 1,
            slot,
            timestamp: 0,
        }
    }

    fn ring(stream: u64) -> Arc<StreamRing> {
        Arc::new(StreamRing {
            stream: PlatformStream(stream),
            read: [1, 2, 3],
            write: [4, 5, 6],
            source: 7,
            consumer: AtomicUsize::new(0),
            producer: Mutex::new(ProducerState::default()),
            bound: Mutex::new([None; STREAM_RING_SIZE]),
        })
    }

    #[test]
    fn pending() {
        let shared = StreamShared::default();
        shared.push(message(1, 1));
        shared.push(message(2, 1));

        assert_eq!(shared.pending(), 2);
        assert!(shared.take_pending(StreamHandle::from_id(3 << 4)).is_none());
        assert_eq!(shared.take_pending(StreamHandle::from_id(1 << 4)).unwrap().slot, 1);
        assert_eq!(shared.pending(), 1);
    }

    #[test]
    fn drain() {
        let shared = StreamShared::default();
        let first = ring(1);
        let second = ring(2);
        shared.register(StreamHandle::from_id(1 << 4), first.clone());
        shared.register(StreamHandle::from_id(2 << 4), second.clone());

        shared.push(message(1, 2));
        shared.push(message(2, 1));
        shared.push(message(5, 1));

        let drained = shared.drain(|v| v.stream != StreamHandle::from_id(2 << 4));
        assert_eq!(drained.len(), 3);
        assert!(drained[0].1);
        assert!(!drained[1].1);
        assert!(!drained[2].1);

        assert_eq!(first.consumer_slot(), 2);
        assert_eq!(first.consumer_name(), 3);
        assert_eq!(second.consumer_slot(), 0);
        assert_eq!(shared.pending(), 0);
    }
}
