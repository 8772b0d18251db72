//! A fixed-budget slab arena for driver objects.
//!
//! One contiguous memory region is split into three tiers, each serving a single
//! block size (16, 64 and 128 bytes). An object is addressed by a compact integer
//! handle whose value, shifted left by `HANDLE_SHIFT`, is the byte offset of the
//! object inside the region. Objects never move.
//!
//! Handles are minted on any thread (the producer thread usually), while objects
//! are constructed, resolved and destructed on the GL thread only. The allocator
//! state is the only data shared between threads, it is guarded by a spinlock as
//! every operation on it is O(1).

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};

use spin::Mutex;

use super::handle::{self, HandleId, HandleLike, HANDLE_SHIFT};
#[cfg(debug_assertions)]
use super::hash::FastHashMap;

/// The block sizes of the tiers, in bytes.
pub const TIER_BLOCK_SIZES: [usize; 3] = [16, 64, 128];

const REGION_ALIGNMENT: usize = 128;

/// The closed set of objects that live in a `HandleArena`. It's used as a runtime
/// type tag to detect misuse of handles in debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    VertexBuffer,
    IndexBuffer,
    RenderPrimitive,
    Texture,
    RenderTarget,
    UniformBuffer,
    SamplerGroup,
    Stream,
    Fence,
    SwapChain,
}

/// Types that could be placed into a `HandleArena`.
pub trait ArenaObject: Sized {
    const KIND: ObjectKind;
    type Handle: HandleLike;
}

#[derive(Debug, Clone, Copy)]
struct Tier {
    base: usize,
    capacity: usize,
    block: usize,
}

impl Tier {
    #[inline]
    fn contains(&self, offset: usize) -> bool {
        offset >= self.base && offset < self.base + self.capacity
    }
}

struct Allocator {
    cursors: [usize; 3],
    frees: [Vec<usize>; 3],
    lives: [usize; 3],
    #[cfg(debug_assertions)]
    tags: FastHashMap<HandleId, ObjectKind>,
}

pub struct HandleArena {
    memory: NonNull<u8>,
    layout: Layout,
    tiers: [Tier; 3],
    allocator: Mutex<Allocator>,
}

// The arena hands out raw memory; all accesses to objects are unsafe and bound to
// the GL thread by contract, while the allocator itself is behind a lock.
unsafe impl Send for HandleArena {}
unsafe impl Sync for HandleArena {}

impl HandleArena {
    /// Creates a new arena with the byte capacities of the small, medium and large
    /// tiers. Capacities are rounded down to multiples of the tier's block size.
    pub fn new(small: usize, medium: usize, large: usize) -> Self {
        let capacities = [small, medium, large];

        let mut tiers = [Tier {
            base: 0,
            capacity: 0,
            block: 0,
        }; 3];

        let mut base = 0;
        for i in 0..3 {
            let block = TIER_BLOCK_SIZES[i];
            let capacity = (capacities[i] / block) * block;
            tiers[i] = Tier {
                base,
                capacity,
                block,
            };

            base = round_up(base + capacity, REGION_ALIGNMENT);
        }

        let size = base.max(REGION_ALIGNMENT);
        assert!(
            (size >> HANDLE_SHIFT) < handle::NIL_HANDLE as usize,
            "HandleArena is too large to be addressed by handles."
        );

        let layout = match Layout::from_size_align(size, REGION_ALIGNMENT) {
            Ok(v) => v,
            Err(err) => panic!("HandleArena layout is invalid: {}.", err),
        };

        let memory = unsafe { alloc::alloc(layout) };
        let memory = match NonNull::new(memory) {
            Some(v) => v,
            None => alloc::handle_alloc_error(layout),
        };

        debug!(
            "HandleArena created with tiers {:?} ({} bytes).",
            tiers, size
        );

        HandleArena {
            memory,
            layout,
            tiers,
            allocator: Mutex::new(Allocator {
                cursors: [0; 3],
                frees: [Vec::new(), Vec::new(), Vec::new()],
                lives: [0; 3],
                #[cfg(debug_assertions)]
                tags: FastHashMap::default(),
            }),
        }
    }

    /// Allocates a handle that is big enough to hold a `T`.
    #[inline]
    pub fn allocate<T: ArenaObject>(&self) -> T::Handle {
        let id = self.allocate_bytes(mem::size_of::<T>(), mem::align_of::<T>());
        T::Handle::from_id(id)
    }

    /// Allocates a block of at least `size` bytes aligned to `align`, picking the
    /// smallest tier that fits.
    ///
    /// # Panics
    ///
    /// Panics if no tier could fit the request, or if the chosen tier is exhausted.
    /// The arena never grows, sizing its tiers is a deployment decision.
    pub fn allocate_bytes(&self, size: usize, align: usize) -> HandleId {
        let required = size.max(align);
        let index = match TIER_BLOCK_SIZES.iter().position(|&v| v >= required) {
            Some(v) => v,
            None => panic!(
                "HandleArena could not fit an object of {} bytes (align {}).",
                size, align
            ),
        };

        let tier = self.tiers[index];
        let mut allocator = self.allocator.lock();

        let local = if let Some(v) = allocator.frees[index].pop() {
            v
        } else {
            let cursor = allocator.cursors[index];
            if cursor + tier.block > tier.capacity {
                error!(
                    "HandleArena tier of {} bytes blocks is exhausted ({} bytes).",
                    tier.block, tier.capacity
                );

                panic!(
                    "HandleArena tier of {} bytes blocks is exhausted.",
                    tier.block
                );
            }

            allocator.cursors[index] = cursor + tier.block;
            cursor
        };

        allocator.lives[index] += 1;
        handle::from_offset(tier.base + local)
    }

    /// Constructs `value` in place at `handle`, returns a mutable reference to it.
    ///
    /// # Safety
    ///
    /// `handle` must be minted by `allocate::<T>()` of this arena, and must not hold
    /// a constructed object.
    pub unsafe fn construct<T: ArenaObject>(&self, handle: T::Handle, value: T) -> &mut T {
        #[cfg(debug_assertions)]
        {
            let mut allocator = self.allocator.lock();
            if let Some(kind) = allocator.tags.insert(handle.id(), T::KIND) {
                panic!(
                    "{:?} is constructed over a live {:?} object.",
                    handle, kind
                );
            }
        }

        let ptr = self.address_of::<T>(handle.id());
        ptr::write(ptr, value);
        &mut *ptr
    }

    /// Drops the object at `handle` in place and returns its memory to the tier.
    ///
    /// # Safety
    ///
    /// `handle` must address a live `T` constructed by this arena. Debug builds
    /// verify the type tag and abort on mismatch.
    pub unsafe fn destruct<T: ArenaObject>(&self, handle: T::Handle) {
        #[cfg(debug_assertions)]
        {
            let mut allocator = self.allocator.lock();
            match allocator.tags.remove(&handle.id()) {
                Some(kind) if kind == T::KIND => {}
                Some(kind) => panic!(
                    "{:?} destructed as {:?}, but it holds a {:?}.",
                    handle,
                    T::KIND,
                    kind
                ),
                None => panic!("{:?} destructed as {:?}, but it's dead.", handle, T::KIND),
            }
        }

        ptr::drop_in_place(self.address_of::<T>(handle.id()));
        self.free(handle.id());
    }

    /// Returns the memory of a handle that never got an object constructed.
    pub fn free(&self, id: HandleId) {
        let offset = handle::offset_of(id);
        let index = self.tier_index(offset);
        let tier = self.tiers[index];

        let mut allocator = self.allocator.lock();
        allocator.frees[index].push(offset - tier.base);
        allocator.lives[index] -= 1;
    }

    /// Resolves `handle` into a shared reference.
    ///
    /// # Safety
    ///
    /// The handle must address a live `T` of this arena. There are no bounds checks
    /// in release builds.
    #[inline]
    pub unsafe fn get<T: ArenaObject>(&self, handle: T::Handle) -> &T {
        self.verify::<T>(handle.id());
        &*self.address_of::<T>(handle.id())
    }

    /// Resolves `handle` into a mutable reference.
    ///
    /// # Safety
    ///
    /// Same as `get`, and the caller must not alias the returned reference.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut<T: ArenaObject>(&self, handle: T::Handle) -> &mut T {
        self.verify::<T>(handle.id());
        &mut *self.address_of::<T>(handle.id())
    }

    /// Returns true if `handle` holds a constructed `T`. Only tracked in debug
    /// builds, always returns true in release builds.
    pub fn is_alive<T: ArenaObject>(&self, handle: T::Handle) -> bool {
        #[cfg(debug_assertions)]
        {
            self.allocator.lock().tags.get(&handle.id()) == Some(&T::KIND)
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = handle;
            true
        }
    }

    /// The base address of the backing memory region.
    #[inline]
    pub fn base(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    /// Returns the (block size, capacity in bytes) of the tier holding `id`.
    pub fn tier_of(&self, id: HandleId) -> (usize, usize) {
        let tier = self.tiers[self.tier_index(handle::offset_of(id))];
        (tier.block, tier.capacity)
    }

    /// Returns the byte offset of `id` relative to the base of its tier.
    pub fn tier_offset(&self, id: HandleId) -> usize {
        let offset = handle::offset_of(id);
        offset - self.tiers[self.tier_index(offset)].base
    }

    /// Returns the number of live blocks in each tier.
    pub fn lives(&self) -> [usize; 3] {
        self.allocator.lock().lives
    }

    #[inline]
    unsafe fn address_of<T>(&self, id: HandleId) -> *mut T {
        self.memory.as_ptr().add(handle::offset_of(id)) as *mut T
    }

    #[inline]
    fn tier_index(&self, offset: usize) -> usize {
        match self.tiers.iter().position(|v| v.contains(offset)) {
            Some(v) => v,
            None => panic!("Offset {} is out of the bounds of HandleArena.", offset),
        }
    }

    #[cfg(debug_assertions)]
    #[inline]
    fn verify<T: ArenaObject>(&self, id: HandleId) {
        let allocator = self.allocator.lock();
        let kind = allocator.tags.get(&id);
        assert!(
            kind == Some(&T::KIND),
            "Handle {} resolved as {:?}, but it holds {:?}.",
            id,
            T::KIND,
            kind
        );
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn verify<T: ArenaObject>(&self, _: HandleId) {}
}

impl Drop for HandleArena {
    fn drop(&mut self) {
        let lives = self.allocator.lock().lives;
        if lives.iter().any(|&v| v > 0) {
            warn!("HandleArena dropped with live blocks {:?}.", lives);
        }

        unsafe {
            alloc::dealloc(self.memory.as_ptr(), self.layout);
        }
    }
}

#[inline]
fn round_up(v: usize, align: usize) -> usize {
    (v + align - 1) / align * align
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    impl_handle!(ProbeHandle);

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Probe {
        value: u64,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ArenaObject for Probe {
        const KIND: ObjectKind = ObjectKind::Fence;
        type Handle = ProbeHandle;
    }

    struct Wide {
        _values: [u64; 12],
    }

    impl ArenaObject for Wide {
        const KIND: ObjectKind = ObjectKind::Texture;
        type Handle = ProbeHandle;
    }

    #[test]
    fn tiers() {
        let arena = HandleArena::new(64, 256, 512);

        let small = arena.allocate_bytes(8, 8);
        let medium = arena.allocate_bytes(48, 8);
        let large = arena.allocate_bytes(100, 8);

        assert_eq!(arena.tier_of(small), (16, 64));
        assert_eq!(arena.tier_of(medium), (64, 256));
        assert_eq!(arena.tier_of(large), (128, 512));
        assert_eq!(arena.lives(), [1, 1, 1]);
    }

    #[test]
    fn construct_and_destruct() {
        let arena = HandleArena::new(256, 256, 256);
        let h = arena.allocate::<Probe>();

        unsafe {
            arena.construct(h, Probe { value: 7 });
            assert!(arena.is_alive::<Probe>(h));
            assert_eq!(arena.get::<Probe>(h).value, 7);

            arena.get_mut::<Probe>(h).value = 8;
            assert_eq!(arena.get::<Probe>(h).value, 8);

            let before = DROPS.load(Ordering::SeqCst);
            arena.destruct::<Probe>(h);
            assert!(DROPS.load(Ordering::SeqCst) > before);
        }

        assert_eq!(arena.lives(), [0, 0, 0]);
    }

    #[test]
    fn free_list_reuse() {
        let arena = HandleArena::new(32, 64, 128);

        for _ in 0..16 {
            let h = arena.allocate::<Probe>();
            unsafe {
                arena.construct(h, Probe { value: 1 });
                arena.destruct::<Probe>(h);
            }
        }

        let h1 = arena.allocate_bytes(16, 8);
        let h2 = arena.allocate_bytes(16, 8);
        assert_ne!(h1, h2);
    }

    #[test]
    #[should_panic]
    fn exhausted() {
        let arena = HandleArena::new(32, 64, 128);
        for _ in 0..3 {
            arena.allocate_bytes(16, 8);
        }
    }

    #[test]
    #[should_panic]
    fn oversized() {
        let arena = HandleArena::new(32, 64, 128);
        arena.allocate_bytes(129, 8);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn kind_mismatch() {
        let arena = HandleArena::new(256, 256, 256);
        let h = arena.allocate::<Wide>();
        unsafe {
            arena.construct(h, Wide { _values: [0; 12] });
            arena.destruct::<Probe>(h);
        }
    }

    #[test]
    fn concurrent_allocation() {
        let arena = Arc::new(HandleArena::new(16 * 1024, 0, 0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let arena = arena.clone();
                ::std::thread::spawn(move || {
                    (0..128)
                        .map(|_| arena.allocate_bytes(16, 8))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut handles = ::std::collections::HashSet::new();
        for w in workers {
            for h in w.join().unwrap() {
                assert!(handles.insert(h));
            }
        }

        assert_eq!(handles.len(), 512);
        assert_eq!(arena.lives()[0], 512);
    }
}
