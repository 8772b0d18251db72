extern crate crayon_video;
extern crate rand;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crayon_video::prelude::*;
use crayon_video::utils::arena::TIER_BLOCK_SIZES;
use crayon_video::utils::handle::{self, HandleLike};
use crayon_video::video::backends::gl::objects::*;

#[test]
fn handles_address_their_tier() {
    let arena = HandleArena::new(16 * 128, 64 * 128, 128 * 128);
    let mut rng = StdRng::from_seed([11; 32]);
    let mut handles = Vec::new();

    for _ in 0..96 {
        let size = rng.gen_range(1, 129);
        let align = [1, 2, 4, 8][rng.gen_range(0, 4)];
        let id = arena.allocate_bytes(size, align);

        let (block, capacity) = arena.tier_of(id);
        assert!(block >= size);
        assert_eq!(TIER_BLOCK_SIZES.iter().find(|&&v| v >= size), Some(&block));

        let offset = arena.tier_offset(id);
        assert_eq!(offset % block, 0);
        assert!(offset < capacity);

        let address = arena.base() as usize + handle::offset_of(id);
        assert_eq!(address % align, 0);

        handles.push(id);
    }

    handles.sort();
    handles.dedup();
    assert_eq!(handles.len(), 96);

    for id in handles {
        arena.free(id);
    }

    assert_eq!(arena.lives(), [0, 0, 0]);
}

#[test]
fn freed_blocks_are_reused() {
    let arena = HandleArena::new(16 * 4, 64, 128);
    let mut rng = StdRng::from_seed([5; 32]);
    let mut live = Vec::new();

    // Far more allocations than the tier could hold without reuse.
    for _ in 0..1024 {
        if live.len() == 4 || (!live.is_empty() && rng.gen()) {
            let i = rng.gen_range(0, live.len());
            arena.free(live.swap_remove(i));
        } else {
            live.push(arena.allocate_bytes(16, 8));
        }

        assert_eq!(arena.lives()[0], live.len());
    }
}

#[test]
fn driver_objects_fit_default_settings() {
    let arena = DriverSettings::default().arena();

    let handles = [
        arena.allocate::<GLVertexBuffer>().id(),
        arena.allocate::<GLIndexBuffer>().id(),
        arena.allocate::<GLRenderPrimitive>().id(),
        arena.allocate::<GLTexture>().id(),
        arena.allocate::<GLRenderTarget>().id(),
        arena.allocate::<GLUniformBuffer>().id(),
        arena.allocate::<GLSamplerGroup>().id(),
        arena.allocate::<GLStream>().id(),
        arena.allocate::<GLFence>().id(),
        arena.allocate::<GLSwapChain>().id(),
    ];

    assert_eq!(arena.lives().iter().sum::<usize>(), handles.len());
    for &id in &handles {
        arena.free(id);
    }
}

#[test]
fn handles_minted_on_producer_threads() {
    let arena = Arc::new(HandleArena::new(16 * 1024, 64 * 1024, 128 * 1024));

    let workers: Vec<_> = (0..3)
        .map(|i| {
            let arena = arena.clone();
            std::thread::spawn(move || {
                let mut rng = StdRng::from_seed([i as u8; 32]);
                (0..200)
                    .map(|_| arena.allocate_bytes(rng.gen_range(1, 129), 8))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut handles = Vec::new();
    for w in workers {
        handles.extend(w.join().unwrap());
    }

    handles.sort();
    handles.dedup();
    assert_eq!(handles.len(), 600);
    assert_eq!(arena.lives().iter().sum::<usize>(), 600);
}
