extern crate crayon_video;
extern crate env_logger;
extern crate gl;
extern crate rand;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crayon_video::prelude::*;
use crayon_video::video::backends::gl::objects::*;
use crayon_video::video::backends::gl::types::TEXTURE_EXTERNAL_OES;

fn setup(gl: &HeadlessGL) -> (GLDriver, Arc<HeadlessPlatform>) {
    let _ = env_logger::try_init();

    let settings = DriverSettings::default();
    let platform = Arc::new(HeadlessPlatform::new(gl));
    let arena = Arc::new(settings.arena());
    let driver = GLDriver::new(Box::new(gl.clone()), platform.clone(), settings, arena).unwrap();
    (driver, platform)
}

fn external_texture(driver: &mut GLDriver) -> TextureHandle {
    let h = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        h,
        TextureParams {
            sampler: SamplerType::SamplerExternal,
            width: 1,
            height: 1,
            usage: TextureUsage::SAMPLEABLE,
            ..Default::default()
        },
    );

    h
}

#[test]
fn ring_never_writes_the_sampled_slot() {
    let gl = HeadlessGL::es3();
    let (mut driver, platform) = setup(&gl);

    let texture = external_texture(&mut driver);
    assert_eq!(driver.object::<GLTexture>(texture).target, TEXTURE_EXTERNAL_OES);

    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_stream_dimensions(stream, 8, 8);
    driver.set_external_stream(texture, Some(stream));

    let ring = driver.streams().ring(stream).unwrap();
    let mut blitter = driver.stream_blitter().unwrap();
    let mut rng = StdRng::from_seed([3; 32]);

    for frame in 0..32 {
        let sampled = driver.object::<GLTexture>(texture).name;
        assert_eq!(sampled, ring.consumer_name());

        for _ in 0..rng.gen_range(1, 4) {
            assert!(blitter.update_stream(stream));
        }

        driver.begin_frame(frame as i64 * 16_000_000, frame);
        driver.bind_texture(0, texture);
        driver.end_frame(frame);

        let latched = driver.object::<GLTexture>(texture).name;
        assert_ne!(latched, sampled);
        assert!(ring.read.contains(&latched));
        assert_eq!(gl.texture_binding(0, TEXTURE_EXTERNAL_OES), latched);
        assert_eq!(driver.streams().pending(), 0);
    }

    assert!(driver.get_stream_timestamp(stream) > 0);
    assert_eq!(platform.live().storages, 3);

    blitter.terminate();
    driver.destroy_stream(stream);
    driver.destroy_texture(texture);
    driver.terminate();

    assert_eq!(platform.live().storages, 0);
    assert_eq!(platform.live().streams, 0);
    assert_eq!(platform.live().fences, 0);
    assert_eq!(platform.live().contexts, 0);
    assert_eq!(gl.live().textures, 0);
}

#[test]
fn resized_images_are_rebound() {
    let gl = HeadlessGL::es3();
    let (mut driver, platform) = setup(&gl);

    let texture = external_texture(&mut driver);
    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_external_stream(texture, Some(stream));

    let mut blitter = driver.stream_blitter().unwrap();
    assert!(!blitter.update_stream(stream));

    driver.set_stream_dimensions(stream, 4, 2);
    assert!(blitter.update_stream(stream));
    driver.begin_frame(0, 0);

    let name = driver.object::<GLTexture>(texture).name;
    let image = gl.texture_level(name, 0, 0).unwrap();
    assert_eq!((image.width, image.height), (4, 2));

    driver.set_stream_dimensions(stream, 2, 2);
    for frame in 1..4 {
        assert!(blitter.update_stream(stream));
        driver.begin_frame(frame, frame as u32);
    }

    let name = driver.object::<GLTexture>(texture).name;
    let image = gl.texture_level(name, 0, 0).unwrap();
    assert_eq!((image.width, image.height), (2, 2));

    blitter.terminate();
    driver.destroy_stream(stream);
    driver.destroy_texture(texture);
    driver.terminate();
    assert_eq!(platform.live().storages, 0);
}

#[test]
fn images_of_detached_streams_are_dropped() {
    let gl = HeadlessGL::es3();
    let (mut driver, platform) = setup(&gl);

    let texture = external_texture(&mut driver);
    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_stream_dimensions(stream, 2, 2);
    driver.set_external_stream(texture, Some(stream));

    let mut blitter = driver.stream_blitter().unwrap();
    assert!(blitter.update_stream(stream));

    driver.set_external_stream(texture, None);
    let detached = driver.object::<GLTexture>(texture).name;

    driver.begin_frame(0, 0);
    assert_eq!(driver.object::<GLTexture>(texture).name, detached);
    assert_eq!(driver.streams().pending(), 0);
    assert_eq!(platform.live().fences, 0);

    blitter.terminate();
    driver.destroy_stream(stream);
    assert!(driver.streams().ring(stream).is_none());

    // The blitter of a destroyed stream has nothing to do.
    let mut blitter = driver.stream_blitter().unwrap();
    assert!(!blitter.update_stream(stream));
    blitter.terminate();

    driver.destroy_texture(texture);
    driver.terminate();
    assert_eq!(platform.live().contexts, 0);
}

#[test]
fn held_fences_are_waited_on() {
    let gl = HeadlessGL::es3();
    let (mut driver, platform) = setup(&gl);

    let texture = external_texture(&mut driver);
    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_stream_dimensions(stream, 2, 2);
    driver.set_external_stream(texture, Some(stream));

    let mut blitter = driver.stream_blitter().unwrap();
    platform.hold_fences(true);
    assert!(blitter.update_stream(stream));
    driver.begin_frame(0, 0);

    // Sampled anyway once the wait times out, the fence is kept.
    driver.bind_texture(0, texture);
    assert_eq!(platform.live().fences, 1);

    platform.signal_fences();
    driver.bind_texture(0, texture);
    assert_eq!(platform.live().fences, 0);

    blitter.terminate();
    driver.destroy_stream(stream);
    driver.destroy_texture(texture);
    driver.terminate();
}

#[test]
fn native_streams() {
    let gl = HeadlessGL::es3();
    let (mut driver, platform) = setup(&gl);

    let texture = external_texture(&mut driver);
    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, Some(NativeStream(42)));
    driver.set_external_stream(texture, Some(stream));

    let native = driver.object::<GLStream>(stream).stream;
    let name = driver.object::<GLTexture>(texture).name;
    assert!(platform.is_native_stream(native));
    assert_eq!(platform.stream_attachment(native), Some(name));

    driver.begin_frame(0, 0);
    driver.begin_frame(1, 1);
    assert_eq!(driver.get_stream_timestamp(stream), 2);

    driver.destroy_stream(stream);
    assert_eq!(platform.stream_attachment(native), None);
    assert_ne!(driver.object::<GLTexture>(texture).name, name);

    driver.destroy_texture(texture);
    driver.terminate();
    assert_eq!(platform.live().streams, 0);
}

#[test]
fn superseded_images_stay_bound() {
    let gl = HeadlessGL::es3();
    let (mut driver, platform) = setup(&gl);

    let texture = external_texture(&mut driver);
    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_stream_dimensions(stream, 4, 4);
    driver.set_external_stream(texture, Some(stream));

    let mut blitter = driver.stream_blitter().unwrap();

    // The first image is replaced before any frame latches it, after its slot got a
    // storage of its own.
    assert!(blitter.update_stream(stream));
    assert!(blitter.update_stream(stream));
    driver.begin_frame(0, 0);

    for frame in 1..4 {
        let name = driver.object::<GLTexture>(texture).name;
        let image = gl.texture_level(name, 0, 0).unwrap();
        assert_eq!((image.width, image.height), (4, 4));

        assert!(blitter.update_stream(stream));
        driver.begin_frame(frame, frame as u32);
    }

    let name = driver.object::<GLTexture>(texture).name;
    assert!(gl.texture_level(name, 0, 0).is_some());
    assert_eq!(platform.live().storages, 3);

    blitter.terminate();
    driver.destroy_stream(stream);
    driver.destroy_texture(texture);
    driver.terminate();
    assert_eq!(platform.live().storages, 0);
}

#[test]
fn sampled_images_are_read_back() {
    let gl = HeadlessGL::es3();
    let (mut driver, _) = setup(&gl);

    let texture = external_texture(&mut driver);
    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_stream_dimensions(stream, 4, 3);
    driver.set_external_stream(texture, Some(stream));

    let empty = PixelBufferDescriptor::new(vec![], PixelDataFormat::RGBA, PixelDataType::UByte);
    let desc = driver.read_stream_pixels(stream, 0, 0, 4, 3, empty);
    assert!(desc.buffer.is_empty());

    let ring = driver.streams().ring(stream).unwrap();
    let mut blitter = driver.stream_blitter().unwrap();
    assert!(blitter.update_stream(stream));
    driver.begin_frame(0, 0);

    let mut data = Vec::new();
    for y in 0..3u8 {
        data.extend(std::iter::repeat(y * 10).take(4 * 4));
    }
    assert!(gl.write_texture_level(ring.write[ring.consumer_slot()], 0, 0, &data));

    let desc = PixelBufferDescriptor::new(vec![], PixelDataFormat::RGBA, PixelDataType::UByte);
    let desc = driver.read_stream_pixels(stream, 0, 0, 4, 3, desc);
    assert_eq!(desc.buffer.len(), 4 * 3 * 4);

    for (i, row) in desc.buffer.chunks(16).enumerate() {
        let expected = (3 - 1 - i) as u8 * 10;
        assert!(row.iter().all(|&v| v == expected));
    }

    blitter.terminate();
    driver.destroy_stream(stream);
    driver.destroy_texture(texture);
    driver.terminate();
    assert!(gl.errors().is_empty());
}
