extern crate crayon_video;
extern crate env_logger;
extern crate gl;
extern crate rand;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crayon_video::prelude::*;
use crayon_video::video::backends::gl::objects::*;

fn setup(gl: &HeadlessGL) -> GLDriver {
    let _ = env_logger::try_init();

    let settings = DriverSettings::default();
    let platform = Arc::new(HeadlessPlatform::new(gl));
    let arena = Arc::new(settings.arena());
    GLDriver::new(Box::new(gl.clone()), platform, settings, arena).unwrap()
}

fn target(driver: &mut GLDriver, width: u32, height: u32) -> (TextureHandle, RenderTargetHandle) {
    let texture = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        texture,
        TextureParams {
            width,
            height,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE,
            ..Default::default()
        },
    );

    let rt = driver.arena().allocate::<GLRenderTarget>();
    driver.create_render_target(
        rt,
        RenderTargetParams {
            targets: TargetBufferFlags::COLOR,
            width,
            height,
            color: TargetBufferInfo::new(texture),
            ..Default::default()
        },
    );

    (texture, rt)
}

fn rows(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    for y in 0..height {
        for _ in 0..width * 4 {
            data.push(y as u8 * 10);
        }
    }

    data
}

#[test]
fn rows_are_top_down() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl);

    let (texture, rt) = target(&mut driver, 4, 3);
    let name = driver.object::<GLTexture>(texture).name;
    assert!(gl.write_texture_level(name, 0, 0, &rows(4, 3)));

    let desc = PixelBufferDescriptor::new(vec![], PixelDataFormat::RGBA, PixelDataType::UByte);
    let desc = driver.read_pixels(rt, 0, 0, 4, 3, desc);
    assert_eq!(desc.buffer.len(), 4 * 3 * 4);

    for (i, row) in desc.buffer.chunks(16).enumerate() {
        let expected = (3 - 1 - i) as u8 * 10;
        assert!(row.iter().all(|&v| v == expected));
    }

    driver.destroy_render_target(rt);
    driver.destroy_texture(texture);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn rows_of_sub_rect() {
    let gl = HeadlessGL::desktop();
    let mut driver = setup(&gl);

    let mut rng = StdRng::from_seed([7; 32]);
    let data: Vec<u8> = (0..8 * 8 * 4).map(|_| rng.gen()).collect();

    let (texture, rt) = target(&mut driver, 8, 8);
    let name = driver.object::<GLTexture>(texture).name;
    assert!(gl.write_texture_level(name, 0, 0, &data));

    // Reads the 4x4 block at (2, 3) into the 6x5 image of a descriptor with offsets.
    let mut desc = PixelBufferDescriptor::new(vec![0; 6 * 5 * 4], PixelDataFormat::RGBA, PixelDataType::UByte);
    desc.stride = 6;
    desc.left = 1;
    desc.top = 1;

    let desc = driver.read_pixels(rt, 2, 3, 4, 4, desc);
    for i in 0..4 {
        let src = (3 + 4 - 1 - i) * 32 + 2 * 4;
        let dst = (1 + i) * 24 + 4;
        assert_eq!(&desc.buffer[dst..dst + 16], &data[src..src + 16]);
    }

    // Untouched.
    assert!(desc.buffer[0..24].iter().all(|&v| v == 0));

    driver.destroy_render_target(rt);
    driver.destroy_texture(texture);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn blit() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl);

    let (src_texture, src) = target(&mut driver, 4, 4);
    let (dst_texture, dst) = target(&mut driver, 4, 4);

    let name = driver.object::<GLTexture>(src_texture).name;
    assert!(gl.write_texture_level(name, 0, 0, &rows(4, 4)));

    let rect = Viewport::new(0, 0, 4, 4);
    driver.blit(
        TargetBufferFlags::COLOR,
        dst,
        rect,
        src,
        rect,
        SamplerMagFilter::Nearest,
    );

    let name = driver.object::<GLTexture>(dst_texture).name;
    assert_eq!(gl.texture_level(name, 0, 0).unwrap().data, rows(4, 4));

    driver.destroy_render_target(src);
    driver.destroy_render_target(dst);
    driver.destroy_texture(src_texture);
    driver.destroy_texture(dst_texture);
    driver.terminate();
    assert!(gl.errors().is_empty());
}
