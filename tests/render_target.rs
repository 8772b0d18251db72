extern crate crayon_video;
extern crate env_logger;
extern crate gl;

use std::sync::Arc;

use crayon_video::prelude::*;
use crayon_video::video::backends::gl::objects::*;
use crayon_video::video::backends::headless::Attachment;

fn setup(gl: &HeadlessGL, settings: DriverSettings) -> GLDriver {
    let _ = env_logger::try_init();

    let platform = Arc::new(HeadlessPlatform::new(gl));
    let arena = Arc::new(settings.arena());
    GLDriver::new(Box::new(gl.clone()), platform, settings, arena).unwrap()
}

fn color_texture(driver: &mut GLDriver, width: u32, height: u32, samples: u8) -> TextureHandle {
    let h = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        h,
        TextureParams {
            width,
            height,
            samples,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE,
            ..Default::default()
        },
    );

    h
}

fn render_target(driver: &mut GLDriver, color: TextureHandle, targets: TargetBufferFlags, samples: u8) -> RenderTargetHandle {
    let (width, height) = {
        let t = driver.object::<GLTexture>(color);
        (t.params.width, t.params.height)
    };

    let h = driver.arena().allocate::<GLRenderTarget>();
    driver.create_render_target(
        h,
        RenderTargetParams {
            targets,
            width,
            height,
            samples,
            color: TargetBufferInfo::new(color),
            ..Default::default()
        },
    );

    h
}

#[test]
fn multisample_into_plain_texture() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl, DriverSettings::default());
    assert!(!driver.caps().has_multisample_texture());
    assert!(!driver.caps().has_multisampled_render_to_texture());

    let color = color_texture(&mut driver, 4, 4, 1);
    let rt = render_target(&mut driver, color, TargetBufferFlags::COLOR_AND_DEPTH, 4);

    let target = driver.object::<GLRenderTarget>(rt);
    assert_eq!(target.samples, 1);
    assert_ne!(target.depth.renderbuffer, 0);
    assert_eq!(gl.renderbuffer_samples(target.depth.renderbuffer), Some(0));

    let texture = driver.object::<GLTexture>(color).name;
    assert_eq!(
        gl.framebuffer_attachment(target.fbo, gl::COLOR_ATTACHMENT0),
        Some(Attachment::Texture {
            name: texture,
            level: 0,
            layer: 0
        })
    );

    driver.destroy_render_target(rt);
    driver.destroy_texture(color);
    driver.terminate();

    assert_eq!(gl.live().framebuffers, 0);
    assert_eq!(gl.live().renderbuffers, 0);
    assert!(gl.errors().is_empty());
}

#[test]
fn multisample_textures() {
    let gl = HeadlessGL::desktop();
    let mut driver = setup(&gl, DriverSettings::default());

    let color = color_texture(&mut driver, 8, 8, 4);
    assert_eq!(
        driver.object::<GLTexture>(color).target,
        gl::TEXTURE_2D_MULTISAMPLE
    );

    let rt = render_target(&mut driver, color, TargetBufferFlags::COLOR_AND_DEPTH, 4);
    let target = driver.object::<GLRenderTarget>(rt);
    assert_eq!(target.samples, 4);
    assert_eq!(gl.renderbuffer_samples(target.depth.renderbuffer), Some(4));

    driver.destroy_render_target(rt);
    driver.destroy_texture(color);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn samples_are_clamped() {
    let gl = HeadlessGL::desktop();
    let mut driver = setup(&gl, DriverSettings::default());

    let color = color_texture(&mut driver, 4, 4, 16);
    assert_eq!(driver.object::<GLTexture>(color).params.samples, 4);

    driver.destroy_texture(color);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn packed_depth_stencil() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl, DriverSettings::default());

    let color = color_texture(&mut driver, 4, 4, 1);
    let rt = render_target(&mut driver, color, TargetBufferFlags::ALL, 1);

    let target = driver.object::<GLRenderTarget>(rt);
    let renderbuffer = target.depth.renderbuffer;
    assert_ne!(renderbuffer, 0);
    assert_eq!(target.stencil.renderbuffer, renderbuffer);
    assert_eq!(gl.renderbuffer_format(renderbuffer), Some(gl::DEPTH24_STENCIL8));
    assert_eq!(
        gl.framebuffer_attachment(target.fbo, gl::DEPTH_ATTACHMENT),
        Some(Attachment::Renderbuffer(renderbuffer))
    );
    assert_eq!(
        gl.framebuffer_attachment(target.fbo, gl::STENCIL_ATTACHMENT),
        Some(Attachment::Renderbuffer(renderbuffer))
    );

    driver.destroy_render_target(rt);
    driver.destroy_texture(color);
    driver.terminate();

    assert_eq!(gl.live().renderbuffers, 0);
    assert!(gl.errors().is_empty());
}

#[test]
fn default_render_target() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl, DriverSettings::default());

    let rt = driver.arena().allocate::<GLRenderTarget>();
    driver.create_default_render_target(rt);
    assert_eq!(driver.object::<GLRenderTarget>(rt).fbo, 0);

    let mut params = RenderPassParams::default();
    params.viewport = Viewport::new(0, 0, 640, 480);
    params.flags.discard_start = TargetBufferFlags::ALL;

    gl.reset_calls();
    driver.begin_render_pass(rt, params);
    driver.end_render_pass();
    assert_eq!(gl.calls("invalidate_framebuffer"), 1);
    assert_eq!(gl.viewport(), [0, 0, 640, 480]);

    driver.destroy_render_target(rt);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn clear_honors_scissor() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl, DriverSettings::default());

    let color = color_texture(&mut driver, 4, 4, 1);
    let rt = render_target(&mut driver, color, TargetBufferFlags::COLOR, 1);
    let name = driver.object::<GLTexture>(color).name;

    let mut params = RenderPassParams::default();
    params.viewport = Viewport::new(0, 0, 4, 4);
    params.flags.clear = TargetBufferFlags::COLOR;
    params.clear_color = [1.0, 0.0, 0.0, 1.0];

    driver.set_viewport_scissor(Viewport::new(0, 0, 2, 2));
    driver.begin_render_pass(rt, params);
    driver.end_render_pass();

    let image = gl.texture_level(name, 0, 0).unwrap();
    assert_eq!(&image.data[0..4], &[255, 0, 0, 255]);
    assert_eq!(&image.data[8..12], &[0, 0, 0, 0]);

    params.flags.ignore_scissor = true;
    params.clear_color = [0.0, 1.0, 0.0, 1.0];
    driver.begin_render_pass(rt, params);
    driver.end_render_pass();

    let image = gl.texture_level(name, 0, 0).unwrap();
    assert!(image.data.chunks(4).all(|v| v == [0, 255, 0, 255]));
    assert!(gl.is_enabled(gl::SCISSOR_TEST));

    driver.destroy_render_target(rt);
    driver.destroy_texture(color);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn geometry_clear() {
    let gl = HeadlessGL::es3();
    let settings = DriverSettings {
        force_geometry_clear: Some(true),
        ..Default::default()
    };

    let mut driver = setup(&gl, settings);
    let color = color_texture(&mut driver, 4, 4, 1);
    let rt = render_target(&mut driver, color, TargetBufferFlags::COLOR, 1);

    let mut params = RenderPassParams::default();
    params.viewport = Viewport::new(0, 0, 4, 4);
    params.flags.clear = TargetBufferFlags::COLOR;

    gl.reset_calls();
    driver.begin_render_pass(rt, params);
    driver.end_render_pass();
    assert_eq!(gl.calls("clear"), 0);
    assert_eq!(gl.calls("draw_arrays"), 1);

    driver.destroy_render_target(rt);
    driver.destroy_texture(color);
    driver.terminate();

    assert_eq!(gl.live().programs, 0);
    assert!(gl.errors().is_empty());
}

#[test]
fn discard_can_be_disabled() {
    let gl = HeadlessGL::es3();
    let settings = DriverSettings {
        disable_invalidate_framebuffer: Some(true),
        ..Default::default()
    };

    let mut driver = setup(&gl, settings);
    let color = color_texture(&mut driver, 4, 4, 1);
    let rt = render_target(&mut driver, color, TargetBufferFlags::COLOR, 1);

    let mut params = RenderPassParams::default();
    params.flags.discard_start = TargetBufferFlags::COLOR;
    params.flags.discard_end = TargetBufferFlags::COLOR;

    gl.reset_calls();
    driver.begin_render_pass(rt, params);
    driver.end_render_pass();
    assert_eq!(gl.calls("invalidate_framebuffer"), 0);

    driver.destroy_render_target(rt);
    driver.destroy_texture(color);
    driver.terminate();
}
