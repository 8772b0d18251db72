extern crate crayon_video;
extern crate env_logger;
extern crate gl;

use std::sync::Arc;

use crayon_video::prelude::*;
use crayon_video::video::backends::gl::objects::*;

fn setup(gl: &HeadlessGL, settings: DriverSettings) -> (GLDriver, Arc<HeadlessPlatform>) {
    let _ = env_logger::try_init();

    let platform = Arc::new(HeadlessPlatform::new(gl));
    let arena = Arc::new(settings.arena());
    let driver = GLDriver::new(Box::new(gl.clone()), platform.clone(), settings, arena).unwrap();
    (driver, platform)
}

fn rgba(width: u32, height: u32, seed: u8) -> PixelBufferDescriptor {
    let buf: Vec<u8> = (0..width * height * 4).map(|v| (v as u8).wrapping_add(seed)).collect();
    PixelBufferDescriptor::new(buf, PixelDataFormat::RGBA, PixelDataType::UByte)
}

#[test]
fn texture_on_unit_three() {
    let gl = HeadlessGL::es3();
    let (mut driver, _) = setup(&gl, DriverSettings::default());

    let h = driver.arena().allocate::<GLTexture>();
    let params = TextureParams {
        width: 4,
        height: 4,
        levels: 3,
        ..Default::default()
    };

    driver.create_texture(h, params);
    driver.update_2d_image(h, 0, 1, 1, 2, 2, rgba(2, 2, 100));
    driver.generate_mipmaps(h);
    driver.bind_texture(3, h);

    let name = driver.object::<GLTexture>(h).name;
    assert!(gl.texture_exists(name));
    assert_eq!(gl.texture_binding(3, gl::TEXTURE_2D), name);
    assert_eq!(driver.state().texture_binding(3, gl::TEXTURE_2D), name);

    // The second row of the 4x4 image holds the first row of the upload.
    let image = gl.texture_level(name, 0, 0).unwrap();
    assert_eq!(&image.data[16 + 4..16 + 12], &rgba(2, 2, 100).buffer[0..8]);
    assert_eq!(&image.data[0..16], &[0u8; 16][..]);

    driver.destroy_texture(h);
    assert!(!gl.texture_exists(name));
    assert_eq!(gl.texture_binding(3, gl::TEXTURE_2D), 0);
    assert_eq!(driver.state().texture_binding(3, gl::TEXTURE_2D), 0);
    assert_eq!(driver.arena().lives(), [0, 0, 0]);
    assert!(gl.errors().is_empty());

    driver.terminate();
}

#[test]
fn short_uploads_are_rejected() {
    let gl = HeadlessGL::es3();
    let (mut driver, _) = setup(&gl, DriverSettings::default());

    let h = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        h,
        TextureParams {
            width: 4,
            height: 4,
            ..Default::default()
        },
    );

    gl.reset_calls();
    driver.update_2d_image(h, 0, 0, 0, 4, 4, rgba(2, 2, 0));
    assert_eq!(gl.calls("tex_sub_image_2d"), 0);

    driver.destroy_texture(h);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn compressed_fallback() {
    let gl = HeadlessGL::es3();
    let (mut driver, _) = setup(&gl, DriverSettings::default());
    assert!(!driver.is_texture_format_supported(TextureFormat::DxtRGBA));

    let h = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        h,
        TextureParams {
            width: 8,
            height: 8,
            format: TextureFormat::DxtRGBA,
            ..Default::default()
        },
    );

    let t = driver.object::<GLTexture>(h);
    assert_eq!(t.params.format, TextureFormat::RGBA8);
    assert_eq!(t.internal_format, gl::RGBA8);
    assert_eq!(gl.texture_info(t.name).unwrap().1, gl::RGBA8);

    driver.destroy_texture(h);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn min_max_levels() {
    let gl = HeadlessGL::desktop();
    let (mut driver, _) = setup(&gl, DriverSettings::default());

    let h = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        h,
        TextureParams {
            width: 16,
            height: 16,
            levels: 5,
            ..Default::default()
        },
    );

    let name = driver.object::<GLTexture>(h).name;
    assert_eq!(gl.texture_parameter(name, gl::TEXTURE_MAX_LEVEL), Some(4));

    driver.set_min_max_level(h, 1, 2);
    assert_eq!(gl.texture_parameter(name, gl::TEXTURE_BASE_LEVEL), Some(1));
    assert_eq!(gl.texture_parameter(name, gl::TEXTURE_MAX_LEVEL), Some(2));
    assert_eq!(driver.object::<GLTexture>(h).max_level, 2);

    driver.destroy_texture(h);
    driver.terminate();
}

#[test]
fn buffers() {
    let gl = HeadlessGL::es3();
    let (mut driver, _) = setup(&gl, DriverSettings::default());

    let mut attributes = AttributeArray::default();
    attributes[0] = VertexAttribute::new(0, ElementType::Float3, 0, 12);
    attributes[1] = VertexAttribute::new(1, ElementType::UByte4, 0, 4);

    let vb = driver.arena().allocate::<GLVertexBuffer>();
    driver.create_vertex_buffer(
        vb,
        VertexBufferParams {
            buffer_count: 2,
            vertex_count: 4,
            attributes,
            usage: BufferUsage::Static,
        },
    );

    let names = driver.object::<GLVertexBuffer>(vb).buffers;
    assert_eq!(gl.buffer_data(names[0]).unwrap().len(), 48);
    assert_eq!(gl.buffer_data(names[1]).unwrap().len(), 16);

    driver.update_vertex_buffer(vb, 1, BufferDescriptor::new(vec![7u8; 8]), 4);
    let data = gl.buffer_data(names[1]).unwrap();
    assert_eq!(&data[0..4], &[0; 4]);
    assert_eq!(&data[4..12], &[7; 8]);

    // Out of range.
    driver.update_vertex_buffer(vb, 1, BufferDescriptor::new(vec![9u8; 8]), 12);
    assert_eq!(gl.buffer_data(names[1]).unwrap()[12], 0);

    let ib = driver.arena().allocate::<GLIndexBuffer>();
    driver.create_index_buffer(ib, IndexFormat::U16, 6, BufferUsage::Static);
    driver.update_index_buffer(ib, BufferDescriptor::new(vec![1u8; 12]), 0);
    let buffer = driver.object::<GLIndexBuffer>(ib).buffer;
    assert_eq!(gl.buffer_data(buffer).unwrap(), vec![1u8; 12]);

    let rp = driver.arena().allocate::<GLRenderPrimitive>();
    driver.create_render_primitive(rp);
    driver.set_render_primitive_buffer(rp, vb, ib);
    driver.set_render_primitive_range(rp, PrimitiveType::Triangles, 2, 0, 3, 4);

    let primitive = driver.object::<GLRenderPrimitive>(rp);
    assert_eq!(primitive.offset, 4);
    assert_eq!(primitive.enabled, 0b11);
    assert_eq!(gl.vao_element_array(primitive.vao), Some(buffer));
    assert!(gl.vertex_attrib(primitive.vao, 0).unwrap().enabled);
    assert!(!gl.vertex_attrib(primitive.vao, 2).unwrap().enabled);

    driver.destroy_render_primitive(rp);
    driver.destroy_index_buffer(ib);
    driver.destroy_vertex_buffer(vb);
    driver.terminate();

    assert_eq!(gl.live().buffers, 0);
    assert_eq!(gl.live().vertex_arrays, 0);
    assert!(gl.errors().is_empty());
}

#[test]
fn uniform_buffers() {
    let gl = HeadlessGL::es3();
    let (mut driver, _) = setup(&gl, DriverSettings::default());

    let h = driver.arena().allocate::<GLUniformBuffer>();
    driver.create_uniform_buffer(h, 512, BufferUsage::Dynamic);
    driver.load_uniform_buffer(h, BufferDescriptor::new(vec![3u8; 16]));
    driver.bind_uniform_buffer_range(2, h, 256, 64);

    let buffer = driver.object::<GLUniformBuffer>(h).buffer;
    assert_eq!(&gl.buffer_data(buffer).unwrap()[0..16], &[3u8; 16]);
    assert_eq!(
        gl.indexed_binding(gl::UNIFORM_BUFFER, 2),
        Some((buffer, 256, 64))
    );

    driver.destroy_uniform_buffer(h);
    driver.terminate();
    assert_eq!(gl.live().buffers, 0);
}

#[test]
fn samplers_are_shared() {
    let gl = HeadlessGL::desktop();
    let (mut driver, _) = setup(&gl, DriverSettings::default());

    let texture = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        texture,
        TextureParams {
            width: 2,
            height: 2,
            ..Default::default()
        },
    );

    let linear = SamplerParams {
        mag: SamplerMagFilter::Linear,
        ..Default::default()
    };

    let mut desc = SamplerGroupDescriptor::new(3);
    desc.set(0, texture, SamplerParams::default());
    desc.set(1, texture, linear);
    desc.set(2, texture, SamplerParams::default());

    let group = driver.arena().allocate::<GLSamplerGroup>();
    driver.create_sampler_group(group, 3);
    driver.update_sampler_group(group, desc.clone());
    assert_eq!(driver.sampler_count(), 2);

    let other = driver.arena().allocate::<GLSamplerGroup>();
    driver.create_sampler_group(other, 3);
    driver.update_sampler_group(other, desc);
    assert_eq!(driver.sampler_count(), 2);
    assert_eq!(gl.live().samplers, 2);

    driver.destroy_sampler_group(other);
    driver.destroy_sampler_group(group);
    driver.destroy_texture(texture);
    driver.terminate();

    assert_eq!(gl.live().samplers, 0);
    assert_eq!(gl.live().textures, 0);
}

#[test]
fn settings_override_bugs() {
    let gl = HeadlessGL::es3();
    let settings = DriverSettings {
        force_geometry_clear: Some(true),
        disable_invalidate_framebuffer: Some(true),
        texture_units: 4,
        ..Default::default()
    };

    let (mut driver, _) = setup(&gl, settings);
    assert!(driver.caps().bugs.clears_hurt_performance);
    assert!(driver.caps().bugs.disable_invalidate_framebuffer);
    assert_eq!(driver.state().units(), 4);

    driver.terminate();
    assert_eq!(gl.live().programs, 0);
}

#[test]
fn context_failure() {
    let _ = env_logger::try_init();

    let gl = HeadlessGL::es3();
    let platform = Arc::new(HeadlessPlatform::new(&gl));
    platform.set_fail_context(true);

    let settings = DriverSettings::default();
    let arena = Arc::new(settings.arena());
    assert!(GLDriver::new(Box::new(gl.clone()), platform.clone(), settings, arena).is_err());
    assert_eq!(platform.live().contexts, 0);
}

#[test]
fn terminate_releases_context() {
    let gl = HeadlessGL::desktop();
    let (mut driver, platform) = setup(&gl, DriverSettings::default());
    assert_eq!(platform.live().contexts, 1);

    let h = driver.arena().allocate::<GLFence>();
    driver.create_fence(h);
    assert_eq!(driver.wait_fence(h, 0), FenceStatus::ConditionSatisfied);
    driver.destroy_fence(h);
    assert_eq!(platform.live().fences, 0);

    driver.terminate();
    driver.terminate();
    assert_eq!(platform.live().contexts, 0);
    assert_eq!(gl.live().vertex_arrays, 0);
}
