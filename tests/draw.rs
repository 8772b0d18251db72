extern crate crayon_video;
extern crate env_logger;
extern crate gl;

use std::sync::Arc;

use gl::types::*;

use crayon_video::prelude::*;
use crayon_video::video::backends::gl::objects::*;
use crayon_video::video::backends::gl::types::TEXTURE_EXTERNAL_OES;
use crayon_video::video::program::SamplerSlot;

const EXTENSIONS: &[&str] = &[
    "GL_OES_EGL_image_external",
    "GL_OES_EGL_image_external_essl3",
    "GL_EXT_discard_framebuffer",
];

fn setup(gl: &HeadlessGL) -> GLDriver {
    let _ = env_logger::try_init();

    let settings = DriverSettings::default();
    let platform = Arc::new(HeadlessPlatform::new(gl));
    let arena = Arc::new(settings.arena());
    GLDriver::new(Box::new(gl.clone()), platform, settings, arena).unwrap()
}

/// A linked program reading its samplers from fixed slots.
struct FixedProgram {
    id: GLuint,
    slots: Vec<SamplerSlot>,
}

impl CompiledProgram for FixedProgram {
    fn id(&self) -> GLuint {
        self.id
    }

    fn sampler_slots(&self) -> &[SamplerSlot] {
        &self.slots
    }

    fn attribute_location(&self, _: &str) -> Option<GLint> {
        None
    }

    fn uniform_location(&self, _: &str) -> Option<GLint> {
        None
    }
}

fn program(gl: &HeadlessGL, slots: &[SamplerSlot]) -> Arc<FixedProgram> {
    let id = gl.create_program();
    GL::link_program(gl, id);

    Arc::new(FixedProgram {
        id,
        slots: slots.to_vec(),
    })
}

fn pipeline(program: &Arc<FixedProgram>) -> PipelineState {
    PipelineState {
        program: program.clone(),
        raster: RasterState::default(),
        polygon_offset: PolygonOffset::default(),
    }
}

struct Triangle {
    vb: VertexBufferHandle,
    ib: IndexBufferHandle,
    rp: RenderPrimitiveHandle,
}

impl Triangle {
    fn new(driver: &mut GLDriver) -> Triangle {
        let mut attributes = AttributeArray::default();
        attributes[0] = VertexAttribute::new(0, ElementType::Float3, 0, 12);

        let vb = driver.arena().allocate::<GLVertexBuffer>();
        driver.create_vertex_buffer(
            vb,
            VertexBufferParams {
                buffer_count: 1,
                vertex_count: 3,
                attributes,
                usage: BufferUsage::Static,
            },
        );

        let ib = driver.arena().allocate::<GLIndexBuffer>();
        driver.create_index_buffer(ib, IndexFormat::U16, 3, BufferUsage::Static);
        driver.update_index_buffer(ib, BufferDescriptor::new(vec![0u8, 0, 1, 0, 2, 0]), 0);

        let rp = driver.arena().allocate::<GLRenderPrimitive>();
        driver.create_render_primitive(rp);
        driver.set_render_primitive_buffer(rp, vb, ib);
        driver.set_render_primitive_range(rp, PrimitiveType::Triangles, 0, 0, 2, 3);

        Triangle { vb, ib, rp }
    }

    fn destroy(self, driver: &mut GLDriver) {
        driver.destroy_render_primitive(self.rp);
        driver.destroy_index_buffer(self.ib);
        driver.destroy_vertex_buffer(self.vb);
    }
}

#[test]
fn blending_follows_raster_state() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl);
    let program = program(&gl, &[]);
    let triangle = Triangle::new(&mut driver);

    let opaque = pipeline(&program);
    let mut blended = pipeline(&program);
    blended.raster.blend_src_rgb = BlendFactor::Value(BlendValue::SourceAlpha);
    blended.raster.blend_dst_rgb = BlendFactor::OneMinusValue(BlendValue::SourceAlpha);

    driver.draw(&opaque, triangle.rp);
    assert_eq!(gl.program(), program.id);
    assert!(!gl.is_enabled(gl::BLEND));
    assert!(gl.is_enabled(gl::CULL_FACE));
    assert!(gl.is_enabled(gl::DEPTH_TEST));

    gl.reset_calls();
    driver.draw(&blended, triangle.rp);
    assert!(gl.is_enabled(gl::BLEND));
    assert_eq!(gl.calls("blend_func_separate"), 1);

    driver.draw(&opaque, triangle.rp);
    assert!(!gl.is_enabled(gl::BLEND));
    assert_eq!(gl.calls("blend_func_separate"), 1);
    assert_eq!(gl.calls("draw_range_elements"), 2);

    triangle.destroy(&mut driver);
    gl.delete_program(program.id);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

#[test]
fn repeated_draws_are_free_of_state_calls() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl);
    let program = program(&gl, &[]);
    let triangle = Triangle::new(&mut driver);

    let mut pipeline = pipeline(&program);
    pipeline.raster.blend_src_rgb = BlendFactor::Value(BlendValue::SourceAlpha);
    pipeline.raster.depth_write = true;
    pipeline.polygon_offset = PolygonOffset {
        slope: 1.0,
        constant: 2.0,
    };

    driver.draw(&pipeline, triangle.rp);
    assert!(gl.is_enabled(gl::POLYGON_OFFSET_FILL));

    gl.reset_calls();
    for _ in 0..3 {
        driver.draw(&pipeline, triangle.rp);
    }

    let names = [
        "use_program",
        "enable",
        "disable",
        "cull_face",
        "front_face",
        "blend_equation_separate",
        "blend_func_separate",
        "depth_func",
        "depth_mask",
        "color_mask",
        "polygon_offset",
        "bind_vertex_array",
        "bind_buffer",
    ];

    for name in &names {
        assert_eq!(gl.calls(name), 0, "{}", name);
    }

    assert_eq!(gl.calls("draw_range_elements"), 3);

    pipeline.polygon_offset = PolygonOffset::default();
    driver.draw(&pipeline, triangle.rp);
    assert!(!gl.is_enabled(gl::POLYGON_OFFSET_FILL));

    triangle.destroy(&mut driver);
    gl.delete_program(program.id);
    driver.terminate();
    assert!(gl.errors().is_empty());
}

fn element_rebinds(gl: &HeadlessGL) -> usize {
    let mut driver = setup(gl);
    let program = program(gl, &[]);
    let pipeline = pipeline(&program);

    let a = Triangle::new(&mut driver);
    let b = Triangle::new(&mut driver);
    driver.draw(&pipeline, a.rp);
    driver.draw(&pipeline, b.rp);

    gl.reset_calls();
    driver.draw(&pipeline, a.rp);
    let rebinds = gl.calls("bind_buffer");

    let element = driver.object::<GLIndexBuffer>(a.ib).buffer;
    assert_eq!(gl.buffer_binding(gl::ELEMENT_ARRAY_BUFFER), element);

    a.destroy(&mut driver);
    b.destroy(&mut driver);
    gl.delete_program(program.id);
    driver.terminate();
    assert!(gl.errors().is_empty());
    rebinds
}

#[test]
fn element_array_rebound_on_draw() {
    assert_eq!(element_rebinds(&HeadlessGL::es3()), 0);

    let mali = HeadlessGL::with_profile("OpenGL ES 3.0 Headless", "Mali-G72", EXTENSIONS);
    assert_eq!(element_rebinds(&mali), 1);
}

#[test]
fn stream_images_through_sampler_groups() {
    let gl = HeadlessGL::es3();
    let mut driver = setup(&gl);
    let triangle = Triangle::new(&mut driver);

    let texture = driver.arena().allocate::<GLTexture>();
    driver.create_texture(
        texture,
        TextureParams {
            sampler: SamplerType::SamplerExternal,
            width: 1,
            height: 1,
            usage: TextureUsage::SAMPLEABLE,
            ..Default::default()
        },
    );

    let stream = driver.arena().allocate::<GLStream>();
    driver.create_stream(stream, None);
    driver.set_stream_dimensions(stream, 2, 2);
    driver.set_external_stream(texture, Some(stream));

    let mut desc = SamplerGroupDescriptor::new(1);
    desc.set(0, texture, SamplerParams::default());

    let group = driver.arena().allocate::<GLSamplerGroup>();
    driver.create_sampler_group(group, 1);
    driver.update_sampler_group(group, desc);
    driver.bind_sampler_group(0, group);

    let slot = SamplerSlot {
        binding: 0,
        index: 0,
        unit: 2,
    };

    let program = program(&gl, &[slot]);
    let pipeline = pipeline(&program);
    let mut blitter = driver.stream_blitter().unwrap();

    for frame in 0..3 {
        assert!(blitter.update_stream(stream));
        driver.begin_frame(frame, frame as u32);
        driver.draw(&pipeline, triangle.rp);

        let latched = driver.object::<GLTexture>(texture).name;
        assert_eq!(gl.texture_binding(2, TEXTURE_EXTERNAL_OES), latched);
        assert_ne!(gl.sampler_binding(2), 0);
        driver.end_frame(frame as u32);
    }

    blitter.terminate();
    driver.bind_sampler_group(0, SamplerGroupHandle::nil());
    driver.destroy_sampler_group(group);
    driver.destroy_stream(stream);
    driver.destroy_texture(texture);
    triangle.destroy(&mut driver);
    gl.delete_program(program.id);
    driver.terminate();
    assert!(gl.errors().is_empty());
}
