//! The backend of the driver. Everything that talks to native GL goes through the
//! `GL` trait, which has two implementations:
//!
//! 1. `gl::native::NativeGL` forwards to the function pointers loaded by the `gl` crate.
//! 2. `headless::HeadlessGL` emulates a GL server in memory.

pub mod gl;
pub mod headless;

use ::gl::types::*;

/// The subset of OpenGL ES 3.0 / OpenGL 4.1 the driver relies on.
///
/// Calls are issued against the context that is current on the calling thread, so a
/// `GL` must only be used from the thread its context is current on.
pub trait GL: Send {
    /// Returns a `GL` that issues calls into another context, sharing objects with
    /// this one.
    fn shared(&self) -> Box<dyn GL>;

    fn get_error(&self) -> GLenum;
    fn get_string(&self, name: GLenum) -> String;
    fn get_string_i(&self, name: GLenum, index: GLuint) -> String;
    fn get_integer_v(&self, name: GLenum) -> GLint;

    fn gen_buffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_textures(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_renderbuffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_vertex_arrays(&self, n: GLsizei) -> Vec<GLuint>;
    fn gen_samplers(&self, n: GLsizei) -> Vec<GLuint>;
    fn delete_buffers(&self, names: &[GLuint]);
    fn delete_textures(&self, names: &[GLuint]);
    fn delete_framebuffers(&self, names: &[GLuint]);
    fn delete_renderbuffers(&self, names: &[GLuint]);
    fn delete_vertex_arrays(&self, names: &[GLuint]);
    fn delete_samplers(&self, names: &[GLuint]);

    fn active_texture(&self, unit: GLenum);
    fn bind_texture(&self, target: GLenum, name: GLuint);
    fn bind_sampler(&self, unit: GLuint, sampler: GLuint);
    fn bind_buffer(&self, target: GLenum, name: GLuint);
    fn bind_buffer_range(
        &self,
        target: GLenum,
        index: GLuint,
        name: GLuint,
        offset: GLintptr,
        size: GLsizeiptr,
    );
    fn bind_vertex_array(&self, vao: GLuint);
    fn bind_framebuffer(&self, target: GLenum, name: GLuint);
    fn bind_renderbuffer(&self, target: GLenum, name: GLuint);
    fn use_program(&self, program: GLuint);

    fn enable(&self, cap: GLenum);
    fn disable(&self, cap: GLenum);
    fn depth_func(&self, func: GLenum);
    fn depth_mask(&self, flag: bool);
    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool);
    fn cull_face(&self, mode: GLenum);
    fn front_face(&self, mode: GLenum);
    fn blend_equation_separate(&self, rgb: GLenum, alpha: GLenum);
    fn blend_func_separate(&self, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum);
    fn polygon_offset(&self, factor: f32, units: f32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear_depth_f(&self, depth: f32);
    fn clear_stencil(&self, s: GLint);
    fn clear(&self, mask: GLbitfield);
    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    fn scissor(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    fn pixel_store_i(&self, name: GLenum, param: GLint);

    fn buffer_data(&self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>, usage: GLenum);
    fn buffer_sub_data(&self, target: GLenum, offset: GLintptr, data: &[u8]);
    /// Maps a range of the buffer bound to `target`. Returns null on failure.
    fn map_buffer_range(
        &self,
        target: GLenum,
        offset: GLintptr,
        length: GLsizeiptr,
        access: GLbitfield,
    ) -> *mut u8;
    /// Returns false if the content of the buffer got corrupted while mapped.
    fn unmap_buffer(&self, target: GLenum) -> bool;

    fn tex_storage_2d(
        &self,
        target: GLenum,
        levels: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    );
    fn tex_storage_3d(
        &self,
        target: GLenum,
        levels: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
        depth: GLsizei,
    );
    fn tex_storage_2d_multisample(
        &self,
        target: GLenum,
        samples: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &self,
        target: GLenum,
        level: GLint,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_3d(
        &self,
        target: GLenum,
        level: GLint,
        x: GLint,
        y: GLint,
        z: GLint,
        width: GLsizei,
        height: GLsizei,
        depth: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    );
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_2d(
        &self,
        target: GLenum,
        level: GLint,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        data: &[u8],
    );
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_3d(
        &self,
        target: GLenum,
        level: GLint,
        x: GLint,
        y: GLint,
        z: GLint,
        width: GLsizei,
        height: GLsizei,
        depth: GLsizei,
        format: GLenum,
        data: &[u8],
    );
    fn tex_parameter_i(&self, target: GLenum, name: GLenum, param: GLint);
    fn generate_mipmap(&self, target: GLenum);
    fn sampler_parameter_i(&self, sampler: GLuint, name: GLenum, param: GLint);
    fn sampler_parameter_f(&self, sampler: GLuint, name: GLenum, param: f32);

    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
    );
    fn framebuffer_texture_layer(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: GLint,
        layer: GLint,
    );
    /// `GL_EXT_multisampled_render_to_texture`.
    fn framebuffer_texture_2d_multisample(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
        samples: GLsizei,
    );
    fn framebuffer_renderbuffer(
        &self,
        target: GLenum,
        attachment: GLenum,
        renderbuffer_target: GLenum,
        renderbuffer: GLuint,
    );
    fn renderbuffer_storage_multisample(
        &self,
        target: GLenum,
        samples: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    );
    fn check_framebuffer_status(&self, target: GLenum) -> GLenum;
    fn invalidate_framebuffer(&self, target: GLenum, attachments: &[GLenum]);
    #[allow(clippy::too_many_arguments)]
    fn blit_framebuffer(
        &self,
        src_x0: GLint,
        src_y0: GLint,
        src_x1: GLint,
        src_y1: GLint,
        dst_x0: GLint,
        dst_y0: GLint,
        dst_x1: GLint,
        dst_y1: GLint,
        mask: GLbitfield,
        filter: GLenum,
    );
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &self,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &mut [u8],
    );

    fn enable_vertex_attrib_array(&self, index: GLuint);
    fn disable_vertex_attrib_array(&self, index: GLuint);
    fn vertex_attrib_pointer(
        &self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        normalized: bool,
        stride: GLsizei,
        offset: GLuint,
    );
    fn vertex_attrib_i_pointer(
        &self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        stride: GLsizei,
        offset: GLuint,
    );
    fn vertex_attrib_4f(&self, index: GLuint, x: f32, y: f32, z: f32, w: f32);
    fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei);
    #[allow(clippy::too_many_arguments)]
    fn draw_range_elements(
        &self,
        mode: GLenum,
        start: GLuint,
        end: GLuint,
        count: GLsizei,
        ty: GLenum,
        offset: GLuint,
    );

    fn create_shader(&self, ty: GLenum) -> GLuint;
    fn shader_source(&self, shader: GLuint, source: &str);
    fn compile_shader(&self, shader: GLuint);
    fn get_shader_iv(&self, shader: GLuint, name: GLenum) -> GLint;
    fn get_shader_info_log(&self, shader: GLuint) -> String;
    fn delete_shader(&self, shader: GLuint);
    fn create_program(&self) -> GLuint;
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    fn detach_shader(&self, program: GLuint, shader: GLuint);
    fn link_program(&self, program: GLuint);
    fn get_program_iv(&self, program: GLuint, name: GLenum) -> GLint;
    fn get_program_info_log(&self, program: GLuint) -> String;
    fn delete_program(&self, program: GLuint);
    fn get_attrib_location(&self, program: GLuint, name: &str) -> GLint;
    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint;
    fn uniform_1i(&self, location: GLint, v: GLint);
    fn uniform_4f(&self, location: GLint, x: f32, y: f32, z: f32, w: f32);

    fn flush(&self);
    fn finish(&self);
}
