//! `GL` over the native function pointers loaded by the `gl` crate.

use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::ptr;

use gl;
use gl::types::*;

use crate::video::backends::GL;

type FramebufferTexture2DMultisampleFn =
    extern "system" fn(GLenum, GLenum, GLenum, GLuint, GLint, GLsizei);

/// Native OpenGL. The function pointers are process-wide, calls are issued into the
/// context current on the calling thread.
#[derive(Clone, Copy)]
pub struct NativeGL {
    framebuffer_texture_2d_multisample: Option<FramebufferTexture2DMultisampleFn>,
}

impl NativeGL {
    /// Loads the function pointers with `loader`, which usually forwards to
    /// `eglGetProcAddress` and friends. A context must be current.
    pub fn load_with<F>(mut loader: F) -> NativeGL
    where
        F: FnMut(&str) -> *const c_void,
    {
        gl::load_with(|symbol| loader(symbol));

        let ext = loader("glFramebufferTexture2DMultisampleEXT");
        let framebuffer_texture_2d_multisample = if ext.is_null() {
            None
        } else {
            Some(unsafe { ::std::mem::transmute::<_, FramebufferTexture2DMultisampleFn>(ext) })
        };

        NativeGL {
            framebuffer_texture_2d_multisample,
        }
    }
}

#[inline]
fn boolean(v: bool) -> GLboolean {
    if v {
        gl::TRUE
    } else {
        gl::FALSE
    }
}

#[inline]
fn offset_ptr(offset: GLuint) -> *const c_void {
    offset as usize as *const c_void
}

fn gen_names(n: GLsizei, gen: unsafe fn(GLsizei, *mut GLuint)) -> Vec<GLuint> {
    let mut names = vec![0; n.max(0) as usize];
    unsafe { gen(n, names.as_mut_ptr()) };
    names
}

fn delete_names(names: &[GLuint], delete: unsafe fn(GLsizei, *const GLuint)) {
    if !names.is_empty() {
        unsafe { delete(names.len() as GLsizei, names.as_ptr()) };
    }
}

fn c_string(v: &str) -> CString {
    // Interior nul bytes can't reach GL, truncate at the first one.
    let end = v.find('\0').unwrap_or_else(|| v.len());
    CString::new(&v[..end]).unwrap_or_default()
}

unsafe fn from_gl_string(v: *const GLubyte) -> String {
    if v.is_null() {
        String::new()
    } else {
        CStr::from_ptr(v as *const _).to_string_lossy().into_owned()
    }
}

impl GL for NativeGL {
    fn shared(&self) -> Box<dyn GL> {
        Box::new(*self)
    }

    fn get_error(&self) -> GLenum {
        unsafe { gl::GetError() }
    }

    fn get_string(&self, name: GLenum) -> String {
        unsafe { from_gl_string(gl::GetString(name)) }
    }

    fn get_string_i(&self, name: GLenum, index: GLuint) -> String {
        unsafe { from_gl_string(gl::GetStringi(name, index)) }
    }

    fn get_integer_v(&self, name: GLenum) -> GLint {
        let mut v = 0;
        unsafe { gl::GetIntegerv(name, &mut v) };
        v
    }

    fn gen_buffers(&self, n: GLsizei) -> Vec<GLuint> {
        gen_names(n, gl::GenBuffers)
    }

    fn gen_textures(&self, n: GLsizei) -> Vec<GLuint> {
        gen_names(n, gl::GenTextures)
    }

    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint> {
        gen_names(n, gl::GenFramebuffers)
    }

    fn gen_renderbuffers(&self, n: GLsizei) -> Vec<GLuint> {
        gen_names(n, gl::GenRenderbuffers)
    }

    fn gen_vertex_arrays(&self, n: GLsizei) -> Vec<GLuint> {
        gen_names(n, gl::GenVertexArrays)
    }

    fn gen_samplers(&self, n: GLsizei) -> Vec<GLuint> {
        gen_names(n, gl::GenSamplers)
    }

    fn delete_buffers(&self, names: &[GLuint]) {
        delete_names(names, gl::DeleteBuffers)
    }

    fn delete_textures(&self, names: &[GLuint]) {
        delete_names(names, gl::DeleteTextures)
    }

    fn delete_framebuffers(&self, names: &[GLuint]) {
        delete_names(names, gl::DeleteFramebuffers)
    }

    fn delete_renderbuffers(&self, names: &[GLuint]) {
        delete_names(names, gl::DeleteRenderbuffers)
    }

    fn delete_vertex_arrays(&self, names: &[GLuint]) {
        delete_names(names, gl::DeleteVertexArrays)
    }

    fn delete_samplers(&self, names: &[GLuint]) {
        delete_names(names, gl::DeleteSamplers)
    }

    fn active_texture(&self, unit: GLenum) {
        unsafe { gl::ActiveTexture(unit) }
    }

    fn bind_texture(&self, target: GLenum, name: GLuint) {
        unsafe { gl::BindTexture(target, name) }
    }

    fn bind_sampler(&self, unit: GLuint, sampler: GLuint) {
        unsafe { gl::BindSampler(unit, sampler) }
    }

    fn bind_buffer(&self, target: GLenum, name: GLuint) {
        unsafe { gl::BindBuffer(target, name) }
    }

    fn bind_buffer_range(
        &self,
        target: GLenum,
        index: GLuint,
        name: GLuint,
        offset: GLintptr,
        size: GLsizeiptr,
    ) {
        unsafe { gl::BindBufferRange(target, index, name, offset, size) }
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        unsafe { gl::BindVertexArray(vao) }
    }

    fn bind_framebuffer(&self, target: GLenum, name: GLuint) {
        unsafe { gl::BindFramebuffer(target, name) }
    }

    fn bind_renderbuffer(&self, target: GLenum, name: GLuint) {
        unsafe { gl::BindRenderbuffer(target, name) }
    }

    fn use_program(&self, program: GLuint) {
        unsafe { gl::UseProgram(program) }
    }

    fn enable(&self, cap: GLenum) {
        unsafe { gl::Enable(cap) }
    }

    fn disable(&self, cap: GLenum) {
        unsafe { gl::Disable(cap) }
    }

    fn depth_func(&self, func: GLenum) {
        unsafe { gl::DepthFunc(func) }
    }

    fn depth_mask(&self, flag: bool) {
        unsafe { gl::DepthMask(boolean(flag)) }
    }

    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool) {
        unsafe { gl::ColorMask(boolean(r), boolean(g), boolean(b), boolean(a)) }
    }

    fn cull_face(&self, mode: GLenum) {
        unsafe { gl::CullFace(mode) }
    }

    fn front_face(&self, mode: GLenum) {
        unsafe { gl::FrontFace(mode) }
    }

    fn blend_equation_separate(&self, rgb: GLenum, alpha: GLenum) {
        unsafe { gl::BlendEquationSeparate(rgb, alpha) }
    }

    fn blend_func_separate(&self, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum) {
        unsafe { gl::BlendFuncSeparate(src_rgb, dst_rgb, src_a, dst_a) }
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        unsafe { gl::PolygonOffset(factor, units) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { gl::ClearColor(r, g, b, a) }
    }

    fn clear_depth_f(&self, depth: f32) {
        unsafe { gl::ClearDepthf(depth) }
    }

    fn clear_stencil(&self, s: GLint) {
        unsafe { gl::ClearStencil(s) }
    }

    fn clear(&self, mask: GLbitfield) {
        unsafe { gl::Clear(mask) }
    }

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        unsafe { gl::Viewport(x, y, width, height) }
    }

    fn scissor(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        unsafe { gl::Scissor(x, y, width, height) }
    }

    fn pixel_store_i(&self, name: GLenum, param: GLint) {
        unsafe { gl::PixelStorei(name, param) }
    }

    fn buffer_data(&self, target: GLenum, size: GLsizeiptr, data: Option<&[u8]>, usage: GLenum) {
        let ptr = data.map_or(ptr::null(), |v| v.as_ptr() as *const c_void);
        unsafe { gl::BufferData(target, size, ptr, usage) }
    }

    fn buffer_sub_data(&self, target: GLenum, offset: GLintptr, data: &[u8]) {
        unsafe {
            gl::BufferSubData(
                target,
                offset,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
            )
        }
    }

    fn map_buffer_range(
        &self,
        target: GLenum,
        offset: GLintptr,
        length: GLsizeiptr,
        access: GLbitfield,
    ) -> *mut u8 {
        unsafe { gl::MapBufferRange(target, offset, length, access) as *mut u8 }
    }

    fn unmap_buffer(&self, target: GLenum) -> bool {
        unsafe { gl::UnmapBuffer(target) == gl::TRUE }
    }

    fn tex_storage_2d(
        &self,
        target: GLenum,
        levels: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) {
        unsafe { gl::TexStorage2D(target, levels, internal_format, width, height) }
    }

    fn tex_storage_3d(
        &self,
        target: GLenum,
        levels: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
        depth: GLsizei,
    ) {
        unsafe { gl::TexStorage3D(target, levels, internal_format, width, height, depth) }
    }

    fn tex_storage_2d_multisample(
        &self,
        target: GLenum,
        samples: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) {
        unsafe {
            gl::TexStorage2DMultisample(
                target,
                samples,
                internal_format,
                width,
                height,
                gl::TRUE,
            )
        }
    }

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
    ) {
        unsafe {
            gl::TexSubImage2D(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                ty,
                data.as_ptr() as *const c_void,
            )
        }
    }

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
    ) {
        unsafe {
            gl::TexSubImage3D(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                format,
                ty,
                data.as_ptr() as *const c_void,
            )
        }
    }

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
    ) {
        unsafe {
            gl::CompressedTexSubImage2D(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                data.len() as GLsizei,
                data.as_ptr() as *const c_void,
            )
        }
    }

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
    ) {
        unsafe {
            gl::CompressedTexSubImage3D(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                format,
                data.len() as GLsizei,
                data.as_ptr() as *const c_void,
            )
        }
    }

    fn tex_parameter_i(&self, target: GLenum, name: GLenum, param: GLint) {
        unsafe { gl::TexParameteri(target, name, param) }
    }

    fn generate_mipmap(&self, target: GLenum) {
        unsafe { gl::GenerateMipmap(target) }
    }

    fn sampler_parameter_i(&self, sampler: GLuint, name: GLenum, param: GLint) {
        unsafe { gl::SamplerParameteri(sampler, name, param) }
    }

    fn sampler_parameter_f(&self, sampler: GLuint, name: GLenum, param: f32) {
        unsafe { gl::SamplerParameterf(sampler, name, param) }
    }

    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
    ) {
        unsafe { gl::FramebufferTexture2D(target, attachment, textarget, texture, level) }
    }

    fn framebuffer_texture_layer(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: GLint,
        layer: GLint,
    ) {
        unsafe { gl::FramebufferTextureLayer(target, attachment, texture, level, layer) }
    }

    fn framebuffer_texture_2d_multisample(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
        samples: GLsizei,
    ) {
        match self.framebuffer_texture_2d_multisample {
            Some(f) => f(target, attachment, textarget, texture, level, samples),
            None => {
                warn!("glFramebufferTexture2DMultisampleEXT is not available.");
                self.framebuffer_texture_2d(target, attachment, textarget, texture, level);
            }
        }
    }

    fn framebuffer_renderbuffer(
        &self,
        target: GLenum,
        attachment: GLenum,
        renderbuffer_target: GLenum,
        renderbuffer: GLuint,
    ) {
        unsafe {
            gl::FramebufferRenderbuffer(target, attachment, renderbuffer_target, renderbuffer)
        }
    }

    fn renderbuffer_storage_multisample(
        &self,
        target: GLenum,
        samples: GLsizei,
        internal_format: GLenum,
        width: GLsizei,
        height: GLsizei,
    ) {
        unsafe {
            gl::RenderbufferStorageMultisample(target, samples, internal_format, width, height)
        }
    }

    fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
        unsafe { gl::CheckFramebufferStatus(target) }
    }

    fn invalidate_framebuffer(&self, target: GLenum, attachments: &[GLenum]) {
        if !attachments.is_empty() {
            unsafe {
                gl::InvalidateFramebuffer(
                    target,
                    attachments.len() as GLsizei,
                    attachments.as_ptr(),
                )
            }
        }
    }

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
    ) {
        unsafe {
            gl::BlitFramebuffer(
                src_x0, src_y0, src_x1, src_y1, dst_x0, dst_y0, dst_x1, dst_y1, mask, filter,
            )
        }
    }

    fn read_pixels(
        &self,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        data: &mut [u8],
    ) {
        unsafe {
            gl::ReadPixels(
                x,
                y,
                width,
                height,
                format,
                ty,
                data.as_mut_ptr() as *mut c_void,
            )
        }
    }

    fn enable_vertex_attrib_array(&self, index: GLuint) {
        unsafe { gl::EnableVertexAttribArray(index) }
    }

    fn disable_vertex_attrib_array(&self, index: GLuint) {
        unsafe { gl::DisableVertexAttribArray(index) }
    }

    fn vertex_attrib_pointer(
        &self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        normalized: bool,
        stride: GLsizei,
        offset: GLuint,
    ) {
        unsafe {
            gl::VertexAttribPointer(
                index,
                size,
                ty,
                boolean(normalized),
                stride,
                offset_ptr(offset),
            )
        }
    }

    fn vertex_attrib_i_pointer(
        &self,
        index: GLuint,
        size: GLint,
        ty: GLenum,
        stride: GLsizei,
        offset: GLuint,
    ) {
        unsafe { gl::VertexAttribIPointer(index, size, ty, stride, offset_ptr(offset)) }
    }

    fn vertex_attrib_4f(&self, index: GLuint, x: f32, y: f32, z: f32, w: f32) {
        unsafe { gl::VertexAttrib4f(index, x, y, z, w) }
    }

    fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei) {
        unsafe { gl::DrawArrays(mode, first, count) }
    }

    fn draw_range_elements(
        &self,
        mode: GLenum,
        start: GLuint,
        end: GLuint,
        count: GLsizei,
        ty: GLenum,
        offset: GLuint,
    ) {
        unsafe { gl::DrawRangeElements(mode, start, end, count, ty, offset_ptr(offset)) }
    }

    fn create_shader(&self, ty: GLenum) -> GLuint {
        unsafe { gl::CreateShader(ty) }
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        let src = c_string(source);
        unsafe { gl::ShaderSource(shader, 1, &src.as_ptr(), ptr::null()) }
    }

    fn compile_shader(&self, shader: GLuint) {
        unsafe { gl::CompileShader(shader) }
    }

    fn get_shader_iv(&self, shader: GLuint, name: GLenum) -> GLint {
        let mut v = 0;
        unsafe { gl::GetShaderiv(shader, name, &mut v) };
        v
    }

    fn get_shader_info_log(&self, shader: GLuint) -> String {
        let len = self.get_shader_iv(shader, gl::INFO_LOG_LENGTH);
        let mut buf = vec![0u8; len.max(1) as usize];
        let mut written = 0;
        unsafe {
            gl::GetShaderInfoLog(shader, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        }

        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn delete_shader(&self, shader: GLuint) {
        unsafe { gl::DeleteShader(shader) }
    }

    fn create_program(&self) -> GLuint {
        unsafe { gl::CreateProgram() }
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::AttachShader(program, shader) }
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::DetachShader(program, shader) }
    }

    fn link_program(&self, program: GLuint) {
        unsafe { gl::LinkProgram(program) }
    }

    fn get_program_iv(&self, program: GLuint, name: GLenum) -> GLint {
        let mut v = 0;
        unsafe { gl::GetProgramiv(program, name, &mut v) };
        v
    }

    fn get_program_info_log(&self, program: GLuint) -> String {
        let len = self.get_program_iv(program, gl::INFO_LOG_LENGTH);
        let mut buf = vec![0u8; len.max(1) as usize];
        let mut written = 0;
        unsafe {
            gl::GetProgramInfoLog(program, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        }

        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn get_attrib_location(&self, program: GLuint, name: &str) -> GLint {
        let name = c_string(name);
        unsafe { gl::GetAttribLocation(program, name.as_ptr()) }
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
        let name = c_string(name);
        unsafe { gl::GetUniformLocation(program, name.as_ptr()) }
    }

    fn uniform_1i(&self, location: GLint, v: GLint) {
        unsafe { gl::Uniform1i(location, v) }
    }

    fn uniform_4f(&self, location: GLint, x: f32, y: f32, z: f32, w: f32) {
        unsafe { gl::Uniform4f(location, x, y, z, w) }
    }

    fn flush(&self) {
        unsafe { gl::Flush() }
    }

    fn finish(&self) {
        unsafe { gl::Finish() }
    }
}
