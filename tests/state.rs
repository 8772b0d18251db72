extern crate crayon_video;
extern crate env_logger;
extern crate gl;

use crayon_video::prelude::*;
use crayon_video::video::backends::gl::capabilities::Capabilities;
use crayon_video::video::backends::gl::state::GLState;

fn state(gl: &HeadlessGL, element_rebind: bool) -> GLState {
    let _ = env_logger::try_init();

    let mut caps = Capabilities::parse(gl).unwrap();
    caps.bugs.vao_doesnt_store_element_array_buffer_binding = element_rebind;
    GLState::new(gl, &caps, 16)
}

#[test]
fn repeated_bindings_are_skipped() {
    let gl = HeadlessGL::es3();
    let mut state = state(&gl, false);
    let name = gl.gen_textures(1)[0];

    gl.reset_calls();
    state.bind_texture(&gl, 2, gl::TEXTURE_2D, name);
    state.bind_texture(&gl, 2, gl::TEXTURE_2D, name);
    assert_eq!(gl.calls("bind_texture"), 1);
    assert_eq!(gl.calls("active_texture"), 1);

    state.use_program(&gl, 0);
    state.depth_mask(&gl, true);
    state.depth_mask(&gl, true);
    state.viewport(&gl, 0, 0, 16, 16);
    state.viewport(&gl, 0, 0, 16, 16);
    assert_eq!(gl.calls("use_program"), 0);
    assert_eq!(gl.calls("viewport"), 1);
    assert_eq!(gl.viewport(), [0, 0, 16, 16]);

    state.delete_textures(&gl, &[name]);
    assert!(gl.errors().is_empty());
}

#[test]
fn deleted_textures_leave_no_bindings() {
    let gl = HeadlessGL::es3();
    let mut state = state(&gl, false);
    let names = gl.gen_textures(2);

    state.bind_texture(&gl, 3, gl::TEXTURE_2D, names[0]);
    state.bind_texture(&gl, 5, gl::TEXTURE_2D, names[0]);
    state.delete_textures(&gl, &names[0..1]);

    for &unit in &[3, 5] {
        assert_eq!(state.texture_binding(unit, gl::TEXTURE_2D), 0);
        assert_eq!(gl.texture_binding(unit as u32, gl::TEXTURE_2D), 0);
    }

    gl.reset_calls();
    state.bind_texture(&gl, 5, gl::TEXTURE_2D, names[1]);
    assert_eq!(gl.calls("bind_texture"), 1);
    assert_eq!(gl.texture_binding(5, gl::TEXTURE_2D), names[1]);

    state.unbind_texture(&gl, gl::TEXTURE_2D, names[1]);
    assert_eq!(gl.texture_binding(5, gl::TEXTURE_2D), 0);

    state.delete_textures(&gl, &names[1..2]);
    assert!(gl.errors().is_empty());
}

#[test]
fn element_array_follows_vertex_arrays() {
    let gl = HeadlessGL::es3();
    let mut state = state(&gl, false);

    let a = state.gen_vertex_array(&gl);
    let b = state.gen_vertex_array(&gl);
    let buffer = gl.gen_buffers(1)[0];

    state.bind_vertex_array(&gl, Some(a));
    state.bind_buffer(&gl, gl::ELEMENT_ARRAY_BUFFER, buffer);
    assert_eq!(gl.vao_element_array(a), Some(buffer));

    state.bind_vertex_array(&gl, Some(b));
    assert_eq!(state.buffer_binding(gl::ELEMENT_ARRAY_BUFFER), 0);
    assert_eq!(gl.vao_element_array(b), Some(0));

    gl.reset_calls();
    state.bind_vertex_array(&gl, Some(a));
    assert_eq!(state.buffer_binding(gl::ELEMENT_ARRAY_BUFFER), buffer);
    assert_eq!(gl.calls("bind_buffer"), 0);

    // Already remembered by `a`.
    state.bind_buffer(&gl, gl::ELEMENT_ARRAY_BUFFER, buffer);
    assert_eq!(gl.calls("bind_buffer"), 0);

    state.delete_buffer(&gl, buffer, gl::ELEMENT_ARRAY_BUFFER);
    assert_eq!(state.buffer_binding(gl::ELEMENT_ARRAY_BUFFER), 0);

    state.delete_vertex_array(&gl, a);
    state.delete_vertex_array(&gl, b);
    assert_eq!(state.vertex_array(), 0);
    assert_eq!(gl.live().vertex_arrays, 0);
    assert!(gl.errors().is_empty());
}

#[test]
fn element_array_rebind_quirk() {
    let gl = HeadlessGL::es3();
    let mut state = state(&gl, true);

    let vao = state.gen_vertex_array(&gl);
    let buffer = gl.gen_buffers(1)[0];

    state.bind_vertex_array(&gl, Some(vao));
    state.bind_buffer(&gl, gl::ELEMENT_ARRAY_BUFFER, buffer);
    state.bind_vertex_array(&gl, None);

    gl.reset_calls();
    state.bind_vertex_array(&gl, Some(vao));
    assert_eq!(gl.calls("bind_buffer"), 1);
    assert_eq!(gl.vao_element_array(vao), Some(buffer));

    state.delete_vertex_array(&gl, vao);
    state.delete_buffer(&gl, buffer, gl::ELEMENT_ARRAY_BUFFER);
    assert!(gl.errors().is_empty());
}

#[test]
fn default_vertex_array_on_desktop() {
    let gl = HeadlessGL::desktop();
    let mut state = state(&gl, false);

    let vao = state.default_vertex_array();
    assert_ne!(vao, 0);
    assert_eq!(state.vertex_array(), vao);
    assert_eq!(gl.vertex_array(), vao);

    state.terminate(&gl);
    assert_eq!(state.default_vertex_array(), 0);
    assert_eq!(gl.live().vertex_arrays, 0);
}

#[test]
fn framebuffer_halves() {
    let gl = HeadlessGL::es3();
    let mut state = state(&gl, false);
    let fbo = gl.gen_framebuffers(1)[0];

    gl.reset_calls();
    state.bind_framebuffer(&gl, gl::FRAMEBUFFER, fbo);
    state.bind_framebuffer(&gl, gl::DRAW_FRAMEBUFFER, fbo);
    assert_eq!(gl.calls("bind_framebuffer"), 1);

    state.bind_framebuffer(&gl, gl::READ_FRAMEBUFFER, 0);
    assert_eq!(gl.calls("bind_framebuffer"), 2);
    assert_eq!(gl.framebuffer(gl::DRAW_FRAMEBUFFER), fbo);
    assert_eq!(gl.framebuffer(gl::READ_FRAMEBUFFER), 0);

    // The read half differs, so the combined target is rebound.
    state.bind_framebuffer(&gl, gl::FRAMEBUFFER, fbo);
    assert_eq!(gl.calls("bind_framebuffer"), 3);
    assert_eq!(gl.framebuffer(gl::READ_FRAMEBUFFER), fbo);

    state.delete_framebuffer(&gl, fbo);
    assert_eq!(state.framebuffer(gl::DRAW_FRAMEBUFFER), 0);
    assert_eq!(state.framebuffer(gl::READ_FRAMEBUFFER), 0);
    assert!(gl.errors().is_empty());
}

#[test]
fn indexed_bindings_update_generic_slot() {
    let gl = HeadlessGL::es3();
    let mut state = state(&gl, false);
    let buffer = gl.gen_buffers(1)[0];

    state.bind_buffer(&gl, gl::UNIFORM_BUFFER, buffer);
    GL::buffer_data(&gl, gl::UNIFORM_BUFFER, 512, None, gl::DYNAMIC_DRAW);
    state.bind_buffer(&gl, gl::UNIFORM_BUFFER, 0);

    gl.reset_calls();
    state.bind_buffer_range(&gl, gl::UNIFORM_BUFFER, 1, buffer, 256, 64);
    state.bind_buffer_range(&gl, gl::UNIFORM_BUFFER, 1, buffer, 256, 64);
    assert_eq!(gl.calls("bind_buffer_range"), 1);
    assert_eq!(state.buffer_binding(gl::UNIFORM_BUFFER), buffer);
    assert_eq!(state.indexed_binding(gl::UNIFORM_BUFFER, 1).name, buffer);
    assert_eq!(gl.indexed_binding(gl::UNIFORM_BUFFER, 1), Some((buffer, 256, 64)));

    // Rebinding the generic slot does not touch the indexed one.
    state.bind_buffer(&gl, gl::UNIFORM_BUFFER, 0);
    state.bind_buffer_range(&gl, gl::UNIFORM_BUFFER, 1, buffer, 256, 64);
    assert_eq!(gl.calls("bind_buffer_range"), 2);

    state.delete_buffer(&gl, buffer, gl::UNIFORM_BUFFER);
    assert_eq!(state.buffer_binding(gl::UNIFORM_BUFFER), 0);
    assert_eq!(state.indexed_binding(gl::UNIFORM_BUFFER, 1).name, 0);
    assert!(gl.errors().is_empty());
}
