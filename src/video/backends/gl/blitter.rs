//! Internal programs of the driver: the copy from external images into regular
//! textures, and clears done by drawing a full screen triangle.

use gl;
use gl::types::*;

use super::capabilities::Capabilities;
use super::state::GLState;
use super::types::TEXTURE_EXTERNAL_OES;
use crate::errors::*;
use crate::video::backends::GL;
use crate::video::program::{self, CompiledProgram, LinkedProgram};

const ES_HEADER: &str = "#version 300 es\n";
const GL_HEADER: &str = "#version 410 core\n";

const BLIT_VS: &str = r#"
const vec2 positions[4] = vec2[4](vec2(-1.0, -1.0), vec2(1.0, -1.0), vec2(-1.0, 1.0), vec2(1.0, 1.0));
out vec2 uv;
void main() {
    vec2 p = positions[gl_VertexID];
    uv = p * 0.5 + 0.5;
    gl_Position = vec4(p, 0.0, 1.0);
}
"#;

const BLIT_FS: &str = r#"
#extension GL_OES_EGL_image_external_essl3 : require
precision mediump float;
uniform samplerExternalOES source;
in vec2 uv;
out vec4 fragColor;
void main() {
    fragColor = texture(source, uv);
}
"#;

const CLEAR_VS: &str = r#"
uniform vec4 depth;
void main() {
    vec2 p = vec2(float((gl_VertexID & 1) * 4 - 1), float((gl_VertexID & 2) * 2 - 1));
    gl_Position = vec4(p, depth.x, 1.0);
}
"#;

const CLEAR_FS: &str = r#"
precision mediump float;
uniform vec4 color;
out vec4 fragColor;
void main() {
    fragColor = color;
}
"#;

fn header(caps: &Capabilities) -> &'static str {
    if caps.version.is_es() {
        ES_HEADER
    } else {
        GL_HEADER
    }
}

/// Resets the raster state a full screen pass depends on.
fn prepare_full_screen(gl: &dyn GL, state: &mut GLState) {
    state.disable(gl, gl::CULL_FACE);
    state.disable(gl, gl::BLEND);
    state.disable(gl, gl::POLYGON_OFFSET_FILL);
    state.disable(gl, gl::SAMPLE_ALPHA_TO_COVERAGE);
    state.bind_vertex_array(gl, None);
}

/// Copies external images (`samplerExternalOES`) into regular 2D textures.
pub struct ExternalBlitter {
    program: LinkedProgram,
    fbo: GLuint,
    sampler: GLuint,
    invalidate: bool,
}

impl ExternalBlitter {
    pub fn new(gl: &dyn GL, state: &mut GLState, caps: &Capabilities) -> Result<Self> {
        if !caps.has_external_texture() {
            return Err(Error::Requirement("external textures".into()));
        }

        let vs = format!("{}{}", ES_HEADER, BLIT_VS);
        let fs = format!("{}{}", ES_HEADER, BLIT_FS);
        let program = program::link_program(gl, state, &vs, &fs, &[], &[], &["source"])?;

        let fbo = gl.gen_framebuffers(1)[0];
        let sampler = gl.gen_samplers(1)[0];
        gl.sampler_parameter_i(sampler, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
        gl.sampler_parameter_i(sampler, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
        gl.sampler_parameter_i(sampler, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);
        gl.sampler_parameter_i(sampler, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint);

        Ok(ExternalBlitter {
            program,
            fbo,
            sampler,
            invalidate: caps.has_invalidate_framebuffer()
                && !caps.bugs.disable_invalidate_framebuffer,
        })
    }

    /// Draws the external texture `source` into level 0 of the 2D texture `dest`.
    pub fn blit(
        &self,
        gl: &dyn GL,
        state: &mut GLState,
        source: GLuint,
        dest: GLuint,
        width: u32,
        height: u32,
    ) {
        state.bind_framebuffer(gl, gl::FRAMEBUFFER, self.fbo);
        gl.framebuffer_texture_2d(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            dest,
            0,
        );

        if self.invalidate {
            gl.invalidate_framebuffer(gl::FRAMEBUFFER, &[gl::COLOR_ATTACHMENT0]);
        }

        prepare_full_screen(gl, state);
        state.disable(gl, gl::SCISSOR_TEST);
        state.disable(gl, gl::DEPTH_TEST);
        state.color_mask(gl, true);
        state.viewport(gl, 0, 0, width as GLsizei, height as GLsizei);

        state.use_program(gl, self.program.id());
        state.bind_texture(gl, 0, TEXTURE_EXTERNAL_OES, source);
        state.bind_sampler(gl, 0, self.sampler);
        gl.draw_arrays(gl::TRIANGLE_STRIP, 0, 4);

        // The names are owned by the GL thread, which could delete them at any time.
        state.bind_texture(gl, 0, TEXTURE_EXTERNAL_OES, 0);
        gl.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, 0, 0);
    }

    pub fn terminate(self, gl: &dyn GL, state: &mut GLState) {
        state.delete_framebuffer(gl, self.fbo);
        state.unbind_sampler(gl, self.sampler);
        state.delete_samplers(gl, &[self.sampler]);
        state.delete_program(gl, self.program.id());
    }
}

/// Clears the color and depth buffers of the bound framebuffer by drawing a full screen
/// triangle, on GPUs where `glClear` is slow.
pub struct GeometryClear {
    program: LinkedProgram,
    color: GLint,
    depth: GLint,
}

impl GeometryClear {
    pub fn new(gl: &dyn GL, state: &mut GLState, caps: &Capabilities) -> Result<Self> {
        let vs = format!("{}{}", header(caps), CLEAR_VS);
        let fs = format!("{}{}", header(caps), CLEAR_FS);
        let program =
            program::link_program(gl, state, &vs, &fs, &[], &["color", "depth"], &[])?;

        let color = program.uniform_location("color").unwrap_or(-1);
        let depth = program.uniform_location("depth").unwrap_or(-1);

        Ok(GeometryClear {
            program,
            color,
            depth,
        })
    }

    /// Clears the color and/or depth buffers. Scissor test is left as is.
    pub fn clear(
        &self,
        gl: &dyn GL,
        state: &mut GLState,
        color: Option<[f32; 4]>,
        depth: Option<f32>,
    ) {
        prepare_full_screen(gl, state);
        state.use_program(gl, self.program.id());

        state.color_mask(gl, color.is_some());
        if let Some(v) = color {
            gl.uniform_4f(self.color, v[0], v[1], v[2], v[3]);
        }

        if let Some(v) = depth {
            state.enable(gl, gl::DEPTH_TEST);
            state.depth_func(gl, gl::ALWAYS);
            state.depth_mask(gl, true);
            gl.uniform_4f(self.depth, v * 2.0 - 1.0, 0.0, 0.0, 0.0);
        } else {
            state.disable(gl, gl::DEPTH_TEST);
            state.depth_mask(gl, false);
        }

        gl.draw_arrays(gl::TRIANGLES, 0, 3);
    }

    pub fn terminate(self, gl: &dyn GL, state: &mut GLState) {
        state.delete_program(gl, self.program.id());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::video::backends::headless::HeadlessGL;

    fn blits(gl: &HeadlessGL) -> usize {
        let caps = Capabilities::parse(gl).unwrap();
        let mut state = GLState::new(gl, &caps, 16);
        let blitter = ExternalBlitter::new(gl, &mut state, &caps).unwrap();

        let names = gl.gen_textures(2);
        state.bind_texture(gl, 0, TEXTURE_EXTERNAL_OES, names[0]);
        state.bind_texture(gl, 0, gl::TEXTURE_2D, names[1]);

        gl.reset_calls();
        blitter.blit(gl, &mut state, names[0], names[1], 4, 4);
        let calls = gl.calls("invalidate_framebuffer");

        state.delete_textures(gl, &names);
        blitter.terminate(gl, &mut state);
        calls
    }

    #[test]
    fn invalidate_follows_capabilities() {
        assert_eq!(blits(&HeadlessGL::es3()), 1);

        let adreno = HeadlessGL::with_profile(
            "OpenGL ES 3.0 Headless",
            "Adreno (TM) 530",
            &["GL_OES_EGL_image_external", "GL_OES_EGL_image_external_essl3"],
        );
        assert_eq!(blits(&adreno), 0);
    }
}
