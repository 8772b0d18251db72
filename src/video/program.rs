//! Compiled programs, as seen by the driver.
//!
//! Shader compilation is the business of another subsystem, the driver only needs to
//! bind a program and assign the textures its samplers read from. `LinkedProgram` and
//! `link_program` are the small builder the driver uses for its own internal programs.

use std::fmt;

use gl;
use gl::types::*;
use smallvec::SmallVec;

use crate::errors::*;
use crate::utils::hash::FastHashMap;
use crate::video::backends::gl::state::GLState;
use crate::video::backends::GL;

/// Assigns the entry `index` of the sampler group bound at `binding` to texture `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerSlot {
    pub binding: u8,
    pub index: u8,
    pub unit: u8,
}

pub trait CompiledProgram: Send + Sync {
    /// The native program name.
    fn id(&self) -> GLuint;

    /// The sampler-to-texture-unit assignments of this program.
    fn sampler_slots(&self) -> &[SamplerSlot];

    /// Returns the location of the vertex attribute `name`.
    fn attribute_location(&self, name: &str) -> Option<GLint>;

    /// Returns the location of the uniform `name`.
    fn uniform_location(&self, name: &str) -> Option<GLint>;
}

/// A program linked by `link_program`.
pub struct LinkedProgram {
    id: GLuint,
    slots: SmallVec<[SamplerSlot; 4]>,
    attributes: FastHashMap<String, GLint>,
    uniforms: FastHashMap<String, GLint>,
}

impl fmt::Debug for LinkedProgram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("id", &self.id)
            .field("slots", &self.slots)
            .finish()
    }
}

impl CompiledProgram for LinkedProgram {
    #[inline]
    fn id(&self) -> GLuint {
        self.id
    }

    #[inline]
    fn sampler_slots(&self) -> &[SamplerSlot] {
        &self.slots
    }

    fn attribute_location(&self, name: &str) -> Option<GLint> {
        self.attributes.get(name).cloned()
    }

    fn uniform_location(&self, name: &str) -> Option<GLint> {
        self.uniforms.get(name).cloned()
    }
}

/// Compiles and links a program from sources. The sampler uniforms named in `samplers`
/// are assigned to texture units in order, starting from unit 0; the uniforms in
/// `uniforms` and attributes in `attributes` get their locations queried.
///
/// The program is left current.
pub fn link_program(
    gl: &dyn GL,
    state: &mut GLState,
    vs: &str,
    fs: &str,
    attributes: &[&str],
    uniforms: &[&str],
    samplers: &[&str],
) -> Result<LinkedProgram> {
    let vs = compile(gl, gl::VERTEX_SHADER, vs)?;
    let fs = match compile(gl, gl::FRAGMENT_SHADER, fs) {
        Ok(v) => v,
        Err(err) => {
            gl.delete_shader(vs);
            return Err(err);
        }
    };

    let id = link(gl, &[vs, fs]).map(|id| {
        gl.detach_shader(id, vs);
        gl.detach_shader(id, fs);
        id
    });

    gl.delete_shader(vs);
    gl.delete_shader(fs);
    let id = id?;

    let mut program = LinkedProgram {
        id,
        slots: SmallVec::new(),
        attributes: FastHashMap::default(),
        uniforms: FastHashMap::default(),
    };

    for &name in attributes {
        let location = gl.get_attrib_location(id, name);
        if location >= 0 {
            program.attributes.insert(name.to_owned(), location);
        }
    }

    for &name in uniforms {
        let location = gl.get_uniform_location(id, name);
        if location >= 0 {
            program.uniforms.insert(name.to_owned(), location);
        }
    }

    state.use_program(gl, id);
    for (unit, &name) in samplers.iter().enumerate() {
        let location = gl.get_uniform_location(id, name);
        if location >= 0 {
            gl.uniform_1i(location, unit as GLint);
            program.slots.push(SamplerSlot {
                binding: 0,
                index: unit as u8,
                unit: unit as u8,
            });
        }
    }

    Ok(program)
}

fn compile(gl: &dyn GL, ty: GLenum, src: &str) -> Result<GLuint> {
    let shader = gl.create_shader(ty);
    gl.shader_source(shader, src);
    gl.compile_shader(shader);

    // Get the compile status
    if gl.get_shader_iv(shader, gl::COMPILE_STATUS) != GLint::from(gl::TRUE) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        Err(Error::Backend(format!("{:?}\n{:?}", log, src)))
    } else {
        Ok(shader)
    }
}

fn link(gl: &dyn GL, shaders: &[GLuint]) -> Result<GLuint> {
    let program = gl.create_program();
    for &shader in shaders {
        gl.attach_shader(program, shader)
    }

    gl.link_program(program);

    // Get the link status
    if gl.get_program_iv(program, gl::LINK_STATUS) != GLint::from(gl::TRUE) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        Err(Error::Backend(log))
    } else {
        Ok(program)
    }
}
