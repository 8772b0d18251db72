//! The OpenGL/ES driver.

use gl;
use gl::types::*;

use super::GL;

/// Logs the native errors raised so far, with the call site. Compiled out of release
/// builds, and never alters control flow.
#[macro_export]
macro_rules! check_gl {
    ($gl:expr) => {
        if cfg!(debug_assertions) {
            $crate::video::backends::gl::check_error($gl, file!(), line!());
        }
    };
}

pub mod blitter;
pub mod capabilities;
pub mod driver;
pub mod native;
pub mod objects;
pub mod state;
pub mod stream;
pub mod types;

/// Returns the symbolic name of a `glGetError` code.
pub fn error_name(code: GLenum) -> &'static str {
    match code {
        gl::NO_ERROR => "GL_NO_ERROR",
        gl::INVALID_ENUM => "GL_INVALID_ENUM",
        gl::INVALID_VALUE => "GL_INVALID_VALUE",
        gl::INVALID_OPERATION => "GL_INVALID_OPERATION",
        gl::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        gl::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        _ => "GL_UNKNOWN_ERROR",
    }
}

/// Drains the error flags of the current context into the log. Returns the number of
/// errors found.
pub fn check_error(gl: &dyn GL, file: &str, line: u32) -> usize {
    // An implementation keeps one flag per error kind at most.
    let mut count = 0;
    for _ in 0..8 {
        let code = gl.get_error();
        if code == gl::NO_ERROR {
            break;
        }

        error!("[GL] {} ({:#x}) at {}:{}.", error_name(code), code, file, line);
        count += 1;
    }

    count
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(error_name(gl::INVALID_ENUM), "GL_INVALID_ENUM");
        assert_eq!(error_name(gl::OUT_OF_MEMORY), "GL_OUT_OF_MEMORY");
        assert_eq!(error_name(0xFFFF), "GL_UNKNOWN_ERROR");
    }
}
