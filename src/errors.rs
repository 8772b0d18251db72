//! Errors raised while bringing a driver up.
//!
//! Once a driver exists, most failures are either degraded silently (with a warning
//! in the log) or are fatal and abort through a panic, so only construction-time
//! and configuration paths return `Result`.

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "OpenGL implementation doesn't support {}.", _0)]
    Requirement(String),
    #[fail(display = "Context: {}", _0)]
    Context(String),
    #[fail(display = "Backend: {}", _0)]
    Backend(String),
    #[fail(display = "Settings: {}", _0)]
    Settings(String),
    #[fail(display = "Framebuffer is incomplete: {}.", _0)]
    FramebufferIncomplete(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Error {
        Error::Settings(format!("{}", err))
    }
}

impl From<::serde_json::Error> for Error {
    fn from(err: ::serde_json::Error) -> Error {
        Error::Settings(format!("{}", err))
    }
}
