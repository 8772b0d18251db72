//! The GPU side of crayon. Abstract resources and states are described by the types
//! in `assets`, recorded into a command stream by `command::DriverApi`, and realized
//! by the OpenGL/ES driver of `backends`.

pub mod assets;
pub mod backends;
pub mod command;
pub mod platform;
pub mod program;
pub mod settings;
