//! # crayon-video
//!
//! The OpenGL/ES command-stream driver of crayon. Abstract commands recorded on a
//! producer thread are dispatched, one per call, into the methods of a
//! [`GLDriver`](video::backends::gl::driver::GLDriver) living on the GL thread.
//!
//! The driver is built from a few pieces:
//!
//! 1. The enum mapping layer (`video::backends::gl::types`), pure functions that
//!    convert abstract formats and modes into native GL enums.
//! 2. The handle arena (`utils::arena`), which hands out compact integer handles
//!    addressing driver objects inside one fixed memory region.
//! 3. The redundant-state cache (`video::backends::gl::state`), through which every
//!    native state mutation is routed.
//! 4. The GPU object lifecycle manager (`video::backends::gl::driver`).
//! 5. The external-texture streaming pipeline (`video::backends::gl::stream`).
//!
//! Native GL is reached through the [`GL`](video::backends::GL) trait, implemented
//! for real contexts by `NativeGL` and in memory by `HeadlessGL`.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;

pub mod errors;
#[macro_use]
pub mod utils;
pub mod video;

pub mod prelude {
    pub use crate::errors::{Error, Result};
    pub use crate::utils::arena::{ArenaObject, HandleArena, ObjectKind};
    pub use crate::utils::handle::HandleId;
    pub use crate::video::assets::prelude::*;
    pub use crate::video::backends::gl::driver::GLDriver;
    pub use crate::video::backends::headless::{HeadlessGL, HeadlessPlatform};
    pub use crate::video::backends::GL;
    pub use crate::video::command::{CommandQueue, DriverApi};
    pub use crate::video::platform::Platform;
    pub use crate::video::program::CompiledProgram;
    pub use crate::video::settings::DriverSettings;
}
