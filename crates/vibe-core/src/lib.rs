pub mod backup;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod executor;
pub mod gate;
pub mod interpreter;
pub mod io;
pub mod package_manager;
pub mod paths;
pub mod preview;
pub mod scaffold;
pub mod session;
pub mod shell;
pub mod validate;

pub use error::{Result, VibeError};
