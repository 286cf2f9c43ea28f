pub mod config;
pub mod error;
pub mod events;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod resolve;

pub use error::{Result, ToolError};
