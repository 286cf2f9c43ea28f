//! Core library for the salesbridge-tools command line application.
//!
//! The library turns a marketplace sales export into a filled accounting
//! template. IO adapters live under [`salesbridge::tools::io`], data
//! representations inside [`salesbridge::tools::model`], the article join in
//! [`salesbridge::tools::resolve`], and the run orchestration under
//! [`salesbridge::tools::pipeline`].

pub mod salesbridge;

pub use salesbridge::tools::{
    Result, ToolError, config, error, events, io, model, pipeline, resolve,
};
