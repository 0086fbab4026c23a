pub mod aggregate;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod io;
pub mod manifest;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod rules;
pub mod types;

pub use error::{Result, TmError};
