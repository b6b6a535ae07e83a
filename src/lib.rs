#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod controller;
pub mod export;
pub mod geometry;
pub mod history;
pub mod import;
pub mod model;
pub mod render;
pub mod router;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::EditorConfig;
pub use controller::{Controller, Input, State};
pub use model::{Graph, GraphError};
