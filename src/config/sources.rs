//! Configuration sources layered by [`super::ConfigLoader`]

pub mod global_file;
pub mod workspace_file;
