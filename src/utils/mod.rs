//! Utility modules shared by the build and deploy tasks.

pub mod exec;
pub mod git;
pub mod log;
pub mod minify;
pub mod version;
