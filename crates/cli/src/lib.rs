//! Orchestration for the `docsort` binary: input discovery, batch runs and
//! applying rename plans to the filesystem.
pub mod batch;
pub mod fs_apply;
pub mod inputs;
