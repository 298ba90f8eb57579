//! Image-building pipeline used by the `make_ntfs_fixture` binary and tests.
//!
//! Every external step sits behind a trait so the pipeline can be driven
//! with fakes instead of privileged system tools.

pub mod format;
pub mod generator;
pub mod image;
pub mod mount;
pub mod populate;
pub mod tools;
pub mod verify;
