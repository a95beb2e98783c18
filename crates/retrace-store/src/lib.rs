//! # retrace-store
//!
//! XML persistence for retrace projects: full round-trip of documents,
//! their metadata versions, tags, and criteria check states.

pub mod xml;

pub use xml::{load_project, read_project, save_project, write_project};
