//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

#[cfg(test)]
pub(crate) mod fixtures;

pub use loaders::{Channel, DataField, GwyObject, GwyValue, LoaderError};
pub use writers::{write_manifest_csv, ImageRecord, WriteError};
