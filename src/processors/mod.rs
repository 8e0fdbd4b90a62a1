//! Batch processing of data folders.

pub mod batch;
pub mod discovery;

// Re-export key types for convenience
pub use batch::{
    inspect_file, output_path_for, plot_folder, BatchOptions, BatchReport, ChannelError,
    ChannelFailure, ChannelSummary, FileFailure,
};
pub use discovery::{find_data_files, has_extension};
