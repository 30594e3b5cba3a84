/// Dataset storage and building
///
/// `store` aggregates frame-level keypoint records into ordered per-sample sequences and
/// persists them per word; `builder` produces those datasets from captured sample folders.
pub mod builder;
pub mod store;

pub use builder::{write_sample_folder, DatasetBuildSummary, DatasetBuilder, WordBuildReport};
pub use store::{KeypointRecord, SequenceStore};
