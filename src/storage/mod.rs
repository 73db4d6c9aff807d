//! Storage Module - versioned, multi-format analysis results

pub mod artifact;
pub mod npz;
pub mod results;

pub use artifact::{Artifact, ArtifactKind, ResultBundle};
pub use npz::{ArrayCollection, ArrayData, NpyArray};
pub use results::ResultStore;
