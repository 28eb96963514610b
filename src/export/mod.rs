//! Model export and serialization module
//!
//! Trained models are persisted as self-describing artifacts: a header naming
//! the backend, followed by the backend's own binary payload.

mod serializer;

pub use serializer::{ArtifactStore, ModelMetadata, TrainedModel};
