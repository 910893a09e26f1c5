//! Point and cluster storage.
//!
//! Both stores are traits so the engine can run against any persistence
//! backend. In-memory implementations are provided for batch runs and tests.

mod clusters;
mod points;

pub use clusters::{ClusterSnapshot, ClusterStore, DateGeneration, GenerationBatch, GenerationStore};
pub use points::{InMemoryPointStore, IngestReport, PointFilter, PointSource, Rejection};
