pub mod index;

pub use index::{HttpVectorIndex, VectorEntry, VectorIndex, VectorIndexError, VectorMatch};
