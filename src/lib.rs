//! Approximate nearest-neighbour search over fixed-length embeddings,
//! using multi-table sign-random-projection LSH with an L2-magnitude
//! secondary bucket to prune candidates before the exact distance
//! computation.
//!
//! Storage is pluggable behind the [`store::IndexStore`] trait: a
//! filesystem backend ([`store::fs::FsStore`]) ships unconditionally, and a
//! relational backend ([`store::sql::SqlStore`]) ships behind the `sqlite`
//! feature (on by default).
extern crate ndarray;

pub mod constants;
mod error;
pub mod index;
pub mod magnitude;
pub mod mapper;
pub mod params;
pub mod projector;
pub mod store;
pub mod topk;
pub mod utils;

pub use error::{Error, MapperError, Result};
pub use index::{Embedding, Index, QueryReport, VectorId};
pub use mapper::Mapper;
pub use params::IndexParams;
pub use projector::{HashCode, Projector};
pub use store::IndexStore;
pub use topk::BoundedTopK;
