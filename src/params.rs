//! Index parameters: the triple (T, H, D) persisted alongside the
//! projector matrices.
use crate::constants::MAX_HASH_BITS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// `(num_tables, hash_size, embedding_size)` — fixed for the lifetime of an
/// index and persisted on `init`. This is also the entirety of the
/// crate's runtime configuration surface: there is
/// no config file or environment variable beyond what a caller passes here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    pub num_tables: usize,
    pub hash_size: usize,
    pub embedding_size: usize,
}

impl IndexParams {
    /// Builds a new parameter set. Reference deployment defaults are
    /// `num_tables = 49`, `hash_size = 7`.
    pub fn new(num_tables: usize, hash_size: usize, embedding_size: usize) -> Result<Self> {
        if hash_size > MAX_HASH_BITS {
            return Err(Error::HashSizeTooLarge { hash_size });
        }
        Ok(IndexParams {
            num_tables,
            hash_size,
            embedding_size,
        })
    }

    /// Serialises to the on-disk JSON shape:
    /// `{"num_tables": T, "hash_size": H, "embedding_size": D}`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
