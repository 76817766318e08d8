//! The external vector-id → embedding bridge.
use crate::error::MapperError;

/// Resolves a [`VectorId`](crate::index::VectorId) to the full embedding
/// stored outside the index (a side database, an in-memory cache, whatever
/// the caller owns).
///
/// Modelled as a trait rather than a bare function pointer: a duck-typed
/// callable carries no error variant of its own, so a trait lets
/// implementors return a typed miss vs. failure instead of panicking or
/// smuggling errors through `Option`.
pub trait Mapper {
    /// Look up the full embedding for `id`.
    ///
    /// Returns `Err(MapperError::Miss(_))` if `id` is not known to the
    /// mapper, or `Err(MapperError::Failure(_))` if the lookup itself
    /// failed (I/O error, deserialisation error, etc).
    fn resolve(&self, id: &str) -> Result<Vec<f64>, MapperError>;
}

impl<F> Mapper for F
where
    F: Fn(&str) -> Result<Vec<f64>, MapperError>,
{
    fn resolve(&self, id: &str) -> Result<Vec<f64>, MapperError> {
        self(id)
    }
}
