//! Pluggable persistence backends.
//!
//! An [`IndexStore`] owns everything an [`Index`](crate::index::Index) does
//! not keep in memory: the persisted [`IndexParams`], the sampled
//! projection matrices, and the `(code, magnitude key) -> id` bucket
//! mapping. Both shipped backends — [`fs::FsStore`] and, behind the
//! `sqlite` feature, [`sql::SqlStore`] — implement the exact same trait, so
//! `Index` itself never branches on which one it was built with.
use crate::error::Result;
use crate::magnitude::MagnitudeKey;
use crate::params::IndexParams;
use crate::projector::HashCode;
use fnv::FnvHashSet;
use ndarray::Array2;

pub mod fs;
#[cfg(feature = "sqlite")]
pub mod sql;

/// Capability contract a storage backend must provide.
///
/// Bucket membership is intentionally flat across tables: a `put` records
/// `id` once per distinct code it produced (possibly fewer than `T` writes,
/// since different tables can coincide on the same code for a given
/// vector), and `ids_in` looks candidates up purely by code value, with no
/// notion of "which table produced this code". This mirrors the
/// reference system's own bucket layout rather than partitioning buckets
/// per table.
pub trait IndexStore {
    /// `true` once a previous call to `save_params` has completed; used by
    /// `Index::open` to detect a store that was never initialised and by
    /// `Index::init` to refuse clobbering an existing one.
    fn is_initialised(&self) -> Result<bool>;

    /// Persists `params`, the first write `Index::init` performs.
    fn save_params(&mut self, params: &IndexParams) -> Result<()>;

    /// Loads back the params persisted by `save_params`.
    fn load_params(&self) -> Result<IndexParams>;

    /// Persists the `T` freshly sampled `D x H` projection matrices, in
    /// table order.
    fn save_matrices(&mut self, matrices: &[Array2<f64>]) -> Result<()>;

    /// Loads back the matrices persisted by `save_matrices`, in table
    /// order.
    fn load_matrices(&self) -> Result<Vec<Array2<f64>>>;

    /// Records `id` under every distinct code in `codes`, paired with
    /// `magnitude_key`. Calling this twice with the same
    /// arguments is safe — a repeated write never corrupts the store —
    /// though whether it produces a literal duplicate entry (tolerated;
    /// `ids_in` de-duplicates through `FnvHashSet`) or is absorbed outright
    /// is backend-specific.
    fn put(&mut self, id: &str, codes: &[HashCode], magnitude_key: &MagnitudeKey) -> Result<()>;

    /// Returns the union of every id recorded under any of `codes`, paired
    /// with any of `magnitude_keys`.
    fn ids_in(&self, codes: &[HashCode], magnitude_keys: &[MagnitudeKey]) -> Result<FnvHashSet<String>>;
}
