//! The orchestrator tying [`Projector`], [`IndexStore`], [`BoundedTopK`] and
//! a caller-supplied [`Mapper`] together into the public `add`/`query` API.
use crate::error::{Error, Result};
use crate::magnitude::{self, MagnitudeKey};
use crate::mapper::Mapper;
use crate::params::IndexParams;
use crate::projector::Projector;
use crate::store::IndexStore;
use crate::topk::BoundedTopK;
use crate::utils::l2_norm;
use ndarray::{Array1, Array2, ArrayView1};

#[cfg(test)]
mod test;

/// An opaque, caller-assigned identifier, unique across the lifetime of an
/// index. The core never parses it.
pub type VectorId = String;

/// A full-precision embedding, owned by the caller until handed to `add`.
pub type Embedding = Array1<f64>;

/// Outcome of a `query`: the surviving top-k matches plus diagnostics on
/// why any candidate was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    /// The best matches found, ascending by distance, `len() <= k`.
    pub matches: Vec<(VectorId, f64)>,
    /// Candidates whose id the mapper did not recognise.
    pub mapper_misses: usize,
    /// Candidates whose mapper lookup itself errored (I/O, deserialisation,
    /// or returned an embedding of the wrong dimensionality).
    pub mapper_failures: usize,
}

/// The approximate nearest-neighbour index.
///
/// `Index` owns its [`Projector`] and its [`IndexStore`] handle exclusively;
/// the caller owns the `VectorId`s and `Embedding`s it passes in, and the
/// index copies only what it needs to persist. There is no in-place
/// mutation or deletion of an already-added vector.
pub struct Index<S: IndexStore> {
    store: S,
    projector: Projector,
    params: IndexParams,
}

impl<S: IndexStore> Index<S> {
    /// Initialises a brand new index: samples `params.num_tables` fresh
    /// projection matrices, persists them alongside `params`, and retains
    /// both in memory.
    ///
    /// Fails with [`Error::AlreadyInitialised`] if `store` already holds a
    /// persisted index — re-initialisation never overwrites an
    /// existing store.
    pub fn init(params: IndexParams, mut store: S, seed: u64) -> Result<Self> {
        if store.is_initialised()? {
            return Err(Error::AlreadyInitialised);
        }
        let projector = Projector::sample(params.num_tables, params.hash_size, params.embedding_size, seed)?;
        store.save_params(&params)?;
        store.save_matrices(projector.matrices())?;
        Ok(Index {
            store,
            projector,
            params,
        })
    }

    /// Re-opens an index from a store a prior `init` wrote to, loading back
    /// its params and projection matrices.
    ///
    /// Fails with [`Error::Uninitialised`] if `store` has never been
    /// initialised.
    pub fn open(store: S) -> Result<Self> {
        if !store.is_initialised()? {
            return Err(Error::Uninitialised);
        }
        let params = store.load_params()?;
        let matrices = store.load_matrices()?;
        let projector = Projector::from_matrices(matrices, params.embedding_size, params.hash_size)?;
        Ok(Index {
            store,
            projector,
            params,
        })
    }

    /// The params this index was initialised or opened with.
    pub fn params(&self) -> IndexParams {
        self.params
    }

    fn check_dim(&self, len: usize) -> Result<()> {
        if len != self.params.embedding_size {
            return Err(Error::DimensionMismatch {
                expected: self.params.embedding_size,
                actual: len,
            });
        }
        Ok(())
    }

    /// Indexes a single embedding under `id`.
    ///
    /// Fails with [`Error::EmptyId`] if `id` is empty, or
    /// [`Error::DimensionMismatch`] if `v` does not match the dimension
    /// `self` was initialised with.
    pub fn add(&mut self, id: impl Into<String>, v: ArrayView1<f64>) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        self.check_dim(v.len())?;

        let codes = self.projector.hash(v);
        let key = magnitude::key_of(v);
        self.store.put(&id, &codes, &key)?;
        Ok(())
    }

    /// Indexes many `(id, embedding)` pairs at once.
    ///
    /// A convenience entry point over [`Index::add`] rather than a
    /// distinct code path: hashing is naturally expressed as one batched
    /// matrix multiply, so this stacks every row into a
    /// single `Projector::hash_batch` call before writing each result to
    /// `store` individually. Validates every id/dimension up front — a
    /// malformed row anywhere in `items` fails the whole batch before any
    /// writes happen.
    pub fn add_batch(&mut self, items: &[(VectorId, Embedding)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        for (id, v) in items {
            if id.is_empty() {
                return Err(Error::EmptyId);
            }
            self.check_dim(v.len())?;
        }

        let dim = self.params.embedding_size;
        let mut flat = Vec::with_capacity(items.len() * dim);
        for (_, v) in items {
            flat.extend(v.iter().copied());
        }
        let matrix = Array2::from_shape_vec((items.len(), dim), flat)
            .expect("flattened rows match (items.len(), dim) by construction");
        let codes = self.projector.hash_batch(matrix.view());

        for ((id, v), row_codes) in items.iter().zip(codes) {
            let key = magnitude::key_of(v.view());
            self.store.put(id, &row_codes, &key)?;
        }
        Ok(())
    }

    /// Finds the `k` approximate nearest neighbours of `v`.
    ///
    /// `radius` controls how many 0.1-wide magnitude buckets either side of
    /// `v`'s own are swept; pass
    /// [`crate::constants::DEFAULT_MAGNITUDE_RADIUS`] unless a caller has a
    /// specific reason to widen or narrow recall.
    ///
    /// Candidate resolution is best-effort: a mapper miss or failure is
    /// logged at `warn` and folded into the returned counters rather than
    /// aborting the query.
    ///
    /// # Panics
    /// Panics if `k == 0` (a query always asks for at least one
    /// neighbour).
    pub fn query(&self, v: ArrayView1<f64>, k: usize, mapper: &dyn Mapper, radius: u32) -> Result<QueryReport> {
        self.check_dim(v.len())?;

        let mut codes = self.projector.hash(v);
        codes.sort_unstable();
        codes.dedup();
        let key: MagnitudeKey = magnitude::key_of(v);
        let mag_keys = magnitude::neighbours(&key, radius);

        let candidates = self.store.ids_in(&codes, &mag_keys)?;

        let mut topk = BoundedTopK::new(k);
        let mut mapper_misses = 0usize;
        let mut mapper_failures = 0usize;

        for id in candidates {
            match mapper.resolve(&id) {
                Ok(raw) => {
                    if raw.len() != v.len() {
                        log::warn!(
                            "mapper returned a {}-dimensional embedding for id {:?}, expected {}; skipping",
                            raw.len(),
                            id,
                            v.len()
                        );
                        mapper_failures += 1;
                        continue;
                    }
                    let candidate = Array1::from(raw);
                    let diff = &candidate - &v;
                    let dist = l2_norm(diff.view());
                    topk.insert(id, dist);
                }
                Err(crate::error::MapperError::Miss(_)) => {
                    log::warn!("mapper reported no embedding for candidate id {:?}", id);
                    mapper_misses += 1;
                }
                Err(crate::error::MapperError::Failure(e)) => {
                    log::warn!("mapper lookup failed for candidate id {:?}: {}", id, e);
                    mapper_failures += 1;
                }
            }
        }

        Ok(QueryReport {
            matches: topk.drain_sorted(),
            mapper_misses,
            mapper_failures,
        })
    }
}
