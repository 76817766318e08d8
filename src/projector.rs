//! Random-projection hasher.
use crate::constants::MAX_HASH_BITS;
use crate::error::{Error, Result};
use crate::utils::create_rng;
use ndarray::prelude::*;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rayon::prelude::*;

/// An integer in `[0, 2^H)`: sign bits of `v . M_t` packed most-significant
/// bit first. Fits a `u32` for `H <= 31`, which `IndexParams::new`
/// enforces at construction time.
pub type HashCode = u32;

/// Holds the `T` immutable `D x H` Gaussian projection matrices and turns
/// embeddings into one `HashCode` per table.
///
/// Construction always goes through either [`Projector::sample`] (fresh
/// matrices, persisted by the caller immediately after) or
/// [`Projector::from_matrices`] (matrices loaded back from storage) — there
/// is no global/cached projector state.
#[derive(Debug, Clone)]
pub struct Projector {
    /// One `D x H` matrix per table.
    matrices: Vec<Array2<f64>>,
    dim: usize,
    hash_size: usize,
}

impl Projector {
    /// Samples `num_tables` fresh `dim x hash_size` matrices of i.i.d.
    /// standard-normal entries, seeded by `seed` (0 = OS entropy).
    pub fn sample(num_tables: usize, hash_size: usize, dim: usize, seed: u64) -> Result<Self> {
        if hash_size > MAX_HASH_BITS {
            return Err(Error::HashSizeTooLarge { hash_size });
        }
        let mut rng = create_rng(seed);
        let matrices = (0..num_tables)
            .map(|_| Array::random_using((dim, hash_size), StandardNormal, &mut rng))
            .collect();
        Ok(Projector {
            matrices,
            dim,
            hash_size,
        })
    }

    /// Wraps matrices already loaded from storage. Validates their shape
    /// against the expected `(dim, hash_size)`.
    pub fn from_matrices(matrices: Vec<Array2<f64>>, dim: usize, hash_size: usize) -> Result<Self> {
        for m in &matrices {
            if m.shape() != [dim, hash_size] {
                return Err(Error::StorageFailure(format!(
                    "projection matrix has shape {:?}, expected [{}, {}]",
                    m.shape(),
                    dim,
                    hash_size
                )));
            }
        }
        Ok(Projector {
            matrices,
            dim,
            hash_size,
        })
    }

    pub fn num_tables(&self) -> usize {
        self.matrices.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    pub fn matrices(&self) -> &[Array2<f64>] {
        &self.matrices
    }

    /// Computes one `HashCode` per table for a single embedding.
    ///
    /// Bit `i` of the code for table `t` is `1` iff `(v . M_t)[i] > 0`,
    /// bit 0 being the most significant; an exact zero produces bit `0`.
    pub fn hash(&self, v: ArrayView1<f64>) -> Vec<HashCode> {
        self.matrices.iter().map(|m| hash_one(m, v)).collect()
    }

    /// Batch form: one row of `num_tables` codes per input embedding,
    /// equivalent row-wise to calling [`Projector::hash`] on each row.
    pub fn hash_batch(&self, vs: ArrayView2<f64>) -> Vec<Vec<HashCode>> {
        vs.axis_iter(Axis(0)).map(|row| self.hash(row)).collect()
    }

    /// Parallel batch form over independent rows. Must be
    /// observably identical to [`Projector::hash_batch`].
    pub fn hash_batch_par(&self, vs: ArrayView2<f64>) -> Vec<Vec<HashCode>> {
        vs.axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.hash(row))
            .collect()
    }
}

fn hash_one(m: &Array2<f64>, v: ArrayView1<f64>) -> HashCode {
    let projected = v.dot(m);
    let mut code: HashCode = 0;
    for &p in projected.iter() {
        code <<= 1;
        if p > 0.0 {
            code |= 1;
        }
    }
    code
}

/// Writes a matrix in the self-describing `.bin` format: an
/// 8-byte little-endian row count, an 8-byte little-endian column count,
/// then `rows * cols` little-endian `f64` values in row-major order.
pub fn write_matrix<W: std::io::Write>(w: &mut W, m: &Array2<f64>) -> Result<()> {
    let (rows, cols) = (m.nrows(), m.ncols());
    w.write_all(&(rows as u64).to_le_bytes())?;
    w.write_all(&(cols as u64).to_le_bytes())?;
    for v in m.iter() {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Reads back a matrix written by [`write_matrix`].
pub fn read_matrix<R: std::io::Read>(r: &mut R) -> Result<Array2<f64>> {
    let mut rows_buf = [0u8; 8];
    let mut cols_buf = [0u8; 8];
    r.read_exact(&mut rows_buf)?;
    r.read_exact(&mut cols_buf)?;
    let rows = u64::from_le_bytes(rows_buf) as usize;
    let cols = u64::from_le_bytes(cols_buf) as usize;

    let mut data = Vec::with_capacity(rows * cols);
    let mut buf = [0u8; 8];
    for _ in 0..(rows * cols) {
        r.read_exact(&mut buf)?;
        data.push(f64::from_le_bytes(buf));
    }
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::StorageFailure(format!("corrupt matrix payload: {}", e)))
}
