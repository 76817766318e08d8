//! Small numeric helpers shared across the index.
use ndarray::ArrayView1;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// L2 norm of a single embedding.
///
/// # Examples
///
/// ```
/// use annlsh::utils::l2_norm;
/// use ndarray::arr1;
/// let a = arr1(&[3.0_f64, 4.0]);
/// assert_eq!(l2_norm(a.view()), 5.0);
/// ```
pub fn l2_norm(x: ArrayView1<f64>) -> f64 {
    x.dot(&x).sqrt()
}

/// Seeded small RNG, or OS-entropy seeded if `seed == 0`.
///
/// Index parameters are always persisted alongside the sampled matrices, so
/// a caller that wants reproducible matrices should pass a non-zero seed at
/// `init` time; re-sampling never happens after that.
pub fn create_rng(seed: u64) -> SmallRng {
    if seed == 0 {
        SmallRng::from_entropy()
    } else {
        SmallRng::seed_from_u64(seed)
    }
}
