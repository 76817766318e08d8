//! L2-magnitude secondary bucket.
use crate::constants::DEFAULT_MAGNITUDE_RADIUS;
use crate::utils::l2_norm;
use ndarray::ArrayView1;

/// A discretised L2 norm, formatted as a filesystem-path-safe string:
/// `round(‖v‖, 1)` with the decimal point rendered as `'d'`, e.g.
/// `1.3 -> "1d3"`.
pub type MagnitudeKey = String;

/// Rounds `x` to one decimal place using the same rounding rule Rust's
/// `f64::round` applies (half away from zero): ties round away from
/// zero, not to even.
fn round_to_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn format_key(rounded_tenths: f64) -> MagnitudeKey {
    // rounded_tenths is already a multiple of 0.1; format with exactly one
    // decimal digit and substitute '.' -> 'd' so the key is safe to use as
    // a single path component on every common filesystem.
    format!("{:.1}", rounded_tenths).replace('.', "d")
}

/// Computes the magnitude key of an embedding: `round(‖v‖₂, 1)` with the
/// `.`/`d` substitution.
///
/// # Examples
///
/// ```
/// use annlsh::magnitude::key_of;
/// use ndarray::arr1;
/// assert_eq!(key_of(arr1(&[1.25_f64]).view()), "1d3");
/// ```
pub fn key_of(v: ArrayView1<f64>) -> MagnitudeKey {
    let norm = l2_norm(v);
    format_key(round_to_tenth(norm))
}

/// Enumerates the magnitude keys within `radius` steps of 0.1 either side
/// of `key`, including `key` itself.
///
/// The result never contains duplicates: since every candidate is a
/// distinct multiple of 0.1, `2*radius + 1` candidates are always
/// pairwise distinct.
///
/// # Panics
/// Panics if `key` is not a validly formatted magnitude key.
pub fn neighbours(key: &MagnitudeKey, radius: u32) -> Vec<MagnitudeKey> {
    let center = parse_key(key);
    let mut out = Vec::with_capacity(2 * radius as usize + 1);
    for step in -(radius as i64)..=(radius as i64) {
        let candidate = round_to_tenth(center + step as f64 * 0.1);
        out.push(format_key(candidate));
    }
    out
}

/// Enumerates neighbour keys using the crate's default radius (2).
pub fn neighbours_default(key: &MagnitudeKey) -> Vec<MagnitudeKey> {
    neighbours(key, DEFAULT_MAGNITUDE_RADIUS)
}

fn parse_key(key: &MagnitudeKey) -> f64 {
    key.replace('d', ".")
        .parse()
        .unwrap_or_else(|_| panic!("malformed magnitude key: {:?}", key))
}
