//! Small fixed constants shared across the index and its storage backends.

/// Default number of 0.1-wide steps searched either side of a query's
/// magnitude key. Both storage backends use the same value unless a
/// caller overrides it on `Index::query`.
pub const DEFAULT_MAGNITUDE_RADIUS: u32 = 2;

/// `HashCode` is a `u32`; a projector with more than this many bits per
/// table cannot pack its sign bits into one.
pub const MAX_HASH_BITS: usize = 31;
