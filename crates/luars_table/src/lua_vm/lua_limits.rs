//! Limits and sizing constants used by the table engine.
//!
//! Mirrors the relevant parts of Lua's `llimits.h` / `ltable.c`.

// ===== Table storage =====

/// Smallest non-empty hash region. A hash region never has exactly one bucket.
pub const MIN_HASH_CAPACITY: usize = 2;

/// Number of log2 buckets used by the rehash histogram.
/// Array-region capacity is at most `1 << (MAXABITS - 1)`.
pub const MAXABITS: usize = 31;

/// Largest integer key that may live in the array region.
pub const MAXASIZE: i64 = i32::MAX as i64;

// ===== Strings =====

/// Maximum length for "short" strings (stored inline, hashed by value,
/// never held weakly).
/// Matches Lua 5.5's LUAI_MAXSHORTLEN.
pub const LUAI_MAXSHORTLEN: usize = 40;

// ===== Metamethods =====

/// Maximum number of `__index` / `__newindex` handler tables followed
/// before giving up with a loop error.
/// Matches Lua 5.5's MAXTAGLOOP.
pub const MAXTAGLOOP: usize = 2000;

// ===== Table library =====

/// Upper bound on the number of values `unpack` may produce.
pub const MAX_UNPACK: u64 = 0x00ff_ffff;

/// Sequences at least this long are rejected by `sort`.
pub const MAX_SORT: i64 = i32::MAX as i64;
