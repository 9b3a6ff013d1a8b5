//! Compile-time configuration constants for the value store: one file of
//! named constants with short rationale comments, no config-file machinery
//! — these are fixed invariants, not tunables.

/// Maximum array length: `2^20 - 1`. An array growing to this size or
/// beyond is refused.
pub const MAX_ARRAY_LEN: u32 = (1 << 20) - 1;

/// GC triggers once the heap has at least doubled since the last collection,
/// but never below this floor, so tiny stores don't thrash.
pub const GC_HEAP_FLOOR_WORDS: usize = (512 * 1024) / 4;

/// Table load-factor trigger, as a fraction: grow once `count + 1 >= capacity * NUM/DEN`.
pub const TABLE_LOAD_FACTOR_NUM: u32 = 3;
pub const TABLE_LOAD_FACTOR_DEN: u32 = 4;

/// Smallest table capacity (always a power of two).
pub const MIN_TABLE_CAPACITY: u32 = 4;
