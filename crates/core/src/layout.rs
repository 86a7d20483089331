//! Memory layout shared by the code generator and the VM.
//!
//! ```text
//! memory (global cells)                heap (64-bit cells)
//! ┌──────────────┬─────────────┐      ┌────────────┬──────────────┬─────────┐
//! │ 0..100       │ 100..5000   │      │ 0..100000  │ 100000..     │ hp..    │
//! │ reserved     │ globals     │      │ program    │ string pool  │ bump    │
//! └──────────────┴─────────────┘      │ data       │ (NUL-term)   │ alloc   │
//!                                     └────────────┴──────────────┴─────────┘
//! ```
//!
//! The code generator hands out global cells from `GLOBAL_BASE` upward and
//! string addresses from `STRING_POOL_BASE` upward; the VM initializes `hp`
//! to the first cell past the pool, so pool addresses and bump allocations
//! never overlap within a run.

/// First memory cell handed to source-program globals.
pub const GLOBAL_BASE: usize = 100;

/// Size of the flat global-memory array.
pub const MEMORY_CELLS: usize = 5_000;

/// Size of the linear heap. Grows are not supported; the heap is sized for
/// the ledger workloads the VM was built to host.
pub const HEAP_CELLS: usize = 500_000;

/// First heap cell used for interned string literals.
pub const STRING_POOL_BASE: u64 = 100_000;
