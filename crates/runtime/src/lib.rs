//! XL Runtime: the stack virtual machine for compiled XL programs
//!
//! Key design principles:
//! - All values are unsigned 64-bit words; arithmetic wraps, comparisons
//!   are signed, there is no type tagging.
//! - One operand stack, one frame stack, one program counter. Execution is
//!   single-threaded and synchronous; intrinsic I/O blocks.
//! - The heap is a linear array of word cells, bump-allocated and never
//!   freed within a run. String data lives one byte per cell, NUL-terminated.
//! - Host intrinsics (printing, files, PRNG, SHA-512, Ed25519 keygen, the
//!   ledger field scan) are dedicated opcodes, not calls.
//!
//! # Modules
//!
//! - `vm`: fetch-decode-execute loop, call frames, heap, entry points
//! - `error`: the `VmFault` taxonomy for strict-mode failures
//! - `io`: PRINTS / PRINTHEX
//! - `file`: FWRITE / FAPPEND / FREAD / FAPPEND_INT
//! - `crypto`: SHA512 / KEYGEN / RAND plus word-byte bridging for hosts
//! - `json`: the JSON_GET ledger scanner

pub mod crypto;
pub mod error;
pub mod file;
pub mod io;
pub mod json;
pub mod vm;

pub use crypto::{bytes_to_words, sign_message, words_to_bytes};
pub use error::VmFault;
pub use vm::{BOOT_FUEL, Vm, VmState};
