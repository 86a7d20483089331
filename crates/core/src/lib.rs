//! XL Core: the bytecode contract between the XL compiler and VM
//!
//! This crate holds everything that must stay mutually consistent across the
//! code generator and the virtual machine. A drift anywhere in this contract
//! shows up as silent corruption at runtime, so it lives in one place:
//!
//! - `opcode`: the instruction set with its frozen numeric assignments
//! - `image`: the compiled artifact handed from compiler to host to VM
//! - `layout`: the global-memory and heap address map
//! - `disasm`: human-readable bytecode listings
//!
//! The crate is dependency-free so both sides can build on it without
//! pulling in each other's stacks.

pub mod disasm;
pub mod image;
pub mod layout;
pub mod opcode;

pub use disasm::disassemble;
pub use image::Image;
pub use layout::{GLOBAL_BASE, HEAP_CELLS, MEMORY_CELLS, STRING_POOL_BASE};
pub use opcode::Opcode;
