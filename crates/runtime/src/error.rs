//! VM fault taxonomy.
//!
//! Faults are the unrecoverable runtime errors of the machine: underflowing
//! the operand stack, dispatching a word that is not an opcode, or touching
//! cells outside the global or heap arrays. A fault moves the VM to the
//! terminal `Faulted` state; parameter accesses out of frame range are NOT
//! faults (they read 0 / drop the write, per the bytecode contract).

/// An unrecoverable VM error, carrying the instruction address it was
/// raised at so reports can point into the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmFault {
    /// An opcode needed more operands than the stack held.
    StackUnderflow { pc: usize },
    /// The code word at `pc` is not part of the instruction set.
    InvalidOpcode { pc: usize, word: i64 },
    /// A heap access past the end of the linear heap.
    HeapOutOfBounds { pc: usize, addr: u64 },
    /// A global load/store outside the memory array.
    GlobalOutOfBounds { pc: usize, cell: i64 },
    /// A bounded run used up its step budget before halting.
    FuelExhausted { limit: u64 },
}

impl std::fmt::Display for VmFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmFault::StackUnderflow { pc } => {
                write!(f, "stack underflow at instruction {}", pc)
            }
            VmFault::InvalidOpcode { pc, word } => {
                write!(f, "invalid opcode {} at instruction {}", word, pc)
            }
            VmFault::HeapOutOfBounds { pc, addr } => {
                write!(f, "heap access out of bounds at instruction {}: address {}", pc, addr)
            }
            VmFault::GlobalOutOfBounds { pc, cell } => {
                write!(f, "global access out of bounds at instruction {}: cell {}", pc, cell)
            }
            VmFault::FuelExhausted { limit } => {
                write!(f, "execution exceeded the {}-step budget", limit)
            }
        }
    }
}

impl std::error::Error for VmFault {}
