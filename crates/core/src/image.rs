//! The compiled program image.
//!
//! This is the artifact the code generator hands to the host: the flat code
//! vector plus the tables the host and VM need to load strings, look up
//! entry points, and read globals back out after a run.

use std::collections::{BTreeMap, HashMap};

/// A compiled XL program.
///
/// `code` is a flat sequence of `(opcode, argument)` word pairs; instruction
/// addresses (jump targets, function entries) index into it directly, so an
/// image always has even length.
#[derive(Debug, Clone, Default)]
pub struct Image {
    /// Interleaved opcode/argument words.
    pub code: Vec<i64>,
    /// Interned string literals by heap address, NUL terminator not included.
    /// Ordered so dumps and listings are deterministic.
    pub string_pool: BTreeMap<u64, Vec<u8>>,
    /// Function name to instruction address.
    pub func_addresses: HashMap<String, usize>,
    /// Global (and mangled local) name to memory cell index.
    pub globals: HashMap<String, usize>,
    /// First heap cell past the string pool; the VM starts `hp` here.
    pub next_string_addr: u64,
}

impl Image {
    /// Number of instructions (not words) in the image.
    pub fn instruction_count(&self) -> usize {
        self.code.len() / 2
    }

    /// Entry address of a named function.
    pub fn function_address(&self, name: &str) -> Option<usize> {
        self.func_addresses.get(name).copied()
    }

    /// Memory cell of a named global, for hosts reading state back out.
    pub fn global_cell(&self, name: &str) -> Option<usize> {
        self.globals.get(name).copied()
    }

    /// Total heap cells occupied by the string pool, NUL terminators included.
    pub fn string_pool_cells(&self) -> usize {
        self.string_pool.values().map(|s| s.len() + 1).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_helpers() {
        let mut image = Image::default();
        image.code = vec![1, 7, 22, 0];
        image.func_addresses.insert("main".to_string(), 2);
        image.globals.insert("counter".to_string(), 100);
        image.string_pool.insert(100_000, b"hi".to_vec());
        image.next_string_addr = 100_003;

        assert_eq!(image.instruction_count(), 2);
        assert_eq!(image.function_address("main"), Some(2));
        assert_eq!(image.function_address("boot"), None);
        assert_eq!(image.global_cell("counter"), Some(100));
        assert_eq!(image.string_pool_cells(), 3);
    }
}
