//! The JSON_GET ledger scanner.
//!
//! This is not a JSON parser. The ledger file is a pretty-printed array of
//! objects whose blocks are separated by the literal `"  {"` (two spaces
//! then an open brace); JSON_GET splits on exactly that delimiter, selects
//! a block by 1-based index, and scans it for `"<key>": "<digits>"`. Any
//! ledger writer must preserve the delimiter or reads silently return 0.
//! The split and the indexing are part of the contract with stored ledgers
//! and must not be "fixed".

use regex::Regex;

use crate::vm::Vm;

/// Block separator in pretty-printed ledger output.
const BLOCK_DELIMITER: &str = "  {";

impl Vm {
    pub(crate) fn op_json_get(&mut self, at: usize) {
        let Some(key_p) = self.pop_value(at) else { return };
        let Some(index) = self.pop_value(at) else { return };
        let Some(json_p) = self.pop_value(at) else { return };
        let key = self.read_string(key_p);
        let json = self.read_string(json_p);
        self.stack.push(scan_field(&json, index, &key));
    }
}

/// Extract the integer value of `key` in block `index` (1-based), 0 on any
/// miss: index out of range, key absent, or non-numeric value.
fn scan_field(json: &str, index: u64, key: &str) -> u64 {
    let blocks: Vec<&str> = json.split(BLOCK_DELIMITER).collect();
    // Block 0 is the text before the first delimiter and is never
    // selectable; valid indices are 1..blocks.len().
    let slot = index as usize;
    if index == 0 || slot >= blocks.len() {
        return 0;
    }
    let pattern = format!("\"{}\":\\s*\"(-?\\d+)\"", regex::escape(key));
    let Ok(re) = Regex::new(&pattern) else { return 0 };
    re.captures(blocks[slot])
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(|v| v as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER: &str = "[\n  {\"nft_id\":\"42\",\"owner\":\"7\"},\n  {\"nft_id\":\"43\"}\n]";

    #[test]
    fn test_selects_block_by_one_based_index() {
        assert_eq!(scan_field(LEDGER, 1, "nft_id"), 42);
        assert_eq!(scan_field(LEDGER, 2, "nft_id"), 43);
    }

    #[test]
    fn test_index_out_of_range_returns_zero() {
        assert_eq!(scan_field(LEDGER, 0, "nft_id"), 0);
        assert_eq!(scan_field(LEDGER, 3, "nft_id"), 0);
    }

    #[test]
    fn test_missing_key_returns_zero() {
        assert_eq!(scan_field(LEDGER, 2, "owner"), 0);
    }

    #[test]
    fn test_whitespace_after_colon_tolerated() {
        let json = "[\n  {\"h0\": \"99\"}\n]";
        assert_eq!(scan_field(json, 1, "h0"), 99);
    }

    #[test]
    fn test_negative_value_wraps_to_word() {
        let json = "[\n  {\"delta\":\"-1\"}\n]";
        assert_eq!(scan_field(json, 1, "delta"), u64::MAX);
    }

    #[test]
    fn test_wrong_delimiter_misses() {
        // A single-space separator is a different format; reads miss.
        let json = "[\n {\"nft_id\":\"42\"}\n]";
        assert_eq!(scan_field(json, 1, "nft_id"), 0);
    }

    #[test]
    fn test_key_with_regex_metacharacters_is_literal() {
        let json = "[\n  {\"a.b\":\"5\",\"axb\":\"6\"}\n]";
        assert_eq!(scan_field(json, 1, "a.b"), 5);
    }

    #[test]
    fn test_vm_dispatch_pops_three_operands() {
        let mut vm = Vm::with_code(Vec::new());
        let mut cells: Vec<u64> = LEDGER.bytes().map(u64::from).collect();
        cells.push(0);
        let json_p = vm.heap_alloc(&cells);
        let mut key_cells: Vec<u64> = b"nft_id".iter().copied().map(u64::from).collect();
        key_cells.push(0);
        let key_p = vm.heap_alloc(&key_cells);

        vm.stack.extend([json_p, 2, key_p]);
        vm.op_json_get(0);
        assert_eq!(vm.stack, vec![43]);
    }
}
