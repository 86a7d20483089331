//! Global cells, parameter slots, and heap operations.
//!
//! Globals live in the flat `memory` array at cells handed out by the code
//! generator. Parameters are addressed relative to the frame base
//! (`stack[fp - arg - 1]`); accesses outside the frame read 0 or drop the
//! write rather than faulting, which keeps a buggy image observable instead
//! of tearing down the host. Heap cells are reached through `NEW`-returned
//! base addresses plus an index.

use super::Vm;
use crate::error::VmFault;

impl Vm {
    pub(crate) fn op_loadg(&mut self, cell: i64, at: usize) {
        match usize::try_from(cell).ok().and_then(|c| self.memory.get(c)) {
            Some(v) => self.stack.push(*v),
            None => self.raise(VmFault::GlobalOutOfBounds { pc: at, cell }),
        }
    }

    pub(crate) fn op_storeg(&mut self, cell: i64, at: usize) {
        let Some(v) = self.pop_value(at) else { return };
        match usize::try_from(cell).ok().and_then(|c| self.memory.get_mut(c)) {
            Some(slot) => *slot = v,
            None => self.raise(VmFault::GlobalOutOfBounds { pc: at, cell }),
        }
    }

    pub(crate) fn op_loadl(&mut self, slot: i64) {
        let v = match self.param_index(slot) {
            Some(idx) => self.stack[idx],
            None => 0,
        };
        self.stack.push(v);
    }

    pub(crate) fn op_storel(&mut self, slot: i64, at: usize) {
        let Some(v) = self.pop_value(at) else { return };
        if let Some(idx) = self.param_index(slot) {
            self.stack[idx] = v;
        }
    }

    /// Resolve `stack[fp - slot - 1]`, `None` when outside the live stack.
    fn param_index(&self, slot: i64) -> Option<usize> {
        let idx = (self.fp as i64).checked_sub(slot)?.checked_sub(1)?;
        usize::try_from(idx).ok().filter(|i| *i < self.stack.len())
    }

    pub(crate) fn op_new(&mut self, at: usize) {
        let Some(size) = self.pop_value(at) else { return };
        self.stack.push(self.hp);
        // No implicit size cap; oversized blocks fault on first access.
        self.hp = self.hp.wrapping_add(size);
    }

    pub(crate) fn op_hload(&mut self, at: usize) {
        let Some(idx) = self.pop_value(at) else { return };
        let Some(base) = self.pop_value(at) else { return };
        let Some(v) = self.heap_load(base.wrapping_add(idx), at) else {
            return;
        };
        self.stack.push(v);
    }

    pub(crate) fn op_hstore(&mut self, at: usize) {
        let Some(v) = self.pop_value(at) else { return };
        let Some(idx) = self.pop_value(at) else { return };
        let Some(base) = self.pop_value(at) else { return };
        self.heap_store(base.wrapping_add(idx), v, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmState;
    use xl_core::layout::HEAP_CELLS;

    #[test]
    fn test_global_round_trip() {
        let mut vm = Vm::with_code(Vec::new());
        vm.stack.push(41);
        vm.op_storeg(100, 0);
        vm.op_loadg(100, 2);
        assert_eq!(vm.stack, vec![41]);
    }

    #[test]
    fn test_global_out_of_bounds_faults() {
        let mut vm = Vm::with_code(Vec::new());
        vm.op_loadg(1_000_000, 0);
        assert_eq!(vm.state(), VmState::Faulted);
        assert_eq!(
            vm.fault(),
            Some(&VmFault::GlobalOutOfBounds {
                pc: 0,
                cell: 1_000_000
            })
        );
    }

    #[test]
    fn test_heap_store_load_round_trip() {
        let mut vm = Vm::with_code(Vec::new());
        let base = vm.hp();
        vm.stack.push(2);
        vm.op_new(0);
        assert_eq!(vm.stack.pop(), Some(base));
        vm.stack.extend([base, 1, 77]);
        vm.op_hstore(2);
        vm.stack.extend([base, 1]);
        vm.op_hload(4);
        assert_eq!(vm.stack, vec![77]);
    }

    #[test]
    fn test_heap_out_of_bounds_faults() {
        let mut vm = Vm::with_code(Vec::new());
        vm.stack.extend([HEAP_CELLS as u64, 0]);
        vm.op_hload(0);
        assert!(matches!(vm.fault(), Some(VmFault::HeapOutOfBounds { .. })));
    }

    #[test]
    fn test_new_has_no_implicit_cap() {
        // Oversized allocations succeed; the fault surfaces on first access.
        let mut vm = Vm::with_code(Vec::new());
        let base = vm.hp();
        vm.stack.push(10_000_000);
        vm.op_new(0);
        assert_eq!(vm.stack.pop(), Some(base));
        assert_eq!(vm.state(), VmState::Idle);
        assert_eq!(vm.hp(), base + 10_000_000);
    }
}
