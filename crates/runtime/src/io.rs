//! Printing intrinsics.
//!
//! PRINTS writes the NUL-terminated heap string at the popped address,
//! PRINTHEX writes the popped word as `0x` + 16 hex digits. Both append a
//! newline, flush (the facade tails this output live), and push 0 as the
//! intrinsic's result.

use std::io::Write;

use crate::vm::Vm;

impl Vm {
    pub(crate) fn op_prints(&mut self, at: usize) {
        let Some(addr) = self.pop_value(at) else { return };
        let text = self.read_string(addr);
        let mut out = std::io::stdout();
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
        self.stack.push(0);
    }

    pub(crate) fn op_printhex(&mut self, at: usize) {
        let Some(v) = self.pop_value(at) else { return };
        let mut out = std::io::stdout();
        let _ = writeln!(out, "0x{:016x}", v);
        let _ = out.flush();
        self.stack.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prints_pushes_result_word() {
        let mut vm = Vm::with_code(Vec::new());
        let addr = vm.heap_alloc(&[104, 105, 0]); // "hi"
        vm.stack.push(addr);
        vm.op_prints(0);
        assert_eq!(vm.stack, vec![0]);
    }

    #[test]
    fn test_printhex_pushes_result_word() {
        let mut vm = Vm::with_code(Vec::new());
        vm.stack.push(0xDEAD);
        vm.op_printhex(0);
        assert_eq!(vm.stack, vec![0]);
    }
}
