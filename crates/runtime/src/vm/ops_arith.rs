//! Arithmetic, bitwise, logical, comparison, and shift operations.
//!
//! All binary ops pop `b` then `a` and push one result word. Arithmetic is
//! unsigned 64-bit with explicit wraparound; comparisons are signed;
//! logical ops treat any nonzero word as true; shift amounts are taken
//! modulo 64.

use xl_core::opcode::Opcode;

use super::Vm;

impl Vm {
    pub(crate) fn op_binary(&mut self, op: Opcode, at: usize) {
        let Some(b) = self.pop_value(at) else { return };
        let Some(a) = self.pop_value(at) else { return };
        let result = match op {
            Opcode::And => a & b,
            Opcode::Or => a | b,
            Opcode::Xor => a ^ b,
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Mul => a.wrapping_mul(b),
            Opcode::Div => {
                if b == 0 {
                    0
                } else {
                    a / b
                }
            }
            Opcode::Eq => u64::from(a == b),
            Opcode::Neq => u64::from(a != b),
            Opcode::Lt => u64::from((a as i64) < (b as i64)),
            Opcode::Gt => u64::from((a as i64) > (b as i64)),
            Opcode::LAnd => u64::from(a != 0 && b != 0),
            Opcode::LOr => u64::from(a != 0 || b != 0),
            Opcode::Shr => a >> (b % 64),
            Opcode::Shl => a.wrapping_shl((b % 64) as u32),
            // `step` routes only binary opcodes here.
            _ => unreachable!("non-binary opcode {:?}", op),
        };
        self.stack.push(result);
    }
}
