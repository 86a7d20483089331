//! Stack-Based Bytecode Virtual Machine
//!
//! Executes the flat `(opcode, argument)` word pairs produced by the code
//! generator.
//!
//! ## High-level model
//! - **Operand stack (`stack`)**: 64-bit words consumed/produced by ops.
//! - **Frame stack (`call_stack`)**: `{return_pc, saved_fp}` pairs pushed by
//!   CALL and popped by RET.
//! - **Globals (`memory`)**: flat array of cells addressed by the code
//!   generator's symbol table.
//! - **Heap (`heap`)**: linear word array holding strings, arrays, and
//!   intrinsic scratch; `hp` bump-allocates and never decreases.
//! - **Registers**: `pc` (instruction index), `fp` (operand-stack length at
//!   call entry, used to address parameters), `hp`.
//!
//! ## Calling convention
//! Callers push arguments in reverse source order, so `LOADL i` resolves
//! parameter `i` at `stack[fp - i - 1]` with parameter 0 closest to the
//! frame base. RET truncates the operand stack to the saved `fp` before
//! pushing the return value, which also discards the argument slots.
//!
//! ## Lifecycle
//! `Idle → Running → Halted | Faulted`. RET with an empty frame stack, RET
//! through the `-1` sentinel frame pushed by [`Vm::execute_function`], and
//! `pc` leaving the code vector all halt. Faults (underflow, bad opcode,
//! out-of-range memory) are terminal; parameter accesses outside the frame
//! deliberately read 0 / drop the write instead of faulting.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use xl_core::image::Image;
use xl_core::layout::{HEAP_CELLS, MEMORY_CELLS, STRING_POOL_BASE};
use xl_core::opcode::Opcode;

use crate::error::VmFault;

mod ops_arith;
mod ops_mem;

/// Step budget recommended for untrusted boot-time entry points, matching
/// the watchdog the ledger facade runs its initializers under.
pub const BOOT_FUEL: u64 = 50_000;

/// Where the machine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Loaded, not yet running.
    Idle,
    /// Inside `run`/`execute_function`.
    Running,
    /// Ran to completion; a fresh `execute_function` may re-enter.
    Halted,
    /// Hit an unrecoverable fault; see [`Vm::fault`].
    Faulted,
}

/// A call frame. `ret_pc` is `-1` for the sentinel frame pushed by
/// [`Vm::execute_function`]; observing it on RET halts the machine.
#[derive(Debug, Clone, Copy)]
struct Frame {
    ret_pc: i64,
    saved_fp: usize,
}

/// The XL virtual machine.
pub struct Vm {
    code: Vec<i64>,
    pub(crate) memory: Vec<u64>,
    pub(crate) heap: Vec<u64>,
    pub(crate) stack: Vec<u64>,
    call_stack: Vec<Frame>,
    pub(crate) pc: i64,
    pub(crate) fp: usize,
    pub(crate) hp: u64,
    state: VmState,
    fault: Option<VmFault>,
}

impl Vm {
    /// Build a machine from a compiled image: the string pool is preloaded
    /// into the heap one byte per cell and `hp` starts just past it.
    pub fn new(image: &Image) -> Vm {
        let mut vm = Vm::with_code(image.code.clone());
        for (addr, bytes) in &image.string_pool {
            let base = *addr as usize;
            for (i, b) in bytes.iter().enumerate() {
                vm.heap[base + i] = u64::from(*b);
            }
            vm.heap[base + bytes.len()] = 0;
        }
        vm.hp = image.next_string_addr;
        vm
    }

    /// Build a machine over raw code with an empty string pool. `hp` starts
    /// at the string-pool base. Used by hosts that assemble code directly
    /// and by tests.
    pub fn with_code(code: Vec<i64>) -> Vm {
        Vm {
            code,
            memory: vec![0; MEMORY_CELLS],
            heap: vec![0; HEAP_CELLS],
            stack: Vec::new(),
            call_stack: Vec::new(),
            pc: 0,
            fp: 0,
            hp: STRING_POOL_BASE,
            state: VmState::Idle,
            fault: None,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// The fault that moved the machine to `Faulted`, if any.
    pub fn fault(&self) -> Option<&VmFault> {
        self.fault.as_ref()
    }

    pub fn hp(&self) -> u64 {
        self.hp
    }

    /// Top of the operand stack, e.g. the final value after a run-from-0
    /// program returns from its top-level frame.
    pub fn stack_top(&self) -> Option<u64> {
        self.stack.last().copied()
    }

    /// Read a global cell back out, e.g. after a run (hosts use this with
    /// the image's `globals` map).
    pub fn read_global(&self, cell: usize) -> u64 {
        self.memory.get(cell).copied().unwrap_or(0)
    }

    /// Copy words into fresh heap cells and return their base address.
    /// Hosts use this to stage argument blocks (hash words, key material)
    /// before an `execute_function` call.
    pub fn heap_alloc(&mut self, words: &[u64]) -> u64 {
        let base = self.hp;
        for (i, w) in words.iter().enumerate() {
            let addr = base as usize + i;
            if addr < self.heap.len() {
                self.heap[addr] = *w;
            }
        }
        self.hp += words.len() as u64;
        base
    }

    /// Read one heap cell; out-of-range reads yield 0.
    pub fn heap_read(&self, addr: u64) -> u64 {
        self.heap.get(addr as usize).copied().unwrap_or(0)
    }

    /// Decode the NUL-terminated string at `heap[addr]`, one byte per cell.
    pub fn read_string(&self, addr: u64) -> String {
        let mut bytes = Vec::new();
        let mut at = addr as usize;
        while at < self.heap.len() && self.heap[at] != 0 {
            bytes.push((self.heap[at] & 0xFF) as u8);
            at += 1;
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Run from the current `pc` until the machine halts or faults.
    pub fn run(&mut self) -> Result<(), VmFault> {
        self.fault = None;
        self.state = VmState::Running;
        while self.state == VmState::Running {
            self.step();
        }
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    /// Run with a step budget. `Ok(steps)` is the count actually consumed;
    /// exceeding the budget is a `FuelExhausted` fault.
    pub fn run_bounded(&mut self, fuel: u64) -> Result<u64, VmFault> {
        self.fault = None;
        self.state = VmState::Running;
        let mut steps = 0;
        while self.state == VmState::Running {
            if steps >= fuel {
                self.raise(VmFault::FuelExhausted { limit: fuel });
                break;
            }
            self.step();
            steps += 1;
        }
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(steps),
        }
    }

    /// Invoke the function at `addr` synchronously and return its value.
    ///
    /// Arguments are pushed in reverse order and a sentinel frame with
    /// `ret_pc = -1` marks the host boundary; the callee's RET through it
    /// halts the machine with the return value on top. Calls are re-entrant
    /// across invocations on the same machine: globals, heap, and `hp` all
    /// persist.
    pub fn execute_function(&mut self, addr: usize, args: &[u64]) -> Result<u64, VmFault> {
        self.enter_function(addr, args);
        while self.state == VmState::Running {
            self.step();
        }
        self.leave_function()
    }

    /// [`Vm::execute_function`] under a step budget, for boot-time and other
    /// untrusted entry points.
    pub fn execute_function_bounded(
        &mut self,
        addr: usize,
        args: &[u64],
        fuel: u64,
    ) -> Result<u64, VmFault> {
        self.enter_function(addr, args);
        let mut steps = 0;
        while self.state == VmState::Running {
            if steps >= fuel {
                self.raise(VmFault::FuelExhausted { limit: fuel });
                break;
            }
            self.step();
            steps += 1;
        }
        self.leave_function()
    }

    fn enter_function(&mut self, addr: usize, args: &[u64]) {
        self.fault = None;
        for a in args.iter().rev() {
            self.stack.push(*a);
        }
        self.call_stack.push(Frame {
            ret_pc: -1,
            saved_fp: self.fp,
        });
        self.fp = self.stack.len();
        self.pc = addr as i64;
        self.state = VmState::Running;
    }

    fn leave_function(&mut self) -> Result<u64, VmFault> {
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(self.stack.pop().unwrap_or(0)),
        }
    }

    /// Fetch, decode, and execute one instruction.
    pub fn step(&mut self) {
        if self.pc < 0 {
            self.state = VmState::Halted;
            return;
        }
        let at = self.pc as usize;
        if at + 1 >= self.code.len() {
            self.state = VmState::Halted;
            return;
        }
        let word = self.code[at];
        let arg = self.code[at + 1];
        self.pc += 2;

        let Some(op) = Opcode::from_word(word) else {
            self.raise(VmFault::InvalidOpcode { pc: at, word });
            return;
        };

        match op {
            Opcode::Push => self.stack.push(arg as u64),
            Opcode::Pop => {
                self.stack.pop();
            }
            Opcode::LoadG => self.op_loadg(arg, at),
            Opcode::StoreG => self.op_storeg(arg, at),
            Opcode::LoadL => self.op_loadl(arg),
            Opcode::StoreL => self.op_storel(arg, at),

            Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Eq
            | Opcode::Neq
            | Opcode::Lt
            | Opcode::Gt
            | Opcode::LAnd
            | Opcode::LOr
            | Opcode::Shr
            | Opcode::Shl => self.op_binary(op, at),

            Opcode::Jmp => self.pc = arg,
            Opcode::Jz => self.op_jz(arg, at),
            Opcode::Call => self.op_call(arg),
            Opcode::Ret => self.op_ret(at),

            Opcode::New => self.op_new(at),
            Opcode::HLoad => self.op_hload(at),
            Opcode::HStore => self.op_hstore(at),

            Opcode::Prints => self.op_prints(at),
            Opcode::PrintHex => self.op_printhex(at),
            Opcode::FWrite => self.op_fwrite(at),
            Opcode::FAppend => self.op_fappend(at),
            Opcode::FRead => self.op_fread(at),
            Opcode::FAppendInt => self.op_fappend_int(at),
            Opcode::Rand => self.op_rand(),
            Opcode::JsonGet => self.op_json_get(at),
            Opcode::Sha512 => self.op_sha512(at),
            Opcode::KeyGen => self.op_keygen(at),
        }
    }

    fn op_jz(&mut self, target: i64, at: usize) {
        let Some(v) = self.pop_value(at) else { return };
        if v == 0 {
            self.pc = target;
        }
    }

    fn op_call(&mut self, target: i64) {
        self.call_stack.push(Frame {
            ret_pc: self.pc,
            saved_fp: self.fp,
        });
        self.fp = self.stack.len();
        self.pc = target;
    }

    fn op_ret(&mut self, at: usize) {
        let Some(val) = self.pop_value(at) else { return };
        match self.call_stack.pop() {
            None => {
                // Top-level return in run-from-0 mode: leave the value on
                // the stack so the host can observe it.
                self.stack.push(val);
                self.state = VmState::Halted;
            }
            Some(frame) => {
                self.stack.truncate(frame.saved_fp);
                self.pc = frame.ret_pc;
                self.fp = frame.saved_fp;
                self.stack.push(val);
                if self.pc == -1 {
                    self.state = VmState::Halted;
                }
            }
        }
    }

    /// Pop one operand, faulting on underflow.
    pub(crate) fn pop_value(&mut self, at: usize) -> Option<u64> {
        match self.stack.pop() {
            Some(v) => Some(v),
            None => {
                self.raise(VmFault::StackUnderflow { pc: at });
                None
            }
        }
    }

    /// Store one heap cell, faulting past the end of the heap.
    pub(crate) fn heap_store(&mut self, addr: u64, value: u64, at: usize) -> bool {
        match self.heap.get_mut(addr as usize) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => {
                self.raise(VmFault::HeapOutOfBounds { pc: at, addr });
                false
            }
        }
    }

    /// Load one heap cell, faulting past the end of the heap.
    pub(crate) fn heap_load(&mut self, addr: u64, at: usize) -> Option<u64> {
        match self.heap.get(addr as usize) {
            Some(cell) => Some(*cell),
            None => {
                self.raise(VmFault::HeapOutOfBounds { pc: at, addr });
                None
            }
        }
    }

    pub(crate) fn raise(&mut self, fault: VmFault) {
        self.fault = Some(fault);
        self.state = VmState::Faulted;
    }

    /// Write a human-readable dump of the registers and every populated
    /// heap cell from the string-pool base to just past `hp`.
    pub fn dump_heap(&self, path: &Path) -> io::Result<()> {
        let mut out = File::create(path)?;
        writeln!(out, "--- XL VM HEAP DUMP ---")?;
        writeln!(out, "PC: {} | FP: {} | HP: {}", self.pc, self.fp, self.hp)?;
        writeln!(out, "{}", "-".repeat(30))?;
        let end = (self.hp + 10).min(self.heap.len() as u64);
        for addr in STRING_POOL_BASE..end {
            let val = self.heap[addr as usize];
            if val == 0 && addr > self.hp {
                continue;
            }
            let printable = (32..=126).contains(&val);
            if printable {
                writeln!(out, "[{}] {:<20} | '{}'", addr, val, (val as u8) as char)?;
            } else {
                writeln!(out, "[{}] {}", addr, val)?;
            }
        }
        Ok(())
    }
}
