//! File I/O intrinsics.
//!
//! The surface is UTF-8 text: FWRITE truncates, FAPPEND and FAPPEND_INT
//! append, FREAD copies the file into fresh heap cells NUL-terminated.
//! I/O failures are surfaced to the program as a 0 result word (FREAD) or a
//! 0 status (the write family), so XL code can detect "file not found" and
//! initialize fresh ledger state instead of crashing the host.

use std::fs::{self, OpenOptions};
use std::io::Write;

use crate::vm::Vm;

impl Vm {
    pub(crate) fn op_fwrite(&mut self, at: usize) {
        let Some(data_p) = self.pop_value(at) else { return };
        let Some(name_p) = self.pop_value(at) else { return };
        let name = self.read_string(name_p);
        let data = self.read_string(data_p);
        let status = u64::from(fs::write(&name, data.as_bytes()).is_ok());
        self.stack.push(status);
    }

    pub(crate) fn op_fappend(&mut self, at: usize) {
        let Some(data_p) = self.pop_value(at) else { return };
        let Some(name_p) = self.pop_value(at) else { return };
        let name = self.read_string(name_p);
        let data = self.read_string(data_p);
        self.stack.push(append_text(&name, &data));
    }

    pub(crate) fn op_fappend_int(&mut self, at: usize) {
        let Some(v) = self.pop_value(at) else { return };
        let Some(name_p) = self.pop_value(at) else { return };
        let name = self.read_string(name_p);
        self.stack.push(append_text(&name, &v.to_string()));
    }

    pub(crate) fn op_fread(&mut self, at: usize) {
        let Some(name_p) = self.pop_value(at) else { return };
        let name = self.read_string(name_p);
        let Ok(content) = fs::read_to_string(&name) else {
            self.stack.push(0);
            return;
        };
        let addr = self.hp;
        for (i, b) in content.bytes().enumerate() {
            if !self.heap_store(addr + i as u64, u64::from(b), at) {
                return;
            }
        }
        if !self.heap_store(addr + content.len() as u64, 0, at) {
            return;
        }
        self.hp += content.len() as u64 + 1;
        self.stack.push(addr);
    }
}

fn append_text(name: &str, data: &str) -> u64 {
    let appended = OpenOptions::new()
        .create(true)
        .append(true)
        .open(name)
        .and_then(|mut f| f.write_all(data.as_bytes()));
    u64::from(appended.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_string(vm: &mut Vm, s: &str) -> u64 {
        let mut cells: Vec<u64> = s.bytes().map(u64::from).collect();
        cells.push(0);
        vm.heap_alloc(&cells)
    }

    #[test]
    fn test_fwrite_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut vm = Vm::with_code(Vec::new());
        let name_p = stage_string(&mut vm, path.to_str().unwrap());
        let old_p = stage_string(&mut vm, "old contents");
        let new_p = stage_string(&mut vm, "new");

        vm.stack.extend([name_p, old_p]);
        vm.op_fwrite(0);
        vm.stack.extend([name_p, new_p]);
        vm.op_fwrite(2);

        assert_eq!(vm.stack, vec![1, 1]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_fappend_appends_and_creates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut vm = Vm::with_code(Vec::new());
        let name_p = stage_string(&mut vm, path.to_str().unwrap());
        let a_p = stage_string(&mut vm, "a");
        let b_p = stage_string(&mut vm, "b");

        vm.stack.extend([name_p, a_p]);
        vm.op_fappend(0);
        vm.stack.extend([name_p, b_p]);
        vm.op_fappend(2);

        assert_eq!(fs::read_to_string(&path).unwrap(), "ab");
    }

    #[test]
    fn test_fappend_int_writes_decimal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.txt");
        let mut vm = Vm::with_code(Vec::new());
        let name_p = stage_string(&mut vm, path.to_str().unwrap());

        vm.stack.extend([name_p, 12345]);
        vm.op_fappend_int(0);

        assert_eq!(vm.stack, vec![1]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "12345");
    }

    #[test]
    fn test_fread_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "payload").unwrap();
        let mut vm = Vm::with_code(Vec::new());
        let name_p = stage_string(&mut vm, path.to_str().unwrap());
        let hp_before = vm.hp();

        vm.stack.push(name_p);
        vm.op_fread(0);

        let addr = vm.stack.pop().unwrap();
        assert_eq!(addr, hp_before);
        assert_eq!(vm.read_string(addr), "payload");
        assert_eq!(vm.hp(), hp_before + 8); // bytes + NUL
    }

    #[test]
    fn test_fread_miss_returns_zero() {
        let mut vm = Vm::with_code(Vec::new());
        let name_p = stage_string(&mut vm, "/nonexistent/definitely/missing.txt");
        let hp_before = vm.hp();

        vm.stack.push(name_p);
        vm.op_fread(0);

        assert_eq!(vm.stack, vec![0]);
        assert_eq!(vm.hp(), hp_before);
    }
}
