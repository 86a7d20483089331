//! Image-level execution tests: string-pool preload, `hp` initialization,
//! and host-style function invocation against a hand-assembled image.

use xl_core::image::Image;
use xl_core::layout::STRING_POOL_BASE;
use xl_core::opcode::Opcode as Op;
use xl_runtime::{Vm, VmState};

fn asm(instrs: &[(Op, i64)]) -> Vec<i64> {
    let mut code = Vec::with_capacity(instrs.len() * 2);
    for (op, arg) in instrs {
        code.push(*op as i64);
        code.push(*arg);
    }
    code
}

fn image_with_pool(code: Vec<i64>, strings: &[&str]) -> Image {
    let mut image = Image::default();
    image.code = code;
    let mut addr = STRING_POOL_BASE;
    for s in strings {
        image.string_pool.insert(addr, s.as_bytes().to_vec());
        addr += s.len() as u64 + 1;
    }
    image.next_string_addr = addr;
    image
}

#[test]
fn test_string_pool_preloaded_one_byte_per_cell() {
    let image = image_with_pool(Vec::new(), &["hi", "xl"]);
    let vm = Vm::new(&image);
    assert_eq!(vm.read_string(STRING_POOL_BASE), "hi");
    assert_eq!(vm.read_string(STRING_POOL_BASE + 3), "xl");
}

#[test]
fn test_hp_starts_past_the_pool() {
    let image = image_with_pool(Vec::new(), &["hi", "xl"]);
    let vm = Vm::new(&image);
    assert_eq!(vm.hp(), STRING_POOL_BASE + 6);
    assert_eq!(vm.hp(), image.next_string_addr);
}

#[test]
fn test_allocations_never_overlap_pool() {
    let image = image_with_pool(Vec::new(), &["persist"]);
    let mut vm = Vm::new(&image);
    let block = vm.heap_alloc(&[1, 2, 3]);
    assert!(block >= image.next_string_addr);
    assert_eq!(vm.read_string(STRING_POOL_BASE), "persist");
}

#[test]
fn test_execute_function_against_image() {
    // double(n) { return n + n; }
    let mut image = image_with_pool(
        asm(&[
            (Op::LoadL, 0),
            (Op::LoadL, 0),
            (Op::Add, 0),
            (Op::Ret, 0),
        ]),
        &[],
    );
    image.func_addresses.insert("double".to_string(), 0);

    let mut vm = Vm::new(&image);
    let addr = image.function_address("double").unwrap();
    assert_eq!(vm.execute_function(addr, &[21]).unwrap(), 42);
    assert_eq!(vm.state(), VmState::Halted);

    // State persists across host calls on the same machine.
    assert_eq!(vm.execute_function(addr, &[5]).unwrap(), 10);
}

#[test]
fn test_globals_survive_between_host_calls() {
    // bump() { counter = counter + 1; return counter; }
    let mut image = image_with_pool(
        asm(&[
            (Op::LoadG, 100),
            (Op::Push, 1),
            (Op::Add, 0),
            (Op::StoreG, 100),
            (Op::LoadG, 100),
            (Op::Ret, 0),
        ]),
        &[],
    );
    image.func_addresses.insert("bump".to_string(), 0);
    image.globals.insert("counter".to_string(), 100);

    let mut vm = Vm::new(&image);
    let addr = image.function_address("bump").unwrap();
    vm.execute_function(addr, &[]).unwrap();
    vm.execute_function(addr, &[]).unwrap();
    let cell = image.global_cell("counter").unwrap();
    assert_eq!(vm.read_global(cell), 2);
}
