//! Bytecode listings.
//!
//! Renders an image as assembler-style text: one instruction per line,
//! function entries labeled, call targets and interned strings annotated.
//! Used by the `xlc disasm` subcommand and by VM fault reports.

use std::collections::HashMap;
use std::fmt::Write;

use crate::image::Image;
use crate::opcode::Opcode;

/// Render a full listing of the image.
pub fn disassemble(image: &Image) -> String {
    // Invert the function table so entry points can be labeled in order.
    let mut labels: HashMap<usize, &str> = HashMap::new();
    for (name, addr) in &image.func_addresses {
        labels.insert(*addr, name.as_str());
    }

    let mut out = String::new();
    let mut pc = 0;
    while pc + 1 < image.code.len() {
        if let Some(name) = labels.get(&pc) {
            let _ = writeln!(out, "{}:", name);
        }
        let _ = writeln!(out, "  {}", render_at(image, pc));
        pc += 2;
    }
    out
}

/// Render the single instruction at `pc`, e.g. for fault reports.
pub fn render_at(image: &Image, pc: usize) -> String {
    let word = image.code[pc];
    let arg = image.code.get(pc + 1).copied().unwrap_or(0);
    match Opcode::from_word(word) {
        Some(op) => {
            let mut line = if op.uses_arg() {
                format!("{:>6}  {:<12}{}", pc, op.mnemonic(), arg)
            } else {
                format!("{:>6}  {}", pc, op.mnemonic())
            };
            if let Some(note) = annotate(image, op, arg) {
                let _ = write!(line, "    ; {}", note);
            }
            line
        }
        None => format!("{:>6}  ??? ({})", pc, word),
    }
}

/// Context note for an instruction: callee names and string previews.
fn annotate(image: &Image, op: Opcode, arg: i64) -> Option<String> {
    match op {
        Opcode::Call => {
            let target = usize::try_from(arg).ok()?;
            image
                .func_addresses
                .iter()
                .find(|(_, addr)| **addr == target)
                .map(|(name, _)| name.clone())
        }
        Opcode::Push => {
            let addr = u64::try_from(arg).ok()?;
            image
                .string_pool
                .get(&addr)
                .map(|bytes| format!("{:?}", String::from_utf8_lossy(bytes)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> Image {
        let mut image = Image::default();
        // PUSH 100000; PRINTS; POP; JMP 8; PUSH 0; RET
        image.code = vec![1, 100_000, 45, 0, 2, 0, 20, 8, 1, 0, 22, 0];
        image.func_addresses.insert("main".to_string(), 8);
        image.string_pool.insert(100_000, b"hi".to_vec());
        image.next_string_addr = 100_003;
        image
    }

    #[test]
    fn test_listing_labels_functions() {
        let listing = disassemble(&sample_image());
        assert!(listing.contains("main:"));
        assert!(listing.contains("PUSH"));
        assert!(listing.contains("RET"));
    }

    #[test]
    fn test_string_push_annotated() {
        let listing = disassemble(&sample_image());
        assert!(listing.contains("\"hi\""), "listing:\n{}", listing);
    }

    #[test]
    fn test_call_target_annotated() {
        let mut image = sample_image();
        image.code = vec![21, 2, 1, 0, 22, 0];
        image.func_addresses.clear();
        image.func_addresses.insert("boot".to_string(), 2);
        let listing = disassemble(&image);
        assert!(listing.contains("CALL"));
        assert!(listing.contains("; boot"));
    }

    #[test]
    fn test_unknown_word_rendered() {
        let mut image = sample_image();
        image.code = vec![99, 0];
        let listing = disassemble(&image);
        assert!(listing.contains("???"));
    }
}
