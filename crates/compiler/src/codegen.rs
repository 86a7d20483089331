//! Bytecode generation.
//!
//! Single pass over the merged program, emitting the flat `(opcode, arg)`
//! vector in the fixed image layout:
//!
//! 1. Global initializers: each value expression followed by a store.
//! 2. One `JMP` to `main` (patched to the image end when there is none).
//! 3. Function bodies in declaration order, each closed with `PUSH 0; RET`
//!    so falling off the end returns 0.
//!
//! Forward references are handled without a second AST pass: every CALL
//! site is emitted with a zero argument and recorded, then back-patched
//! once all entry addresses are known. A callee that never materializes is
//! a link error.
//!
//! ## Name resolution
//!
//! Inside a function an identifier resolves, first match wins, as:
//! parameter → mangled global `<func>_<name>` → bare global. `var` inside a
//! function declares the mangled global; only parameters live on the
//! operand stack.
//!
//! ## Intrinsics
//!
//! A fixed name table lowers known calls to dedicated opcodes with their
//! arguments evaluated in source order. The table fails closed: a wrong
//! argument count is a compile error, and unknown names fall through to the
//! CALL path where the back-patcher rejects them if no function exists.

use std::collections::{BTreeMap, HashMap};

use xl_core::image::Image;
use xl_core::layout::{GLOBAL_BASE, MEMORY_CELLS, STRING_POOL_BASE};
use xl_core::opcode::Opcode;

use crate::ast::{BinOp, Expr, Stmt, VarDecl};
use crate::loader::LoadedProgram;

/// Source-level intrinsic names, their opcodes, and arities.
const INTRINSICS: &[(&str, Opcode, usize)] = &[
    ("prints", Opcode::Prints, 1),
    ("printi", Opcode::PrintHex, 1),
    ("fwrite", Opcode::FWrite, 2),
    ("fappend", Opcode::FAppend, 2),
    ("fread", Opcode::FRead, 1),
    ("fappend_int", Opcode::FAppendInt, 2),
    ("rand", Opcode::Rand, 0),
    ("json_get_hash", Opcode::JsonGet, 3),
    ("sha512", Opcode::Sha512, 2),
    ("keygen", Opcode::KeyGen, 0),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeGenError {
    UndefinedVariable { name: String, function: Option<String> },
    /// Link failure: a CALL whose target was never defined.
    UndefinedFunction { name: String },
    IntrinsicArity { name: String, expected: usize, found: usize },
    GlobalSpaceExhausted { limit: usize },
}

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeGenError::UndefinedVariable { name, function } => match function {
                Some(func) => write!(f, "undefined variable '{}' in function '{}'", name, func),
                None => write!(f, "undefined variable '{}'", name),
            },
            CodeGenError::UndefinedFunction { name } => {
                write!(f, "call to undefined function '{}'", name)
            }
            CodeGenError::IntrinsicArity { name, expected, found } => {
                write!(
                    f,
                    "intrinsic '{}' takes {} argument(s), found {}",
                    name, expected, found
                )
            }
            CodeGenError::GlobalSpaceExhausted { limit } => {
                write!(f, "global space exhausted: more than {} cells", limit)
            }
        }
    }
}

impl std::error::Error for CodeGenError {}

/// Emission state: the growing code vector plus the symbol tables that
/// become part of the image.
pub struct CodeGen {
    code: Vec<i64>,
    globals: HashMap<String, usize>,
    next_cell: usize,
    string_pool: BTreeMap<u64, Vec<u8>>,
    interned: HashMap<String, u64>,
    next_string_addr: u64,
    func_addresses: HashMap<String, usize>,
    calls_to_patch: Vec<(usize, String)>,
    params: HashMap<String, usize>,
    current_func: Option<String>,
}

impl Default for CodeGen {
    fn default() -> Self {
        CodeGen::new()
    }
}

impl CodeGen {
    pub fn new() -> CodeGen {
        CodeGen {
            code: Vec::new(),
            globals: HashMap::new(),
            next_cell: GLOBAL_BASE,
            string_pool: BTreeMap::new(),
            interned: HashMap::new(),
            next_string_addr: STRING_POOL_BASE,
            func_addresses: HashMap::new(),
            calls_to_patch: Vec::new(),
            params: HashMap::new(),
            current_func: None,
        }
    }

    /// Emit the whole program and link it into an image.
    pub fn generate(mut self, program: &LoadedProgram) -> Result<Image, CodeGenError> {
        for decl in &program.globals {
            let cell = self.global_cell(&decl.name)?;
            self.gen_expr(&decl.value)?;
            self.emit(Opcode::StoreG, cell as i64);
        }

        let main_jmp = self.code.len();
        self.emit(Opcode::Jmp, 0);

        for func in &program.functions {
            self.current_func = Some(func.name.clone());
            self.func_addresses.insert(func.name.clone(), self.code.len());
            self.params = func
                .params
                .iter()
                .enumerate()
                .map(|(slot, name)| (name.clone(), slot))
                .collect();
            for stmt in &func.body {
                self.gen_stmt(stmt)?;
            }
            // Implicit `return 0` for bodies that fall off the end.
            self.emit(Opcode::Push, 0);
            self.emit(Opcode::Ret, 0);
        }
        self.current_func = None;
        self.params.clear();

        // Without a main the prologue jumps to the image end and halts.
        let entry = self
            .func_addresses
            .get("main")
            .copied()
            .unwrap_or(self.code.len());
        self.code[main_jmp + 1] = entry as i64;

        for (offset, callee) in &self.calls_to_patch {
            match self.func_addresses.get(callee) {
                Some(addr) => self.code[*offset] = *addr as i64,
                None => {
                    return Err(CodeGenError::UndefinedFunction { name: callee.clone() });
                }
            }
        }

        Ok(Image {
            code: self.code,
            string_pool: self.string_pool,
            func_addresses: self.func_addresses,
            globals: self.globals,
            next_string_addr: self.next_string_addr,
        })
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodeGenError> {
        match stmt {
            Stmt::Var(decl) => self.gen_var_decl(decl),
            Stmt::Assign { name, expr } => {
                self.gen_expr(expr)?;
                if let Some(&slot) = self.params.get(name) {
                    self.emit(Opcode::StoreL, slot as i64);
                    return Ok(());
                }
                let cell = self.resolve_global(name)?;
                self.emit(Opcode::StoreG, cell as i64);
                Ok(())
            }
            Stmt::ArrayAssign { name, index, value } => {
                self.gen_var(name)?;
                self.gen_expr(index)?;
                self.gen_expr(value)?;
                self.emit(Opcode::HStore, 0);
                Ok(())
            }
            Stmt::If { cond, then_body, else_body } => {
                self.gen_expr(cond)?;
                self.emit(Opcode::Jz, 0);
                let jz_at = self.code.len() - 1;
                for s in then_body {
                    self.gen_stmt(s)?;
                }
                if else_body.is_empty() {
                    self.patch(jz_at);
                } else {
                    self.emit(Opcode::Jmp, 0);
                    let jmp_at = self.code.len() - 1;
                    self.patch(jz_at);
                    for s in else_body {
                        self.gen_stmt(s)?;
                    }
                    self.patch(jmp_at);
                }
                Ok(())
            }
            Stmt::While { cond, body } => {
                let start = self.code.len();
                self.gen_expr(cond)?;
                self.emit(Opcode::Jz, 0);
                let exit_at = self.code.len() - 1;
                for s in body {
                    self.gen_stmt(s)?;
                }
                self.emit(Opcode::Jmp, start as i64);
                self.patch(exit_at);
                Ok(())
            }
            Stmt::For { init, cond, step, body } => {
                self.gen_stmt(init)?;
                let start = self.code.len();
                self.gen_expr(cond)?;
                self.emit(Opcode::Jz, 0);
                let exit_at = self.code.len() - 1;
                for s in body {
                    self.gen_stmt(s)?;
                }
                self.gen_stmt(step)?;
                self.emit(Opcode::Jmp, start as i64);
                self.patch(exit_at);
                Ok(())
            }
            Stmt::Return(expr) => {
                self.gen_expr(expr)?;
                self.emit(Opcode::Ret, 0);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.gen_expr(expr)?;
                self.emit(Opcode::Pop, 0);
                Ok(())
            }
        }
    }

    /// `var` declares a global; inside a function the name is mangled to
    /// `<func>_<name>` (there is no frame-local storage for non-parameters).
    fn gen_var_decl(&mut self, decl: &VarDecl) -> Result<(), CodeGenError> {
        let name = self.mangled(&decl.name);
        let cell = self.global_cell(&name)?;
        self.gen_expr(&decl.value)?;
        self.emit(Opcode::StoreG, cell as i64);
        Ok(())
    }

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
        match expr {
            Expr::Number(v) => {
                self.emit(Opcode::Push, *v);
                Ok(())
            }
            Expr::Str(s) => {
                let addr = self.intern(s);
                self.emit(Opcode::Push, addr as i64);
                Ok(())
            }
            Expr::Var(name) => self.gen_var(name),
            Expr::Binary { left, op, right } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                self.gen_binop(*op);
                Ok(())
            }
            Expr::Alloc(size) => {
                self.gen_expr(size)?;
                self.emit(Opcode::New, 0);
                Ok(())
            }
            Expr::Index { name, index } => {
                self.gen_var(name)?;
                self.gen_expr(index)?;
                self.emit(Opcode::HLoad, 0);
                Ok(())
            }
            Expr::Call { name, args } => self.gen_call(name, args),
        }
    }

    fn gen_binop(&mut self, op: BinOp) {
        let opcode = match op {
            BinOp::Or => Opcode::LOr,
            BinOp::And => Opcode::LAnd,
            BinOp::Eq => Opcode::Eq,
            BinOp::Ne => Opcode::Neq,
            BinOp::Lt => Opcode::Lt,
            BinOp::Gt => Opcode::Gt,
            BinOp::BitAnd => Opcode::And,
            BinOp::BitOr => Opcode::Or,
            BinOp::BitXor => Opcode::Xor,
            BinOp::Shl => Opcode::Shl,
            BinOp::Shr => Opcode::Shr,
            BinOp::Add => Opcode::Add,
            BinOp::Sub => Opcode::Sub,
            BinOp::Mul => Opcode::Mul,
            BinOp::Div => Opcode::Div,
            // The instruction set has no LE/GE; lower as negated GT/LT.
            BinOp::Le => {
                self.emit(Opcode::Gt, 0);
                self.emit(Opcode::Push, 0);
                self.emit(Opcode::Eq, 0);
                return;
            }
            BinOp::Ge => {
                self.emit(Opcode::Lt, 0);
                self.emit(Opcode::Push, 0);
                self.emit(Opcode::Eq, 0);
                return;
            }
        };
        self.emit(opcode, 0);
    }

    fn gen_call(&mut self, name: &str, args: &[Expr]) -> Result<(), CodeGenError> {
        if let Some((_, opcode, arity)) = INTRINSICS.iter().find(|(n, _, _)| *n == name) {
            if args.len() != *arity {
                return Err(CodeGenError::IntrinsicArity {
                    name: name.to_string(),
                    expected: *arity,
                    found: args.len(),
                });
            }
            // Intrinsic arguments evaluate in source order.
            for arg in args {
                self.gen_expr(arg)?;
            }
            self.emit(*opcode, 0);
            return Ok(());
        }

        // Reverse push order places argument 0 closest to the frame base.
        for arg in args.iter().rev() {
            self.gen_expr(arg)?;
        }
        self.emit(Opcode::Call, 0);
        self.calls_to_patch.push((self.code.len() - 1, name.to_string()));
        Ok(())
    }

    /// Load an identifier: parameter, then mangled global, then bare global.
    fn gen_var(&mut self, name: &str) -> Result<(), CodeGenError> {
        if let Some(&slot) = self.params.get(name) {
            self.emit(Opcode::LoadL, slot as i64);
            return Ok(());
        }
        let cell = self.resolve_global(name)?;
        self.emit(Opcode::LoadG, cell as i64);
        Ok(())
    }

    fn resolve_global(&self, name: &str) -> Result<usize, CodeGenError> {
        let mangled = self.mangled(name);
        if let Some(&cell) = self.globals.get(&mangled) {
            return Ok(cell);
        }
        if let Some(&cell) = self.globals.get(name) {
            return Ok(cell);
        }
        Err(CodeGenError::UndefinedVariable {
            name: name.to_string(),
            function: self.current_func.clone(),
        })
    }

    fn mangled(&self, name: &str) -> String {
        match &self.current_func {
            Some(func) => format!("{}_{}", func, name),
            None => name.to_string(),
        }
    }

    /// Cell for a (possibly mangled) global, allocating on first sight.
    fn global_cell(&mut self, name: &str) -> Result<usize, CodeGenError> {
        if let Some(&cell) = self.globals.get(name) {
            return Ok(cell);
        }
        if self.next_cell >= MEMORY_CELLS {
            return Err(CodeGenError::GlobalSpaceExhausted { limit: MEMORY_CELLS });
        }
        let cell = self.next_cell;
        self.next_cell += 1;
        self.globals.insert(name.to_string(), cell);
        Ok(cell)
    }

    /// First occurrence interns the literal at the next pool address;
    /// repeats reuse it. Only the address is ever emitted into code.
    fn intern(&mut self, literal: &str) -> u64 {
        if let Some(&addr) = self.interned.get(literal) {
            return addr;
        }
        let addr = self.next_string_addr;
        self.string_pool.insert(addr, literal.as_bytes().to_vec());
        self.interned.insert(literal.to_string(), addr);
        self.next_string_addr += literal.len() as u64 + 1;
        addr
    }

    fn emit(&mut self, op: Opcode, arg: i64) {
        self.code.push(op as i64);
        self.code.push(arg);
    }

    /// Point the recorded jump argument at the current end of code.
    fn patch(&mut self, at: usize) {
        let target = self.code.len() as i64;
        self.code[at] = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn compile(source: &str) -> Result<Image, CodeGenError> {
        let program = Parser::new(tokenize(source).unwrap()).parse().unwrap();
        CodeGen::new().generate(&LoadedProgram::from(program))
    }

    #[test]
    fn test_arithmetic_image_layout() {
        let image = compile("func main() { return 2 + 3 * 4; }").unwrap();
        // JMP main; PUSH 2; PUSH 3; PUSH 4; MUL; ADD; RET; PUSH 0; RET
        assert_eq!(
            image.code,
            vec![20, 2, 1, 2, 1, 3, 1, 4, 12, 0, 10, 0, 22, 0, 1, 0, 22, 0]
        );
        assert_eq!(image.function_address("main"), Some(2));
    }

    #[test]
    fn test_bytecode_has_even_length() {
        let image = compile(
            "var g = 1; func f(a) { if (a) { return a; } return g; } func main() { return f(2); }",
        )
        .unwrap();
        assert_eq!(image.code.len() % 2, 0);
    }

    #[test]
    fn test_forward_reference_is_back_patched() {
        let image = compile(
            "func main() { return later(); } func later() { return 5; }",
        )
        .unwrap();
        let later = image.function_address("later").unwrap() as i64;
        let call_at = image
            .code
            .chunks(2)
            .position(|pair| pair[0] == Opcode::Call as i64)
            .unwrap();
        assert_eq!(image.code[call_at * 2 + 1], later);
    }

    #[test]
    fn test_undefined_callee_is_a_link_error() {
        let err = compile("func main() { return ghost(); }").unwrap_err();
        assert_eq!(
            err,
            CodeGenError::UndefinedFunction { name: "ghost".to_string() }
        );
    }

    #[test]
    fn test_undefined_variable() {
        let err = compile("func main() { return nope; }").unwrap_err();
        assert!(matches!(err, CodeGenError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_string_literals_are_interned_once() {
        let image = compile(
            r#"func main() { prints("hi"); prints("hi"); prints("yo"); return 0; }"#,
        )
        .unwrap();
        assert_eq!(image.string_pool.len(), 2);
        let hi_addr = STRING_POOL_BASE;
        assert_eq!(image.string_pool.get(&hi_addr).unwrap(), b"hi");
        // "yo" starts right past "hi" and its NUL.
        assert_eq!(image.string_pool.get(&(hi_addr + 3)).unwrap(), b"yo");
        assert_eq!(image.next_string_addr, hi_addr + 6);
    }

    #[test]
    fn test_locals_become_mangled_globals() {
        let image = compile("func f() { var x = 1; return x; }").unwrap();
        assert!(image.globals.contains_key("f_x"));
        assert_eq!(image.global_cell("f_x"), Some(GLOBAL_BASE));
    }

    #[test]
    fn test_parameters_use_frame_slots() {
        let image = compile("func sub(a, b) { return a - b; }").unwrap();
        // Body: LOADL 0 (a); LOADL 1 (b); SUB; RET; PUSH 0; RET
        let body_at = image.function_address("sub").unwrap();
        assert_eq!(
            &image.code[body_at..body_at + 8],
            &[5, 0, 5, 1, 11, 0, 22, 0]
        );
    }

    #[test]
    fn test_call_arguments_pushed_in_reverse() {
        let image = compile(
            "func sub(a, b) { return a - b; } func main() { return sub(10, 3); }",
        )
        .unwrap();
        let main_at = image.function_address("main").unwrap();
        // PUSH 3; PUSH 10; CALL sub
        assert_eq!(image.code[main_at], Opcode::Push as i64);
        assert_eq!(image.code[main_at + 1], 3);
        assert_eq!(image.code[main_at + 2], Opcode::Push as i64);
        assert_eq!(image.code[main_at + 3], 10);
        assert_eq!(image.code[main_at + 4], Opcode::Call as i64);
    }

    #[test]
    fn test_intrinsic_arguments_in_source_order() {
        let image = compile(r#"func main() { fwrite("f", "d"); return 0; }"#).unwrap();
        let main_at = image.function_address("main").unwrap();
        let f_addr = STRING_POOL_BASE as i64;
        let d_addr = f_addr + 2;
        assert_eq!(
            &image.code[main_at..main_at + 6],
            &[1, f_addr, 1, d_addr, Opcode::FWrite as i64, 0]
        );
    }

    #[test]
    fn test_intrinsic_arity_fails_closed() {
        let err = compile(r#"func main() { prints("a", "b"); return 0; }"#).unwrap_err();
        assert_eq!(
            err,
            CodeGenError::IntrinsicArity {
                name: "prints".to_string(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_le_ge_lowered_as_negations() {
        let image = compile("func main() { return 1 <= 2; }").unwrap();
        let main_at = image.function_address("main").unwrap();
        // PUSH 1; PUSH 2; GT; PUSH 0; EQ
        assert_eq!(
            &image.code[main_at..main_at + 10],
            &[1, 1, 1, 2, 17, 0, 1, 0, 14, 0]
        );
    }

    #[test]
    fn test_missing_main_jumps_to_image_end() {
        let image = compile("var g = 9;").unwrap();
        // PUSH 9; STOREG g; JMP <end>
        let end = image.code.len() as i64;
        assert_eq!(image.code[4], Opcode::Jmp as i64);
        assert_eq!(image.code[5], end);
    }

    #[test]
    fn test_regeneration_is_deterministic() {
        let source = r#"
            var a = 1; var b = 2;
            func f(x) { var t = x * 2; return t; }
            func main() { prints("hello"); return f(a + b); }
        "#;
        let first = compile(source).unwrap();
        let second = compile(source).unwrap();
        assert_eq!(first.code, second.code);
        assert_eq!(first.func_addresses, second.func_addresses);
        assert_eq!(first.string_pool, second.string_pool);
        assert_eq!(first.globals, second.globals);
    }

    #[test]
    fn test_global_initializers_precede_main_jump() {
        let image = compile("var g = 5; func main() { return g; }").unwrap();
        // PUSH 5; STOREG 100; JMP main
        assert_eq!(&image.code[0..6], &[1, 5, 4, 100, 20, 6]);
    }

    #[test]
    fn test_while_loop_shape() {
        let image = compile("func main() { var i = 0; while (i < 3) { i = i + 1; } return i; }")
            .unwrap();
        let code = &image.code;
        // Find the JZ and check its exit target points past the loop's JMP.
        let jz_at = code
            .chunks(2)
            .position(|pair| pair[0] == Opcode::Jz as i64)
            .unwrap()
            * 2;
        let exit = code[jz_at + 1] as usize;
        assert_eq!(code[exit - 2], Opcode::Jmp as i64);
        let back = code[exit - 1] as usize;
        assert!(back < jz_at, "back edge must precede the JZ");
    }
}
