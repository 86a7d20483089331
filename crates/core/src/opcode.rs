//! Instruction set for the XL stack VM.
//!
//! Every instruction is an `(opcode, argument)` pair of 64-bit words laid out
//! flat in the code vector; the program counter advances by 2 per
//! instruction. The argument word is always present and is ignored by
//! opcodes that do not consume it.
//!
//! The numeric assignments below are frozen. The code generator emits them
//! and the VM dispatches on them, so any renumbering is an ABI break.

/// One opcode of the XL virtual machine.
///
/// Stack effects are written `(inputs) -> (outputs)`, top of stack rightmost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum Opcode {
    /// `(--) -> (v)` push the argument word
    Push = 1,
    /// `(v) -> (--)` discard top of stack
    Pop = 2,
    /// `(--) -> (v)` push `memory[arg]`
    LoadG = 3,
    /// `(v) -> (--)` store top of stack into `memory[arg]`
    StoreG = 4,
    /// `(--) -> (v)` push parameter `arg` (`stack[fp - arg - 1]`)
    LoadL = 5,
    /// `(v) -> (--)` overwrite parameter `arg`
    StoreL = 6,
    /// `(a, b) -> (a & b)` bitwise
    And = 7,
    /// `(a, b) -> (a | b)` bitwise
    Or = 8,
    /// `(a, b) -> (a ^ b)` bitwise
    Xor = 9,
    /// `(a, b) -> (a + b)` wrapping
    Add = 10,
    /// `(a, b) -> (a - b)` wrapping
    Sub = 11,
    /// `(a, b) -> (a * b)` wrapping
    Mul = 12,
    /// `(a, b) -> (a / b)`; division by zero yields 0
    Div = 13,
    /// `(a, b) -> (a == b ? 1 : 0)`
    Eq = 14,
    /// `(a, b) -> (a != b ? 1 : 0)`
    Neq = 15,
    /// `(a, b) -> (a < b ? 1 : 0)` signed
    Lt = 16,
    /// `(a, b) -> (a > b ? 1 : 0)` signed
    Gt = 17,
    /// `(a, b) -> (1 if both nonzero else 0)`
    LAnd = 18,
    /// `(a, b) -> (1 if either nonzero else 0)`
    LOr = 19,
    /// unconditional jump to instruction index `arg`
    Jmp = 20,
    /// push a return frame, set `fp` to the stack length, jump to `arg`
    Call = 21,
    /// pop the return value, drop the frame's slots, resume the caller
    Ret = 22,
    /// `(v) -> (--)` jump to `arg` when v is zero
    Jz = 30,
    /// `(a, b) -> (a >> (b mod 64))` logical
    Shr = 32,
    /// `(a, b) -> (a << (b mod 64))` wrapping
    Shl = 33,
    /// `(n) -> (p)` bump-allocate n heap cells, push the base address
    New = 41,
    /// `(base, idx) -> (heap[base + idx])`
    HLoad = 42,
    /// `(base, idx, v) -> (--)` store v at `heap[base + idx]`
    HStore = 43,
    /// `(p) -> (0)` print the NUL-terminated string at `heap[p]`
    Prints = 45,
    /// `(v) -> (0)` print `0x` + 16 hex digits
    PrintHex = 46,
    /// `(name_p, data_p) -> (1)` overwrite a file
    FWrite = 50,
    /// `(name_p, data_p) -> (1)` append to a file
    FAppend = 51,
    /// `(name_p) -> (heap_p | 0)` read a file into fresh heap cells
    FRead = 52,
    /// `(name_p, v) -> (1)` append the decimal rendering of v
    FAppendInt = 53,
    /// `(--) -> (v)` fresh 63-bit random integer
    Rand = 60,
    /// `(json_p, index, key_p) -> (value | 0)` ledger field scan
    JsonGet = 61,
    /// `(p, size) -> (hash_p)` SHA-512 over byte-masked cells, 8 words at hp
    Sha512 = 62,
    /// `(--) -> (desc_p)` Ed25519 keypair, `[pub_p, priv_p]` descriptor
    KeyGen = 63,
}

impl Opcode {
    /// Decode a code word into an opcode. `None` means the word is not part
    /// of the instruction set and the VM must fault rather than guess.
    pub fn from_word(word: i64) -> Option<Opcode> {
        use Opcode::*;
        Some(match word {
            1 => Push,
            2 => Pop,
            3 => LoadG,
            4 => StoreG,
            5 => LoadL,
            6 => StoreL,
            7 => And,
            8 => Or,
            9 => Xor,
            10 => Add,
            11 => Sub,
            12 => Mul,
            13 => Div,
            14 => Eq,
            15 => Neq,
            16 => Lt,
            17 => Gt,
            18 => LAnd,
            19 => LOr,
            20 => Jmp,
            21 => Call,
            22 => Ret,
            30 => Jz,
            32 => Shr,
            33 => Shl,
            41 => New,
            42 => HLoad,
            43 => HStore,
            45 => Prints,
            46 => PrintHex,
            50 => FWrite,
            51 => FAppend,
            52 => FRead,
            53 => FAppendInt,
            60 => Rand,
            61 => JsonGet,
            62 => Sha512,
            63 => KeyGen,
            _ => return None,
        })
    }

    /// The assembler mnemonic used in listings.
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Push => "PUSH",
            Pop => "POP",
            LoadG => "LOADG",
            StoreG => "STOREG",
            LoadL => "LOADL",
            StoreL => "STOREL",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Eq => "EQ",
            Neq => "NEQ",
            Lt => "LT",
            Gt => "GT",
            LAnd => "LAND",
            LOr => "LOR",
            Jmp => "JMP",
            Call => "CALL",
            Ret => "RET",
            Jz => "JZ",
            Shr => "SHR",
            Shl => "SHL",
            New => "NEW",
            HLoad => "HLOAD",
            HStore => "HSTORE",
            Prints => "PRINTS",
            PrintHex => "PRINTHEX",
            FWrite => "FWRITE",
            FAppend => "FAPPEND",
            FRead => "FREAD",
            FAppendInt => "FAPPEND_INT",
            Rand => "RAND",
            JsonGet => "JSON_GET",
            Sha512 => "SHA512",
            KeyGen => "KEYGEN",
        }
    }

    /// Whether the argument word is meaningful for this opcode.
    /// Listings omit the argument for the rest.
    pub fn uses_arg(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Push | LoadG | StoreG | LoadL | StoreL | Jmp | Call | Jz
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
