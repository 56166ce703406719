//! types for representing instructions and their parts

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use lazy_static::lazy_static;

/// One of the two fixed-capacity byte addressable memory regions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// Addressed with the `0x` prefix.
    Ram,

    /// Addressed with the `0d` prefix.
    Disk,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Region::Ram => write!(f, "RAM"),
            Region::Disk => write!(f, "Disk"),
        }
    }
}

/// A classified operand of an instruction.
///
/// Operands are classified once when the program is loaded, see
/// [classify](crate::operand::classify) for the prefix rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// An all-digit token, stored modulo 256.
    Immediate(u8),

    /// A `0r<name>` token.
    Register(String),

    /// A `0x<hex>` token.
    RamAddress(u16),

    /// A `0d<hex>` token.
    DiskAddress(u16),

    /// A `0b<name>` token.
    BufferRef(String),

    /// Any other token. Used for labels and literal text.
    StringLiteral(String),
}

impl Operand {
    /// Short human readable name of the operand kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Immediate(_) => "immediate",
            Operand::Register(_) => "register",
            Operand::RamAddress(_) => "RAM address",
            Operand::DiskAddress(_) => "disk address",
            Operand::BufferRef(_) => "buffer",
            Operand::StringLiteral(_) => "literal",
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Immediate(value) => write!(f, "{}", value),
            Operand::Register(name) => write!(f, "0r{}", name),
            Operand::RamAddress(addr) => write!(f, "0x{:x}", addr),
            Operand::DiskAddress(addr) => write!(f, "0d{:x}", addr),
            Operand::BufferRef(name) => write!(f, "0b{}", name),
            Operand::StringLiteral(text) => write!(f, "{}", text),
        }
    }
}

/// A single loaded instruction. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// Lower-cased opcode name as written in the source.
    pub mnemonic: String,

    /// Operands in source order.
    pub operands: Vec<Operand>,

    /// 1-based source line the instruction was loaded from.
    pub line: usize,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operands.iter().join(", "))
        }
    }
}

/// The builtin instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Copies a value into a register or memory cell. (`mov dst, src`)
    Move,

    /// Alias of [OpCode::Move]. (`set dst, src`)
    Set,

    /// Adds a value to a writable location. (`add dst, src`)
    Add,

    /// Subtracts a value from a writable location. (`sub dst, src`)
    Subtract,

    /// Performs a binary xor operation on a writable location. (`xor dst, src`)
    Xor,

    /// Unconditional jump to a label. (`jmp label`)
    Jump,

    /// Pushes the return address and jumps to a label. (`call label`)
    Call,

    /// Pops the return address and stores the optional value into the result register.
    /// Halts the program when the call stack is empty. (`ret [value]`)
    Return,

    /// Same as [OpCode::Return], but also writes the value to the output as a character.
    /// (`retout [value]`)
    ReturnOutput,

    /// Writes a character, a buffer or a literal to the output. (`stdout value`)
    Output,

    /// Clears the output. (`stdoutflush`)
    Flush,

    /// Declares or resets a buffer. (`setbuffer 0bname`)
    SetBuffer,

    /// Appends a byte to a buffer. (`addbuffer 0bname, value`)
    AddBuffer,

    /// Stores the length of a buffer. (`lenbuffer 0bname [, dst]`)
    LengthBuffer,

    /// Blocks until a key is available and stores it. (`waitkey [dst]`)
    WaitKey,

    /// Does nothing besides incrementing the program counter.
    NoOperation,

    /// Moves the program counter past the end of the program.
    Halt,
}

impl OpCode {
    /// All builtin opcodes in documentation order.
    pub const ALL: [OpCode; 17] = [
        OpCode::Move,
        OpCode::Set,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Xor,
        OpCode::Jump,
        OpCode::Call,
        OpCode::Return,
        OpCode::ReturnOutput,
        OpCode::Output,
        OpCode::Flush,
        OpCode::SetBuffer,
        OpCode::AddBuffer,
        OpCode::LengthBuffer,
        OpCode::WaitKey,
        OpCode::NoOperation,
        OpCode::Halt,
    ];

    /// The mnemonic used in the source text.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Move => "mov",
            OpCode::Set => "set",
            OpCode::Add => "add",
            OpCode::Subtract => "sub",
            OpCode::Xor => "xor",
            OpCode::Jump => "jmp",
            OpCode::Call => "call",
            OpCode::Return => "ret",
            OpCode::ReturnOutput => "retout",
            OpCode::Output => "stdout",
            OpCode::Flush => "stdoutflush",
            OpCode::SetBuffer => "setbuffer",
            OpCode::AddBuffer => "addbuffer",
            OpCode::LengthBuffer => "lenbuffer",
            OpCode::WaitKey => "waitkey",
            OpCode::NoOperation => "nop",
            OpCode::Halt => "halt",
        }
    }

    /// Looks up a builtin by its mnemonic. The lookup is case-insensitive.
    pub fn from_name(name: &str) -> Option<OpCode> {
        BUILTINS.get(name.to_lowercase().as_str()).copied()
    }
}

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, OpCode> = OpCode::ALL
        .iter()
        .map(|op| (op.name(), *op))
        .collect();
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OpCode {
    type Err = ();

    fn from_str(s: &str) -> Result<OpCode, ()> {
        OpCode::from_name(s).ok_or(())
    }
}

#[test]
fn test_opcode_names_roundtrip() {
    for op in OpCode::ALL.iter() {
        assert_eq!(OpCode::from_name(op.name()), Some(*op));
    }

    assert_eq!("STDOUT".parse::<OpCode>(), Ok(OpCode::Output));
    assert_eq!("frobnicate".parse::<OpCode>(), Err(()));
}

#[test]
fn test_instruction_display() {
    let ins = Instruction {
        mnemonic: "mov".into(),
        operands: vec![Operand::RamAddress(0x10), Operand::Immediate(5)],
        line: 1,
    };

    assert_eq!(ins.to_string(), "mov 0x10, 5");

    let ins = Instruction {
        mnemonic: "stdoutflush".into(),
        operands: vec![],
        line: 2,
    };

    assert_eq!(ins.to_string(), "stdoutflush");
}
