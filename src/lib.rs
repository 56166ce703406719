//! A crate for loading and executing programs written in a small byte-oriented toy
//! assembly language.
//!
//! The machine has a RAM and a Disk of byte cells, named single-byte registers, named
//! growable buffers, a call stack and a text output. Every stored value is truncated to
//! 8 bits.
//!
//! Currently this crate provides the functionality to:
//! - Load symbolic assembly into a [Program](symbolic::Program) with a label table.
//! - Execute programs step by step or to completion.
//! - Extend the instruction set through an [OpcodeTable](opcodes::OpcodeTable).
//! - Observe state changes through [events](event).
//! - Feed key presses from another thread and stop a run cooperatively.
//!
//! # Example
//! ```
//! use bytecpu::{
//!     symbolic::Program,
//!     emulator::Emulator,
//!     io::{TestInput, TestOutput},
//! };
//!
//! fn main() {
//!     let source = r#"
//!         ; Collect a greeting into a buffer and print it.
//!         setbuffer 0bgreeting
//!         call fill
//!         stdout 0bgreeting
//!         jmp end
//!
//!     fill:
//!         addbuffer 0bgreeting, 72
//!         addbuffer 0bgreeting, 105
//!         ret
//!
//!     end:
//!     "#;
//!
//!     // Parse the source into instructions and labels.
//!     let program = Program::parse(source).unwrap();
//!
//!     // Execute the program, collecting its output.
//!     let mut emulator = Emulator::new(program, TestOutput::new(), TestInput::new());
//!
//!     emulator.run()
//!         .expect("an error occurred while executing the program");
//!
//!     assert_eq!(emulator.output.output(), "Hi");
//! }
//! ```
//!
//! # Executables
//!
//! ## `bytecpurun`
//!
//! Loads a source file and executes it, writing the output to the terminal and
//! forwarding bytes of the standard input to `waitkey`. Build with the `tools` feature.
//!
//! ```text
//! $ bytecpurun --dump tests/programs/hello.asm
//! Hello World!
//! pc: 0016 (halted)
//! call stack: []
//! registers:
//!   rax = 33
//!   rbx = 101
//!   rcx = 0
//! ```

pub mod config;
pub mod emulator;
pub mod error;
pub mod event;
pub mod instruction;
pub mod io;
pub mod label_table;
pub mod memory;
pub mod opcodes;
pub mod operand;
pub mod symbolic;
