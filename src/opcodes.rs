//! The opcode table and the handlers of the builtin instructions.
//!
//! Handlers are plain function pointers taking an
//! [InstructionContext](crate::emulator::InstructionContext). Additional opcodes can be
//! registered on an [OpcodeTable] before it is handed to the emulator:
//!
//! ```
//! use bytecpu::{
//!     emulator::{Emulator, Flow, InstructionContext},
//!     config::Config,
//!     error::ErrorKind,
//!     io::{InputSource, OutputSink, TestInput, TestOutput},
//!     opcodes::OpcodeTable,
//!     symbolic::Program,
//! };
//!
//! fn double<Out: OutputSink, In: InputSource>(
//!     ctx: &mut InstructionContext<Out, In>,
//! ) -> Result<Flow, ErrorKind> {
//!     ctx.expect_operands(1, 1)?;
//!     let destination = ctx.destination(0)?;
//!     let value = ctx.read(&destination)?;
//!     ctx.write(&destination, value as u32 * 2)?;
//!     Ok(Flow::Next)
//! }
//!
//! let mut table: OpcodeTable<TestOutput, TestInput> = OpcodeTable::default();
//! table.register("dbl", double);
//!
//! let program = Program::parse("mov 0x0, 21\ndbl 0x0").unwrap();
//! let mut emulator = Emulator::with_table(
//!     program,
//!     Config::default(),
//!     table,
//!     TestOutput::new(),
//!     TestInput::new(),
//! );
//!
//! emulator.run().unwrap();
//! assert_eq!(emulator.machine.ram.read(0), Ok(42));
//! ```

use std::collections::HashMap;

use edit_distance::edit_distance;

use crate::emulator::{Flow, Handler, InstructionContext};
use crate::error::ErrorKind;
use crate::instruction::{OpCode, Operand};
use crate::io::{InputSource, OutputSink};
use crate::memory::{printable, Location};

/// Maximum edit distance for an opcode name to be suggested.
const SUGGESTION_DISTANCE: usize = 2;

/// Mapping from opcode names to handlers.
pub struct OpcodeTable<Out, In> {
    handlers: HashMap<String, Handler<Out, In>>,
}

impl<Out, In> OpcodeTable<Out, In>
where
    Out: OutputSink,
    In: InputSource,
{
    /// A table without any opcodes.
    pub fn empty() -> Self {
        OpcodeTable {
            handlers: HashMap::new(),
        }
    }

    /// Adds or replaces an opcode. Names are case-insensitive.
    ///
    /// # Returns
    /// The handler previously registered under `name`.
    pub fn register<S: AsRef<str>>(&mut self, name: S, handler: Handler<Out, In>) -> Option<Handler<Out, In>> {
        self.handlers.insert(name.as_ref().to_lowercase(), handler)
    }

    pub fn get(&self, name: &str) -> Option<Handler<Out, In>> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Closest registered name to an unknown opcode.
    pub fn suggest(&self, name: &str) -> Option<&str> {
        self.handlers.keys()
            .map(|candidate| (edit_distance(name, candidate), candidate))
            .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
            .min()
            .map(|(_, candidate)| candidate.as_str())
    }
}

impl<Out, In> Default for OpcodeTable<Out, In>
where
    Out: OutputSink,
    In: InputSource,
{
    /// A table with every builtin opcode.
    fn default() -> Self {
        let mut table = OpcodeTable::empty();

        for op in OpCode::ALL.iter() {
            table.register(op.name(), builtin(*op));
        }

        table
    }
}

/// The handler implementing a builtin opcode.
pub fn builtin<Out, In>(opcode: OpCode) -> Handler<Out, In>
where
    Out: OutputSink,
    In: InputSource,
{
    match opcode {
        OpCode::Move | OpCode::Set => mov,
        OpCode::Add => add,
        OpCode::Subtract => sub,
        OpCode::Xor => xor,
        OpCode::Jump => jmp,
        OpCode::Call => call,
        OpCode::Return => ret,
        OpCode::ReturnOutput => retout,
        OpCode::Output => stdout,
        OpCode::Flush => stdoutflush,
        OpCode::SetBuffer => setbuffer,
        OpCode::AddBuffer => addbuffer,
        OpCode::LengthBuffer => lenbuffer,
        OpCode::WaitKey => waitkey,
        OpCode::NoOperation => nop,
        OpCode::Halt => halt,
    }
}

type Result = std::result::Result<Flow, ErrorKind>;

fn mov<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(2, 2)?;

    let destination = ctx.destination(0)?;
    let value = ctx.value(1)?;
    ctx.write(&destination, value as u32)?;

    Ok(Flow::Next)
}

/// `dst = op(dst, src)`, truncated to 8 bits by the write.
fn arithmetic<Out, In>(ctx: &mut InstructionContext<Out, In>, op: fn(u32, u32) -> u32) -> Result
where
    Out: OutputSink,
    In: InputSource,
{
    ctx.expect_operands(2, 2)?;

    let destination = ctx.destination(0)?;
    let lhs = ctx.read(&destination)?;
    let rhs = ctx.value(1)?;
    ctx.write(&destination, op(lhs as u32, rhs as u32))?;

    Ok(Flow::Next)
}

fn add<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    arithmetic(ctx, |a, b| a.wrapping_add(b))
}

fn sub<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    arithmetic(ctx, |a, b| a.wrapping_sub(b))
}

fn xor<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    arithmetic(ctx, |a, b| a ^ b)
}

fn jmp<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(1, 1)?;

    Ok(Flow::Jump(ctx.label(0)?))
}

fn call<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(1, 1)?;

    // The label is resolved before the call stack is touched.
    let target = ctx.label(0)?;
    let return_address = ctx.pc() + 1;
    ctx.push_return(return_address);

    Ok(Flow::Jump(target))
}

fn return_from<Out, In>(ctx: &mut InstructionContext<Out, In>, echo: bool) -> Result
where
    Out: OutputSink,
    In: InputSource,
{
    ctx.expect_operands(0, 1)?;

    let value = match ctx.operand(0) {
        Some(_) => ctx.value(0)?,
        None => 0,
    };

    let character = if echo { Some(printable(value)) } else { None };

    let result = Location::Register(ctx.config().result_register.clone());
    ctx.write(&result, value as u32)?;

    if let Some(character) = character {
        ctx.emit(&character.to_string());
    }

    let target = ctx.pop_return().unwrap_or_else(|| ctx.program_len());

    Ok(Flow::Jump(target))
}

fn ret<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    return_from(ctx, false)
}

fn retout<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    return_from(ctx, true)
}

fn stdout<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(1, 1)?;

    let text = match ctx.operand(0) {
        Some(Operand::BufferRef(name)) => ctx.render_buffer(name)?,
        Some(Operand::StringLiteral(text)) => text.clone(),
        _ => printable(ctx.value(0)?).to_string(),
    };

    ctx.emit(&text);

    Ok(Flow::Next)
}

fn stdoutflush<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(0, 0)?;
    ctx.clear_output();

    Ok(Flow::Next)
}

fn setbuffer<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(1, 1)?;

    let name = ctx.buffer_name(0)?;
    ctx.declare_buffer(name);

    Ok(Flow::Next)
}

fn addbuffer<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(2, 2)?;

    let name = ctx.buffer_name(0)?;
    let value = ctx.value(1)?;
    ctx.append_buffer(name, value as u32)?;

    Ok(Flow::Next)
}

fn lenbuffer<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(1, 2)?;

    let name = ctx.buffer_name(0)?;
    let length = ctx.machine().buffers.len(name)?;

    let destination = match ctx.operand(1) {
        Some(_) => ctx.destination(1)?,
        None => Location::Register(ctx.config().result_register.clone()),
    };

    ctx.write(&destination, length as u32)?;

    Ok(Flow::Next)
}

fn waitkey<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(0, 1)?;

    let destination = match ctx.operand(0) {
        Some(_) => ctx.destination(0)?,
        None => Location::Register(ctx.config().key_register.clone()),
    };

    loop {
        if ctx.stop_requested() {
            return Ok(Flow::Cancel);
        }

        if let Some(key) = ctx.poll_key() {
            ctx.write(&destination, key as u32)?;
            return Ok(Flow::Next);
        }
    }
}

fn nop<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(0, 0)?;

    Ok(Flow::Next)
}

fn halt<Out: OutputSink, In: InputSource>(ctx: &mut InstructionContext<Out, In>) -> Result {
    ctx.expect_operands(0, 0)?;

    Ok(Flow::Jump(ctx.program_len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{TestInput, TestOutput};

    type Table = OpcodeTable<TestOutput, TestInput>;

    #[test]
    fn test_default_table_has_builtins() {
        let table = Table::default();

        for op in OpCode::ALL.iter() {
            assert!(table.contains(op.name()), "missing {}", op);
        }

        assert!(!table.contains("frobnicate"));
    }

    #[test]
    fn test_suggest() {
        let table = Table::default();

        assert_eq!(table.suggest("stdot"), Some("stdout"));
        assert_eq!(table.suggest("mvo"), Some("mov"));
        assert_eq!(table.suggest("frobnicate"), None);
    }

    #[test]
    fn test_register_is_case_insensitive() {
        let mut table = Table::empty();

        assert!(table.register("NOP", builtin(OpCode::NoOperation)).is_none());
        assert!(table.contains("nop"));
        assert!(table.register("nop", builtin(OpCode::Halt)).is_some());
    }
}
