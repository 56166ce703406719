//! [Emulator] for executing loaded [programs](crate::symbolic::Program).
//!
//! ```
//! use bytecpu::{
//!     emulator::{Emulator, Outcome},
//!     io::{TestInput, TestOutput},
//!     symbolic::Program,
//! };
//!
//! let program = Program::parse("
//!     mov 0x0, 72
//!     stdout 0x0
//!     stdout i
//! ").unwrap();
//!
//! let mut emulator = Emulator::new(program, TestOutput::new(), TestInput::new());
//!
//! assert_eq!(emulator.run(), Ok(Outcome::Completed));
//! assert_eq!(emulator.output.output(), "Hi");
//! ```

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::sync::Arc;

use itertools::Itertools;
use slog::{debug, o, trace, Discard, Logger};

use crate::config::Config;
use crate::error::{Diagnostics, ErrorKind, ExecutionError, TraceEntry};
use crate::event::{Event, EventDispatcher, EventListener};
use crate::instruction::{Instruction, Operand};
use crate::io::{InputSource, OutputSink, StopHandle};
use crate::memory::{truncate, Location, Machine};
use crate::opcodes::OpcodeTable;
use crate::operand::{resolve_destination, resolve_value};
use crate::symbolic::Program;

/// Signature of an instruction handler.
pub type Handler<Out, In> = fn(&mut InstructionContext<Out, In>) -> Result<Flow, ErrorKind>;

/// Where execution continues after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The instruction after this one.
    Next,

    /// An absolute instruction index. The length of the program halts.
    Jump(usize),

    /// The instruction observed a stop request and did not complete.
    Cancel,
}

/// Lifecycle of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Running,

    /// The program counter reached the end of the program.
    Halted,

    /// Stopped through a [StopHandle].
    Cancelled,

    /// An instruction failed. Further steps return the same error.
    Faulted(ExecutionError),
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Running => write!(f, "running"),
            Status::Halted => write!(f, "halted"),
            Status::Cancelled => write!(f, "cancelled"),
            Status::Faulted(_) => write!(f, "faulted"),
        }
    }
}

/// How a finished run ended, when it did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
}

/// Control state of the emulated processor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState {
    /// Index of the next instruction to be executed.
    pub pc: usize,

    /// Return addresses pushed by `call`, innermost last.
    pub call_stack: Vec<usize>,

    pub status: Status,

    /// Index of the most recently completed instruction.
    pub last: Option<usize>,
}

impl ExecutionState {
    fn new() -> ExecutionState {
        ExecutionState {
            pc: 0,
            call_stack: Vec::new(),
            status: Status::Running,
            last: None,
        }
    }

    /// True once the run has ended for any reason.
    pub fn is_halted(&self) -> bool {
        self.status != Status::Running
    }
}

/// Access to the emulator while a single instruction is being executed.
///
/// Instruction handlers only ever see the emulator through this type.
pub struct InstructionContext<'e, 'i, Out, In> {
    /// The emulator in whose context the instruction is being emulated.
    emulator: &'e mut Emulator<Out, In>,

    /// The instruction that we are currently emulating.
    instruction: &'i Instruction,
}

impl<'e, 'i, Out, In> InstructionContext<'e, 'i, Out, In>
where
    Out: OutputSink,
    In: InputSource,
{
    pub fn instruction(&self) -> &'i Instruction {
        self.instruction
    }

    /// Index of the instruction being executed.
    pub fn pc(&self) -> usize {
        self.emulator.state.pc
    }

    pub fn program_len(&self) -> usize {
        self.emulator.program.len()
    }

    pub fn config(&self) -> &Config {
        &self.emulator.config
    }

    pub fn machine(&self) -> &Machine {
        &self.emulator.machine
    }

    /// Checks the operand count is within `[min, max]`.
    pub fn expect_operands(&self, min: usize, max: usize) -> Result<(), ErrorKind> {
        let got = self.instruction.operands.len();

        if got < min || got > max {
            return Err(ErrorKind::OperandCount { min, max, got });
        }

        Ok(())
    }

    pub fn operand(&self, index: usize) -> Option<&'i Operand> {
        self.instruction.operands.get(index)
    }

    fn required(&self, index: usize) -> Result<&'i Operand, ErrorKind> {
        self.operand(index).ok_or_else(|| ErrorKind::OperandCount {
            min: index + 1,
            max: index + 1,
            got: self.instruction.operands.len(),
        })
    }

    /// Value of an operand.
    pub fn value(&self, index: usize) -> Result<u8, ErrorKind> {
        resolve_value(&self.emulator.machine, self.required(index)?)
    }

    /// Location an operand writes to.
    pub fn destination(&self, index: usize) -> Result<Location, ErrorKind> {
        resolve_destination(self.required(index)?)
    }

    /// Name of a buffer operand.
    pub fn buffer_name(&self, index: usize) -> Result<&'i str, ErrorKind> {
        match self.required(index)? {
            Operand::BufferRef(name) => Ok(name.as_str()),
            other => Err(ErrorKind::InvalidOperand {
                index,
                operand: other.clone(),
            }),
        }
    }

    /// Resolves a label operand to an instruction index.
    pub fn label(&self, index: usize) -> Result<usize, ErrorKind> {
        match self.required(index)? {
            Operand::StringLiteral(name) => self.emulator.program.labels
                .get(name)
                .ok_or_else(|| ErrorKind::UnknownLabel(name.clone())),
            other => Err(ErrorKind::InvalidOperand {
                index,
                operand: other.clone(),
            }),
        }
    }

    pub fn read(&self, location: &Location) -> Result<u8, ErrorKind> {
        self.emulator.machine.read(location)
    }

    /// Stores `value mod 256` and notifies the listeners.
    pub fn write(&mut self, location: &Location, value: u32) -> Result<(), ErrorKind> {
        self.emulator.machine.write(location, value)?;

        let value = truncate(value);
        let event = match location {
            Location::Register(name) => Event::RegisterChange {
                register: name.clone(),
                value,
            },
            Location::Memory(region, address) => Event::MemoryChange {
                region: *region,
                address: *address,
                value,
            },
        };

        self.emulator.events.dispatch(event);

        Ok(())
    }

    pub fn push_return(&mut self, address: usize) {
        self.emulator.state.call_stack.push(address);
    }

    pub fn pop_return(&mut self) -> Option<usize> {
        self.emulator.state.call_stack.pop()
    }

    /// Creates the buffer or empties an existing one.
    pub fn declare_buffer(&mut self, name: &str) {
        self.emulator.machine.buffers.declare(name);
        self.emulator.events.dispatch(Event::BufferChange {
            buffer: name.to_string(),
            length: 0,
        });
    }

    pub fn append_buffer(&mut self, name: &str, value: u32) -> Result<(), ErrorKind> {
        let buffers = &mut self.emulator.machine.buffers;
        buffers.append(name, value)?;
        let length = buffers.len(name)?;

        self.emulator.events.dispatch(Event::BufferChange {
            buffer: name.to_string(),
            length,
        });

        Ok(())
    }

    /// Buffer contents as text, honoring [Config::filter_null].
    pub fn render_buffer(&self, name: &str) -> Result<String, ErrorKind> {
        self.emulator.machine.buffers.render(name, self.emulator.config.filter_null)
    }

    /// Writes text to the output and the transcript.
    pub fn emit(&mut self, text: &str) {
        let text: String = if self.emulator.config.filter_null {
            text.chars().filter(|c| *c != '\0').collect()
        } else {
            text.to_string()
        };

        if text.is_empty() {
            return;
        }

        self.emulator.output.write(&text);
        self.emulator.transcript.push_str(&text);
        self.emulator.events.dispatch(Event::Output(text));
    }

    /// Clears the visible output. The transcript is kept.
    pub fn clear_output(&mut self) {
        self.emulator.output.clear();
        self.emulator.events.dispatch(Event::Flush);
    }

    pub fn poll_key(&mut self) -> Option<u8> {
        let key = self.emulator.input.poll_key();

        if let Some(key) = key {
            trace!(self.emulator.logger, "key received"; "key" => key);
            self.emulator.events.dispatch(Event::KeyPressed(key));
        }

        key
    }

    pub fn stop_requested(&self) -> bool {
        self.emulator.stop.is_stopped()
    }
}

/// The emulator contains the machine state of a single run together with the
/// interfaces for doing IO.
pub struct Emulator<Out, In> {
    program: Arc<Program>,

    /// Handler of every instruction, resolved once on construction.
    handlers: Vec<Option<Handler<Out, In>>>,
    table: OpcodeTable<Out, In>,
    config: Config,

    /// Program counter, call stack and status.
    pub state: ExecutionState,

    /// Memory, registers and buffers.
    pub machine: Machine,

    pub output: Out,
    pub input: In,

    logger: Logger,
    events: EventDispatcher,
    stop: StopHandle,
    trace: VecDeque<TraceEntry>,
    transcript: String,
}

impl<Out, In> Emulator<Out, In>
where
    Out: OutputSink,
    In: InputSource,
{
    /// Create a new emulator with the default [Config] and the builtin opcodes.
    pub fn new(program: Program, output: Out, input: In) -> Emulator<Out, In> {
        Emulator::with_config(program, Config::default(), output, input)
    }

    pub fn with_config(program: Program, config: Config, output: Out, input: In) -> Emulator<Out, In> {
        Emulator::with_table(program, config, OpcodeTable::default(), output, input)
    }

    /// Create a new emulator.
    ///
    /// # Parameters
    /// - `program`: The loaded program.
    /// - `config`: Memory sizes, register conventions and diagnostics settings.
    /// - `table`: The opcodes known to the emulator.
    /// - `output`: The [OutputSink] receiving the text of the program.
    /// - `input`: The [InputSource] used by `waitkey`.
    ///
    /// Unknown opcodes are not an error here. They fault when executed.
    pub fn with_table(
        program: Program,
        config: Config,
        table: OpcodeTable<Out, In>,
        output: Out,
        input: In,
    ) -> Emulator<Out, In> {
        let handlers = program.instructions.iter()
            .map(|instruction| table.get(&instruction.mnemonic))
            .collect();

        Emulator {
            machine: Machine::new(&config),
            program: Arc::new(program),
            handlers,
            table,
            state: ExecutionState::new(),
            output,
            input,
            logger: Logger::root(Discard, o!()),
            events: EventDispatcher::new(),
            stop: StopHandle::new(),
            trace: VecDeque::with_capacity(config.trace_capacity),
            transcript: String::new(),
            config,
        }
    }

    pub fn set_logger<L: Into<Option<Logger>>>(&mut self, logger: L) {
        self.logger = logger
            .into()
            .unwrap_or(Logger::root(Discard, o!()))
            .new(o!("stage" => "execution"));
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.events.add_listener(listener);
    }

    /// Handle for stopping the run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Replaces the stop flag, e.g. with one shared with a key mailbox.
    pub fn set_stop_handle(&mut self, handle: StopHandle) {
        self.stop = handle;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Everything written to the output so far, including text later flushed away.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// The bounded trace of executed instructions and the output transcript.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            executed: self.trace.iter().cloned().collect(),
            output: self.transcript.clone(),
        }
    }

    /// The instruction the program counter points at, if any.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.program.get(self.state.pc)
    }

    /// Executes a single instruction.
    ///
    /// Does nothing once the run has halted or was cancelled.
    ///
    /// # Errors
    /// The fault of the instruction, or the earlier fault if the run already faulted.
    pub fn step(&mut self) -> Result<(), ExecutionError> {
        match &self.state.status {
            Status::Running => (),
            Status::Faulted(error) => return Err(error.clone()),
            Status::Halted | Status::Cancelled => return Ok(()),
        }

        if self.stop.is_stopped() {
            debug!(self.logger, "stop requested"; "pc" => self.state.pc);
            self.state.status = Status::Cancelled;
            return Ok(());
        }

        let pc = self.state.pc;
        let program = Arc::clone(&self.program);

        let instruction = match program.get(pc) {
            Some(instruction) => instruction,
            None => {
                debug!(self.logger, "halted"; "pc" => pc);
                self.state.status = Status::Halted;
                return Ok(());
            }
        };

        trace!(self.logger, "execute"; "pc" => pc, "instruction" => %instruction);

        let handler = self.handlers[pc];

        let result = match handler {
            Some(handler) => {
                let mut ctx = InstructionContext {
                    emulator: self,
                    instruction,
                };

                handler(&mut ctx)
            }
            None => Err(ErrorKind::UnknownInstruction {
                mnemonic: instruction.mnemonic.clone(),
                suggestion: self.table.suggest(&instruction.mnemonic).map(String::from),
            }),
        };

        match result {
            Ok(Flow::Next) => self.state.pc = pc + 1,
            Ok(Flow::Jump(target)) => self.state.pc = target,
            Ok(Flow::Cancel) => {
                debug!(self.logger, "cancelled"; "pc" => pc);
                self.state.status = Status::Cancelled;
                return Ok(());
            }
            Err(kind) => return Err(self.fault(pc, instruction, kind)),
        }

        self.record(pc, instruction);

        Ok(())
    }

    /// Steps until the program halts, is cancelled or faults.
    pub fn run(&mut self) -> Result<Outcome, ExecutionError> {
        loop {
            match &self.state.status {
                Status::Running => self.step()?,
                Status::Halted => return Ok(Outcome::Completed),
                Status::Cancelled => return Ok(Outcome::Cancelled),
                Status::Faulted(error) => return Err(error.clone()),
            }
        }
    }

    /// Human readable snapshot of the program counter, call stack and registers.
    pub fn dump_state(&self) -> String {
        let registers = self.machine.registers.iter()
            .map(|(name, value)| format!("  {} = {}", name, value))
            .join("\n");

        format!(
            "pc: {:04} ({})\ncall stack: [{}]\nregisters:\n{}",
            self.state.pc,
            self.state.status,
            self.state.call_stack.iter().join(", "),
            registers,
        )
    }

    fn record(&mut self, pc: usize, instruction: &Instruction) {
        self.state.last = Some(pc);

        if self.config.trace_capacity == 0 {
            return;
        }

        if self.trace.len() == self.config.trace_capacity {
            self.trace.pop_front();
        }

        self.trace.push_back(TraceEntry {
            pc,
            instruction: instruction.clone(),
        });
    }

    fn fault(&mut self, pc: usize, instruction: &Instruction, kind: ErrorKind) -> ExecutionError {
        debug!(self.logger, "fault"; "pc" => pc, "error" => %kind);

        let error = ExecutionError {
            kind,
            pc,
            instruction: instruction.clone(),
            diagnostics: self.diagnostics(),
        };

        self.state.status = Status::Faulted(error.clone());

        error
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::instruction::Region;
    use crate::io::{TestInput, TestOutput};

    macro_rules! assert_register {
        ($emulator:expr, $register:expr, $value:expr) => {
            assert_eq!(
                $emulator.machine.registers.get($register),
                Ok($value),
                "Register {} != {}", $register, $value
            );
        };
    }

    macro_rules! assert_ram {
        ($emulator:expr, $address:expr, $value:expr) => {
            assert_eq!(
                $emulator.machine.ram.read($address),
                Ok($value),
                "RAM[0x{:x}] != {}", $address, $value
            );
        };
    }

    type TestEmulator = Emulator<TestOutput, TestInput>;

    fn emulator(source: &str) -> TestEmulator {
        emulator_with(source, Config::default(), TestInput::new())
    }

    fn emulator_with(source: &str, config: Config, input: TestInput) -> TestEmulator {
        let program = Program::parse(source).expect("could not parse program");

        Emulator::with_config(program, config, TestOutput::new(), input)
    }

    #[test]
    fn test_output_and_arithmetic() {
        let mut emulator = emulator("
            mov 0x0, 72
            stdout 0x0
            mov 0x1, 105
            stdout 0x1
            add 0x1, 1
            sub 0x0, 2
            xor 0x1, 0x1
        ");

        assert_eq!(emulator.run(), Ok(Outcome::Completed));
        assert_eq!(emulator.output.output(), "Hi");
        assert_ram!(emulator, 0, 70);
        assert_ram!(emulator, 1, 0);
        assert!(emulator.state.is_halted());
        assert_eq!(emulator.state.pc, 7);
    }

    #[test]
    fn test_arithmetic_wraps() {
        let mut emulator = emulator("
            mov 0rrbx, 250
            add 0rrbx, 10
            mov 0rrdx, 3
            sub 0rrdx, 5
            set 0d10, 255
            add 0d10, 0d10
        ");

        emulator.run().unwrap();

        assert_register!(emulator, "rbx", 4);
        assert_register!(emulator, "rdx", 254);
        assert_eq!(emulator.machine.disk.read(0x10), Ok(254));
    }

    #[test]
    fn test_buffers() {
        let mut emulator = emulator("
            setbuffer 0bp
            addbuffer 0bp, 72
            addbuffer 0bp, 105
            addbuffer 0bp, 0
            stdout 0bp
            lenbuffer 0bp
            lenbuffer 0bp, 0x20
            mov 0x21, 0bp
        ");

        emulator.run().unwrap();

        assert_eq!(emulator.output.output(), "Hi");
        assert_register!(emulator, "rax", 3);
        assert_ram!(emulator, 0x20, 3);
        assert_ram!(emulator, 0x21, 72);
    }

    #[test]
    fn test_keep_null() {
        let config = Config::default().filter_null(false);
        let mut emulator = emulator_with("
            setbuffer 0bp
            addbuffer 0bp, 65
            addbuffer 0bp, 0
            stdout 0bp
        ", config, TestInput::new());

        emulator.run().unwrap();

        assert_eq!(emulator.output.output(), "A\0");
    }

    #[test]
    fn test_setbuffer_resets() {
        let mut emulator = emulator("
            setbuffer 0bp
            addbuffer 0bp, 65
            setbuffer 0bp
            lenbuffer 0bp
        ");

        emulator.run().unwrap();

        assert_register!(emulator, "rax", 0);
    }

    #[test]
    fn test_call_and_return() {
        let mut emulator = emulator("
                call greet
                stdout 33
                jmp end
            greet:
                stdout Hello
                ret 7
            end:
        ");

        assert_eq!(emulator.run(), Ok(Outcome::Completed));
        assert_eq!(emulator.output.output(), "Hello!");
        assert_register!(emulator, "rax", 7);
        assert!(emulator.state.call_stack.is_empty());
    }

    #[test]
    fn test_nested_calls() {
        let mut emulator = emulator("
                call outer
                stdout c
                halt
            outer:
                call inner
                stdout b
                ret
            inner:
                stdout a
                retout 33
        ");

        emulator.run().unwrap();

        assert_eq!(emulator.output.output(), "a!bc");
        assert_register!(emulator, "rax", 0);
    }

    #[test]
    fn test_return_with_empty_stack_halts() {
        let mut emulator = emulator("
            stdout a
            ret 5
            stdout b
        ");

        assert_eq!(emulator.run(), Ok(Outcome::Completed));
        assert_eq!(emulator.output.output(), "a");
        assert_register!(emulator, "rax", 5);
    }

    #[test]
    fn test_jump_loop() {
        let mut emulator = emulator("
                mov 0rrbx, 0
            again:
                stdout x
                add 0rrbx, 1
                jmp again
        ");

        // The program never halts on its own; run a bounded number of steps.
        for _ in 0..10 {
            emulator.step().unwrap();
        }

        assert_eq!(emulator.output.output(), "xxx");
        assert_register!(emulator, "rbx", 3);
        assert_eq!(emulator.state.pc, 1);
        assert!(!emulator.state.is_halted());
    }

    #[test]
    fn test_unknown_label_faults_before_mutation() {
        let mut emulator = emulator("
            stdout a
            call nowhere
        ");

        let err = emulator.run().unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownLabel("nowhere".into()));
        assert_eq!(err.pc, 1);
        assert_eq!(err.instruction.line, 3);
        assert!(emulator.state.call_stack.is_empty());
        assert_eq!(emulator.state.pc, 1);
        assert_eq!(err.diagnostics.output, "a");
        assert_eq!(err.diagnostics.executed.len(), 1);

        // The fault is sticky.
        assert_eq!(emulator.step(), Err(err.clone()));
        assert_eq!(emulator.run(), Err(err));

        let mut emulator = self::emulator("
            stdout a
            jmp nowhere
            stdout b
        ");

        let err = emulator.run().unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownLabel("nowhere".into()));
        assert_eq!(err.pc, 1);
        assert_eq!(emulator.state.pc, 1);
        assert_eq!(emulator.state.last, Some(0));
        assert_eq!(emulator.output.output(), "a");
    }

    #[test]
    fn test_stdout_high_bytes() {
        let mut emulator = emulator("
            stdout 255
            mov 0rrbx, 233
            stdout 0rrbx
            retout 252
        ");

        assert_eq!(emulator.run(), Ok(Outcome::Completed));
        assert_eq!(emulator.output.output(), "\u{ff}\u{e9}\u{fc}");
        assert_register!(emulator, "rax", 252);
    }

    #[test]
    fn test_unknown_instruction_suggests() {
        let mut emulator = emulator("
            jmp skip
            stdot a
            skip:
            stdout b
            frobnicate
        ");

        let err = emulator.run().unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownInstruction {
            mnemonic: "frobnicate".into(),
            suggestion: None,
        });
        assert_eq!(emulator.output.output(), "b");

        let mut emulator = self::emulator("stdot a");
        let err = emulator.run().unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownInstruction {
            mnemonic: "stdot".into(),
            suggestion: Some("stdout".into()),
        });
    }

    #[test]
    fn test_runtime_faults() {
        let cases = vec![
            ("mov 0xFFF, 1\nmov 0x1000, 1", ErrorKind::AddressOutOfRange {
                region: Region::Ram,
                address: 0x1000,
                capacity: 0x1000,
            }),
            ("addbuffer 0bq, 1", ErrorKind::UninitializedBuffer("q".into())),
            ("stdout 0bq", ErrorKind::UninitializedBuffer("q".into())),
            ("mov 5, 1", ErrorKind::InvalidDestination(Operand::Immediate(5))),
            ("mov 0x0", ErrorKind::OperandCount { min: 2, max: 2, got: 1 }),
            ("halt 1", ErrorKind::OperandCount { min: 0, max: 0, got: 1 }),
            ("jmp 0x10", ErrorKind::InvalidOperand {
                index: 0,
                operand: Operand::RamAddress(0x10),
            }),
            ("setbuffer 0x1", ErrorKind::InvalidOperand {
                index: 0,
                operand: Operand::RamAddress(1),
            }),
        ];

        for (source, kind) in cases {
            let err = emulator(source).run().unwrap_err();
            assert_eq!(err.kind, kind, "{}", source);
        }
    }

    #[test]
    fn test_strict_registers() {
        let source = "mov 0x0, 0rrbx";

        let mut lenient = emulator(source);
        assert_eq!(lenient.run(), Ok(Outcome::Completed));

        let config = Config::default().strict_registers(true);
        let mut strict = emulator_with(source, config, TestInput::new());
        let err = strict.run().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UninitializedRegister("rbx".into()));

        let config = Config::default().strict_registers(true);
        let mut strict = emulator_with("mov 0x0, 0rrax", config, TestInput::new());
        assert_eq!(strict.run(), Ok(Outcome::Completed));
    }

    #[test]
    fn test_small_regions() {
        let config = Config::default().ram_size(4).disk_size(0);
        let mut emulator = emulator_with("mov 0x3, 1\nmov 0d0, 1", config, TestInput::new());
        let err = emulator.run().unwrap_err();

        assert_eq!(err.kind, ErrorKind::AddressOutOfRange {
            region: Region::Disk,
            address: 0,
            capacity: 0,
        });
        assert_ram!(emulator, 3, 1);
    }

    #[test]
    fn test_flush() {
        let mut emulator = emulator("
            stdout Hello
            stdoutflush
            stdout World
        ");

        emulator.run().unwrap();

        assert_eq!(emulator.output.output(), "World");
        assert_eq!(emulator.output.clears(), 1);
        assert_eq!(emulator.transcript(), "HelloWorld");
    }

    #[test]
    fn test_waitkey() {
        let mut emulator = emulator_with("
            waitkey
            waitkey 0x5
            stdout 0rrcx
            stdout 0x5
        ", Config::default(), TestInput::with_keys(vec![b'o', b'k']));

        emulator.run().unwrap();

        assert_eq!(emulator.output.output(), "ok");
        assert_register!(emulator, "rcx", b'o');
        assert_eq!(emulator.input.remaining(), 0);
    }

    #[test]
    fn test_stop_before_step() {
        let mut emulator = emulator("
            stdout a
            waitkey
            stdout b
        ");

        emulator.step().unwrap();

        let stop = emulator.stop_handle();
        stop.stop();

        assert_eq!(emulator.run(), Ok(Outcome::Cancelled));
        assert_eq!(emulator.output.output(), "a");
        assert_eq!(emulator.state.status, Status::Cancelled);

        // Cancellation is final.
        assert_eq!(emulator.step(), Ok(()));
        assert_eq!(emulator.state.pc, 1);
    }

    #[test]
    fn test_trace_is_bounded() {
        let config = Config::default().trace_capacity(2);
        let mut emulator = emulator_with("
            nop
            nop
            stdout a
            mov 0x0
        ", config, TestInput::new());

        let err = emulator.run().unwrap_err();
        let pcs: Vec<usize> = err.diagnostics.executed.iter().map(|entry| entry.pc).collect();

        assert_eq!(pcs, vec![1, 2]);
        assert!(err.report().contains("0002 (line 4): stdout a"));
    }

    #[test]
    fn test_halt_and_empty_program() {
        let mut emulator = emulator("stdout a\nhalt\nstdout b");
        emulator.run().unwrap();
        assert_eq!(emulator.output.output(), "a");

        let mut emulator = emulator_with("; nothing\n", Config::default(), TestInput::new());
        assert_eq!(emulator.run(), Ok(Outcome::Completed));
        assert_eq!(emulator.state.last, None);
    }

    #[test]
    fn test_events() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();

        let mut emulator = emulator("
            mov 0rrbx, 300
            setbuffer 0bp
            addbuffer 0bp, 65
            stdout 0bp
            stdoutflush
        ");

        emulator.add_listener(move |event: &Event| sink.borrow_mut().push(event.clone()));
        emulator.run().unwrap();

        assert_eq!(*events.borrow(), vec![
            Event::RegisterChange { register: "rbx".into(), value: 44 },
            Event::BufferChange { buffer: "p".into(), length: 0 },
            Event::BufferChange { buffer: "p".into(), length: 1 },
            Event::Output("A".into()),
            Event::Flush,
        ]);
    }

    #[test]
    fn test_deterministic() {
        let source = include_str!("../tests/programs/counter.asm");

        let run = || {
            let mut emulator = emulator(source);
            emulator.run().unwrap();
            (emulator.output.into_output(), emulator.machine.registers.iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect::<Vec<_>>())
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_dump_state() {
        let mut emulator = emulator("mov 0rrbx, 2\ncall f\nf:\nnop");

        emulator.step().unwrap();
        emulator.step().unwrap();

        assert_eq!(
            emulator.dump_state(),
            "pc: 0002 (running)\ncall stack: [2]\nregisters:\n  rax = 0\n  rbx = 2\n  rcx = 0"
        );
    }
}
