use bytecpu::{
    emulator::{Emulator, Outcome},
    instruction::{Instruction, Operand},
    io::{TestInput, TestOutput},
    symbolic::Program,
};

use slog::{o, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

fn read_program() -> Program {
    let source = include_str!("programs/hello.asm");

    Program::parse(source).expect("could not parse hello.asm")
}

#[test]
fn test_hello_read_program() {
    let p = read_program();

    assert_eq!(p.len(), 16);

    assert_eq!(p.labels.get("main"), Some(0));
    assert_eq!(p.labels.get("greet"), Some(4));
    assert_eq!(p.labels.get("world"), Some(14));
    assert_eq!(p.labels.get("missing"), None);

    assert_eq!(p.instructions[0], Instruction {
        mnemonic: "call".into(),
        operands: vec![Operand::StringLiteral("greet".into())],
        line: 4,
    });

    assert_eq!(p.instructions[4], Instruction {
        mnemonic: "mov".into(),
        operands: vec![Operand::RamAddress(0), Operand::Immediate(72)],
        line: 10,
    });
}

#[test]
fn test_hello_emulate() {
    let mut output = TestOutput::new();
    let mut emulator = Emulator::new(read_program(), &mut output, TestInput::new());

    assert_eq!(emulator.run(), Ok(Outcome::Completed));
    assert_eq!(emulator.machine.registers.get("rax"), Ok(33));
    assert!(emulator.state.call_stack.is_empty());

    drop(emulator);

    assert_eq!(output.output(), "Hello World!");
}

#[test]
fn test_hello_with_logger() {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let program = Program::parse_with_logger(include_str!("programs/hello.asm"), logger.clone())
        .expect("could not parse hello.asm");

    let mut emulator = Emulator::new(program, TestOutput::new(), TestInput::new());
    emulator.set_logger(logger);

    while !emulator.state.is_halted() {
        println!("{:?}", emulator.current_instruction());
        emulator.step().expect("error while executing the program");
    }

    assert_eq!(emulator.output.output(), "Hello World!");
}
