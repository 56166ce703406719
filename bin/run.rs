use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::thread;

use clap::{App, Arg, ArgMatches};
use slog::{o, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use bytecpu::{
    config::Config,
    emulator::{Emulator, Outcome},
    error::{ExecutionError, ParseError},
    io::{mailbox, KeySender, StdOutput, StopHandle},
    symbolic::Program,
};

enum Error {
    Arguments(String),
    Parse(ParseError),
    Execution(ExecutionError),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Error {
        Error::Parse(e)
    }
}

impl From<ExecutionError> for Error {
    fn from(e: ExecutionError) -> Error {
        Error::Execution(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Arguments(msg) => write!(f, "Invalid arguments: {}", msg),
            Error::Parse(e) => write!(f, "Parse error {}", e),
            Error::Execution(e) => write!(f, "Execution error: {}", e.report()),
            Error::IO(e) => write!(f, "IO error: {}", e),
        }
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("bytecpurun")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Mitja Karhusaari <mitja@karhusaari.me>")
        .about("Utility for loading and executing byte machine programs")
        .arg(Arg::with_name("source")
             .help("File containing assembly source")
             .value_name("SOURCE")
             .required(true)
             .index(1))
        .arg(Arg::with_name("ram-size")
             .help("Number of RAM cells")
             .long("ram-size")
             .value_name("CELLS")
             .takes_value(true))
        .arg(Arg::with_name("disk-size")
             .help("Number of Disk cells")
             .long("disk-size")
             .value_name("CELLS")
             .takes_value(true))
        .arg(Arg::with_name("trace")
             .help("Number of executed instructions shown on a fault")
             .long("trace")
             .value_name("COUNT")
             .takes_value(true))
        .arg(Arg::with_name("strict-registers")
             .help("Fail on reads of registers that were never written")
             .long("strict-registers"))
        .arg(Arg::with_name("keep-null")
             .help("Write null characters to the output")
             .long("keep-null"))
        .arg(Arg::with_name("dump")
             .help("Print the registers and call stack after the run")
             .long("dump")
             .short("d"))
        .arg(Arg::with_name("verbose")
             .help("Log every loaded and executed instruction")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn number<T: FromStr>(args: &ArgMatches, name: &str) -> Result<Option<T>, Error> {
    match args.value_of(name) {
        None => Ok(None),
        Some(value) => value.parse()
            .map(Some)
            .map_err(|_| Error::Arguments(format!("--{} expects a number, got '{}'", name, value))),
    }
}

fn config(args: &ArgMatches) -> Result<Config, Error> {
    let mut config = Config::default()
        .strict_registers(args.is_present("strict-registers"))
        .filter_null(!args.is_present("keep-null"));

    if let Some(size) = number(args, "ram-size")? {
        config = config.ram_size(size);
    }

    if let Some(size) = number(args, "disk-size")? {
        config = config.disk_size(size);
    }

    if let Some(capacity) = number(args, "trace")? {
        config = config.trace_capacity(capacity);
    }

    Ok(config)
}

/// Forwards every byte of the standard input as a key press. The sender is dropped at
/// the end of input, which closes the mailbox.
fn capture_stdin(sender: KeySender) {
    thread::spawn(move || {
        for byte in std::io::stdin().bytes() {
            match byte {
                Ok(byte) => sender.send(byte),
                Err(_) => break,
            }
        }
    });
}

fn main() {
    let args = parse_arguments();

    let logger = if args.is_present("verbose") {
        let decorator = TermDecorator::new().build();
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Some(Logger::root(drain, o!()))
    } else {
        None
    };

    if let Err(e) = run(&args, logger) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &ArgMatches, logger: Option<Logger>) -> Result<(), Error> {
    let file_path = args.value_of("source")
        .ok_or_else(|| Error::Arguments("no source file".to_string()))?;

    let config = config(args)?;
    let source = std::fs::read_to_string(file_path)?;

    let program = match &logger {
        Some(logger) => Program::parse_with_logger(&source, logger.clone())?,
        None => Program::parse(&source)?,
    };

    // A waitkey after the end of input would never return.
    let stop = StopHandle::new();
    let (sender, receiver) = mailbox(config.poll_interval);
    let receiver = receiver.stop_on_close(stop.clone());

    let mut emulator = Emulator::with_config(program, config, StdOutput, receiver);
    emulator.set_stop_handle(stop);
    emulator.set_logger(logger);

    capture_stdin(sender);

    let result = emulator.run();

    println!();

    if args.is_present("dump") {
        println!("{}", emulator.dump_state());
    }

    if result? == Outcome::Cancelled {
        eprintln!("Execution cancelled: no more input");
    }

    Ok(())
}
