//! Classification of operand tokens and their resolution against a [Machine].
//!
//! | Prefix / shape | Kind                        |
//! |----------------|-----------------------------|
//! | all digits     | [Operand::Immediate]        |
//! | `0r<name>`     | [Operand::Register]         |
//! | `0x<hex>`      | [Operand::RamAddress]       |
//! | `0d<hex>`      | [Operand::DiskAddress]      |
//! | `0b<name>`     | [Operand::BufferRef]        |
//! | anything else  | [Operand::StringLiteral]    |

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, hex_digit1},
    combinator::{all_consuming, map, rest},
    sequence::preceded,
};

use crate::error::{ErrorKind, ParseErrorKind};
use crate::instruction::{Operand, Region};
use crate::memory::{Location, Machine};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape<'a> {
    Digits(&'a str),
    Register(&'a str),
    Ram(&'a str),
    Disk(&'a str),
    Buffer(&'a str),
    Literal(&'a str),
}

fn shape(input: &str) -> IResult<&str, Shape> {
    alt((
        map(preceded(tag("0r"), rest), Shape::Register),
        map(preceded(tag("0x"), rest), Shape::Ram),
        map(preceded(tag("0d"), rest), Shape::Disk),
        map(preceded(tag("0b"), rest), Shape::Buffer),
        map(all_consuming(digit1), Shape::Digits),
        map(rest, Shape::Literal),
    ))(input)
}

fn hex_u16(digits: &str) -> Option<u16> {
    let parsed: IResult<&str, &str> = all_consuming(hex_digit1)(digits);

    parsed.ok()
        .and_then(|(_, hex)| u16::from_str_radix(hex, 16).ok())
}

/// Digits are accumulated modulo 256, so any length is accepted.
fn immediate(digits: &str) -> u8 {
    digits.bytes()
        .fold(0u8, |acc, digit| acc.wrapping_mul(10).wrapping_add(digit - b'0'))
}

/// Classifies a raw operand token.
///
/// # Errors
/// - `InvalidAddress` if a `0x`/`0d` token is not followed by a hexadecimal `u16`.
/// - `InvalidOperand` if a `0r`/`0b` token has no name.
pub fn classify(token: &str) -> Result<Operand, ParseErrorKind> {
    let shape = match shape(token) {
        Ok((_, shape)) => shape,
        Err(_) => Shape::Literal(token),
    };

    match shape {
        Shape::Digits(digits) => Ok(Operand::Immediate(immediate(digits))),
        Shape::Ram(digits) => hex_u16(digits)
            .map(Operand::RamAddress)
            .ok_or_else(|| ParseErrorKind::InvalidAddress(token.to_string())),
        Shape::Disk(digits) => hex_u16(digits)
            .map(Operand::DiskAddress)
            .ok_or_else(|| ParseErrorKind::InvalidAddress(token.to_string())),
        Shape::Register("") | Shape::Buffer("") => {
            Err(ParseErrorKind::InvalidOperand(token.to_string()))
        }
        Shape::Register(name) => Ok(Operand::Register(name.to_string())),
        Shape::Buffer(name) => Ok(Operand::BufferRef(name.to_string())),
        Shape::Literal(text) => Ok(Operand::StringLiteral(text.to_string())),
    }
}

/// Reads the byte an operand stands for.
///
/// Buffers yield their first byte (0 when empty) and literals the code of their first
/// character, truncated to 8 bits.
pub fn resolve_value(machine: &Machine, operand: &Operand) -> Result<u8, ErrorKind> {
    match operand {
        Operand::Immediate(value) => Ok(*value),
        Operand::Register(name) => machine.registers.get(name),
        Operand::RamAddress(addr) => machine.ram.read(*addr as usize),
        Operand::DiskAddress(addr) => machine.disk.read(*addr as usize),
        Operand::BufferRef(name) => machine.buffers.bytes(name)
            .map(|bytes| bytes.first().copied().unwrap_or(0)),
        Operand::StringLiteral(text) => Ok(text.chars()
            .next()
            .map(|c| (c as u32 & 0xFF) as u8)
            .unwrap_or(0)),
    }
}

/// Maps an operand to the location a write goes to.
///
/// # Errors
/// `InvalidDestination` for anything but registers and memory addresses.
pub fn resolve_destination(operand: &Operand) -> Result<Location, ErrorKind> {
    match operand {
        Operand::Register(name) => Ok(Location::Register(name.clone())),
        Operand::RamAddress(addr) => Ok(Location::Memory(Region::Ram, *addr as usize)),
        Operand::DiskAddress(addr) => Ok(Location::Memory(Region::Disk, *addr as usize)),
        other => Err(ErrorKind::InvalidDestination(other.clone())),
    }
}
