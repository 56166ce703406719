//! The memory subsystem: RAM, Disk, registers and buffers.
//!
//! Every stored value is truncated to 8 bits at the boundary of these types, so
//! the instruction handlers can compute with wider integers.

use std::collections::{BTreeMap, HashMap};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::instruction::Region;

/// Truncates a value to a byte.
pub fn truncate(value: u32) -> u8 {
    (value & 0xFF) as u8
}

/// Converts a byte into the character with the same code point. Every byte has one.
pub fn printable(value: u8) -> char {
    value as char
}

/// A fixed-capacity byte addressable memory region.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    region: Region,
    cells: Vec<u8>,
}

impl MemoryRegion {
    pub fn new(region: Region, capacity: usize) -> MemoryRegion {
        MemoryRegion {
            region,
            cells: vec![0; capacity],
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn out_of_range(&self, address: usize) -> ErrorKind {
        ErrorKind::AddressOutOfRange {
            region: self.region,
            address,
            capacity: self.cells.len(),
        }
    }

    /// Reads the byte at `address`.
    ///
    /// # Errors
    /// `AddressOutOfRange` if `address` is not below the capacity.
    pub fn read(&self, address: usize) -> Result<u8, ErrorKind> {
        self.cells.get(address)
            .copied()
            .ok_or_else(|| self.out_of_range(address))
    }

    /// Stores `value mod 256` at `address`.
    ///
    /// # Errors
    /// `AddressOutOfRange` if `address` is not below the capacity.
    pub fn write(&mut self, address: usize, value: u32) -> Result<(), ErrorKind> {
        if address >= self.cells.len() {
            return Err(self.out_of_range(address));
        }

        self.cells[address] = truncate(value);

        Ok(())
    }
}

/// Named single byte registers. Names are introduced by writing to them.
#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    values: BTreeMap<String, u8>,
    strict: bool,
}

impl RegisterBank {
    /// Creates a bank with the given registers declared as zero.
    pub fn new<'a, I: IntoIterator<Item = &'a str>>(declared: I, strict: bool) -> RegisterBank {
        RegisterBank {
            values: declared.into_iter().map(|name| (name.to_string(), 0)).collect(),
            strict,
        }
    }

    /// Value of a register. Unwritten registers read as 0 unless the bank is strict.
    pub fn get(&self, name: &str) -> Result<u8, ErrorKind> {
        match self.values.get(name) {
            Some(value) => Ok(*value),
            None if self.strict => Err(ErrorKind::UninitializedRegister(name.to_string())),
            None => Ok(0),
        }
    }

    pub fn set(&mut self, name: &str, value: u32) {
        self.values.insert(name.to_string(), truncate(value));
    }

    /// All written registers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

/// Named growable byte sequences, created with `setbuffer`.
#[derive(Debug, Clone, Default)]
pub struct Buffers {
    inner: HashMap<String, Vec<u8>>,
}

impl Buffers {
    /// Creates the buffer or empties an existing one.
    pub fn declare(&mut self, name: &str) {
        self.inner.insert(name.to_string(), Vec::new());
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8], ErrorKind> {
        self.inner.get(name)
            .map(|bytes| &bytes[..])
            .ok_or_else(|| ErrorKind::UninitializedBuffer(name.to_string()))
    }

    /// Appends `value mod 256`.
    pub fn append(&mut self, name: &str, value: u32) -> Result<(), ErrorKind> {
        self.inner.get_mut(name)
            .ok_or_else(|| ErrorKind::UninitializedBuffer(name.to_string()))?
            .push(truncate(value));

        Ok(())
    }

    pub fn len(&self, name: &str) -> Result<usize, ErrorKind> {
        self.bytes(name).map(<[u8]>::len)
    }

    /// Converts the buffer to text in insertion order, dropping null bytes if `filter_null`.
    pub fn render(&self, name: &str, filter_null: bool) -> Result<String, ErrorKind> {
        Ok(self.bytes(name)?
            .iter()
            .filter(|byte| !filter_null || **byte != 0)
            .map(|byte| printable(*byte))
            .collect())
    }
}

/// A writable location an operand resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Register(String),
    Memory(Region, usize),
}

/// All state mutated by instruction handlers.
#[derive(Debug, Clone)]
pub struct Machine {
    pub ram: MemoryRegion,
    pub disk: MemoryRegion,
    pub registers: RegisterBank,
    pub buffers: Buffers,
}

impl Machine {
    pub fn new(config: &Config) -> Machine {
        let declared = vec![config.result_register.as_str(), config.key_register.as_str()];

        Machine {
            ram: MemoryRegion::new(Region::Ram, config.ram_size),
            disk: MemoryRegion::new(Region::Disk, config.disk_size),
            registers: RegisterBank::new(declared, config.strict_registers),
            buffers: Buffers::default(),
        }
    }

    pub fn region(&self, region: Region) -> &MemoryRegion {
        match region {
            Region::Ram => &self.ram,
            Region::Disk => &self.disk,
        }
    }

    pub fn region_mut(&mut self, region: Region) -> &mut MemoryRegion {
        match region {
            Region::Ram => &mut self.ram,
            Region::Disk => &mut self.disk,
        }
    }

    pub fn read(&self, location: &Location) -> Result<u8, ErrorKind> {
        match location {
            Location::Register(name) => self.registers.get(name),
            Location::Memory(region, address) => self.region(*region).read(*address),
        }
    }

    pub fn write(&mut self, location: &Location, value: u32) -> Result<(), ErrorKind> {
        match location {
            Location::Register(name) => {
                self.registers.set(name, value);
                Ok(())
            }
            Location::Memory(region, address) => self.region_mut(*region).write(*address, value),
        }
    }
}
