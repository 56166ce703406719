//! Construction parameters of an [Emulator](crate::emulator::Emulator).

use std::time::Duration;

/// Capacity of RAM and Disk used by every known program.
pub const DEFAULT_REGION_SIZE: usize = 4096;

/// Settings for a single run.
///
/// ```
/// use bytecpu::config::Config;
///
/// let config = Config::default()
///     .ram_size(256)
///     .strict_registers(true);
///
/// assert_eq!(config.ram_size, 256);
/// assert_eq!(config.disk_size, 4096);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of addressable RAM cells.
    pub ram_size: usize,

    /// Number of addressable Disk cells.
    pub disk_size: usize,

    /// Register receiving the value of `ret`, `retout` and `lenbuffer`.
    pub result_register: String,

    /// Register receiving the key read by `waitkey` when no destination is given.
    pub key_register: String,

    /// Fail with `UninitializedRegister` instead of reading 0 from unwritten registers.
    pub strict_registers: bool,

    /// Drop null characters before they reach the output.
    pub filter_null: bool,

    /// How many executed instructions are kept for diagnostics.
    pub trace_capacity: usize,

    /// Upper bound for a single wait on the key mailbox.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            ram_size: DEFAULT_REGION_SIZE,
            disk_size: DEFAULT_REGION_SIZE,
            result_register: "rax".to_string(),
            key_register: "rcx".to_string(),
            strict_registers: false,
            filter_null: true,
            trace_capacity: 64,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl Config {
    pub fn ram_size(mut self, size: usize) -> Config {
        self.ram_size = size;
        self
    }

    pub fn disk_size(mut self, size: usize) -> Config {
        self.disk_size = size;
        self
    }

    pub fn result_register<S: Into<String>>(mut self, name: S) -> Config {
        self.result_register = name.into();
        self
    }

    pub fn key_register<S: Into<String>>(mut self, name: S) -> Config {
        self.key_register = name.into();
        self
    }

    pub fn strict_registers(mut self, strict: bool) -> Config {
        self.strict_registers = strict;
        self
    }

    pub fn filter_null(mut self, filter: bool) -> Config {
        self.filter_null = filter;
        self
    }

    pub fn trace_capacity(mut self, capacity: usize) -> Config {
        self.trace_capacity = capacity;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Config {
        self.poll_interval = interval;
        self
    }
}
