//! Event handling.
//!
//! This library exposes an event-based interface for reacting
//! to the state changes of the emulator in real-time. [EventListeners](EventListener)
//! can be registered on the [Emulator](crate::emulator::Emulator) with the
//! [add_listener](crate::emulator::Emulator::add_listener) method.
//!
//! A blanket implementation of [EventListener] for all `FnMut(&Event)` is provided.

use crate::instruction::Region;

/// Represents an event that occurred while executing a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The program modified a register.
    RegisterChange {
        /// The register which was modified.
        register: String,

        /// The new value of the register.
        value: u8,
    },

    /// The program modified a memory cell.
    MemoryChange {
        region: Region,

        /// The address of the changed cell.
        address: usize,

        /// New value of the changed cell.
        value: u8,
    },

    /// The program declared, reset or appended to a buffer.
    BufferChange {
        buffer: String,

        /// Length of the buffer after the change.
        length: usize,
    },

    /// Text was written to the output.
    Output(String),

    /// The output was cleared.
    Flush,

    /// `waitkey` received a key.
    KeyPressed(u8),
}

/// Trait for consuming events.
pub trait EventListener {
    /// Called whenever a new event has been created.
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F where F: FnMut(&Event) {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener) as Box<dyn EventListener>)
    }

    pub fn dispatch(&mut self, event: Event) {
        for listener in &mut self.listeners {
            listener.event(&event);
        }
    }
}
