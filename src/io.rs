//! Interfaces to the output and input devices, and the plumbing between a key capture
//! thread and the emulator.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Receives the text produced by the program.
pub trait OutputSink {
    /// Called by the output producing instructions. Append only.
    fn write(&mut self, text: &str);

    /// Called by `stdoutflush`. Resets the accumulated output.
    fn clear(&mut self);
}

/// Source of key presses for `waitkey`.
pub trait InputSource {
    /// Returns the next key if one is available.
    ///
    /// May block for a bounded time; the emulator calls this repeatedly, checking for a
    /// stop request in between.
    fn poll_key(&mut self) -> Option<u8>;
}

/// Cooperative cancellation flag shared between the emulator and whoever drives it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> StopHandle {
        StopHandle::default()
    }

    /// Requests the emulator to stop before its next step.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An output sink that writes to the terminal standard output.
///
/// Clearing the output starts a new line. Errors writing to the terminal are ignored.
pub struct StdOutput;

impl OutputSink for StdOutput {
    fn write(&mut self, text: &str) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
        let _ = lock.flush();
    }

    fn clear(&mut self) {
        println!();
    }
}

/// An output sink for testing purposes.
///
/// Keeps the text written since the last clear.
#[derive(Debug, Default)]
pub struct TestOutput {
    buffer: String,
    clears: usize,
}

impl TestOutput {
    pub fn new() -> TestOutput {
        TestOutput::default()
    }

    /// Text written since the last clear.
    pub fn output(&self) -> &str {
        &self.buffer
    }

    /// Number of times the output was cleared.
    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn into_output(self) -> String {
        self.buffer
    }
}

impl OutputSink for TestOutput {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.clears += 1;
    }
}

impl OutputSink for &mut TestOutput {
    fn write(&mut self, text: &str) {
        (**self).write(text)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

/// An input source for testing purposes.
///
/// Hands out pre-determined keys in order. Once they run out it never yields again, so a
/// `waitkey` then only ends through a stop request.
#[derive(Debug, Default)]
pub struct TestInput {
    keys: VecDeque<u8>,
}

impl TestInput {
    pub fn new() -> TestInput {
        TestInput::default()
    }

    pub fn with_keys<I: IntoIterator<Item = u8>>(keys: I) -> TestInput {
        TestInput {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn push(&mut self, key: u8) {
        self.keys.push_back(key);
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl InputSource for TestInput {
    fn poll_key(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }
}

impl InputSource for &mut TestInput {
    fn poll_key(&mut self) -> Option<u8> {
        (**self).poll_key()
    }
}

#[derive(Debug, Default)]
struct Slot {
    key: Option<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Creates a single-slot key mailbox.
///
/// The [KeySender] side overwrites the slot with every key, the [KeyMailbox] side takes
/// whatever is in it. Keys sent faster than they are polled are lost: the last key wins.
pub fn mailbox(poll_interval: Duration) -> (KeySender, KeyMailbox) {
    let shared = Arc::new(Shared::default());

    let sender = KeySender {
        shared: shared.clone(),
    };

    let receiver = KeyMailbox {
        shared,
        poll_interval,
        on_close: None,
    };

    (sender, receiver)
}

/// Producer side of a [mailbox]. Dropping it closes the mailbox.
#[derive(Debug)]
pub struct KeySender {
    shared: Arc<Shared>,
}

impl KeySender {
    /// Replaces the key in the slot.
    pub fn send(&self, key: u8) {
        self.shared.lock().key = Some(key);
        self.shared.ready.notify_one();
    }
}

impl Drop for KeySender {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_one();
    }
}

/// Consumer side of a [mailbox].
#[derive(Debug)]
pub struct KeyMailbox {
    shared: Arc<Shared>,
    poll_interval: Duration,
    on_close: Option<StopHandle>,
}

impl KeyMailbox {
    /// Stops the given handle once the sender is gone and the slot is drained.
    pub fn stop_on_close(mut self, handle: StopHandle) -> KeyMailbox {
        self.on_close = Some(handle);
        self
    }
}

impl InputSource for KeyMailbox {
    fn poll_key(&mut self) -> Option<u8> {
        let mut slot = self.shared.lock();

        if slot.key.is_none() && !slot.closed {
            slot = match self.shared.ready.wait_timeout(slot, self.poll_interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        let key = slot.key.take();

        if key.is_none() && slot.closed {
            if let Some(handle) = &self.on_close {
                handle.stop();
            }
        }

        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_mailbox_last_key_wins() {
        let (sender, mut receiver) = mailbox(Duration::from_millis(1));

        sender.send(b'a');
        sender.send(b'b');

        assert_eq!(receiver.poll_key(), Some(b'b'));
        assert_eq!(receiver.poll_key(), None);
    }

    #[test]
    fn test_mailbox_from_thread() {
        let (sender, mut receiver) = mailbox(Duration::from_millis(5));

        let producer = thread::spawn(move || {
            sender.send(b'x');
        });

        let mut key = None;

        for _ in 0..1000 {
            key = receiver.poll_key();

            if key.is_some() {
                break;
            }
        }

        producer.join().unwrap();
        assert_eq!(key, Some(b'x'));
    }

    #[test]
    fn test_mailbox_close_stops() {
        let stop = StopHandle::new();
        let (sender, receiver) = mailbox(Duration::from_millis(1));
        let mut receiver = receiver.stop_on_close(stop.clone());

        sender.send(b'q');
        drop(sender);

        assert_eq!(receiver.poll_key(), Some(b'q'));
        assert!(!stop.is_stopped());
        assert_eq!(receiver.poll_key(), None);
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_test_output() {
        let mut output = TestOutput::new();
        output.write("ab");
        output.clear();
        output.write("c");

        assert_eq!(output.output(), "c");
        assert_eq!(output.clears(), 1);
    }
}
