//! Mock HID transport for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{HidTransport, TransportError};
use crate::protocol::Packet;
use crate::protocol::constants::OFFSET_STATUS;

/// Mock transport for unit testing session logic.
///
/// Clones share state, so a test can keep one handle while a session owns
/// another.
#[derive(Clone)]
pub struct MockTransport {
    /// Queued replies to return on read.
    reply_queue: Arc<Mutex<VecDeque<Packet>>>,
    /// Reply the device sends only after the host has given up waiting.
    late_reply: Arc<Mutex<Option<Packet>>>,
    /// Captured writes.
    write_log: Arc<Mutex<Vec<Packet>>>,
    /// Echo the last written command with status 0 when the queue is empty.
    auto_echo: Arc<AtomicBool>,
    /// Fail every write.
    fail_writes: Arc<AtomicBool>,
    /// Whether device is "connected".
    connected: Arc<AtomicBool>,
    /// Number of `close` calls.
    closes: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            reply_queue: Arc::new(Mutex::new(VecDeque::new())),
            late_reply: Arc::new(Mutex::new(None)),
            write_log: Arc::new(Mutex::new(Vec::new())),
            auto_echo: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(true)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock that acknowledges every command.
    pub fn echoing() -> Self {
        let mock = Self::new();
        mock.set_auto_echo(true);
        mock
    }

    /// Queue a reply to be returned on next read.
    pub fn queue_reply(&self, packet: Packet) {
        self.reply_queue.lock().unwrap().push_back(packet);
    }

    /// Queue a status-only reply.
    pub fn queue_status(&self, command: u8, status: u8) {
        let mut p = Packet::new(command);
        p.as_mut_bytes()[OFFSET_STATUS] = status;
        self.queue_reply(p);
    }

    /// Answer the next read with a timeout, the device's `packet` arriving
    /// too late. Like a real transport, the timed-out read discards it.
    pub fn queue_late_reply(&self, packet: Packet) {
        *self.late_reply.lock().unwrap() = Some(packet);
    }

    pub fn set_auto_echo(&self, enabled: bool) {
        self.auto_echo.store(enabled, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Packet> {
        self.write_log.lock().unwrap().clone()
    }

    /// Command bytes of all captured writes, in order.
    pub fn written_commands(&self) -> Vec<u8> {
        self.write_log
            .lock()
            .unwrap()
            .iter()
            .map(Packet::command)
            .collect()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Replies still waiting in the queue.
    pub fn pending_replies(&self) -> usize {
        self.reply_queue.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Simulate device reconnect.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for MockTransport {
    fn write_packet(&self, packet: &Packet) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::WriteFailed("injected failure".into()));
        }
        self.write_log.lock().unwrap().push(packet.clone());
        Ok(())
    }

    fn read_packet(&self, packet: &mut Packet) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        if let Some(late) = self.late_reply.lock().unwrap().take() {
            tracing::debug!(cmd = late.command(), "Discarding late reply");
            return Err(TransportError::Timeout { timeout_ms: 1000 });
        }
        if let Some(reply) = self.reply_queue.lock().unwrap().pop_front() {
            *packet = reply;
            return Ok(());
        }
        if self.auto_echo.load(Ordering::SeqCst)
            && let Some(last) = self.write_log.lock().unwrap().last()
        {
            *packet = Packet::new(last.command());
            return Ok(());
        }
        Err(TransportError::Timeout { timeout_ms: 1000 })
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::*;

    #[test]
    fn test_mock_reply_queue() {
        let mock = MockTransport::new();
        mock.queue_status(CMD_BEGIN_CAPTURE, 0);
        mock.queue_status(CMD_END_CAPTURE, 1);

        let r1 = mock.round_trip(&Packet::new(CMD_BEGIN_CAPTURE)).unwrap();
        assert_eq!(r1.command(), CMD_BEGIN_CAPTURE);

        let r2 = mock.round_trip(&Packet::new(CMD_END_CAPTURE)).unwrap();
        assert_eq!(r2.as_bytes()[OFFSET_STATUS], 1);

        // Queue is empty now
        assert!(matches!(
            mock.round_trip(&Packet::new(CMD_READ_CHUNK)),
            Err(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::echoing();
        mock.round_trip(&Packet::new(CMD_TRANSMIT_CHUNK)).unwrap();
        mock.round_trip(&Packet::new(CMD_TRIGGER_TRANSMIT)).unwrap();

        assert_eq!(
            mock.written_commands(),
            vec![CMD_TRANSMIT_CHUNK, CMD_TRIGGER_TRANSMIT]
        );
        mock.clear_writes();
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_mock_auto_echo() {
        let mock = MockTransport::echoing();
        let reply = mock.round_trip(&Packet::new(CMD_END_CAPTURE)).unwrap();
        assert_eq!(reply.command(), CMD_END_CAPTURE);
        assert_eq!(reply.as_bytes()[OFFSET_STATUS], STATUS_OK);
    }

    #[test]
    fn test_mock_disconnect() {
        let mock = MockTransport::echoing();
        mock.disconnect();
        assert!(matches!(
            mock.write_packet(&Packet::new(CMD_READ_CHUNK)),
            Err(TransportError::Disconnected)
        ));

        mock.reconnect();
        assert!(mock.write_packet(&Packet::new(CMD_READ_CHUNK)).is_ok());
    }

    #[test]
    fn test_mock_late_reply_is_dropped() {
        let mock = MockTransport::new();
        mock.queue_late_reply(Packet::new(CMD_TRANSMIT_CHUNK));
        assert!(matches!(
            mock.round_trip(&Packet::new(CMD_TRANSMIT_CHUNK)),
            Err(TransportError::Timeout { .. })
        ));

        // The next read sees only what the device sends for the next request.
        mock.queue_status(CMD_TRIGGER_TRANSMIT, 0);
        let reply = mock.round_trip(&Packet::new(CMD_TRIGGER_TRANSMIT)).unwrap();
        assert_eq!(reply.command(), CMD_TRIGGER_TRANSMIT);
        assert_eq!(mock.pending_replies(), 0);
    }

    #[test]
    fn test_mock_clones_share_state() {
        let mock = MockTransport::new();
        let other = mock.clone();
        other.close();
        assert_eq!(mock.close_count(), 1);
    }
}
