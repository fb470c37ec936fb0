use crate::{BusInfo, CanBus, CanFilter, CanFrame, CanId, Result, TransportError};
use std::collections::VecDeque;
use tracing::trace;

const RPDO1_BASE: u32 = 0x200;
const HEARTBEAT_BASE: u16 = 0x780;
const FUNCTION_MASK: u32 = 0x780;
const NODE_MASK: u32 = 0x07F;

/// A simple in-process mock bus. Each bus instance is independent.
///
/// Inbound frames are queued with [`MockBus::push_inbound`] and handed out by
/// `recv`/`try_recv` in order; everything sent is recorded for inspection.
/// With [`MockBus::with_mit_echo`] the bus also behaves like an actuator that
/// answers each MIT command with a heartbeat reporting the commanded
/// position, velocity and torque.
#[derive(Debug, Default)]
pub struct MockBus {
    name: String,
    inbound: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
    failing_sends: usize,
    mit_echo: bool,
}

impl MockBus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_mit_echo(mut self) -> Self {
        self.mit_echo = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_inbound(&mut self, frame: CanFrame) {
        self.inbound.push_back(frame);
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    pub fn sent(&self) -> &[CanFrame] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<CanFrame> {
        std::mem::take(&mut self.sent)
    }

    /// Make the next `n` sends fail with an I/O error.
    pub fn fail_next_sends(&mut self, n: usize) {
        self.failing_sends = n;
    }

    fn echo_heartbeat(&mut self, cmd: &CanFrame) {
        let raw = cmd.id.raw();
        if cmd.id.is_extended() || cmd.len < 8 || raw & FUNCTION_MASK != RPDO1_BASE {
            return;
        }
        let node = (raw & NODE_MASK) as u16;
        let d = cmd.data;
        // pos(16) | vel(12) | tor(12) lifted straight out of the command layout
        let reply = [
            node as u8,
            d[0],
            d[1],
            d[2],
            (d[3] & 0xF0) | (d[6] & 0x0F),
            d[7],
            0,
            0,
        ];
        let id = CanId::standard_masked(HEARTBEAT_BASE + node);
        self.inbound
            .push_back(CanFrame::with_payload(id, reply).stamped_now());
    }
}

impl CanBus for MockBus {
    fn open(name: &str) -> Result<Self> {
        Ok(Self::new(name))
    }

    fn list() -> Result<Vec<BusInfo>> {
        Ok(vec![BusInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn set_filters(&mut self, _filters: &[CanFilter]) -> Result<()> {
        let _ = _filters;
        Err(TransportError::Unsupported(
            "mock backend has no hardware filters",
        ))
    }

    fn recv(&mut self, _timeout_ms: Option<u64>) -> Result<CanFrame> {
        self.inbound.pop_front().ok_or(TransportError::Timeout)
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        Ok(self.inbound.pop_front())
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            return Err(TransportError::Io(format!("{}: injected send failure", self.name)));
        }
        trace!(bus = %self.name, %frame, "mock send");
        self.sent.push(frame.clone());
        if self.mit_echo {
            self.echo_heartbeat(frame);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u16) -> CanId {
        CanId::standard(raw).unwrap()
    }

    #[test]
    fn test_try_recv_drains_in_order_then_reports_empty() {
        let mut bus = MockBus::new("mock0");
        bus.push_inbound(CanFrame::new(id(0x781), &[1]).unwrap());
        bus.push_inbound(CanFrame::new(id(0x782), &[2]).unwrap());

        assert_eq!(bus.try_recv().unwrap().unwrap().id, id(0x781));
        assert_eq!(bus.try_recv().unwrap().unwrap().id, id(0x782));
        assert!(bus.try_recv().unwrap().is_none());
        assert_eq!(bus.recv(Some(5)), Err(TransportError::Timeout));
    }

    #[test]
    fn test_injected_send_failures_are_consumed() {
        let mut bus = MockBus::new("mock0");
        let frame = CanFrame::new(id(0x201), &[0; 8]).unwrap();
        bus.fail_next_sends(1);
        assert!(matches!(bus.send(&frame), Err(TransportError::Io(_))));
        assert!(bus.send(&frame).is_ok());
        assert_eq!(bus.sent().len(), 1);
    }

    #[test]
    fn test_mit_echo_reports_commanded_fields() {
        let mut bus = MockBus::new("mock0").with_mit_echo();
        let cmd = [0x57, 0x3C, 0x9C, 0x78, 0x00, 0x4C, 0xD8, 0xE3];
        bus.send(&CanFrame::with_payload(id(0x203), cmd)).unwrap();

        let hb = bus.try_recv().unwrap().unwrap();
        assert_eq!(hb.id, id(0x783));
        assert_eq!(hb.data, [0x03, 0x57, 0x3C, 0x9C, 0x78, 0xE3, 0x00, 0x00]);
    }

    #[test]
    fn test_mit_echo_ignores_non_command_frames() {
        let mut bus = MockBus::new("mock0").with_mit_echo();
        bus.send(&CanFrame::with_payload(id(0x001), [0xFF; 8]))
            .unwrap();
        assert_eq!(bus.pending(), 0);
    }
}
