use crate::{BusInfo, CanFilter, CanFrame, Result, TransportError};

/// A minimal CAN bus interface with both blocking and polling receive.
pub trait CanBus {
    /// Open a CAN interface by name (e.g., "can0", "/dev/tty.usbmodem1").
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available interfaces for this backend.
    fn list() -> Result<Vec<BusInfo>>
    where
        Self: Sized;

    /// Set acceptance filters if supported.
    fn set_filters(&mut self, _filters: &[CanFilter]) -> Result<()> {
        let _ = _filters;
        Err(TransportError::Unsupported("filters not supported"))
    }

    /// Receive one frame (blocking with optional timeout in milliseconds).
    fn recv(&mut self, _timeout_ms: Option<u64>) -> Result<CanFrame>;

    /// Receive one frame if one is already pending, never waiting.
    ///
    /// `Ok(None)` means the receive queue is empty. Backends with a native
    /// non-blocking mode override this; the default polls with a zero timeout.
    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        match self.recv(Some(0)) {
            Ok(frame) => Ok(Some(frame)),
            Err(TransportError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send one frame. Fire-and-forget: no acknowledgement is awaited.
    fn send(&mut self, frame: &CanFrame) -> Result<()>;
}
