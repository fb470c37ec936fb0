use crate::{BusInfo, CanBus, CanFilter, CanFrame, CanId, Result, TransportError};
use socketcan::{
    CanFilter as SocketFilter, CanFrame as SocketFrame, CanSocket, EmbeddedFrame, ExtendedId,
    Frame, Socket, SocketOptions, StandardId,
};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

/// `ARPHRD_CAN` as reported in `/sys/class/net/<if>/type`.
const ARPHRD_CAN: &str = "280";
const CAN_EFF_FLAG: u32 = 0x8000_0000;

/// Linux SocketCAN raw socket, switched to non-blocking mode after bind.
pub struct SocketCanBus {
    name: String,
    socket: CanSocket,
}

impl SocketCanBus {
    pub fn interface(&self) -> &str {
        &self.name
    }

    fn to_socket_frame(frame: &CanFrame) -> Result<SocketFrame> {
        let raw = frame.id.raw();
        let built = if frame.id.is_extended() {
            let id = ExtendedId::new(raw).ok_or(TransportError::InvalidFrame("id range"))?;
            if frame.rtr {
                SocketFrame::new_remote(id, usize::from(frame.len))
            } else {
                SocketFrame::new(id, frame.payload())
            }
        } else {
            let id = StandardId::new(raw as u16).ok_or(TransportError::InvalidFrame("id range"))?;
            if frame.rtr {
                SocketFrame::new_remote(id, usize::from(frame.len))
            } else {
                SocketFrame::new(id, frame.payload())
            }
        };
        built.ok_or(TransportError::InvalidFrame("len"))
    }

    fn from_socket_frame(frame: &SocketFrame) -> Result<CanFrame> {
        let id = if frame.is_extended() {
            CanId::extended(frame.raw_id())
        } else {
            CanId::standard(frame.raw_id() as u16)
        }
        .ok_or(TransportError::InvalidFrame("id range"))?;
        let mut data = [0u8; 8];
        let src = frame.data();
        let n = src.len().min(8);
        data[..n].copy_from_slice(&src[..n]);
        let out = CanFrame {
            id,
            len: frame.dlc().min(8) as u8,
            data,
            rtr: matches!(frame, SocketFrame::Remote(_)),
            timestamp: None,
        };
        Ok(out.stamped_now())
    }
}

impl CanBus for SocketCanBus {
    fn open(name: &str) -> Result<Self> {
        if !Path::new("/sys/class/net").join(name).exists() {
            return Err(TransportError::InterfaceNotFound(name.to_string()));
        }
        let socket = CanSocket::open(name)
            .map_err(|e| TransportError::Io(format!("failed to open CAN interface '{name}': {e}")))?;
        socket.set_nonblocking(true)?;
        debug!(interface = name, "socketcan bound (non-blocking)");
        Ok(Self {
            name: name.to_string(),
            socket,
        })
    }

    fn list() -> Result<Vec<BusInfo>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir("/sys/class/net")? {
            let entry = entry?;
            let kind = std::fs::read_to_string(entry.path().join("type")).unwrap_or_default();
            if kind.trim() == ARPHRD_CAN {
                out.push(BusInfo {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    driver: "socketcan".to_string(),
                });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Kernel-side filters. The extended-frame flag is part of the mask, so a
    /// standard filter never passes an extended frame with matching low bits.
    fn set_filters(&mut self, filters: &[CanFilter]) -> Result<()> {
        let native: Vec<SocketFilter> = filters
            .iter()
            .map(|f| {
                let eff = if f.id.is_extended() { CAN_EFF_FLAG } else { 0 };
                SocketFilter::new(f.id.raw() | eff, f.mask | CAN_EFF_FLAG)
            })
            .collect();
        self.socket.set_filters(&native)?;
        debug!(interface = %self.name, count = native.len(), "socketcan filters set");
        Ok(())
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<CanFrame> {
        self.socket.set_nonblocking(false)?;
        let timeout = timeout_ms.map(Duration::from_millis);
        let result = match timeout {
            Some(t) => self.socket.read_frame_timeout(t),
            None => self.socket.read_frame(),
        };
        self.socket.set_nonblocking(true)?;
        let frame = result?;
        Self::from_socket_frame(&frame)
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        loop {
            match self.socket.read_frame() {
                Ok(frame) if frame.is_error_frame() => {
                    debug!(interface = %self.name, "skipping CAN error frame");
                }
                Ok(frame) => return Self::from_socket_frame(&frame).map(Some),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let out = Self::to_socket_frame(frame)?;
        self.socket
            .write_frame(&out)
            .map_err(|e| TransportError::Io(format!("socketcan transmit error: {e}")))?;
        trace!(interface = %self.name, %frame, "socketcan send");
        Ok(())
    }
}
