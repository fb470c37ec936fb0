use crate::{BusInfo, CanBus, CanFilter, CanFrame, CanId, Result, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// SLCAN text protocol over serial (common on macOS USB-CAN dongles)
pub struct SlcanBus {
    port_path: String,
    port: Box<dyn SerialPort>,
    // bytes read from the port that do not yet form a complete `\r`-terminated line
    pending: Vec<u8>,
}

impl SlcanBus {
    /// Open the serial port and start the channel at `bitrate` (500k when `None`).
    pub fn open_with(path: &str, bitrate: Option<SlcanBitrate>) -> Result<Self> {
        let mut port = serialport::new(path, 115200)
            .timeout(DEFAULT_TIMEOUT)
            .open()
            .map_err(|e| match e.kind {
                serialport::ErrorKind::NoDevice => TransportError::InterfaceNotFound(path.into()),
                _ => TransportError::Io(e.to_string()),
            })?;
        // Close, set bitrate, then open; the close may fail on a fresh adapter
        let _ = Self::write_cmd(&mut *port, b"C\r");
        let code = bitrate.unwrap_or(SlcanBitrate::B500k).code();
        Self::write_cmd(&mut *port, &[b'S', code, b'\r'])?;
        Self::write_cmd(&mut *port, b"O\r")?;
        debug!(port = path, "slcan channel open");
        Ok(SlcanBus {
            port_path: path.to_string(),
            port,
            pending: Vec::with_capacity(64),
        })
    }

    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    fn encode_frame(frame: &CanFrame) -> Result<Vec<u8>> {
        if frame.len > 8 {
            return Err(TransportError::InvalidFrame("dlc > 8"));
        }
        let mut line = match (frame.id.is_extended(), frame.rtr) {
            (false, false) => format!("t{:03X}{}", frame.id.raw(), frame.len),
            (false, true) => format!("r{:03X}{}", frame.id.raw(), frame.len),
            (true, false) => format!("T{:08X}{}", frame.id.raw(), frame.len),
            (true, true) => format!("R{:08X}{}", frame.id.raw(), frame.len),
        };
        if !frame.rtr {
            for b in frame.payload() {
                line.push_str(&format!("{b:02X}"));
            }
        }
        line.push('\r');
        Ok(line.into_bytes())
    }

    fn parse_frame(line: &[u8]) -> Result<CanFrame> {
        let text = std::str::from_utf8(line)
            .ok()
            .filter(|t| t.is_ascii())
            .ok_or(TransportError::InvalidFrame("not ascii"))?;
        let (kind, rest) = match text.chars().next() {
            Some(k @ ('t' | 'r' | 'T' | 'R')) => (k, &text[1..]),
            Some(_) => return Err(TransportError::InvalidFrame("unknown header")),
            None => return Err(TransportError::InvalidFrame("empty")),
        };
        let id_digits = if kind.is_ascii_lowercase() { 3 } else { 8 };
        if rest.len() < id_digits + 1 {
            return Err(TransportError::InvalidFrame("short header"));
        }
        let raw_id = u32::from_str_radix(&rest[..id_digits], 16)
            .map_err(|_| TransportError::InvalidFrame("id"))?;
        let id = if id_digits == 3 {
            CanId::standard(raw_id as u16)
        } else {
            CanId::extended(raw_id)
        }
        .ok_or(TransportError::InvalidFrame("id range"))?;

        let dlc = rest[id_digits..id_digits + 1]
            .parse::<u8>()
            .map_err(|_| TransportError::InvalidFrame("dlc"))?;
        if dlc > 8 {
            return Err(TransportError::InvalidFrame("dlc > 8"));
        }
        let rtr = kind == 'r' || kind == 'R';
        let mut data = [0u8; 8];
        if !rtr {
            let hex = &rest[id_digits + 1..];
            if hex.len() < usize::from(dlc) * 2 {
                return Err(TransportError::InvalidFrame("short data"));
            }
            for (i, slot) in data.iter_mut().take(usize::from(dlc)).enumerate() {
                *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                    .map_err(|_| TransportError::InvalidFrame("byte"))?;
            }
        }
        let frame = CanFrame {
            id,
            len: dlc,
            data,
            rtr,
            timestamp: None,
        };
        Ok(frame.stamped_now())
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        pop_line(&mut self.pending)
    }

    fn fill(&mut self, max: usize) -> Result<usize> {
        let mut buf = [0u8; 128];
        let want = max.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_cmd(port: &mut dyn SerialPort, cmd: &[u8]) -> Result<()> {
        port.write_all(cmd)?;
        Ok(())
    }
}

impl CanBus for SlcanBus {
    fn open(path: &str) -> Result<Self>
    where
        Self: Sized,
    {
        Self::open_with(path, Some(SlcanBitrate::B500k))
    }

    fn list() -> Result<Vec<BusInfo>> {
        let ports =
            serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|p| {
                let driver = match p.port_type {
                    SerialPortType::UsbPort(_) => "slcan-serial",
                    _ => "serial",
                };
                BusInfo {
                    name: p.port_name,
                    driver: driver.to_string(),
                }
            })
            .collect())
    }

    fn set_filters(&mut self, _filters: &[CanFilter]) -> Result<()> {
        let _ = _filters;
        // SLCAN hardware filters are not standardized
        Err(TransportError::Unsupported("slcan filters not supported"))
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<CanFrame> {
        if let Some(line) = self.next_line() {
            return Self::parse_frame(&line);
        }
        if let Some(ms) = timeout_ms {
            self.port
                .set_timeout(Duration::from_millis(ms))
                .map_err(|e| TransportError::Io(e.to_string()))?;
        }
        loop {
            self.fill(usize::MAX)?;
            if let Some(line) = self.next_line() {
                return Self::parse_frame(&line);
            }
        }
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        loop {
            if let Some(line) = self.next_line() {
                return Self::parse_frame(&line).map(Some);
            }
            let available = self
                .port
                .bytes_to_read()
                .map_err(|e| TransportError::Io(e.to_string()))? as usize;
            if available == 0 {
                return Ok(None);
            }
            // only what is already buffered, so the read cannot block
            if self.fill(available)? == 0 {
                return Ok(None);
            }
        }
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let line = Self::encode_frame(frame)?;
        trace!(port = %self.port_path, %frame, "slcan send");
        self.port.write_all(&line)?;
        Ok(())
    }
}

/// Pop the next complete line from `pending`. Bare terminators (command
/// acks), BEL (command errors) and the `z`/`Z` acks sent after every
/// transmitted frame carry no frame and are skipped.
fn pop_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
        let mut line: Vec<u8> = pending.drain(..=pos).collect();
        line.pop();
        // BEL is sent without a terminator and may prefix the next line
        let bells = line.iter().take_while(|&&b| b == 0x07).count();
        line.drain(..bells);
        match line.first() {
            None | Some(b'z' | b'Z') => continue,
            Some(_) => return Some(line),
        }
    }
    None
}

/// Supported SLCAN bitrates (mapped to Sx codes)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlcanBitrate {
    B10k,
    B20k,
    B50k,
    B100k,
    B125k,
    B250k,
    B500k,
    B800k,
    B1M,
}

impl SlcanBitrate {
    pub fn code(self) -> u8 {
        match self {
            SlcanBitrate::B10k => b'0',
            SlcanBitrate::B20k => b'1',
            SlcanBitrate::B50k => b'2',
            SlcanBitrate::B100k => b'3',
            SlcanBitrate::B125k => b'4',
            SlcanBitrate::B250k => b'5',
            SlcanBitrate::B500k => b'6',
            SlcanBitrate::B800k => b'7',
            SlcanBitrate::B1M => b'8',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_standard_frame() {
        let frame =
            CanFrame::with_payload(CanId::standard(0x201).unwrap(), [0x7F, 0xFF, 0x80, 0, 0, 0, 0x08, 0]);
        let line = SlcanBus::encode_frame(&frame).unwrap();
        assert_eq!(line, b"t20187FFF800000000800\r".to_vec());
    }

    #[test]
    fn test_parse_heartbeat_line() {
        let frame = SlcanBus::parse_frame(b"t78180080000000000000").unwrap();
        assert_eq!(frame.id, CanId::standard(0x781).unwrap());
        assert_eq!(frame.len, 8);
        assert_eq!(frame.data, [0x00, 0x80, 0, 0, 0, 0, 0, 0]);
        assert!(!frame.rtr);
    }

    #[test]
    fn test_parse_extended_and_remote() {
        let ext = SlcanBus::parse_frame(b"T1234567820102").unwrap();
        assert!(ext.id.is_extended());
        assert_eq!(ext.payload(), &[0x01, 0x02]);

        let rtr = SlcanBus::parse_frame(b"r7814").unwrap();
        assert!(rtr.rtr);
        assert_eq!(rtr.len, 4);
    }

    #[test]
    fn test_parse_rejects_truncated_data() {
        assert_eq!(
            SlcanBus::parse_frame(b"t7818008000"),
            Err(TransportError::InvalidFrame("short data"))
        );
        assert!(SlcanBus::parse_frame(b"x123").is_err());
    }

    #[test]
    fn test_transmit_acks_are_not_frames() {
        let mut pending = b"z\r\rt78180080000000000000\rZ\r\x07t7820\rt7812".to_vec();
        let line = pop_line(&mut pending).unwrap();
        assert_eq!(line, b"t78180080000000000000".to_vec());
        assert_eq!(pop_line(&mut pending), Some(b"t7820".to_vec()));
        // the partial line stays buffered
        assert_eq!(pop_line(&mut pending), None);
        assert_eq!(pending, b"t7812".to_vec());
    }
}
