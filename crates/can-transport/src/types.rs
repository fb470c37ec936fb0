use core::fmt;
use time::OffsetDateTime;

/// Mask of the significant bits of a standard (CAN 2.0A) identifier.
pub const SFF_MASK: u16 = 0x7FF;

/// 11-bit or 29-bit CAN identifier
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CanId {
    raw: u32,
    extended: bool,
}

impl CanId {
    pub fn standard(id11: u16) -> Option<Self> {
        if id11 <= SFF_MASK {
            Some(Self {
                raw: u32::from(id11),
                extended: false,
            })
        } else {
            None
        }
    }

    /// Standard identifier built from the low 11 bits of `id`.
    pub fn standard_masked(id: u16) -> Self {
        Self {
            raw: u32::from(id & SFF_MASK),
            extended: false,
        }
    }

    pub fn extended(id29: u32) -> Option<Self> {
        if id29 <= 0x1FFF_FFFF {
            Some(Self {
                raw: id29,
                extended: true,
            })
        } else {
            None
        }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }
    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "0x{raw:08X}", raw = self.raw)
        } else {
            write!(f, "0x{raw:03X}", raw = self.raw)
        }
    }
}

/// A classic CAN data frame; unused trailing payload bytes are zero.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanFrame {
    pub id: CanId,
    pub len: u8,
    pub data: [u8; 8],
    pub rtr: bool,
    pub timestamp: Option<Timestamp>,
}

impl CanFrame {
    pub fn new(id: CanId, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            len: data.len() as u8,
            data: buf,
            rtr: false,
            timestamp: None,
        })
    }

    /// Full 8-byte frame, the shape every motor command takes on the wire.
    pub fn with_payload(id: CanId, data: [u8; 8]) -> Self {
        Self {
            id,
            len: 8,
            data,
            rtr: false,
            timestamp: None,
        }
    }

    /// The valid bytes of the payload (`len` clamped to 8).
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.len).min(self.data.len());
        &self.data[..len]
    }

    /// True for an 11-bit identifier carrying data (not a remote request).
    pub fn is_standard_data(&self) -> bool {
        !self.id.is_extended() && !self.rtr
    }

    pub fn stamped_now(mut self) -> Self {
        self.timestamp = Some(Timestamp(OffsetDateTime::now_utc()));
        self
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\tlen={}\t", self.id, self.len)?;
        for (i, b) in self.payload().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        if self.rtr {
            f.write_str("\trtr")?;
        }
        Ok(())
    }
}

/// Acceptance filter: a frame passes when `frame_id & mask == id & mask`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CanFilter {
    pub id: CanId,
    pub mask: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn rfc3339(&self) -> Option<String> {
        self.0
            .format(&time::format_description::well_known::Rfc3339)
            .ok()
    }
}

#[derive(Clone, Debug)]
pub struct BusInfo {
    pub name: String,
    pub driver: String,
}
