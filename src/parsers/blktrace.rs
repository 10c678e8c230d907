//! Binary `blk_io_trace` record codec.
//!
//! Every record is a 48-byte header followed by `pdu_len` bytes of payload:
//!
//! ```text
//! magic u32 | sequence u32 | time u64 | sector u64 | bytes u32 | action u32
//! pid u32   | device u32   | cpu u32  | error u16  | pdu_len u16
//! ```
//!
//! Traces are written in the byte order of the machine that captured them.
//! The order is probed once per run from the first record decoded by any
//! codec sharing the same [`ByteOrderProbe`].

use crate::error::DecodeError;
use crate::models::TraceEvent;
use std::io::{self, Read};
use std::sync::{Arc, OnceLock};

pub const BLK_IO_TRACE_MAGIC: u32 = 0x6561_7400;
pub const BLK_IO_TRACE_VERSION: u32 = 0x07;
pub const RECORD_HEADER_SIZE: usize = 48;

const MAGIC_MASK: u32 = 0xffff_ff00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Native,
    Swapped,
}

impl ByteOrder {
    /// Classifies a raw magic word as read with native byte order.
    pub fn detect(raw_magic: u32) -> Option<Self> {
        if raw_magic & MAGIC_MASK == BLK_IO_TRACE_MAGIC {
            Some(ByteOrder::Native)
        } else if raw_magic.swap_bytes() & MAGIC_MASK == BLK_IO_TRACE_MAGIC {
            Some(ByteOrder::Swapped)
        } else {
            None
        }
    }

    fn u16(self, bytes: [u8; 2]) -> u16 {
        let v = u16::from_ne_bytes(bytes);
        match self {
            ByteOrder::Native => v,
            ByteOrder::Swapped => v.swap_bytes(),
        }
    }

    fn u32(self, bytes: [u8; 4]) -> u32 {
        let v = u32::from_ne_bytes(bytes);
        match self {
            ByteOrder::Native => v,
            ByteOrder::Swapped => v.swap_bytes(),
        }
    }

    fn u64(self, bytes: [u8; 8]) -> u64 {
        let v = u64::from_ne_bytes(bytes);
        match self {
            ByteOrder::Native => v,
            ByteOrder::Swapped => v.swap_bytes(),
        }
    }
}

/// Byte order decision shared by every codec of one run.
#[derive(Debug, Clone, Default)]
pub struct ByteOrderProbe {
    order: Arc<OnceLock<ByteOrder>>,
}

impl ByteOrderProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already decided order, if any record has been decoded.
    pub fn get(&self) -> Option<ByteOrder> {
        self.order.get().copied()
    }

    fn resolve(&self, raw_magic: u32) -> Result<ByteOrder, DecodeError> {
        if let Some(order) = self.order.get() {
            return Ok(*order);
        }
        let detected = ByteOrder::detect(raw_magic).ok_or(DecodeError::BadMagic(raw_magic))?;
        // Another stream may have won the race; its answer is the one that counts.
        Ok(*self.order.get_or_init(|| detected))
    }
}

/// Decodes records from any byte stream.
#[derive(Debug, Clone, Default)]
pub struct TraceCodec {
    probe: ByteOrderProbe,
}

impl TraceCodec {
    pub fn new(probe: ByteOrderProbe) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &ByteOrderProbe {
        &self.probe
    }

    /// Reads the next record, payload included.
    ///
    /// Returns `Ok(None)` when the stream ends exactly at a record boundary.
    pub fn decode<R: Read>(&self, reader: &mut R) -> Result<Option<TraceEvent>, DecodeError> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let got = read_full(reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < RECORD_HEADER_SIZE {
            return Err(DecodeError::TruncatedRecord {
                expected: RECORD_HEADER_SIZE,
                got,
            });
        }

        let raw_magic = u32::from_ne_bytes(field(&header, 0));
        let order = self.probe.resolve(raw_magic)?;

        let magic = order.u32(field(&header, 0));
        if magic & MAGIC_MASK != BLK_IO_TRACE_MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let version = (magic & 0xff) as u8;
        if u32::from(version) != BLK_IO_TRACE_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let pdu_len = order.u16(field(&header, 46)) as usize;
        let mut pdu = vec![0u8; pdu_len];
        if pdu_len > 0 {
            let got = read_full(reader, &mut pdu)?;
            if got < pdu_len {
                return Err(DecodeError::TruncatedRecord {
                    expected: pdu_len,
                    got,
                });
            }
        }

        Ok(Some(TraceEvent {
            sequence: order.u32(field(&header, 4)),
            time: order.u64(field(&header, 8)),
            sector: order.u64(field(&header, 16)),
            bytes: order.u32(field(&header, 24)),
            action: order.u32(field(&header, 28)),
            pid: order.u32(field(&header, 32)),
            device: order.u32(field(&header, 36)),
            cpu: order.u32(field(&header, 40)),
            error: order.u16(field(&header, 44)),
            pdu,
        }))
    }
}

/// Serializes an event as one record, the inverse of [`TraceCodec::decode`].
/// Used to build fixtures and to re-emit filtered traces.
///
/// The on-disk payload length is 16 bits, longer payloads are rejected.
pub fn encode_record(event: &TraceEvent, order: ByteOrder) -> Result<Vec<u8>, DecodeError> {
    fn put<const N: usize>(buf: &mut Vec<u8>, native: [u8; N], order: ByteOrder) {
        let mut bytes = native;
        if order == ByteOrder::Swapped {
            bytes.reverse();
        }
        buf.extend_from_slice(&bytes);
    }

    let pdu_len =
        u16::try_from(event.pdu.len()).map_err(|_| DecodeError::PduTooLong(event.pdu.len()))?;
    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + event.pdu.len());
    put(&mut buf, (BLK_IO_TRACE_MAGIC | BLK_IO_TRACE_VERSION).to_ne_bytes(), order);
    put(&mut buf, event.sequence.to_ne_bytes(), order);
    put(&mut buf, event.time.to_ne_bytes(), order);
    put(&mut buf, event.sector.to_ne_bytes(), order);
    put(&mut buf, event.bytes.to_ne_bytes(), order);
    put(&mut buf, event.action.to_ne_bytes(), order);
    put(&mut buf, event.pid.to_ne_bytes(), order);
    put(&mut buf, event.device.to_ne_bytes(), order);
    put(&mut buf, event.cpu.to_ne_bytes(), order);
    put(&mut buf, event.error.to_ne_bytes(), order);
    put(&mut buf, pdu_len.to_ne_bytes(), order);
    buf.extend_from_slice(&event.pdu);
    Ok(buf)
}

fn field<const N: usize>(header: &[u8; RECORD_HEADER_SIZE], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&header[offset..offset + N]);
    out
}

// read_exact, but reports how much was read before EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
