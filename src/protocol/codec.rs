//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬─────────┬────────┬─────────┬──────────────────────┬─────┐
//! │ 01 13 37 (3) │ Svc (1) │ St (1) │ Len (2) │ [1F][field bytes]... │ 04  │
//! └──────────────┴─────────┴────────┴─────────┴──────────────────────┴─────┘
//! ```
//!
//! `Len` is big-endian and counts the payload plus the end-marker.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CorvidError, Result};
use super::{text, Packet, Service, Status};

/// Fixed frame preamble
pub const PREAMBLE: [u8; 3] = [0x01, 0x13, 0x37];

/// Header size: preamble (3) + service (1) + status (1) + length (2)
pub const HEADER_SIZE: usize = 7;

/// Marks the start of one field
pub const UNIT_SEPARATOR: u8 = 0x1F;

/// Marks the end of the payload
pub const END_MARKER: u8 = 0x04;

/// Largest declarable payload length
pub const MAX_LENGTH: usize = u16::MAX as usize;

// =============================================================================
// Header
// =============================================================================

/// Parsed frame header
///
/// Only used to learn how many payload bytes to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub service: Service,
    pub status: Status,
    pub length: u16,
}

impl Header {
    /// Render the 7-byte header prefix
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [hi, lo] = self.length.to_be_bytes();
        [
            PREAMBLE[0],
            PREAMBLE[1],
            PREAMBLE[2],
            self.service as u8,
            self.status as u8,
            hi,
            lo,
        ]
    }

    /// Size of the whole frame this header announces
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.length as usize
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a packet to bytes
pub fn encode(packet: &Packet) -> Result<Bytes> {
    encode_with_status(packet, packet.status)
}

/// Encode a packet, writing `status` in place of the packet's own status
pub fn encode_with_status(packet: &Packet, status: Status) -> Result<Bytes> {
    let length = packet.length();
    if length > MAX_LENGTH {
        return Err(CorvidError::PayloadTooLarge(length));
    }

    let header = Header {
        service: packet.service,
        status,
        length: length as u16,
    };

    let mut frame = BytesMut::with_capacity(header.frame_len());
    frame.put_slice(&header.to_bytes());
    for field in packet.fields() {
        frame.put_u8(UNIT_SEPARATOR);
        text::encode_into(field, &mut frame);
    }
    frame.put_u8(END_MARKER);

    debug_assert_eq!(frame.len(), header.frame_len());
    Ok(frame.freeze())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode and validate a frame header
///
/// Every preamble byte must match; a single differing byte rejects the frame.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < HEADER_SIZE {
        return Err(CorvidError::MalformedHeader(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    if bytes[..3] != PREAMBLE {
        return Err(CorvidError::MalformedHeader(format!(
            "Bad preamble: {:02x} {:02x} {:02x}",
            bytes[0], bytes[1], bytes[2]
        )));
    }

    Ok(Header {
        service: Service::try_from(bytes[3])?,
        status: Status::try_from(bytes[4])?,
        length: u16::from_be_bytes([bytes[5], bytes[6]]),
    })
}

/// Decode a complete frame into a packet
pub fn decode_packet(bytes: &[u8]) -> Result<Packet> {
    let header = decode_header(bytes)?;

    if header.length == 0 {
        return Err(CorvidError::MalformedPayload(
            "Declared length 0 leaves no room for the end-marker".to_string(),
        ));
    }

    let total_len = header.frame_len();
    if bytes.len() < total_len {
        return Err(CorvidError::IncompletePayload {
            expected: total_len,
            received: bytes.len(),
        });
    }

    let region = &bytes[HEADER_SIZE..total_len];
    if region.last() != Some(&END_MARKER) {
        return Err(CorvidError::MalformedPayload(format!(
            "Missing end-marker at offset {}",
            total_len - 1
        )));
    }

    Ok(Packet::new(header.service, header.status, split_fields(region)))
}

/// Collect the fields of a payload region
///
/// A field starts after a unit separator and runs up to the next separator or
/// end-marker. Bytes outside a field are skipped.
fn split_fields(region: &[u8]) -> Vec<String> {
    let mut fields = Vec::new();
    let mut i = 0;

    while i < region.len() {
        if region[i] != UNIT_SEPARATOR {
            i += 1;
            continue;
        }

        let start = i + 1;
        let end = region[start..]
            .iter()
            .position(|&b| b == UNIT_SEPARATOR || b == END_MARKER)
            .map_or(region.len(), |offset| start + offset);

        fields.push(text::decode(&region[start..end]));
        i = end;
    }

    fields
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete packet from a stream
///
/// Blocks until a full frame is received or an error occurs.
pub fn read_packet<R: Read>(reader: &mut R) -> Result<Packet> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;
    let header = decode_header(&header_bytes)?;

    let mut frame = Vec::with_capacity(header.frame_len());
    frame.extend_from_slice(&header_bytes);
    frame.resize(header.frame_len(), 0);
    reader.read_exact(&mut frame[HEADER_SIZE..])?;

    decode_packet(&frame)
}

/// Write a packet to a stream
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    let bytes = encode(packet)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
