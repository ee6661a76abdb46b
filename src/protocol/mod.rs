//! Protocol Module
//!
//! Defines the wire protocol shared by server and client.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────┬─────────┬────────┬─────────┬──────────────────────┬─────┐
//! │ 01 13 37 (3) │ Svc (1) │ St (1) │ Len (2) │ [1F][field bytes]... │ 04  │
//! └──────────────┴─────────┴────────┴─────────┴──────────────────────┴─────┘
//! ```
//!
//! ### Services
//! - 0x00: DEFAULT
//! - 0x01: PING
//! - 0x02: GET
//! - 0x03: SET
//! - 0x04: DELETE
//!
//! ### Status Codes
//! - 0x00: DEFAULT
//! - 0x05: QUERY
//! - 0x06: ACKNOWLEDGE
//! - 0x10: DATA_LINK
//! - 0x15: NEGATIVE
//! - 0x16: SYNC

mod packet;
mod codec;
pub mod text;

pub use packet::{Packet, Service, Status, NEGATIVE_SENTINEL};
pub use codec::{
    encode, encode_with_status, decode_header, decode_packet,
    read_packet, write_packet, Header,
    PREAMBLE, HEADER_SIZE, UNIT_SEPARATOR, END_MARKER, MAX_LENGTH,
};
