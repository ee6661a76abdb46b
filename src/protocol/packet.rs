//! Packet definitions
//!
//! Service and status tags plus the packet value carried by every frame.

use crate::error::CorvidError;
use super::text;

/// Coarse operation category, ordinal-encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Service {
    #[default]
    Default = 0,
    Ping = 1,
    Get = 2,
    Set = 3,
    Delete = 4,
}

impl TryFrom<u8> for Service {
    type Error = CorvidError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Service::Default),
            1 => Ok(Service::Ping),
            2 => Ok(Service::Get),
            3 => Ok(Service::Set),
            4 => Ok(Service::Delete),
            _ => Err(CorvidError::MalformedHeader(format!(
                "Unknown service: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// Request/response disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Status {
    #[default]
    Default = 0x00,
    Query = 0x05,
    Acknowledge = 0x06,
    DataLink = 0x10,
    Negative = 0x15,
    Sync = 0x16,
}

impl TryFrom<u8> for Status {
    type Error = CorvidError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Status::Default),
            0x05 => Ok(Status::Query),
            0x06 => Ok(Status::Acknowledge),
            0x10 => Ok(Status::DataLink),
            0x15 => Ok(Status::Negative),
            0x16 => Ok(Status::Sync),
            _ => Err(CorvidError::MalformedHeader(format!(
                "Unknown status: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// Field carried by every rejection reply
pub const NEGATIVE_SENTINEL: &str = "-1";

/// A protocol message: two tags and an ordered list of text fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub service: Service,
    pub status: Status,
    fields: Vec<String>,
}

impl Packet {
    /// Create a packet from any iterable of text fields
    pub fn new<I, S>(service: Service, status: Status, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service,
            status,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a packet with no fields
    pub fn empty(service: Service, status: Status) -> Self {
        Self {
            service,
            status,
            fields: Vec::new(),
        }
    }

    /// The `Negative` reply sent when a frame is rejected
    pub fn negative(service: Service) -> Self {
        Self::new(service, Status::Negative, [NEGATIVE_SENTINEL])
    }

    /// The acknowledgment a client sends in answer to a ping query
    pub fn ping_ack(name: &str) -> Self {
        Self::new(Service::Ping, Status::Acknowledge, [name])
    }

    /// True for exactly `{Ping, Query}`
    pub fn is_ping_query(&self) -> bool {
        self.service == Service::Ping && self.status == Status::Query
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Append a field, builder style
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Number of fields
    pub fn count(&self) -> usize {
        self.fields.len()
    }

    /// Payload length as declared on the wire, end-marker included
    ///
    /// `1 + Σ(1 + byte_len(field))`; a packet with no fields has length 1.
    pub fn length(&self) -> usize {
        1 + self
            .fields
            .iter()
            .map(|field| 1 + text::byte_len(field))
            .sum::<usize>()
    }
}
