//! Field text mapping
//!
//! Fields travel as single-byte text: every character U+0000..=U+00FF maps to
//! the byte with the same value and back. Characters outside that range have no
//! byte and are written as `?`.

use bytes::BufMut;

/// Byte written for characters the mapping cannot represent
pub const REPLACEMENT: u8 = b'?';

/// Map one character to its wire byte
pub fn char_to_byte(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT)
}

/// Map one wire byte to its character
pub fn byte_to_char(byte: u8) -> char {
    char::from(byte)
}

/// Number of wire bytes `text` occupies
pub fn byte_len(text: &str) -> usize {
    text.chars().count()
}

/// Write `text` into `buf`, one byte per character
pub fn encode_into<B: BufMut>(text: &str, buf: &mut B) {
    for c in text.chars() {
        buf.put_u8(char_to_byte(c));
    }
}

/// Encode `text` into a fresh byte vector
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(byte_len(text));
    encode_into(text, &mut out);
    out
}

/// Decode wire bytes into text
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(byte_to_char).collect()
}

/// True if every character survives an encode/decode cycle unchanged
pub fn is_representable(text: &str) -> bool {
    text.chars().all(|c| u32::from(c) <= 0xFF)
}
