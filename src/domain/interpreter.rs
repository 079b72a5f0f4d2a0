//! Descriptor Payload Decoding
//!
//! Decodes the two well-known descriptor payloads: the UTF-8 user
//! description and the fixed-layout presentation format record.

use tracing::debug;

/// Short code of the Characteristic User Description descriptor.
pub const USER_DESCRIPTION: &str = "2901";

/// Short code of the Characteristic Presentation Format descriptor.
pub const PRESENTATION_FORMAT: &str = "2904";

/// Minimum length of a presentation format record.
pub const PRESENTATION_FORMAT_LEN: usize = 7;

/// Registered names for the numeric format code in byte 0.
fn format_name(code: u8) -> Option<&'static str> {
    match code {
        0x01 => Some("boolean"),
        0x02 => Some("2-bit"),
        0x04 => Some("uint8"),
        0x05 => Some("uint12"),
        0x06 => Some("uint16"),
        0x07 => Some("uint24"),
        0x08 => Some("uint32"),
        0x09 => Some("uint48"),
        0x0a => Some("uint64"),
        0x0b => Some("uint128"),
        0x0c => Some("sint8"),
        0x0d => Some("sint12"),
        0x0e => Some("sint16"),
        0x0f => Some("sint24"),
        0x10 => Some("sint32"),
        0x11 => Some("sint48"),
        0x12 => Some("sint64"),
        0x13 => Some("sint128"),
        0x14 => Some("float32"),
        0x15 => Some("float64"),
        0x16 => Some("sfloat"),
        0x17 => Some("float"),
        0x1e => Some("utf-8 string"),
        0x1f => Some("utf-16 string"),
        _ => None,
    }
}

/// Decodes a user description payload. Invalid sequences degrade to the
/// lossy form with a logged diagnostic.
pub fn decode_user_description(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => text.to_string(),
        Err(err) => {
            debug!(%err, "user description is not valid UTF-8");
            String::from_utf8_lossy(value).into_owned()
        }
    }
}

fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    let lo = bytes.get(offset).copied().unwrap_or(0);
    let hi = bytes.get(offset + 1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

/// Parses a presentation format record: byte 0 is the unsigned format
/// code, byte 1 the signed exponent, bytes 2-3 the little-endian unit
/// code, bytes 6-7 the little-endian description code. Records shorter
/// than 7 bytes are rejected; a 7-byte record reads the description's
/// missing high byte as zero.
pub fn parse_presentation_format(value: &[u8]) -> Option<String> {
    if value.len() < PRESENTATION_FORMAT_LEN {
        return None;
    }

    let format = value[0];
    let exponent = value[1] as i8;
    let unit = read_u16_le(value, 2);
    let description = read_u16_le(value, 6);

    let label = match format_name(format) {
        Some(name) => name.to_string(),
        None => format!("0x{format:x}"),
    };

    Some(format!(
        "Format: {label}, exponent: {exponent}, unit: 0x{unit:x}, description: 0x{description:x}"
    ))
}
