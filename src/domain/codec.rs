//! Value Codec
//!
//! Converts raw characteristic bytes into the dual hex+text display string
//! and parses free-form write input back into bytes.

use tracing::debug;

/// Renders bytes as space-joined two-digit lower-case hex octets. When the
/// payload is valid UTF-8 made entirely of printable ASCII, the text form
/// is appended in parentheses. An empty payload renders as `0x00`.
pub fn decode_for_display(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0x00".to_string();
    }

    let hex = bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");

    match std::str::from_utf8(bytes) {
        Ok(text) if text.bytes().all(|b| (0x20..=0x7e).contains(&b)) => {
            format!("{hex} ({text})")
        }
        Ok(_) => hex,
        Err(err) => {
            debug!(%err, "value is not valid UTF-8, rendering hex only");
            hex
        }
    }
}

/// Parses write input. A whitespace-separated run of two-hex-digit tokens
/// is taken as raw bytes; anything else is encoded as UTF-8 text. The hex
/// match is all-or-nothing: a single malformed token makes the whole input
/// text. Empty (after trimming) input yields zero bytes.
pub fn encode_for_write(input: &str) -> Vec<u8> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(bytes) = parse_hex_pairs(trimmed) {
        return bytes;
    }

    trimmed.as_bytes().to_vec()
}

fn parse_hex_pairs(input: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in input.split_whitespace() {
        if token.len() != 2 {
            return None;
        }
        bytes.push(u8::from_str_radix(token, 16).ok()?);
    }
    (!bytes.is_empty()).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_displays_as_zero() {
        assert_eq!(decode_for_display(&[]), "0x00");
    }

    #[test]
    fn test_printable_payload_gets_text_suffix() {
        assert_eq!(decode_for_display(&[0x48, 0x69]), "48 69 (Hi)");
    }

    #[test]
    fn test_non_printable_payload_is_hex_only() {
        assert_eq!(decode_for_display(&[0x00, 0x01]), "00 01");
        // Valid UTF-8 but contains a control character.
        assert_eq!(decode_for_display(b"H\ni"), "48 0a 69");
    }

    #[test]
    fn test_invalid_utf8_is_hex_only() {
        assert_eq!(decode_for_display(&[0xff, 0xfe]), "ff fe");
    }

    #[test]
    fn test_hex_pairs_round_trip() {
        assert_eq!(encode_for_write("01 FF 0a"), vec![0x01, 0xFF, 0x0A]);
        assert_eq!(encode_for_write("ff"), vec![0xff]);
    }

    #[test]
    fn test_plain_text_encodes_as_utf8() {
        assert_eq!(encode_for_write("hello"), b"hello".to_vec());
    }

    #[test]
    fn test_malformed_hex_falls_back_to_text() {
        // One bad token disqualifies the whole hex interpretation.
        assert_eq!(encode_for_write("01 GG"), b"01 GG".to_vec());
        assert_eq!(encode_for_write("01 fff"), b"01 fff".to_vec());
    }

    #[test]
    fn test_input_is_trimmed() {
        assert_eq!(encode_for_write("  hi  "), b"hi".to_vec());
        assert_eq!(encode_for_write("   "), Vec::<u8>::new());
        assert_eq!(encode_for_write(""), Vec::<u8>::new());
    }
}
