//! Text-safe payload encoding for block fields that travel through the
//! generic markdown layer (code and formula text).
//!
//! The encoding matches JavaScript's `encodeURIComponent`, so notes written by
//! a browser-hosted editing surface decode identically here.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Bytes `encodeURIComponent` leaves untouched besides ASCII alphanumerics.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode `raw`.
pub fn encode_payload(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Decode a percent-encoded payload.
///
/// Returns `None` when the input has a `%` not followed by two hex digits, or
/// when the decoded bytes are not UTF-8. Both mean the text was never encoded.
pub fn decode_payload(encoded: &str) -> Option<String> {
    if !has_valid_escapes(encoded) {
        return None;
    }
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Decode a payload, falling back to the raw text when it is not encoded.
pub fn decode_payload_lossy(text: &str) -> String {
    decode_payload(text).unwrap_or_else(|| text.to_string())
}

/// True when `text` decodes cleanly and re-encodes to itself.
pub fn is_canonical(text: &str) -> bool {
    decode_payload(text).is_some_and(|decoded| encode_payload(&decoded) == text)
}

fn has_valid_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
