//! UUID Canonicalization
//!
//! Maps 128-bit Bluetooth identifiers and registered long-form names to the
//! 4-hex-digit short form, and attaches SIG-registered names for display.
//! The same short-code space is reused by services, characteristics, and
//! descriptors, so name lookups are namespaced.

/// Suffix shared by every standard-base Bluetooth UUID.
pub const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

/// Sentinel returned for an empty identifier.
pub const UNKNOWN_UUID: &str = "Unknown UUID";

/// Which registry a short code should be resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidNamespace {
    Service,
    Characteristic,
    Descriptor,
}

/// Long-form service names accepted in scan filters.
fn alias_short_code(name: &str) -> Option<&'static str> {
    match name {
        "generic_access" => Some("1800"),
        "generic_attribute" => Some("1801"),
        "current_time" => Some("1805"),
        "device_information" => Some("180a"),
        "heart_rate" => Some("180d"),
        "battery_service" => Some("180f"),
        _ => None,
    }
}

fn service_name(code: &str) -> Option<&'static str> {
    match code {
        "1800" => Some("Generic Access"),
        "1801" => Some("Generic Attribute"),
        "1805" => Some("Current Time Service"),
        "180a" => Some("Device Information"),
        "180d" => Some("Heart Rate"),
        "180f" => Some("Battery Service"),
        _ => None,
    }
}

fn characteristic_name(code: &str) -> Option<&'static str> {
    match code {
        "2a00" => Some("Device Name"),
        "2a01" => Some("Appearance"),
        "2a05" => Some("Service Changed"),
        "2a19" => Some("Battery Level"),
        "2a24" => Some("Model Number String"),
        "2a25" => Some("Serial Number String"),
        "2a26" => Some("Firmware Revision String"),
        "2a27" => Some("Hardware Revision String"),
        "2a28" => Some("Software Revision String"),
        "2a29" => Some("Manufacturer Name String"),
        "2a2b" => Some("Current Time"),
        "2a37" => Some("Heart Rate Measurement"),
        _ => None,
    }
}

fn descriptor_name(code: &str) -> Option<&'static str> {
    match code {
        "2900" => Some("Characteristic Extended Properties"),
        "2901" => Some("Characteristic User Description"),
        "2902" => Some("Client Characteristic Configuration"),
        "2903" => Some("Server Characteristic Configuration"),
        "2904" => Some("Characteristic Presentation Format"),
        _ => None,
    }
}

fn registered_name(code: &str, namespace: UuidNamespace) -> Option<&'static str> {
    match namespace {
        UuidNamespace::Service => service_name(code),
        UuidNamespace::Characteristic => characteristic_name(code),
        UuidNamespace::Descriptor => descriptor_name(code),
    }
}

/// Canonical comparison form of an identifier: lower case, with
/// standard-base 128-bit identifiers reduced to their 4-hex short code.
/// Anything unrecognized passes through (lower-cased) unchanged.
pub fn canonicalize_short(identifier: &str) -> String {
    if identifier.is_empty() {
        return UNKNOWN_UUID.to_string();
    }

    let normalized = identifier.to_ascii_lowercase();

    if let Some(code) = alias_short_code(&normalized) {
        return code.to_string();
    }

    if normalized.len() == 36
        && normalized.starts_with("0000")
        && normalized.ends_with(BASE_UUID_SUFFIX)
    {
        return normalized[4..8].to_string();
    }

    normalized
}

fn is_short_code(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_full_uuid(identifier: &str) -> bool {
    identifier.len() == 36
        && identifier.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// Display form of a canonical code: short codes upper-cased, everything
/// else left as-is.
fn display_form(code: &str) -> String {
    if is_short_code(code) {
        code.to_ascii_uppercase()
    } else {
        code.to_string()
    }
}

/// Formats an identifier for display, attaching the registered name when
/// the short code is known in `namespace`.
pub fn label_with_name(identifier: &str, namespace: UuidNamespace) -> String {
    let code = canonicalize_short(identifier);
    let display = display_form(&code);
    match registered_name(&code, namespace) {
        Some(name) => format!("{display} ({name})"),
        None => display,
    }
}

/// Expands an alias, short code, or full identifier into the 128-bit string
/// form usable as a scan filter. Returns None for unresolvable input.
pub fn expand_to_full(identifier: &str) -> Option<String> {
    let code = canonicalize_short(identifier);
    if is_short_code(&code) {
        return Some(format!("0000{code}{BASE_UUID_SUFFIX}"));
    }
    if is_full_uuid(&code) {
        return Some(code);
    }
    None
}
