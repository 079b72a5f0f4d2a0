//! Characteristic Properties
//!
//! The declared operation flags of a characteristic, their reduction into
//! the three capabilities that gate interactive controls, and the labels
//! rendered in the property pills.

use serde::Serialize;

/// Raw property flags as reported by the host platform, in the platform's
/// declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
    pub reliable_write: bool,
    pub writable_auxiliaries: bool,
}

/// Derived interaction capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_read: bool,
    pub supports_write: bool,
    pub supports_notify: bool,
}

impl CharacteristicProperties {
    /// OR-reduction over the raw flags: write counts write-without-response,
    /// notify counts indications. An empty flag set yields all-false.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_read: self.read,
            supports_write: self.write || self.write_without_response,
            supports_notify: self.notify || self.indicate,
        }
    }

    /// Lower-case label of every set flag, in declaration order.
    pub fn labels(&self) -> Vec<&'static str> {
        let flags = [
            (self.broadcast, "broadcast"),
            (self.read, "read"),
            (self.write_without_response, "write without response"),
            (self.write, "write"),
            (self.notify, "notify"),
            (self.indicate, "indicate"),
            (self.authenticated_signed_writes, "authenticated signed writes"),
            (self.reliable_write, "reliable write"),
            (self.writable_auxiliaries, "writable auxiliaries"),
        ];

        flags
            .into_iter()
            .filter(|(set, _)| *set)
            .map(|(_, label)| label)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_flags_yield_no_capabilities() {
        let props = CharacteristicProperties::default();
        assert_eq!(props.capabilities(), Capabilities::default());
        assert!(props.labels().is_empty());
    }

    #[test]
    fn test_write_without_response_counts_as_write() {
        let props = CharacteristicProperties {
            write_without_response: true,
            ..Default::default()
        };
        assert!(props.capabilities().supports_write);
        assert!(!props.capabilities().supports_read);
    }

    #[test]
    fn test_indicate_counts_as_notify() {
        let props = CharacteristicProperties {
            indicate: true,
            ..Default::default()
        };
        assert!(props.capabilities().supports_notify);
    }

    #[test]
    fn test_capabilities_monotonic_in_flags() {
        // Turning an extra flag on never turns a capability off.
        let base = CharacteristicProperties {
            read: true,
            notify: true,
            ..Default::default()
        };
        let more = CharacteristicProperties {
            write: true,
            indicate: true,
            ..base
        };
        let before = base.capabilities();
        let after = more.capabilities();
        assert!(after.supports_read >= before.supports_read);
        assert!(after.supports_write >= before.supports_write);
        assert!(after.supports_notify >= before.supports_notify);
    }

    #[test]
    fn test_labels_follow_declaration_order() {
        let props = CharacteristicProperties {
            read: true,
            write_without_response: true,
            notify: true,
            ..Default::default()
        };
        assert_eq!(props.labels(), vec!["read", "write without response", "notify"]);
    }
}
