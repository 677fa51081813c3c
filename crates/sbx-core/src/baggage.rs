//! W3C baggage parsing and the routing-key extractor.
//!
//! The baggage property is a comma-separated list of `key=value` members, each
//! optionally followed by `;`-separated properties. Values are percent-encoded.
//! Parsing is lenient: malformed members are skipped, never fatal.
use std::borrow::Cow;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tracing::trace;

use sbx_model::{BAGGAGE_PROPERTY, ROUTING_KEY_PROPERTY};

use crate::carrier::Carrier;

/// Headers longer than this are ignored entirely.
pub const MAX_HEADER_LENGTH: usize = 8192;

/// At most this many list members are considered.
pub const MAX_MEMBERS: usize = 180;

/// Members longer than this are skipped.
pub const MAX_MEMBER_LENGTH: usize = 4096;

/// Octets that must be percent-encoded inside a baggage key or value.
const BAGGAGE_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'=')
    .add(b'\\')
    .add(b'%');

/// Ordered list of decoded baggage members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baggage {
    members: Vec<(String, String)>,
}

impl Baggage {
    /// Create an empty baggage list.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Parse a baggage header value.
    ///
    /// Skips members without `=`, with an empty key, longer than
    /// [`MAX_MEMBER_LENGTH`] or that do not decode to UTF-8.
    pub fn parse(header: &str) -> Self {
        let mut out = Self::new();
        if header.len() > MAX_HEADER_LENGTH {
            trace!(len = header.len(), "baggage header too long, ignored");
            return out;
        }

        for member in header.split(',').take(MAX_MEMBERS) {
            if member.len() > MAX_MEMBER_LENGTH {
                continue;
            }
            // Member properties (`;k=v`) are not used for routing.
            let pair = member.split(';').next().unwrap_or_default();
            let Some((raw_key, raw_value)) = pair.split_once('=') else {
                continue;
            };
            let (Some(key), Some(value)) = (decode(raw_key), decode(raw_value)) else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            out.insert(key, value.trim());
        }
        out
    }

    /// Decode the baggage carried by `carrier`, if any.
    ///
    /// Only the first value stored under the baggage property is read.
    pub fn from_carrier(carrier: &Carrier<'_>) -> Self {
        carrier
            .first(BAGGAGE_PROPERTY)
            .map(Self::parse)
            .unwrap_or_default()
    }

    /// Value bound to `key`; the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.members
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite a member, keeping its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.members.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.members.push((key, value)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate through members as `(&str, &str)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode the members into a header value.
    pub fn to_header_value(&self) -> String {
        self.members
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, BAGGAGE_ENCODE_SET),
                    utf8_percent_encode(v, BAGGAGE_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn decode(raw: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(raw).decode_utf8().ok()
}

/// Recover the propagated routing key from message metadata.
///
/// Returns `None` when the baggage property or the routing-key member is
/// absent, or when the baggage is malformed. Never fails.
pub fn extract_routing_key(carrier: &Carrier<'_>) -> Option<String> {
    Baggage::from_carrier(carrier)
        .get(ROUTING_KEY_PROPERTY)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{AttributeValue, Headers, MessageAttributes};

    #[test]
    fn parses_members_and_strips_properties() {
        let b = Baggage::parse("tenant=acme;ttl=30, sd-routing-key = abc ,x=1");
        assert_eq!(b.len(), 3);
        assert_eq!(b.get("tenant"), Some("acme"));
        assert_eq!(b.get("sd-routing-key"), Some("abc"));
        assert_eq!(b.get("x"), Some("1"));
    }

    #[test]
    fn percent_decodes_values() {
        let b = Baggage::parse("sd-routing-key=a%2Cb%20c");
        assert_eq!(b.get("sd-routing-key"), Some("a,b c"));
    }

    #[test]
    fn skips_malformed_members() {
        let b = Baggage::parse("novalue,=orphan,,ok=1,bad=%FF%FE");
        assert_eq!(b.len(), 1);
        assert_eq!(b.get("ok"), Some("1"));
    }

    #[test]
    fn last_occurrence_wins() {
        let b = Baggage::parse("k=1,k=2");
        assert_eq!(b.get("k"), Some("2"));
    }

    #[test]
    fn oversized_header_is_ignored() {
        let header = format!("sd-routing-key=abc,pad={}", "x".repeat(MAX_HEADER_LENGTH));
        assert!(Baggage::parse(&header).is_empty());
    }

    #[test]
    fn oversized_member_is_skipped() {
        let header = format!("big={},sd-routing-key=abc", "x".repeat(MAX_MEMBER_LENGTH));
        let b = Baggage::parse(&header);
        assert_eq!(b.get("big"), None);
        assert_eq!(b.get("sd-routing-key"), Some("abc"));
    }

    #[test]
    fn members_beyond_limit_are_ignored() {
        let mut parts: Vec<String> = (0..MAX_MEMBERS).map(|i| format!("k{i}=v")).collect();
        parts.push("sd-routing-key=late".to_string());
        let b = Baggage::parse(&parts.join(","));
        assert_eq!(b.len(), MAX_MEMBERS);
        assert_eq!(b.get("sd-routing-key"), None);
    }

    #[test]
    fn header_value_escapes_reserved_octets() {
        let mut b = Baggage::new();
        b.insert("sd-routing-key", "a,b;c=d e");
        let encoded = b.to_header_value();
        assert_eq!(encoded, "sd-routing-key=a%2Cb%3Bc%3Dd%20e");
        assert_eq!(Baggage::parse(&encoded), b);
    }

    #[test]
    fn extracts_from_every_carrier_shape() {
        let attrs = MessageAttributes::new().with_routing_key("abc");
        let headers = Headers::new().with_routing_key("abc");

        assert_eq!(
            extract_routing_key(&Carrier::from(&attrs)).as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_routing_key(&Carrier::from(&headers)).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn absent_property_yields_none() {
        let mut attrs = MessageAttributes::new();
        attrs.insert("baggage", AttributeValue::string("tenant=acme"));
        let headers: Headers = [("x-request-id", "1")].into_iter().collect();

        assert_eq!(extract_routing_key(&Carrier::from(&attrs)), None);
        assert_eq!(extract_routing_key(&Carrier::from(&headers)), None);
        assert_eq!(
            extract_routing_key(&Carrier::from(&MessageAttributes::new())),
            None
        );
    }

    #[test]
    fn garbage_baggage_yields_none() {
        let headers: Headers = [("baggage", ";;;,,,==,%%%")].into_iter().collect();
        assert_eq!(extract_routing_key(&Carrier::from(&headers)), None);
    }
}
