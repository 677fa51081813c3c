//! Uniform key lookup over heterogeneous message metadata.
//!
//! Transports attach propagated context in different shapes: queue services use
//! structured attribute maps (`{name: {DataType, StringValue}}`), while HTTP and
//! broker headers are flat string maps. [`Carrier`] closes over both so a single
//! extraction procedure works across transports.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use sbx_model::{BAGGAGE_PROPERTY, ROUTING_KEY_PROPERTY};

use crate::baggage::Baggage;

/// Typed value of a structured message attribute.
///
/// Only `StringValue` is surfaced through [`Carrier`]; binary values are carried
/// along untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeValue {
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_value: Option<Vec<u8>>,
}

impl AttributeValue {
    /// A `String`-typed attribute.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: Some(value.into()),
            binary_value: None,
        }
    }
}

/// Structured attribute map as attached by queue/topic services.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageAttributes(pub BTreeMap<String, AttributeValue>);

impl MessageAttributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or overwrite an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) -> &mut Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Get an attribute by exact name.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tag the attributes with a routing key, merging into any existing baggage.
    pub fn with_routing_key(mut self, routing_key: &str) -> Self {
        let mut baggage = self
            .get(BAGGAGE_PROPERTY)
            .and_then(|v| v.string_value.as_deref())
            .map(Baggage::parse)
            .unwrap_or_default();
        baggage.insert(ROUTING_KEY_PROPERTY, routing_key);

        self.insert(
            BAGGAGE_PROPERTY,
            AttributeValue::string(baggage.to_header_value()),
        );
        self
    }
}

/// Flat header map (HTTP request headers, AMQP message headers).
///
/// Names keep their original spelling and order; repeated names are allowed.
/// Lookups are ASCII case-insensitive.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(pub Vec<(String, String)>);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a header; earlier values with the same name are kept.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((name.into(), value.into()));
        self
    }

    /// Replace every value stored under `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
        self
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tag the headers with a routing key, merging into any existing baggage.
    pub fn with_routing_key(mut self, routing_key: &str) -> Self {
        let mut baggage = self
            .get_all(BAGGAGE_PROPERTY)
            .next()
            .map(Baggage::parse)
            .unwrap_or_default();
        baggage.insert(ROUTING_KEY_PROPERTY, routing_key);

        self.set(BAGGAGE_PROPERTY, baggage.to_header_value());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Read-only view over message metadata, whatever its transport shape.
#[derive(Debug, Clone, Copy)]
pub enum Carrier<'a> {
    /// Structured attribute map; only string values are surfaced.
    Attributes(&'a MessageAttributes),
    /// Flat header map; lookups are case-insensitive.
    Headers(&'a Headers),
}

impl<'a> Carrier<'a> {
    /// All string values stored under `key`.
    ///
    /// Returns an empty list when the key is absent; never fails.
    pub fn lookup(&self, key: &str) -> Vec<&'a str> {
        match *self {
            Carrier::Attributes(attrs) => attrs
                .get(key)
                .and_then(|v| v.string_value.as_deref())
                .into_iter()
                .collect(),
            Carrier::Headers(headers) => headers
                .0
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
                .collect(),
        }
    }

    /// First value stored under `key`, if any.
    pub fn first(&self, key: &str) -> Option<&'a str> {
        self.lookup(key).into_iter().next()
    }

    /// Names of every property present in the carrier.
    pub fn keys(&self) -> BTreeSet<String> {
        match *self {
            Carrier::Attributes(attrs) => attrs.0.keys().cloned().collect(),
            Carrier::Headers(headers) => headers.0.iter().map(|(n, _)| n.clone()).collect(),
        }
    }
}

impl<'a> From<&'a MessageAttributes> for Carrier<'a> {
    fn from(attrs: &'a MessageAttributes) -> Self {
        Carrier::Attributes(attrs)
    }
}

impl<'a> From<&'a Headers> for Carrier<'a> {
    fn from(headers: &'a Headers) -> Self {
        Carrier::Headers(headers)
    }
}
