use axum::http::HeaderMap;
use tokio::time::Instant;

use sbx_core::{carrier::Headers, decision::RoutingFilter};

use crate::handler::RoutingStatus;

/// Copy an HTTP header map into a routing carrier.
///
/// Every value is kept, in order. Values that are not visible ASCII are
/// dropped.
pub fn headers_from_map(map: &HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

impl RoutingStatus {
    /// Describe a filter's current snapshot as of `now`.
    pub fn from_filter(filter: &RoutingFilter, now: Instant) -> Self {
        let cache = filter.cache();
        let snapshot = cache.snapshot();
        let role = filter.role();

        Self {
            role: role.label().to_string(),
            sandbox_name: role.sandbox().map(|s| s.name.clone()),
            routing_key: role.own_key().map(str::to_string),
            workload: cache.query().workload.clone(),
            delivery_mode: filter.delivery_mode(),
            active_keys: snapshot
                .sorted_keys()
                .into_iter()
                .map(str::to_string)
                .collect(),
            version: snapshot.version(),
            has_completed_first_update: snapshot.has_completed_first_update(),
            seconds_since_update: snapshot.age(now).map(|age| age.as_secs_f64()),
            refreshing: cache.is_refreshing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::HeaderValue;
    use sbx_core::{baggage::extract_routing_key, carrier::Carrier};

    #[test]
    fn header_map_keeps_repeated_values() {
        let mut map = HeaderMap::new();
        map.append("baggage", HeaderValue::from_static("sd-routing-key=abc"));
        map.append("baggage", HeaderValue::from_static("a=1"));
        map.insert("x-request-id", HeaderValue::from_static("r-1"));

        let headers = headers_from_map(&map);
        assert_eq!(headers.len(), 3);
        assert_eq!(
            headers.get_all("Baggage").collect::<Vec<_>>(),
            vec!["sd-routing-key=abc", "a=1"]
        );
        assert_eq!(
            extract_routing_key(&Carrier::from(&headers)).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn opaque_values_are_dropped() {
        let mut map = HeaderMap::new();
        map.insert("baggage", HeaderValue::from_bytes(b"k=\xff").unwrap());

        assert!(headers_from_map(&map).is_empty());
    }
}
