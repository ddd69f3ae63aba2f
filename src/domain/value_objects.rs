//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Externally visible hostname a set of droplets is registered under.
///
/// Route keys are case-insensitive; the constructor lowercases the input so
/// every map lookup and comparison sees the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    /// Normalize a hostname into a route key.
    ///
    /// # Examples
    /// ```
    /// use edge_router::RouteKey;
    ///
    /// assert_eq!(RouteKey::new("Foo.Example.COM").as_str(), "foo.example.com");
    /// ```
    pub fn new(route: &str) -> Self {
        Self(route.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RouteKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response status bucket used by the per-tag counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    Redirection,
    ClientError,
    ServerError,
    /// Anything outside 200..=599.
    Other,
}

impl StatusClass {
    /// All classes, in the order their counters are stored.
    pub const ALL: [StatusClass; 5] = [
        Self::Success,
        Self::Redirection,
        Self::ClientError,
        Self::ServerError,
        Self::Other,
    ];

    /// Classify a numeric HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            300..=399 => Self::Redirection,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// Slot index of this class in a five-counter array.
    pub fn index(self) -> usize {
        match self {
            Self::Success => 0,
            Self::Redirection => 1,
            Self::ClientError => 2,
            Self::ServerError => 3,
            Self::Other => 4,
        }
    }
}

/// Sanitized tag metadata attached to a droplet (e.g. framework, runtime).
///
/// Pairs with a missing key or a missing value never make it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build tags from raw pairs, dropping any pair with a `None` side.
    pub fn sanitize<I, K, V>(raw: I) -> Self
    where
        I: IntoIterator<Item = (Option<K>, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = raw
            .into_iter()
            .filter_map(|(k, v)| match (k, v) {
                (Some(k), Some(v)) => Some((k.into(), v.into())),
                _ => None,
            })
            .collect();
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Fixed 404 redirect response, rendered once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundRedirect {
    location: String,
    response: String,
}

impl NotFoundRedirect {
    pub fn new(location: impl Into<String>) -> Self {
        let location = location.into();
        let response = format!(
            "HTTP/1.1 302 Not Found\r\nConnection: close\r\nLocation: {}\r\n\r\n",
            location
        );
        Self { location, response }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Raw HTTP response to write back to the client.
    pub fn response(&self) -> &str {
        &self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== RouteKey Tests =====

    #[test]
    fn test_route_key_lowercases() {
        assert_eq!(RouteKey::new("Foo.Example.com").as_str(), "foo.example.com");
        assert_eq!(RouteKey::new("FOO.EXAMPLE.COM"), RouteKey::new("foo.example.com"));
    }

    #[test]
    fn test_route_key_display() {
        assert_eq!(format!("{}", RouteKey::from("App.Vcap.Me")), "app.vcap.me");
    }

    // ===== StatusClass Tests =====

    #[test]
    fn test_status_class_buckets() {
        assert_eq!(StatusClass::from_status(200), StatusClass::Success);
        assert_eq!(StatusClass::from_status(204), StatusClass::Success);
        assert_eq!(StatusClass::from_status(302), StatusClass::Redirection);
        assert_eq!(StatusClass::from_status(404), StatusClass::ClientError);
        assert_eq!(StatusClass::from_status(503), StatusClass::ServerError);
    }

    #[test]
    fn test_status_class_out_of_range_is_other() {
        assert_eq!(StatusClass::from_status(0), StatusClass::Other);
        assert_eq!(StatusClass::from_status(101), StatusClass::Other);
        assert_eq!(StatusClass::from_status(600), StatusClass::Other);
        assert_eq!(StatusClass::from_status(999), StatusClass::Other);
    }

    #[test]
    fn test_status_class_indices_are_distinct() {
        let mut seen = [false; 5];
        for class in StatusClass::ALL {
            assert!(!seen[class.index()]);
            seen[class.index()] = true;
        }
    }

    // ===== Tags Tests =====

    #[test]
    fn test_tags_sanitize_drops_missing_sides() {
        let tags = Tags::sanitize(vec![
            (None, Some("x")),
            (Some("k"), None),
            (Some("good"), Some("v")),
        ]);

        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("good"), Some("v"));
        assert_eq!(tags.get("k"), None);
    }

    #[test]
    fn test_tags_from_iter() {
        let tags: Tags = [("framework", "rails"), ("runtime", "ruby19")].into_iter().collect();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("runtime"), Some("ruby19"));
    }

    // ===== NotFoundRedirect Tests =====

    #[test]
    fn test_not_found_redirect_response() {
        let redirect = NotFoundRedirect::new("http://www.example.com/404");
        assert_eq!(redirect.location(), "http://www.example.com/404");
        assert_eq!(
            redirect.response(),
            "HTTP/1.1 302 Not Found\r\nConnection: close\r\nLocation: http://www.example.com/404\r\n\r\n"
        );
    }
}
