use std::fmt;

/// Cache key: a namespace plus a normalized entity id.
///
/// Rendered as `namespace:id`. The id is trimmed and lower-cased so every
/// spelling of the same entity lands on the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    id: String,
}

impl CacheKey {
    pub fn new(namespace: &str, id: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            id: normalize_id(id),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// Trim and lower-case an entity identifier.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_and_cased_ids_share_a_key() {
        let a = CacheKey::new("weather", "  London ");
        let b = CacheKey::new("weather", "london");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "weather:london");
    }

    #[test]
    fn test_namespace_is_kept_verbatim() {
        let key = CacheKey::new("Weather", "PARIS");
        assert_eq!(key.namespace(), "Weather");
        assert_eq!(key.id(), "paris");
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        assert_ne!(CacheKey::new("weather", "oslo"), CacheKey::new("forecast", "oslo"));
    }

    #[test]
    fn test_normalize_unicode() {
        assert_eq!(normalize_id("\tSÃO PAULO\n"), "são paulo");
    }
}
