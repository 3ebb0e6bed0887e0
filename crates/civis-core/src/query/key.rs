//! Cache keys.
//!
//! A [`QueryKey`] is an ordered tuple: resource name followed by filter
//! parameters. Construction is normalized so one logical query always maps
//! to one key:
//! - empty strings and `None` both become [`KeyPart::Null`]
//! - trailing `Null`s are ignored for equality, hashing and prefix matching

use std::fmt;
use std::hash::{Hash, Hasher};

/// One positional element of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    /// "Not specified".
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Page number. Keys differing only in pages are the same query at a
    /// different offset, which enables placeholder data while paginating.
    Page(u32),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            KeyPart::Null
        } else {
            KeyPart::Str(value.to_string())
        }
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::from(value.as_str())
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::from(value.as_str())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(KeyPart::Null)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => write!(f, "null"),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Int(n) => write!(f, "{}", n),
            KeyPart::Str(s) => write!(f, "{:?}", s),
            KeyPart::Page(p) => write!(f, "page:{}", p),
        }
    }
}

/// Ordered identifier of one logical query.
#[derive(Debug, Clone, Default)]
pub struct QueryKey {
    parts: Vec<KeyPart>,
}

impl QueryKey {
    /// Start a key with the resource name.
    pub fn new(resource: &str) -> Self {
        Self {
            parts: vec![KeyPart::from(resource)],
        }
    }

    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a positional parameter.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// Append a page number.
    pub fn page(mut self, page: u32) -> Self {
        self.parts.push(KeyPart::Page(page));
        self
    }

    /// Normalized parts, trailing `Null`s removed.
    pub fn parts(&self) -> &[KeyPart] {
        let len = self
            .parts
            .iter()
            .rposition(|p| *p != KeyPart::Null)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.parts[..len]
    }

    pub fn resource(&self) -> Option<&KeyPart> {
        self.parts().first()
    }

    /// Whether `prefix` matches the leading elements of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.parts().starts_with(prefix.parts())
    }

    /// Same query, different page.
    pub fn differs_only_in_page(&self, other: &QueryKey) -> bool {
        let (a, b) = (self.parts(), other.parts());
        a != b
            && a.len() == b.len()
            && a.iter().zip(b).all(|pair| match pair {
                (KeyPart::Page(_), KeyPart::Page(_)) => true,
                (x, y) => x == y,
            })
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts() == other.parts()
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.parts().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}

/// Build a [`QueryKey`] from a resource name and parameters.
///
/// ```
/// use civis_core::query_key;
///
/// let a = query_key!("reports", "x", None::<&str>);
/// let b = query_key!("reports", "x");
/// assert_eq!(a, b);
/// ```
#[macro_export]
macro_rules! query_key {
    ($resource:expr $(, $part:expr)* $(,)?) => {
        $crate::query::QueryKey::new($resource)$(.with($part))*
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_omitted_and_unspecified_trailing_parts_are_equal() {
        let explicit = QueryKey::new("reports").with("x").with(None::<&str>);
        let omitted = QueryKey::new("reports").with("x");
        let empty = QueryKey::new("reports").with("x").with("");

        assert_eq!(explicit, omitted);
        assert_eq!(empty, omitted);

        let set: HashSet<QueryKey> = [explicit, omitted, empty].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_inner_null_is_positional() {
        let a = QueryKey::new("reports").with("x").with(None::<&str>).with("2024");
        let b = QueryKey::new("reports").with("x").with("2024");
        assert_ne!(a, b);
        assert_eq!(a.parts().len(), 4);
    }

    #[test]
    fn test_prefix_matching() {
        let pending = query_key!("reports", "cityA", "pendente");
        let resolved = query_key!("reports", "cityA", "resolvido");
        let other_city = query_key!("reports", "cityB", "pendente");
        let prefix = query_key!("reports", "cityA");

        assert!(pending.starts_with(&prefix));
        assert!(resolved.starts_with(&prefix));
        assert!(!other_city.starts_with(&prefix));
        assert!(prefix.starts_with(&prefix));
        assert!(!prefix.starts_with(&pending));
    }

    #[test]
    fn test_numbers_and_strings_differ() {
        assert_ne!(query_key!("users", 1i64), query_key!("users", "1"));
    }

    #[test]
    fn test_page_only_difference() {
        let page1 = query_key!("reports", "x").page(1);
        let page2 = query_key!("reports", "x").page(2);
        let other = query_key!("reports", "y").page(2);

        assert!(page1.differs_only_in_page(&page2));
        assert!(!page1.differs_only_in_page(&page1));
        assert!(!page1.differs_only_in_page(&other));
    }

    #[test]
    fn test_display() {
        let key = query_key!("reports", "x", 3i64).page(2);
        assert_eq!(key.to_string(), r#"["reports","x",3,page:2]"#);
    }
}
