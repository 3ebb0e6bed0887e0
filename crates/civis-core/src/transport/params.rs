//! Query-string parameters with "not specified" handling.

/// Ordered query parameters.
///
/// `None` and empty strings both mean "not specified" and are dropped, so a
/// form that submits `""` for an unset filter produces the same request as
/// one that omits it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, skipping empty values.
    pub fn set(mut self, name: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.trim().is_empty() {
            self.pairs.push((name.to_string(), value));
        }
        self
    }

    /// Add a parameter only when a value is present.
    pub fn set_opt<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}
