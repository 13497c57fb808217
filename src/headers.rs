use std::fmt;

use http::{HeaderName, HeaderValue};

use crate::Error;

/// Ordered list of headers.
///
/// Unlike `http::HeaderMap` this keeps the exact order headers were added in, across
/// different names. Duplicates are allowed. Lookup by name is case insensitive.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(HeaderName, HeaderValue)>);

impl Headers {
    /// Empty list.
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    /// Append a header, validating name and value.
    pub fn append<K, V>(&mut self, key: K, value: V) -> Result<(), Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(key).map_err(|e| bad_header(e.into()))?;
        let value = HeaderValue::try_from(value).map_err(|e| bad_header(e.into()))?;
        self.0.push((name, value));
        Ok(())
    }

    pub(crate) fn push(&mut self, name: HeaderName, value: HeaderValue) {
        self.0.push((name, value));
    }

    /// Remove all headers named `name`.
    pub fn remove(&mut self, name: &HeaderName) {
        self.0.retain(|(k, _)| k != name);
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// First value of `name` as a string, if it is valid visible ascii.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Tell if there is at least one header `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    /// Number of headers, counting duplicates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tell if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn bad_header(e: http::Error) -> Error {
    Error::BadHeader(e.to_string())
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}
