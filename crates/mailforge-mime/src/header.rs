//! MIME header handling.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fmt;

/// Preferred maximum length of a rendered header line.
const FOLD_WIDTH: usize = 76;

/// Collection of email headers.
///
/// Lookup is case-insensitive; rendering keeps the case and order in which
/// each header name was first added.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: IndexMap<String, (String, Vec<String>)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid field name or the value
    /// contains a bare line break.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (name, value) = checked(name.into(), value.into())?;
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| (name, Vec::new()))
            .1
            .push(value);
        Ok(())
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Headers::add`].
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (name, value) = checked(name.into(), value.into())?;
        let entry = self
            .headers
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| (name, Vec::new()));
        entry.1.clear();
        entry.1.push(value);
        Ok(())
    }

    /// Returns true if `name` is a valid header field name: printable ASCII
    /// without spaces or colons.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|(_, v)| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.headers.shift_remove(&name.to_ascii_lowercase());
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .values()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }
}

fn checked(name: String, value: String) -> Result<(String, String)> {
    if !Headers::is_valid_name(&name) {
        return Err(Error::InvalidHeader(format!("Invalid header name: {name:?}")));
    }
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeader(format!(
            "Line break in value of {name}"
        )));
    }
    Ok((name, value))
}

/// Folds a header line at whitespace so lines stay near [`FOLD_WIDTH`].
///
/// Words longer than the limit are left intact.
fn fold(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + 8);
    let mut current = 0;

    for (i, word) in line.split(' ').enumerate() {
        if i == 0 {
            folded.push_str(word);
            current = word.len();
        } else if current + 1 + word.len() > FOLD_WIDTH && current > 0 {
            folded.push_str("\r\n ");
            folded.push_str(word);
            current = 1 + word.len();
        } else {
            folded.push(' ');
            folded.push_str(word);
            current += 1 + word.len();
        }
    }

    folded
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}\r\n", fold(&format!("{name}: {value}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com").unwrap();
        headers.add("to", "bob@example.com").unwrap();
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("TO", "charlie@example.com").unwrap();
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test").unwrap();
        assert!(headers.contains("subject"));

        headers.remove("Subject");
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_headers_reject_bad_input() {
        let mut headers = Headers::new();
        assert!(headers.add("", "x").is_err());
        assert!(headers.add("Bad Name", "x").is_err());
        assert!(headers.add("X-Colon:", "x").is_err());
        assert!(headers.add("X-Inject", "a\r\nBcc: evil@example.com").is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_display_keeps_order_and_case() {
        let mut headers = Headers::new();
        headers.add("X-Mailer", "mailforge").unwrap();
        headers.add("From", "sender@example.com").unwrap();
        headers.add("to", "recipient@example.com").unwrap();

        assert_eq!(
            headers.to_string(),
            "X-Mailer: mailforge\r\nFrom: sender@example.com\r\nto: recipient@example.com\r\n"
        );
    }

    #[test]
    fn test_headers_display_folds_long_values() {
        let mut headers = Headers::new();
        let value = vec!["word"; 40].join(" ");
        headers.add("X-Long", value.clone()).unwrap();

        let rendered = headers.to_string();
        assert!(rendered.contains("\r\n "));
        assert!(rendered.split("\r\n").all(|l| l.len() <= FOLD_WIDTH));
        assert_eq!(rendered.replace("\r\n ", " "), format!("X-Long: {value}\r\n"));
    }

    #[test]
    fn test_is_valid_name() {
        assert!(Headers::is_valid_name("X-Custom"));
        assert!(!Headers::is_valid_name(""));
        assert!(!Headers::is_valid_name("Bad Name"));
        assert!(!Headers::is_valid_name("X:Y"));
        assert!(!Headers::is_valid_name("Grüße"));
        assert!(!Headers::is_valid_name("X-\tTab"));
    }
}
