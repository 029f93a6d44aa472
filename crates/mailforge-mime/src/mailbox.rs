//! Mailbox rendering for address headers.

use crate::encoding::encode_rfc2047;
use crate::error::Result;
use std::fmt;

/// Recipient header kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecipientType {
    /// Primary recipients.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy (never rendered into the message text).
    Bcc,
}

impl RecipientType {
    /// Header name for this recipient kind.
    #[must_use]
    pub const fn header_name(self) -> &'static str {
        match self {
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// An address with an optional display name, as it appears in a header.
///
/// No syntax checking happens here; callers hand in addresses they have
/// already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox with just an address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Creates a mailbox with a display name.
    #[must_use]
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Renders the mailbox for a header, encoding the display name in
    /// `charset` when it is not plain ASCII.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset cannot represent the display name.
    pub fn render(&self, charset: &str) -> Result<String> {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            None => Ok(self.address.clone()),
            Some(name) => {
                let encoded = encode_rfc2047(name, charset)?;
                if encoded == name {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    Ok(format!("\"{escaped}\" <{}>", self.address))
                } else {
                    Ok(format!("{encoded} <{}>", self.address))
                }
            }
        }
    }

    /// Renders a list of mailboxes as a comma separated header value.
    ///
    /// # Errors
    ///
    /// Returns an error if any display name cannot be encoded.
    pub fn render_list(mailboxes: &[Self], charset: &str) -> Result<String> {
        let rendered = mailboxes
            .iter()
            .map(|m| m.render(charset))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_bare_address() {
        let mailbox = Mailbox::new("user@example.com");
        assert_eq!(mailbox.render("utf-8").unwrap(), "user@example.com");
    }

    #[test]
    fn test_render_quotes_ascii_name() {
        let mailbox = Mailbox::with_name("Doe, \"JD\" John", "john@example.com");
        assert_eq!(
            mailbox.render("utf-8").unwrap(),
            "\"Doe, \\\"JD\\\" John\" <john@example.com>"
        );
    }

    #[test]
    fn test_render_encodes_non_ascii_name() {
        let mailbox = Mailbox::with_name("Jörg", "joerg@example.com");
        assert_eq!(
            mailbox.render("utf-8").unwrap(),
            "=?utf-8?B?SsO2cmc=?= <joerg@example.com>"
        );
    }

    #[test]
    fn test_render_list() {
        let list = vec![
            Mailbox::new("a@example.com"),
            Mailbox::with_name("B", "b@example.com"),
        ];
        assert_eq!(
            Mailbox::render_list(&list, "utf-8").unwrap(),
            "a@example.com, \"B\" <b@example.com>"
        );
    }

    #[test]
    fn test_recipient_type_header_name() {
        assert_eq!(RecipientType::Cc.to_string(), "Cc");
    }
}
