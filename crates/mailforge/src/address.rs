//! Validated email addresses and ordered address lists.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use mailforge_mime::Mailbox;
use std::fmt;

/// Longest address accepted (RFC 5321 path limit minus the angle brackets).
const MAX_ADDRESS_LEN: usize = 254;

/// Longest local part accepted.
const MAX_LOCAL_PART_LEN: usize = 64;

/// Longest domain label accepted.
const MAX_LABEL_LEN: usize = 63;

/// Capability that decides whether a string is an acceptable address.
pub trait AddressValidator {
    /// Returns true if `address` is syntactically acceptable.
    fn validate(&self, address: &str) -> bool;
}

impl<F> AddressValidator for F
where
    F: Fn(&str) -> bool,
{
    fn validate(&self, address: &str) -> bool {
        self(address)
    }
}

/// RFC 5322 `addr-spec` check restricted to dot-atom local parts and
/// host-name domains.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxValidator;

impl SyntaxValidator {
    fn is_atom_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~-".contains(c)
    }

    fn valid_local_part(local: &str) -> bool {
        !local.is_empty()
            && local.len() <= MAX_LOCAL_PART_LEN
            && local
                .split('.')
                .all(|atom| !atom.is_empty() && atom.chars().all(Self::is_atom_char))
    }

    fn valid_domain(domain: &str) -> bool {
        !domain.is_empty()
            && domain.split('.').all(|label| {
                !label.is_empty()
                    && label.len() <= MAX_LABEL_LEN
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
    }
}

impl AddressValidator for SyntaxValidator {
    fn validate(&self, address: &str) -> bool {
        if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
            return false;
        }

        match address.split_once('@') {
            Some((local, domain)) => {
                !domain.contains('@')
                    && Self::valid_local_part(local)
                    && Self::valid_domain(domain)
            }
            None => false,
        }
    }
}

/// An address that passed validation, with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    address: String,
    name: Option<String>,
}

impl EmailAddress {
    /// Validates `address` with [`SyntaxValidator`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(address: &str) -> Result<Self> {
        Self::validated(address, None, &SyntaxValidator)
    }

    /// Validates `address` and attaches a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn with_name(address: &str, name: &str) -> Result<Self> {
        Self::validated(address, Some(name), &SyntaxValidator)
    }

    /// Validates `address` with the given validator.
    ///
    /// Surrounding whitespace is ignored; an empty display name counts as
    /// none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the validator rejects the address.
    pub fn validated(
        address: &str,
        name: Option<&str>,
        validator: &dyn AddressValidator,
    ) -> Result<Self> {
        let address = address.trim();
        if !validator.validate(address) {
            tracing::debug!(address, "Rejected email address");
            return Err(Error::invalid_address(format!(
                "Invalid email address: {address:?}"
            )));
        }

        Ok(Self {
            address: address.to_string(),
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        })
    }

    /// The address itself.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Key used for uniqueness: the domain is case-insensitive, the local
    /// part is not.
    fn key(&self) -> String {
        match self.address.rsplit_once('@') {
            Some((local, domain)) => format!("{local}@{}", domain.to_ascii_lowercase()),
            None => self.address.clone(),
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl From<&EmailAddress> for Mailbox {
    fn from(address: &EmailAddress) -> Self {
        Self {
            name: address.name.clone(),
            address: address.address.clone(),
        }
    }
}

/// Ordered collection of addresses, unique by address.
///
/// Re-adding an address keeps its original position and replaces its
/// display name.
#[derive(Debug, Clone, Default)]
pub struct AddressList {
    entries: IndexMap<String, EmailAddress>,
}

impl AddressList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an address. Returns true if it was not already present.
    pub fn insert(&mut self, address: EmailAddress) -> bool {
        self.entries.insert(address.key(), address).is_none()
    }

    /// Number of addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the list holds `address`.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    /// Looks up an entry by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&EmailAddress> {
        let probe = EmailAddress {
            address: address.trim().to_string(),
            name: None,
        };
        self.entries.get(&probe.key())
    }

    /// Iterates the addresses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EmailAddress> {
        self.entries.values()
    }

    /// The bare address strings in insertion order.
    #[must_use]
    pub fn addresses(&self) -> Vec<&str> {
        self.iter().map(EmailAddress::address).collect()
    }

    /// Removes every address.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Converts to mailboxes for the MIME layer.
    #[must_use]
    pub fn to_mailboxes(&self) -> Vec<Mailbox> {
        self.iter().map(Mailbox::from).collect()
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a EmailAddress;
    type IntoIter = indexmap::map::Values<'a, String, EmailAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        for addr in [
            "ab@cd.com",
            "a.b@c.org",
            "abcdefjhjkmnoprstuof@com.bd",
            "ghknb@inet.com",
            "first+tag@sub-domain.example.co.uk",
            "o'brien@example.ie",
            "postmaster@localhost",
        ] {
            assert!(SyntaxValidator.validate(addr), "{addr} should be valid");
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for addr in [
            "",
            "invalidEmail",
            "@example.com",
            "user@",
            "user@@example.com",
            "a@b@example.com",
            ".user@example.com",
            "user.@example.com",
            "us..er@example.com",
            "user name@example.com",
            "user@-example.com",
            "user@example-.com",
            "user@example..com",
            "user@exa_mple.com",
        ] {
            assert!(!SyntaxValidator.validate(addr), "{addr:?} should be invalid");
        }
    }

    #[test]
    fn test_length_limits() {
        let local = "a".repeat(MAX_LOCAL_PART_LEN + 1);
        assert!(!SyntaxValidator.validate(&format!("{local}@example.com")));

        let label = "b".repeat(MAX_LABEL_LEN + 1);
        assert!(!SyntaxValidator.validate(&format!("user@{label}.com")));
    }

    #[test]
    fn test_email_address_trims_and_keeps_name() {
        let addr = EmailAddress::with_name("  user@example.com ", " User ").unwrap();
        assert_eq!(addr.address(), "user@example.com");
        assert_eq!(addr.name(), Some("User"));
        assert_eq!(addr.to_string(), "User <user@example.com>");

        let addr = EmailAddress::with_name("user@example.com", "  ").unwrap();
        assert_eq!(addr.name(), None);
    }

    #[test]
    fn test_email_address_error_message() {
        let err = EmailAddress::new("invalidEmail").unwrap_err();
        assert!(err.is_invalid_address());
        assert!(err.to_string().contains("invalidEmail"));
    }

    #[test]
    fn test_custom_validator() {
        let corporate_only = |addr: &str| addr.ends_with("@corp.example");
        assert!(EmailAddress::validated("a@corp.example", None, &corporate_only).is_ok());
        assert!(EmailAddress::validated("a@example.com", None, &corporate_only).is_err());
    }

    #[test]
    fn test_address_list_order_and_uniqueness() {
        let mut list = AddressList::new();
        assert!(list.insert(EmailAddress::new("b@example.com").unwrap()));
        assert!(list.insert(EmailAddress::new("a@example.com").unwrap()));
        assert!(!list.insert(EmailAddress::with_name("b@EXAMPLE.com", "Bee").unwrap()));

        assert_eq!(list.len(), 2);
        assert_eq!(list.addresses(), vec!["b@EXAMPLE.com", "a@example.com"]);
        assert_eq!(list.get("b@example.com").unwrap().name(), Some("Bee"));
        assert!(list.contains("a@Example.COM"));
        assert!(!list.contains("A@example.com"));
    }

    #[test]
    fn test_address_list_to_mailboxes() {
        let mut list = AddressList::new();
        list.insert(EmailAddress::with_name("a@example.com", "A").unwrap());
        let mailboxes = list.to_mailboxes();
        assert_eq!(mailboxes, vec![Mailbox::with_name("A", "a@example.com")]);
    }
}
