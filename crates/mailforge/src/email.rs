//! The email composer.

use crate::address::{AddressList, AddressValidator, EmailAddress, SyntaxValidator};
use crate::config::{Authenticator, TransportConfig};
use crate::error::{Error, Result};
use crate::session::{Session, SessionProperties};
use crate::transport::{MimeTransport, OutgoingMessage, Transport};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use mailforge_mime::encoding::{DEFAULT_CHARSET, encode_charset, encode_rfc2047};
use mailforge_mime::{ContentType, Headers, RecipientType};
use std::fmt;
use std::time::Duration;

const ADDRESS_LIST_INVALID: &str = "Address List invalid";
const HEADER_NAME_MISSING: &str = "name can not be null or empty";
const HEADER_VALUE_MISSING: &str = " Value can not be null or empty";
const HEADER_VALUE_EMPTY: &str = "Value can not be empty";
const ALREADY_BUILT: &str = "Mime message already built";

/// Lifecycle of an [`Email`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Nothing has been set yet.
    #[default]
    Empty,
    /// At least one field has been set.
    Configuring,
    /// The MIME message has been built; the email is now read-only.
    Built,
}

/// Address list an address is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    To,
    Cc,
    Bcc,
    ReplyTo,
}

#[derive(Debug, Clone)]
enum Body {
    Text(String),
    Content {
        content: String,
        content_type: ContentType,
    },
}

/// Accumulates the parts of an email, validates them, and builds the MIME
/// message plus the session needed to send it.
///
/// Every mutator returns `Result<&mut Self>` so calls chain with `?`. Once
/// [`Email::build_mime_message`] succeeds the email is frozen and every
/// mutator fails with [`Error::IllegalState`].
///
/// ```
/// use mailforge::Email;
///
/// # fn main() -> mailforge::Result<()> {
/// let mut email = Email::new();
/// email
///     .set_host_name("smtp.example.com")?
///     .set_smtp_port(587)?
///     .set_from("from@example.com")?
///     .add_to("to@example.com")?
///     .set_subject("Test Subject")?
///     .set_msg("Test message")?;
///
/// email.build_mime_message()?;
/// assert_eq!(email.mime_message()?.subject().as_deref(), Some("Test Subject"));
/// # Ok(())
/// # }
/// ```
pub struct Email<T: Transport = MimeTransport> {
    transport: T,
    validator: Box<dyn AddressValidator>,
    config: TransportConfig,
    from: Option<EmailAddress>,
    to: AddressList,
    cc: AddressList,
    bcc: AddressList,
    reply_to: AddressList,
    headers: IndexMap<String, String>,
    subject: Option<String>,
    charset: Option<String>,
    body: Option<Body>,
    sent_date: Option<DateTime<Utc>>,
    state: State,
    message: Option<T::Message>,
}

impl Email<MimeTransport> {
    /// Creates an empty email backed by [`MimeTransport`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(MimeTransport)
    }

    /// Creates an email whose transport settings come from `config`.
    #[must_use]
    pub fn from_config(config: TransportConfig) -> Self {
        let mut email = Self::new();
        email.config = config;
        email
    }
}

impl Default for Email<MimeTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Email<T> {
    /// Creates an empty email that builds sessions and messages through
    /// `transport`.
    #[must_use]
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            validator: Box::new(SyntaxValidator),
            config: TransportConfig::default(),
            from: None,
            to: AddressList::new(),
            cc: AddressList::new(),
            bcc: AddressList::new(),
            reply_to: AddressList::new(),
            headers: IndexMap::new(),
            subject: None,
            charset: None,
            body: None,
            sent_date: None,
            state: State::Empty,
            message: None,
        }
    }

    /// Replaces the address validator used by every address setter.
    #[must_use]
    pub fn with_validator(mut self, validator: impl AddressValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// The transport sessions and messages come from.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Runs a mutation unless the email is already built.
    fn mutate(&mut self, change: impl FnOnce(&mut Self) -> Result<()>) -> Result<&mut Self> {
        if self.state == State::Built {
            return Err(Error::illegal_state(
                "Email already built; create a new Email for another message",
            ));
        }
        change(self)?;
        self.state = State::Configuring;
        Ok(self)
    }

    fn validate(&self, address: &str, name: Option<&str>) -> Result<EmailAddress> {
        EmailAddress::validated(address, name, self.validator.as_ref())
    }

    const fn list_mut(&mut self, kind: ListKind) -> &mut AddressList {
        match kind {
            ListKind::To => &mut self.to,
            ListKind::Cc => &mut self.cc,
            ListKind::Bcc => &mut self.bcc,
            ListKind::ReplyTo => &mut self.reply_to,
        }
    }

    fn add_one(&mut self, kind: ListKind, address: &str, name: Option<&str>) -> Result<&mut Self> {
        self.mutate(|email| {
            let address = email.validate(address, name)?;
            email.list_mut(kind).insert(address);
            Ok(())
        })
    }

    /// Validates every entry before adding any, so a bad entry leaves the
    /// list untouched.
    fn add_many<I, S>(&mut self, kind: ListKind, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate(|email| {
            let validated = addresses
                .into_iter()
                .map(|a| email.validate(a.as_ref(), None))
                .collect::<Result<Vec<_>>>()
                .map_err(|_| Error::invalid_address(ADDRESS_LIST_INVALID))?;
            if validated.is_empty() {
                return Err(Error::invalid_address(ADDRESS_LIST_INVALID));
            }

            let list = email.list_mut(kind);
            for address in validated {
                list.insert(address);
            }
            Ok(())
        })
    }

    /// Adds a To recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_to(&mut self, address: &str) -> Result<&mut Self> {
        self.add_one(ListKind::To, address, None)
    }

    /// Adds a To recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_to_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.add_one(ListKind::To, address, Some(name))
    }

    /// Adds several To recipients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] with `"Address List invalid"` if the
    /// list is empty or any entry is malformed; nothing is added then.
    pub fn add_tos<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(ListKind::To, addresses)
    }

    /// Adds a Cc recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_cc(&mut self, address: &str) -> Result<&mut Self> {
        self.add_one(ListKind::Cc, address, None)
    }

    /// Adds a Cc recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_cc_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.add_one(ListKind::Cc, address, Some(name))
    }

    /// Adds several Cc recipients.
    ///
    /// # Errors
    ///
    /// Same as [`Email::add_tos`].
    pub fn add_ccs<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(ListKind::Cc, addresses)
    }

    /// Adds a Bcc recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_bcc(&mut self, address: &str) -> Result<&mut Self> {
        self.add_one(ListKind::Bcc, address, None)
    }

    /// Adds a Bcc recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_bcc_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.add_one(ListKind::Bcc, address, Some(name))
    }

    /// Adds several Bcc recipients.
    ///
    /// # Errors
    ///
    /// Same as [`Email::add_tos`].
    pub fn add_bccs<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(ListKind::Bcc, addresses)
    }

    /// Adds a Reply-To address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_reply_to(&mut self, address: &str) -> Result<&mut Self> {
        self.add_one(ListKind::ReplyTo, address, None)
    }

    /// Adds a Reply-To address with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn add_reply_to_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.add_one(ListKind::ReplyTo, address, Some(name))
    }

    /// Adds several Reply-To addresses.
    ///
    /// # Errors
    ///
    /// Same as [`Email::add_tos`].
    pub fn add_reply_tos<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_many(ListKind::ReplyTo, addresses)
    }

    /// To recipients in insertion order.
    #[must_use]
    pub const fn to_addresses(&self) -> &AddressList {
        &self.to
    }

    /// Cc recipients in insertion order.
    #[must_use]
    pub const fn cc_addresses(&self) -> &AddressList {
        &self.cc
    }

    /// Bcc recipients in insertion order.
    #[must_use]
    pub const fn bcc_addresses(&self) -> &AddressList {
        &self.bcc
    }

    /// Reply-To addresses in insertion order.
    #[must_use]
    pub const fn reply_to_addresses(&self) -> &AddressList {
        &self.reply_to
    }

    /// Sets the sender.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn set_from(&mut self, address: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            email.from = Some(email.validate(address, None)?);
            Ok(())
        })
    }

    /// Sets the sender with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn set_from_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            email.from = Some(email.validate(address, Some(name))?);
            Ok(())
        })
    }

    /// The sender, if set.
    #[must_use]
    pub const fn from_address(&self) -> Option<&EmailAddress> {
        self.from.as_ref()
    }

    /// Sets the envelope sender that receives bounces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn set_bounce_address(&mut self, address: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            let bounce = email.validate(address, None)?;
            email.config.bounce_address = Some(bounce.address().to_string());
            Ok(())
        })
    }

    /// The bounce address, if set.
    #[must_use]
    pub fn bounce_address(&self) -> Option<&str> {
        self.config.bounce_address.as_deref()
    }

    /// Adds a custom header, replacing an earlier value for the same name.
    ///
    /// `None` stands for a missing argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is missing, empty or not
    /// a valid field name, or the value is missing, empty or spans lines.
    /// A `Content-Type` value that does not parse yields [`Error::Mime`].
    pub fn add_header<'a>(
        &mut self,
        name: impl Into<Option<&'a str>>,
        value: impl Into<Option<&'a str>>,
    ) -> Result<&mut Self> {
        let (name, value) = (name.into(), value.into());
        self.mutate(|email| {
            let (name, value) = check_header(name, value)?;
            tracing::trace!(name, value, "Header added");
            email.headers.insert(name.to_string(), value.to_string());
            Ok(())
        })
    }

    /// Replaces all custom headers.
    ///
    /// # Errors
    ///
    /// Same as [`Email::add_header`]; on error the previous headers are kept.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.mutate(|email| {
            let mut checked = IndexMap::new();
            for (name, value) in headers {
                let (name, value) = check_header(Some(name.as_ref()), Some(value.as_ref()))?;
                checked.insert(name.to_string(), value.to_string());
            }
            email.headers = checked;
            Ok(())
        })
    }

    /// Custom headers in insertion order.
    #[must_use]
    pub const fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Sets the subject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_subject(&mut self, subject: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            email.subject = Some(subject.to_string());
            Ok(())
        })
    }

    /// The subject, if set.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Sets the charset for the subject, names and body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the charset is empty or not
    /// supported.
    pub fn set_charset(&mut self, charset: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            let charset = charset.trim();
            if charset.is_empty() {
                return Err(Error::invalid_argument("charset can not be empty"));
            }
            encode_charset("", charset)
                .map_err(|_| Error::invalid_argument(format!("Unsupported charset: {charset}")))?;
            email.charset = Some(charset.to_string());
            Ok(())
        })
    }

    /// The charset in effect; UTF-8 unless one was set.
    #[must_use]
    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }

    /// Sets a plain text body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the text is empty.
    pub fn set_msg(&mut self, text: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            if text.is_empty() {
                return Err(Error::invalid_argument("Invalid message supplied"));
            }
            email.body = Some(Body::Text(text.to_string()));
            Ok(())
        })
    }

    /// Sets a body with an explicit content type such as
    /// `text/html; charset=utf-8`.
    ///
    /// A `charset` parameter in the content type becomes the email charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mime`] if the content type cannot be parsed, or
    /// [`Error::InvalidArgument`] if its charset is not supported.
    pub fn set_content(&mut self, content: &str, content_type: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            let content_type = ContentType::parse(content_type)?;
            if let Some(charset) = content_type.charset() {
                encode_charset("", charset).map_err(|_| {
                    Error::invalid_argument(format!("Unsupported charset: {charset}"))
                })?;
                email.charset = Some(charset.to_string());
            }
            email.body = Some(Body::Content {
                content: content.to_string(),
                content_type,
            });
            Ok(())
        })
    }

    /// The body text, if set.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            Some(Body::Text(text)) => Some(text),
            Some(Body::Content { content, .. }) => Some(content),
            None => None,
        }
    }

    /// Sets the sent date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_sent_date(&mut self, date: DateTime<Utc>) -> Result<&mut Self> {
        self.mutate(|email| {
            email.sent_date = Some(date);
            Ok(())
        })
    }

    /// The sent date, or the current time when none was set.
    ///
    /// Dates are returned by value, so changing the result never affects
    /// the stored date.
    #[must_use]
    pub fn sent_date(&self) -> DateTime<Utc> {
        self.sent_date.unwrap_or_else(Utc::now)
    }

    /// Transport settings.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sets the SMTP host name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_host_name(&mut self, host: &str) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.host_name = Some(host.to_string());
            Ok(())
        })
    }

    /// The SMTP host name, if set.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        self.config.host_name.as_deref()
    }

    /// Sets the plain SMTP port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_smtp_port(&mut self, port: u16) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.smtp_port = port;
            Ok(())
        })
    }

    /// The plain SMTP port.
    #[must_use]
    pub const fn smtp_port(&self) -> u16 {
        self.config.smtp_port
    }

    /// Sets the port used with implicit TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_ssl_smtp_port(&mut self, port: u16) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.ssl_smtp_port = port;
            Ok(())
        })
    }

    /// The implicit TLS port.
    #[must_use]
    pub const fn ssl_smtp_port(&self) -> u16 {
        self.config.ssl_smtp_port
    }

    /// Connects with implicit TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_ssl_on_connect(&mut self, enabled: bool) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.ssl_on_connect = enabled;
            Ok(())
        })
    }

    /// Whether implicit TLS is used.
    #[must_use]
    pub const fn is_ssl_on_connect(&self) -> bool {
        self.config.ssl_on_connect
    }

    /// Enables STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_start_tls_enabled(&mut self, enabled: bool) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.start_tls_enabled = enabled;
            Ok(())
        })
    }

    /// Whether STARTTLS is enabled.
    #[must_use]
    pub const fn is_start_tls_enabled(&self) -> bool {
        self.config.start_tls_enabled
    }

    /// Requires STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_start_tls_required(&mut self, required: bool) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.start_tls_required = required;
            Ok(())
        })
    }

    /// Whether STARTTLS is required.
    #[must_use]
    pub const fn is_start_tls_required(&self) -> bool {
        self.config.start_tls_required
    }

    /// Verifies the server certificate's host name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_ssl_check_server_identity(&mut self, check: bool) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.ssl_check_server_identity = check;
            Ok(())
        })
    }

    /// Whether the server identity is checked.
    #[must_use]
    pub const fn is_ssl_check_server_identity(&self) -> bool {
        self.config.ssl_check_server_identity
    }

    /// Delivers to valid recipients even if others are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_send_partial(&mut self, send_partial: bool) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.send_partial = send_partial;
            Ok(())
        })
    }

    /// Whether partial sends are allowed.
    #[must_use]
    pub const fn is_send_partial(&self) -> bool {
        self.config.send_partial
    }

    /// Asks the transport for protocol tracing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_debug(&mut self, debug: bool) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.debug = debug;
            Ok(())
        })
    }

    /// Whether protocol tracing is requested.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.config.debug
    }

    /// Sets the SMTP AUTH credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_authenticator(&mut self, authenticator: Authenticator) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.authenticator = Some(authenticator);
            Ok(())
        })
    }

    /// Shorthand for [`Email::set_authenticator`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_authentication(&mut self, username: &str, password: &str) -> Result<&mut Self> {
        self.set_authenticator(Authenticator::new(username, password))
    }

    /// SMTP AUTH credentials, if set.
    #[must_use]
    pub const fn authenticator(&self) -> Option<&Authenticator> {
        self.config.authenticator.as_ref()
    }

    /// Sets the socket read timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_socket_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.socket_timeout = timeout;
            Ok(())
        })
    }

    /// The socket read timeout.
    #[must_use]
    pub const fn socket_timeout(&self) -> Duration {
        self.config.socket_timeout
    }

    /// Sets the socket connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the message is built.
    pub fn set_socket_connection_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        self.mutate(|email| {
            email.config.socket_connection_timeout = timeout;
            Ok(())
        })
    }

    /// The socket connect timeout.
    #[must_use]
    pub const fn socket_connection_timeout(&self) -> Duration {
        self.config.socket_connection_timeout
    }

    /// Builds the mail session from the transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransportConfig`] if no host name is set.
    pub fn mail_session(&self) -> Result<Session> {
        let properties = SessionProperties::from_config(&self.config)?;
        self.transport
            .create_session(properties, self.config.authenticator.clone())
    }

    /// Validates the email and assembles the MIME message.
    ///
    /// On success the email becomes [`State::Built`]; on failure nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] if the message was already built
    /// - [`Error::InvalidTransportConfig`] if no host name is set
    /// - [`Error::InvalidAddress`] if there is no sender or no recipient
    /// - [`Error::Mime`] if a value cannot be encoded in the charset
    pub fn build_mime_message(&mut self) -> Result<()> {
        if self.state == State::Built {
            return Err(Error::illegal_state(ALREADY_BUILT));
        }

        let session = self.mail_session()?;

        let from = self
            .from
            .as_ref()
            .ok_or_else(|| Error::invalid_address("From address required"))?;

        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(Error::invalid_address(
                "At least one receiver address required",
            ));
        }

        let charset = self.charset();
        let mut message = self.transport.new_message(&session);

        if let Some(subject) = &self.subject {
            message.set_subject(subject, charset)?;
        }

        match &self.body {
            Some(Body::Text(text)) => message.set_text(text, charset)?,
            Some(Body::Content {
                content,
                content_type,
            }) => {
                let mut content_type = content_type.clone();
                if content_type.is_text() && content_type.charset().is_none() {
                    content_type.set_parameter("charset", charset);
                }
                message.set_content(content, content_type)?;
            }
            None => message.set_text("", charset)?,
        }

        message.set_from(from.into(), charset)?;

        for (kind, list) in [
            (RecipientType::To, &self.to),
            (RecipientType::Cc, &self.cc),
            (RecipientType::Bcc, &self.bcc),
        ] {
            if !list.is_empty() {
                message.set_recipients(kind, list.to_mailboxes(), charset)?;
            }
        }

        if !self.reply_to.is_empty() {
            message.set_reply_to(self.reply_to.to_mailboxes(), charset)?;
        }

        for (name, value) in &self.headers {
            message.add_header(name, &encode_rfc2047(value, charset)?)?;
        }

        if !message.has_header("Date") {
            message.set_sent_date(self.sent_date())?;
        } else if self.sent_date.is_some() {
            tracing::warn!("Custom Date header overrides the sent date");
        }

        tracing::debug!(
            from = from.address(),
            to = self.to.len(),
            cc = self.cc.len(),
            bcc = self.bcc.len(),
            headers = self.headers.len(),
            "Built MIME message"
        );

        self.message = Some(message);
        self.state = State::Built;
        Ok(())
    }

    /// The built message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] before [`Email::build_mime_message`].
    pub fn mime_message(&self) -> Result<&T::Message> {
        self.message
            .as_ref()
            .ok_or_else(|| Error::illegal_state("Mime message has not been built"))
    }

    /// Consumes the email and returns the built message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] before [`Email::build_mime_message`].
    pub fn into_mime_message(self) -> Result<T::Message> {
        self.message
            .ok_or_else(|| Error::illegal_state("Mime message has not been built"))
    }
}

fn check_header<'a>(name: Option<&'a str>, value: Option<&'a str>) -> Result<(&'a str, &'a str)> {
    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::invalid_argument(HEADER_NAME_MISSING))?;
    if !Headers::is_valid_name(name) {
        return Err(Error::invalid_argument(format!(
            "Invalid header name: {name:?}"
        )));
    }
    let value = value.ok_or_else(|| Error::invalid_argument(HEADER_VALUE_MISSING))?;
    if value.is_empty() {
        return Err(Error::invalid_argument(HEADER_VALUE_EMPTY));
    }
    if value.contains(['\r', '\n']) {
        return Err(Error::invalid_argument(format!(
            "Line break in value of {name}"
        )));
    }
    if name.eq_ignore_ascii_case("Content-Type") {
        ContentType::parse(value)?;
    }
    Ok((name, value))
}

impl<T: Transport> fmt::Debug for Email<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Email")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("reply_to", &self.reply_to)
            .field("headers", &self.headers)
            .field("subject", &self.subject)
            .field("charset", &self.charset)
            .field("sent_date", &self.sent_date)
            .finish_non_exhaustive()
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
    use crate::session::{MAIL_PORT, MAIL_SMTP_FROM};
    use chrono::TimeZone;

    fn ready() -> Email {
        let mut email = Email::new();
        email
            .set_host_name("smtp.example.com")
            .unwrap()
            .set_from("from@example.com")
            .unwrap()
            .add_to("to@example.com")
            .unwrap();
        email
    }

    #[test]
    fn test_state_transitions() {
        let mut email = Email::new();
        assert_eq!(email.state(), State::Empty);

        assert!(email.add_to("not an address").is_err());
        assert_eq!(email.state(), State::Empty);

        email.set_subject("Hi").unwrap();
        assert_eq!(email.state(), State::Configuring);

        let mut email = ready();
        email.build_mime_message().unwrap();
        assert_eq!(email.state(), State::Built);
    }

    #[test]
    fn test_mutation_after_build_fails() {
        let mut email = ready();
        email.build_mime_message().unwrap();

        let err = email.set_subject("late").unwrap_err();
        assert!(err.is_illegal_state());
        assert!(email.add_cc("cc@example.com").unwrap_err().is_illegal_state());
        assert_eq!(email.subject(), None);
    }

    #[test]
    fn test_second_build_fails() {
        let mut email = ready();
        email.build_mime_message().unwrap();
        let err = email.build_mime_message().unwrap_err();
        assert!(err.is_illegal_state());
        assert_eq!(err.to_string(), "Mime message already built");
    }

    #[test]
    fn test_failed_build_keeps_configuring() {
        let mut email = Email::new();
        email.set_host_name("smtp.example.com").unwrap();
        email.add_to("to@example.com").unwrap();

        let err = email.build_mime_message().unwrap_err();
        assert_eq!(err.to_string(), "From address required");
        assert_eq!(email.state(), State::Configuring);

        email.set_from("from@example.com").unwrap();
        email.build_mime_message().unwrap();
    }

    #[test]
    fn test_build_requires_recipient() {
        let mut email = Email::new();
        email.set_host_name("smtp.example.com").unwrap();
        email.set_from("from@example.com").unwrap();
        email.add_reply_to("reply@example.com").unwrap();

        let err = email.build_mime_message().unwrap_err();
        assert!(err.is_invalid_address());
        assert_eq!(err.to_string(), "At least one receiver address required");
    }

    #[test]
    fn test_build_requires_host() {
        let mut email = Email::new();
        email.set_from("from@example.com").unwrap();
        email.add_to("to@example.com").unwrap();

        let err = email.build_mime_message().unwrap_err();
        assert!(err.is_invalid_transport_config());
    }

    #[test]
    fn test_bcc_only_is_enough() {
        let mut email = Email::new();
        email.set_host_name("smtp.example.com").unwrap();
        email.set_from("from@example.com").unwrap();
        email.add_bcc("hidden@example.com").unwrap();
        email.build_mime_message().unwrap();

        let message = email.mime_message().unwrap();
        assert!(!message.headers().contains("To"));
        assert_eq!(message.recipients(RecipientType::Bcc).len(), 1);
    }

    #[test]
    fn test_custom_date_header_wins() {
        let mut email = ready();
        email
            .add_header("Date", "Tue, 31 Dec 2019 23:00:00 +0000")
            .unwrap();
        email.build_mime_message().unwrap();

        let message = email.mime_message().unwrap();
        assert_eq!(
            message.headers().get_all("Date"),
            vec!["Tue, 31 Dec 2019 23:00:00 +0000"]
        );
    }

    #[test]
    fn test_sent_date_written_to_message() {
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 12, 30, 0).unwrap();
        let mut email = ready();
        email.set_sent_date(date).unwrap();
        email.build_mime_message().unwrap();

        assert_eq!(email.mime_message().unwrap().sent_date().unwrap(), date);
    }

    #[test]
    fn test_headers_are_encoded_in_charset() {
        let mut email = ready();
        email.add_header("X-Note", "Grüße").unwrap();
        email.build_mime_message().unwrap();

        let message = email.mime_message().unwrap();
        assert_eq!(message.headers().get("X-Note"), Some("=?utf-8?B?R3LDvMOfZQ==?="));
    }

    #[test]
    fn test_html_content_gets_charset() {
        let mut email = ready();
        email.set_charset("iso-8859-1").unwrap();
        email.set_content("<p>café</p>", "text/html").unwrap();
        email.build_mime_message().unwrap();

        let message = email.mime_message().unwrap();
        assert_eq!(message.content_type().mime_type(), "text/html");
        assert_eq!(message.content_type().charset(), Some("iso-8859-1"));
        assert_eq!(message.body_text().unwrap(), "<p>café</p>");
    }

    #[test]
    fn test_content_type_charset_becomes_email_charset() {
        let mut email = Email::new();
        email
            .set_content("<b>hi</b>", "text/html; charset=US-ASCII")
            .unwrap();
        assert_eq!(email.charset(), "US-ASCII");
        assert!(email.set_content("x", "text/plain; charset=klingon").is_err());
        assert!(email.set_content("x", "nonsense").unwrap_err().to_string().starts_with("MIME error"));
    }

    #[test]
    fn test_set_charset_validation() {
        let mut email = Email::new();
        assert!(email.set_charset("").unwrap_err().is_invalid_argument());
        assert!(email.set_charset("klingon").unwrap_err().is_invalid_argument());
        email.set_charset("UTF-8").unwrap();
        assert_eq!(email.charset(), "UTF-8");
    }

    #[test]
    fn test_set_msg_rejects_empty() {
        let mut email = Email::new();
        let err = email.set_msg("").unwrap_err();
        assert_eq!(err.to_string(), "Invalid message supplied");
    }

    #[test]
    fn test_empty_body_builds() {
        let mut email = ready();
        email.build_mime_message().unwrap();
        assert_eq!(email.mime_message().unwrap().body_text().unwrap(), "");
    }

    #[test]
    fn test_set_headers_replaces_and_validates() {
        let mut email = Email::new();
        email.add_header("X-Old", "1").unwrap();
        assert!(email.set_headers([("X-New", "2"), ("", "3")]).is_err());
        assert_eq!(email.headers().get("X-Old").map(String::as_str), Some("1"));

        email.set_headers([("X-New", "2")]).unwrap();
        assert_eq!(email.headers().len(), 1);
        assert_eq!(email.headers().get("X-New").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_bounce_address() {
        let mut email = ready();
        assert!(email.set_bounce_address("nope").is_err());
        email.set_bounce_address("bounces@example.com").unwrap();

        let session = email.mail_session().unwrap();
        assert_eq!(session.property(MAIL_SMTP_FROM), Some("bounces@example.com"));
    }

    #[test]
    fn test_session_available_after_build() {
        let mut email = ready();
        email.set_ssl_smtp_port(465).unwrap();
        email.set_ssl_on_connect(true).unwrap();
        email.build_mime_message().unwrap();

        let session = email.mail_session().unwrap();
        assert_eq!(session.property(MAIL_PORT), Some("465"));
    }

    #[test]
    fn test_from_config() {
        let mut config = TransportConfig::new("smtp.example.com");
        config.smtp_port = 2525;
        let email = Email::from_config(config);
        assert_eq!(email.host_name(), Some("smtp.example.com"));
        assert_eq!(email.smtp_port(), 2525);
        assert_eq!(email.state(), State::Empty);
    }

    #[test]
    fn test_with_validator() {
        let mut email = Email::new().with_validator(|a: &str| a.ends_with("@corp.example"));
        assert!(email.add_to("a@corp.example").is_ok());
        assert!(email.add_to("a@example.com").is_err());
    }

    #[test]
    fn test_into_mime_message() {
        assert!(Email::new().into_mime_message().unwrap_err().is_illegal_state());

        let mut email = ready();
        email.build_mime_message().unwrap();
        let message = email.into_mime_message().unwrap();
        assert_eq!(message.from().unwrap().address, "from@example.com");
    }

    #[test]
    fn test_malformed_header_fails_when_added() {
        let mut email = ready();

        let err = email.add_header("Bad Name", "x").unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("Bad Name"));

        let err = email.set_headers([("X:Y", "v")]).unwrap_err();
        assert!(err.is_invalid_argument());

        assert!(email.add_header("X-Multi", "a\r\nBcc: x@example.com").unwrap_err().is_invalid_argument());
        assert!(email.add_header("Content-Type", "nonsense").is_err());

        assert!(email.headers().is_empty());
        email.build_mime_message().unwrap();
    }

    #[test]
    fn test_content_type_header_is_not_duplicated() {
        let mut email = ready();
        email.add_header("Content-Type", "text/html").unwrap();
        email.set_msg("hello").unwrap();
        email.build_mime_message().unwrap();

        let message = email.mime_message().unwrap();
        let rendered = message.to_string();
        assert_eq!(rendered.matches("Content-Type:").count(), 1);
        assert_eq!(message.content_type().mime_type(), "text/html");
        assert_eq!(message.body_text().unwrap(), "hello");
    }
}
