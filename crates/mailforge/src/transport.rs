//! The seam between the composer and the mail-transport library.
//!
//! [`crate::Email`] never builds sessions or messages itself; it asks a
//! [`Transport`] for them and fills the message through the
//! [`OutgoingMessage`] primitives. [`MimeTransport`] backs both with
//! `mailforge-mime`.

use crate::config::Authenticator;
use crate::error::Result;
use crate::session::{Session, SessionProperties};
use chrono::{DateTime, Utc};
use mailforge_mime::{ContentType, Mailbox, Message, RecipientType};

/// Message-building primitives offered by the transport library.
pub trait OutgoingMessage {
    /// Sets the sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the value.
    fn set_from(&mut self, from: Mailbox, charset: &str) -> Result<()>;

    /// Replaces the recipients of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects a value.
    fn set_recipients(
        &mut self,
        kind: RecipientType,
        recipients: Vec<Mailbox>,
        charset: &str,
    ) -> Result<()>;

    /// Replaces the Reply-To list.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects a value.
    fn set_reply_to(&mut self, reply_to: Vec<Mailbox>, charset: &str) -> Result<()>;

    /// Sets the subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject cannot be encoded in `charset`.
    fn set_subject(&mut self, subject: &str, charset: &str) -> Result<()>;

    /// Sets a plain text body.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be encoded in `charset`.
    fn set_text(&mut self, text: &str, charset: &str) -> Result<()>;

    /// Sets a body with an explicit content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be encoded.
    fn set_content(&mut self, content: &str, content_type: ContentType) -> Result<()>;

    /// Appends a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    fn add_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Returns true if a header with this name is present.
    fn has_header(&self, name: &str) -> bool;

    /// Sets the `Date` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the value.
    fn set_sent_date(&mut self, date: DateTime<Utc>) -> Result<()>;
}

/// Session and message factory.
pub trait Transport {
    /// Message type produced by [`Transport::new_message`].
    type Message: OutgoingMessage;

    /// Creates a session from properties and optional credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the configuration.
    fn create_session(
        &self,
        properties: SessionProperties,
        authenticator: Option<Authenticator>,
    ) -> Result<Session>;

    /// Creates an empty message bound to `session`.
    fn new_message(&self, session: &Session) -> Self::Message;
}

/// Transport backed by `mailforge-mime` messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeTransport;

impl Transport for MimeTransport {
    type Message = Message;

    fn create_session(
        &self,
        properties: SessionProperties,
        authenticator: Option<Authenticator>,
    ) -> Result<Session> {
        Ok(Session::new(properties, authenticator))
    }

    fn new_message(&self, _session: &Session) -> Message {
        Message::new()
    }
}

impl OutgoingMessage for Message {
    fn set_from(&mut self, from: Mailbox, charset: &str) -> Result<()> {
        Ok(Self::set_from(self, from, charset)?)
    }

    fn set_recipients(
        &mut self,
        kind: RecipientType,
        recipients: Vec<Mailbox>,
        charset: &str,
    ) -> Result<()> {
        Ok(Self::set_recipients(self, kind, recipients, charset)?)
    }

    fn set_reply_to(&mut self, reply_to: Vec<Mailbox>, charset: &str) -> Result<()> {
        Ok(Self::set_reply_to(self, reply_to, charset)?)
    }

    fn set_subject(&mut self, subject: &str, charset: &str) -> Result<()> {
        Ok(Self::set_subject(self, subject, charset)?)
    }

    fn set_text(&mut self, text: &str, charset: &str) -> Result<()> {
        Ok(Self::set_text(self, text, charset)?)
    }

    fn set_content(&mut self, content: &str, content_type: ContentType) -> Result<()> {
        Ok(Self::set_content(self, content, content_type)?)
    }

    fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        Ok(Self::add_header(self, name, value)?)
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers().contains(name)
    }

    fn set_sent_date(&mut self, date: DateTime<Utc>) -> Result<()> {
        Ok(Self::set_sent_date(self, date)?)
    }
}
