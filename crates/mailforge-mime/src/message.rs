//! MIME message structure and rendering.

use crate::content_type::ContentType;
use crate::encoding::{
    DEFAULT_CHARSET, decode_charset, decode_rfc2047, encode_charset, encode_quoted_printable,
    encode_rfc2047,
};
use crate::error::Result;
use crate::header::Headers;
use crate::mailbox::{Mailbox, RecipientType};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;

/// Longest line allowed by RFC 5322, excluding CRLF.
const MAX_LINE_OCTETS: usize = 998;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// A single-part MIME message being assembled.
///
/// Address and subject setters write the corresponding header immediately,
/// so [`Message::headers`] always reflects what will be rendered. Bcc
/// recipients are kept for the envelope only.
#[derive(Debug, Clone)]
pub struct Message {
    headers: Headers,
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Vec<Mailbox>,
    content_type: ContentType,
    body: Vec<u8>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// Creates an empty `text/plain` message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            headers: Headers::new(),
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            content_type: ContentType::text_plain(DEFAULT_CHARSET),
            body: Vec::new(),
        }
    }

    /// Message headers, excluding the content headers added at render time.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Appends a header.
    ///
    /// `Content-Type` replaces the body content type and re-encodes the body
    /// in its charset. `MIME-Version` and `Content-Transfer-Encoding` are
    /// always written at render time, so values given here are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is malformed, or the body
    /// cannot be represented in a new charset.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        if name.eq_ignore_ascii_case("Content-Type") {
            let text = self.body_text()?;
            return self.set_content(&text, ContentType::parse(value)?);
        }
        if name.eq_ignore_ascii_case("MIME-Version")
            || name.eq_ignore_ascii_case("Content-Transfer-Encoding")
        {
            return Ok(());
        }
        self.headers.add(name, value)
    }

    /// Sets the sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the display name cannot be encoded in `charset`.
    pub fn set_from(&mut self, from: Mailbox, charset: &str) -> Result<()> {
        self.headers.set("From", from.render(charset)?)?;
        self.from = Some(from);
        Ok(())
    }

    /// The sender, if set.
    #[must_use]
    pub const fn from(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    /// Replaces the recipients of one kind.
    ///
    /// An empty list removes the header.
    ///
    /// # Errors
    ///
    /// Returns an error if a display name cannot be encoded in `charset`.
    pub fn set_recipients(
        &mut self,
        kind: RecipientType,
        recipients: Vec<Mailbox>,
        charset: &str,
    ) -> Result<()> {
        if kind != RecipientType::Bcc {
            if recipients.is_empty() {
                self.headers.remove(kind.header_name());
            } else {
                self.headers
                    .set(kind.header_name(), Mailbox::render_list(&recipients, charset)?)?;
            }
        }

        match kind {
            RecipientType::To => self.to = recipients,
            RecipientType::Cc => self.cc = recipients,
            RecipientType::Bcc => self.bcc = recipients,
        }
        Ok(())
    }

    /// Recipients of one kind.
    #[must_use]
    pub fn recipients(&self, kind: RecipientType) -> &[Mailbox] {
        match kind {
            RecipientType::To => &self.to,
            RecipientType::Cc => &self.cc,
            RecipientType::Bcc => &self.bcc,
        }
    }

    /// Every envelope recipient: To, then Cc, then Bcc.
    pub fn all_recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// Replaces the Reply-To list.
    ///
    /// # Errors
    ///
    /// Returns an error if a display name cannot be encoded in `charset`.
    pub fn set_reply_to(&mut self, reply_to: Vec<Mailbox>, charset: &str) -> Result<()> {
        if reply_to.is_empty() {
            self.headers.remove("Reply-To");
        } else {
            self.headers
                .set("Reply-To", Mailbox::render_list(&reply_to, charset)?)?;
        }
        self.reply_to = reply_to;
        Ok(())
    }

    /// The Reply-To list.
    #[must_use]
    pub fn reply_to(&self) -> &[Mailbox] {
        &self.reply_to
    }

    /// Sets the subject, RFC 2047 encoding it in `charset` when needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset cannot represent the subject.
    pub fn set_subject(&mut self, subject: &str, charset: &str) -> Result<()> {
        self.headers.set("Subject", encode_rfc2047(subject, charset)?)
    }

    /// The decoded subject.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers
            .get("subject")
            .map(|raw| decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string()))
    }

    /// Sets the `Date` header.
    ///
    /// # Errors
    ///
    /// Never fails for well-formed dates; the `Result` mirrors the other
    /// header setters.
    pub fn set_sent_date(&mut self, date: DateTime<Utc>) -> Result<()> {
        self.headers.set("Date", date.to_rfc2822())
    }

    /// The parsed `Date` header.
    #[must_use]
    pub fn sent_date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers
            .get("date")
            .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
    }

    /// Sets a `text/plain` body.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset cannot represent the text.
    pub fn set_text(&mut self, text: &str, charset: &str) -> Result<()> {
        self.set_content(text, ContentType::text_plain(charset))
    }

    /// Sets the body with an explicit content type.
    ///
    /// The text is stored in the content type's charset, defaulting to UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset cannot represent the content.
    pub fn set_content(&mut self, content: &str, content_type: ContentType) -> Result<()> {
        let charset = content_type.charset().unwrap_or(DEFAULT_CHARSET);
        self.body = encode_charset(content, charset)?;
        self.content_type = content_type;
        Ok(())
    }

    /// The body content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// The raw body bytes, in the body charset.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded from its charset.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid in its charset.
    pub fn body_text(&self) -> Result<String> {
        let charset = self.content_type.charset().unwrap_or(DEFAULT_CHARSET);
        decode_charset(self.body.clone(), charset)
    }

    /// Transfer encoding used when rendering the body.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        let bare_cr = self
            .body
            .iter()
            .enumerate()
            .any(|(i, b)| *b == b'\r' && self.body.get(i + 1) != Some(&b'\n'));
        let plain = self.body.is_ascii()
            && !bare_cr
            && self
                .body
                .split(|b| *b == b'\n')
                .all(|line| line.len() <= MAX_LINE_OCTETS);
        if plain {
            TransferEncoding::SevenBit
        } else {
            TransferEncoding::QuotedPrintable
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headers)?;
        write!(f, "MIME-Version: 1.0\r\n")?;
        write!(f, "Content-Type: {}\r\n", self.content_type)?;

        let encoding = self.transfer_encoding();
        write!(f, "Content-Transfer-Encoding: {encoding}\r\n\r\n")?;

        match encoding {
            TransferEncoding::SevenBit => {
                let text = String::from_utf8_lossy(&self.body);
                for (i, line) in text.split('\n').enumerate() {
                    if i > 0 {
                        f.write_str("\r\n")?;
                    }
                    f.write_str(line.strip_suffix('\r').unwrap_or(line))?;
                }
            }
            TransferEncoding::QuotedPrintable => {
                f.write_str(&encode_quoted_printable(&self.body))?;
            }
        }

        f.write_str("\r\n")
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
    use chrono::TimeZone;

    fn sample() -> Message {
        let mut message = Message::new();
        message
            .set_from(Mailbox::new("sender@example.com"), "utf-8")
            .unwrap();
        message
            .set_recipients(
                RecipientType::To,
                vec![Mailbox::new("recipient@example.com")],
                "utf-8",
            )
            .unwrap();
        message.set_subject("Test", "utf-8").unwrap();
        message.set_text("Hello, World!", "utf-8").unwrap();
        message
    }

    #[test]
    fn test_message_single_part() {
        let message = sample();

        assert_eq!(message.from().unwrap().address, "sender@example.com");
        assert_eq!(message.headers().get("to"), Some("recipient@example.com"));
        assert_eq!(message.subject().as_deref(), Some("Test"));
        assert_eq!(message.body_text().unwrap(), "Hello, World!");
        assert_eq!(message.transfer_encoding(), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_bcc_is_not_rendered() {
        let mut message = sample();
        message
            .set_recipients(
                RecipientType::Bcc,
                vec![Mailbox::new("hidden@example.com")],
                "utf-8",
            )
            .unwrap();

        assert!(!message.to_string().contains("hidden@example.com"));
        let envelope: Vec<&str> = message.all_recipients().map(|m| m.address.as_str()).collect();
        assert_eq!(envelope, vec!["recipient@example.com", "hidden@example.com"]);
    }

    #[test]
    fn test_empty_recipients_remove_header() {
        let mut message = sample();
        message
            .set_recipients(RecipientType::To, Vec::new(), "utf-8")
            .unwrap();
        assert!(!message.headers().contains("To"));
    }

    #[test]
    fn test_non_ascii_subject_round_trips() {
        let mut message = Message::new();
        message.set_subject("Grüße", "utf-8").unwrap();
        assert_eq!(message.headers().get("Subject"), Some("=?utf-8?B?R3LDvMOfZQ==?="));
        assert_eq!(message.subject().as_deref(), Some("Grüße"));
    }

    #[test]
    fn test_latin1_body() {
        let mut message = Message::new();
        message.set_text("café", "ISO-8859-1").unwrap();
        assert_eq!(message.body(), b"caf\xE9");
        assert_eq!(message.body_text().unwrap(), "café");
        assert_eq!(message.transfer_encoding(), TransferEncoding::QuotedPrintable);
        assert!(message.to_string().ends_with("caf=E9\r\n"));
    }

    #[test]
    fn test_html_content() {
        let mut message = Message::new();
        message
            .set_content("<p>Hi</p>", ContentType::text_html("utf-8"))
            .unwrap();
        assert_eq!(message.content_type().mime_type(), "text/html");
        assert!(
            message
                .to_string()
                .contains("Content-Type: text/html; charset=utf-8\r\n")
        );
    }

    #[test]
    fn test_sent_date() {
        let mut message = Message::new();
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        message.set_sent_date(date).unwrap();
        let header = message.headers().get("Date").unwrap();
        assert!(header.starts_with("Wed,"));
        assert!(header.ends_with("Jan 2020 00:00:00 +0000"));
        assert_eq!(message.sent_date().unwrap(), date);
    }

    #[test]
    fn test_render() {
        let rendered = sample().to_string();
        assert_eq!(
            rendered,
            concat!(
                "From: sender@example.com\r\n",
                "To: recipient@example.com\r\n",
                "Subject: Test\r\n",
                "MIME-Version: 1.0\r\n",
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "Hello, World!\r\n"
            )
        );
    }

    #[test]
    fn test_content_type_header_replaces_body_type() {
        let mut message = sample();
        message.add_header("content-type", "text/html").unwrap();
        message.add_header("MIME-Version", "2.0").unwrap();
        message
            .add_header("Content-Transfer-Encoding", "base64")
            .unwrap();

        assert_eq!(message.content_type().mime_type(), "text/html");
        assert_eq!(message.body_text().unwrap(), "Hello, World!");

        let rendered = message.to_string();
        assert_eq!(rendered.matches("Content-Type:").count(), 1);
        assert_eq!(rendered.matches("MIME-Version:").count(), 1);
        assert_eq!(rendered.matches("Content-Transfer-Encoding:").count(), 1);
        assert!(rendered.contains("Content-Type: text/html\r\n"));
        assert!(rendered.contains("MIME-Version: 1.0\r\n"));
    }

    #[test]
    fn test_content_type_header_reencodes_body() {
        let mut message = Message::new();
        message.set_text("café", "utf-8").unwrap();
        message
            .add_header("Content-Type", "text/plain; charset=iso-8859-1")
            .unwrap();
        assert_eq!(message.body(), b"caf\xE9");
        assert_eq!(message.body_text().unwrap(), "café");

        assert!(message.add_header("Content-Type", "garbage").is_err());
    }

    #[test]
    fn test_bare_carriage_return_uses_quoted_printable() {
        let mut message = Message::new();
        message.set_text("one\rtwo\r\nthree", "utf-8").unwrap();
        assert_eq!(message.transfer_encoding(), TransferEncoding::QuotedPrintable);
        assert!(message.to_string().contains("one=0Dtwo\r\nthree"));

        message.set_text("one\r\ntwo", "utf-8").unwrap();
        assert_eq!(message.transfer_encoding(), TransferEncoding::SevenBit);
    }
}
