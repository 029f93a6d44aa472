//! # mailforge-mime
//!
//! MIME message assembly primitives used by the `mailforge` composer.
//!
//! ## Features
//!
//! - **Headers**: ordered, case-insensitive header map with line folding
//! - **Addresses**: mailbox rendering with RFC 2047 display names
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Content types**: parameterised MIME content types
//! - **Messages**: single-part text or rich content rendered as RFC 5322 text
//!
//! ## Quick Start
//!
//! ```
//! use mailforge_mime::{Mailbox, Message, RecipientType};
//!
//! # fn main() -> mailforge_mime::Result<()> {
//! let mut message = Message::new();
//! message.set_from(Mailbox::new("sender@example.com"), "utf-8")?;
//! message.set_recipients(
//!     RecipientType::To,
//!     vec![Mailbox::with_name("Recipient", "recipient@example.com")],
//!     "utf-8",
//! )?;
//! message.set_subject("Test Message", "utf-8")?;
//! message.set_text("Hello, World!", "utf-8")?;
//!
//! assert!(message.to_string().contains("Subject: Test Message\r\n"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```
//! use mailforge_mime::encoding::{decode_rfc2047, encode_rfc2047};
//!
//! let encoded = encode_rfc2047("Héllo", "utf-8").unwrap();
//! assert_eq!(decode_rfc2047(&encoded).unwrap(), "Héllo");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod mailbox;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use mailbox::{Mailbox, RecipientType};
pub use message::{Message, TransferEncoding};
