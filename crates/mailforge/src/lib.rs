//! # mailforge
//!
//! Email composition on top of `mailforge-mime`.
//!
//! ## Features
//!
//! - **Addresses**: validated sender, To/Cc/Bcc and Reply-To lists that keep
//!   insertion order and drop duplicates
//! - **Headers**: custom headers with strict name/value checks
//! - **Sessions**: SMTP session properties derived from a [`TransportConfig`]
//! - **Messages**: single-part MIME messages built through a pluggable
//!   [`Transport`]
//!
//! ## Quick Start
//!
//! ```
//! use mailforge::{Email, session::MAIL_PORT};
//!
//! # fn main() -> mailforge::Result<()> {
//! let mut email = Email::new();
//! email
//!     .set_host_name("smtp.example.com")?
//!     .set_smtp_port(587)?
//!     .set_start_tls_enabled(true)?
//!     .set_authentication("user", "password")?
//!     .set_from_named("sender@example.com", "Sender")?
//!     .add_to("recipient@example.com")?
//!     .add_cc("copy@example.com")?
//!     .set_subject("Test Subject")?
//!     .set_msg("Test message")?;
//!
//! email.build_mime_message()?;
//!
//! let session = email.mail_session()?;
//! assert_eq!(session.property(MAIL_PORT), Some("587"));
//!
//! let message = email.mime_message()?;
//! assert!(message.to_string().contains("Subject: Test Subject\r\n"));
//! # Ok(())
//! # }
//! ```
//!
//! Once built, an [`Email`] is read-only: every setter and a second build
//! fail with [`Error::IllegalState`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
pub mod config;
mod email;
mod error;
pub mod session;
pub mod transport;

pub use address::{AddressList, AddressValidator, EmailAddress, SyntaxValidator};
pub use config::{Authenticator, TransportConfig};
pub use email::{Email, State};
pub use error::{Error, Result};
pub use session::{Session, SessionProperties};
pub use transport::{MimeTransport, OutgoingMessage, Transport};

pub use mailforge_mime;
