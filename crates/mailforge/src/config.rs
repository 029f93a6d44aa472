//! Transport configuration types.

use std::fmt;
use std::time::Duration;

/// Default plain SMTP port.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default port for SMTP over implicit TLS.
pub const DEFAULT_SSL_SMTP_PORT: u16 = 465;

/// Default socket read and connect timeout.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(60);

/// Username and password handed to the transport for SMTP AUTH.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Authenticator {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Authenticator {
    /// Creates a username/password authenticator.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings used to build the mail session.
///
/// Nothing is validated here; [`crate::SessionProperties::from_config`]
/// rejects a missing host name when the session is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransportConfig {
    /// SMTP server host name.
    pub host_name: Option<String>,
    /// Port for plain or STARTTLS connections.
    pub smtp_port: u16,
    /// Port used when `ssl_on_connect` is set.
    pub ssl_smtp_port: u16,
    /// Connect with implicit TLS.
    pub ssl_on_connect: bool,
    /// Upgrade with STARTTLS when offered.
    pub start_tls_enabled: bool,
    /// Refuse to send unless STARTTLS succeeds.
    pub start_tls_required: bool,
    /// Verify the server certificate's host name.
    pub ssl_check_server_identity: bool,
    /// Deliver to the valid recipients even if some are rejected.
    pub send_partial: bool,
    /// Ask the transport for protocol tracing.
    pub debug: bool,
    /// SMTP AUTH credentials.
    pub authenticator: Option<Authenticator>,
    /// Envelope sender for bounces, when different from the From address.
    pub bounce_address: Option<String>,
    /// Socket read timeout.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub socket_timeout: Duration,
    /// Socket connect timeout.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub socket_connection_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host_name: None,
            smtp_port: DEFAULT_SMTP_PORT,
            ssl_smtp_port: DEFAULT_SSL_SMTP_PORT,
            ssl_on_connect: false,
            start_tls_enabled: false,
            start_tls_required: false,
            ssl_check_server_identity: false,
            send_partial: false,
            debug: false,
            authenticator: None,
            bounce_address: None,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            socket_connection_timeout: DEFAULT_SOCKET_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Creates a configuration for `host` with default ports and timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host_name: Some(host.into()),
            ..Self::default()
        }
    }

    /// The host name, if it is set and not blank.
    #[must_use]
    pub fn resolved_host(&self) -> Option<&str> {
        self.host_name
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    /// The port the transport should connect to.
    #[must_use]
    pub const fn effective_port(&self) -> u16 {
        if self.ssl_on_connect {
            self.ssl_smtp_port
        } else {
            self.smtp_port
        }
    }
}

#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.smtp_port, 25);
        assert_eq!(config.ssl_smtp_port, 465);
        assert_eq!(config.socket_timeout, Duration::from_millis(60_000));
        assert_eq!(config.socket_connection_timeout, Duration::from_millis(60_000));
        assert!(config.resolved_host().is_none());
    }

    #[test]
    fn test_resolved_host_ignores_blank() {
        let config = TransportConfig::new("   ");
        assert!(config.resolved_host().is_none());

        let config = TransportConfig::new(" smtp.example.com ");
        assert_eq!(config.resolved_host(), Some("smtp.example.com"));
    }

    #[test]
    fn test_effective_port() {
        let mut config = TransportConfig::new("smtp.example.com");
        config.smtp_port = 587;
        assert_eq!(config.effective_port(), 587);
        config.ssl_on_connect = true;
        assert_eq!(config.effective_port(), 465);
    }

    #[test]
    fn test_authenticator_debug_redacts_password() {
        let auth = Authenticator::new("user", "hunter2");
        let debug = format!("{auth:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_partial_config() {
        let config: TransportConfig = serde_json::from_str(
            r#"{
                "host_name": "smtp.example.com",
                "smtp_port": 587,
                "start_tls_enabled": true,
                "authenticator": { "username": "user", "password": "secret" },
                "socket_connection_timeout": 2000
            }"#,
        )
        .unwrap();

        assert_eq!(config.resolved_host(), Some("smtp.example.com"));
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.ssl_smtp_port, DEFAULT_SSL_SMTP_PORT);
        assert!(config.start_tls_enabled);
        assert_eq!(config.authenticator, Some(Authenticator::new("user", "secret")));
        assert_eq!(config.socket_connection_timeout, Duration::from_millis(2000));
        assert_eq!(config.socket_timeout, DEFAULT_SOCKET_TIMEOUT);
    }
}
