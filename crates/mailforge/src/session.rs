//! Mail session properties.
//!
//! The property names are the keys mail transports conventionally read
//! from a session, so they must not change.

use crate::config::{Authenticator, TransportConfig};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// SMTP server host.
pub const MAIL_HOST: &str = "mail.smtp.host";
/// SMTP server port.
pub const MAIL_PORT: &str = "mail.smtp.port";
/// Whether SMTP AUTH is attempted.
pub const MAIL_SMTP_AUTH: &str = "mail.smtp.auth";
/// Transport protocol name.
pub const MAIL_TRANSPORT_PROTOCOL: &str = "mail.transport.protocol";
/// Protocol tracing switch.
pub const MAIL_DEBUG: &str = "mail.debug";
/// Upgrade with STARTTLS when offered.
pub const MAIL_TRANSPORT_STARTTLS_ENABLE: &str = "mail.smtp.starttls.enable";
/// Fail unless STARTTLS succeeds.
pub const MAIL_TRANSPORT_STARTTLS_REQUIRED: &str = "mail.smtp.starttls.required";
/// Deliver to valid recipients despite rejections.
pub const MAIL_SMTP_SEND_PARTIAL: &str = "mail.smtp.sendpartial";
/// Connect with implicit TLS.
pub const MAIL_SMTP_SSL_ENABLE: &str = "mail.smtp.ssl.enable";
/// Verify the server certificate's host name.
pub const MAIL_SMTP_SSL_CHECKSERVERIDENTITY: &str = "mail.smtp.ssl.checkserveridentity";
/// Port of the implicit TLS socket.
pub const MAIL_SMTP_SOCKET_FACTORY_PORT: &str = "mail.smtp.socketFactory.port";
/// Whether to fall back to a plain socket when TLS fails.
pub const MAIL_SMTP_SOCKET_FACTORY_FALLBACK: &str = "mail.smtp.socketFactory.fallback";
/// Envelope sender (bounce address).
pub const MAIL_SMTP_FROM: &str = "mail.smtp.from";
/// Socket read timeout in milliseconds.
pub const MAIL_SMTP_TIMEOUT: &str = "mail.smtp.timeout";
/// Socket connect timeout in milliseconds.
pub const MAIL_SMTP_CONNECTIONTIMEOUT: &str = "mail.smtp.connectiontimeout";

/// Protocol name stored under [`MAIL_TRANSPORT_PROTOCOL`].
pub const SMTP_PROTOCOL: &str = "smtp";

/// Message used when no usable host name is configured.
const INVALID_HOSTNAME: &str = "Invalid hostname: cannot find valid hostname for mail session";

/// String properties describing how to reach the SMTP server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProperties {
    properties: BTreeMap<String, String>,
}

impl SessionProperties {
    /// Derives session properties from a transport configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransportConfig`] if the host name is missing
    /// or blank.
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let host = config
            .resolved_host()
            .ok_or_else(|| Error::InvalidTransportConfig(INVALID_HOSTNAME.to_string()))?;

        let mut props = Self::default();
        props.set(MAIL_TRANSPORT_PROTOCOL, SMTP_PROTOCOL);
        props.set(MAIL_HOST, host);
        props.set(MAIL_PORT, config.effective_port().to_string());
        props.set_flag(MAIL_DEBUG, config.debug);
        props.set_flag(MAIL_TRANSPORT_STARTTLS_ENABLE, config.start_tls_enabled);
        props.set_flag(MAIL_TRANSPORT_STARTTLS_REQUIRED, config.start_tls_required);
        props.set_flag(MAIL_SMTP_SEND_PARTIAL, config.send_partial);

        if config.authenticator.is_some() {
            props.set_flag(MAIL_SMTP_AUTH, true);
        }

        if config.ssl_on_connect {
            props.set(MAIL_SMTP_SOCKET_FACTORY_PORT, config.ssl_smtp_port.to_string());
            props.set_flag(MAIL_SMTP_SSL_ENABLE, true);
            props.set_flag(MAIL_SMTP_SOCKET_FACTORY_FALLBACK, false);
        }

        if (config.ssl_on_connect || config.start_tls_enabled) && config.ssl_check_server_identity
        {
            props.set_flag(MAIL_SMTP_SSL_CHECKSERVERIDENTITY, true);
        }

        if let Some(bounce) = &config.bounce_address {
            props.set(MAIL_SMTP_FROM, bounce.clone());
        }

        props.set_timeout(MAIL_SMTP_TIMEOUT, config.socket_timeout);
        props.set_timeout(MAIL_SMTP_CONNECTIONTIMEOUT, config.socket_connection_timeout);

        tracing::debug!(
            host,
            port = props.get(MAIL_PORT),
            auth = config.authenticator.is_some(),
            ssl = config.ssl_on_connect,
            starttls = config.start_tls_enabled,
            "Built mail session properties"
        );

        Ok(props)
    }

    /// Gets a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Iterates over all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if no property is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.properties.insert(key.to_string(), value.into());
    }

    fn set_flag(&mut self, key: &str, value: bool) {
        self.set(key, value.to_string());
    }

    fn set_timeout(&mut self, key: &str, timeout: Duration) {
        if !timeout.is_zero() {
            self.set(key, timeout.as_millis().to_string());
        }
    }
}

/// A read-only mail session handed to the transport.
#[derive(Debug, Clone)]
pub struct Session {
    properties: SessionProperties,
    authenticator: Option<Authenticator>,
}

impl Session {
    /// Creates a session from built properties and optional credentials.
    #[must_use]
    pub const fn new(properties: SessionProperties, authenticator: Option<Authenticator>) -> Self {
        Self {
            properties,
            authenticator,
        }
    }

    /// Gets a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    /// All session properties.
    #[must_use]
    pub const fn properties(&self) -> &SessionProperties {
        &self.properties
    }

    /// Credentials for SMTP AUTH, if configured.
    #[must_use]
    pub const fn authenticator(&self) -> Option<&Authenticator> {
        self.authenticator.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> TransportConfig {
        let mut config = TransportConfig::new("smtp.example.com");
        config.smtp_port = 587;
        config
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let err = SessionProperties::from_config(&TransportConfig::default()).unwrap_err();
        assert!(err.is_invalid_transport_config());
        assert!(err.to_string().contains("Invalid hostname"));

        let err = SessionProperties::from_config(&TransportConfig::new("")).unwrap_err();
        assert!(err.to_string().contains("Invalid hostname"));
    }

    #[test]
    fn test_basic_properties() {
        let props = SessionProperties::from_config(&config()).unwrap();
        assert_eq!(props.get(MAIL_TRANSPORT_PROTOCOL), Some("smtp"));
        assert_eq!(props.get(MAIL_HOST), Some("smtp.example.com"));
        assert_eq!(props.get(MAIL_PORT), Some("587"));
        assert_eq!(props.get(MAIL_DEBUG), Some("false"));
        assert_eq!(props.get(MAIL_TRANSPORT_STARTTLS_ENABLE), Some("false"));
        assert_eq!(props.get(MAIL_SMTP_AUTH), None);
        assert_eq!(props.get(MAIL_SMTP_SSL_ENABLE), None);
        assert_eq!(props.get(MAIL_SMTP_TIMEOUT), Some("60000"));
        assert_eq!(props.get(MAIL_SMTP_CONNECTIONTIMEOUT), Some("60000"));
    }

    #[test]
    fn test_auth_flag() {
        let mut config = config();
        config.authenticator = Some(Authenticator::new("user", "password"));
        let props = SessionProperties::from_config(&config).unwrap();
        assert_eq!(props.get(MAIL_SMTP_AUTH), Some("true"));
    }

    #[test]
    fn test_ssl_on_connect_switches_port() {
        let mut config = config();
        config.ssl_on_connect = true;
        let props = SessionProperties::from_config(&config).unwrap();
        assert_eq!(props.get(MAIL_PORT), Some("465"));
        assert_eq!(props.get(MAIL_SMTP_SOCKET_FACTORY_PORT), Some("465"));
        assert_eq!(props.get(MAIL_SMTP_SSL_ENABLE), Some("true"));
        assert_eq!(props.get(MAIL_SMTP_SOCKET_FACTORY_FALLBACK), Some("false"));
        assert_eq!(props.get(MAIL_SMTP_SSL_CHECKSERVERIDENTITY), None);
    }

    #[test]
    fn test_check_server_identity_needs_tls() {
        let mut config = config();
        config.ssl_check_server_identity = true;
        let props = SessionProperties::from_config(&config).unwrap();
        assert_eq!(props.get(MAIL_SMTP_SSL_CHECKSERVERIDENTITY), None);

        config.start_tls_enabled = true;
        let props = SessionProperties::from_config(&config).unwrap();
        assert_eq!(props.get(MAIL_SMTP_SSL_CHECKSERVERIDENTITY), Some("true"));
    }

    #[test]
    fn test_bounce_and_zero_timeouts() {
        let mut config = config();
        config.bounce_address = Some("bounces@example.com".into());
        config.socket_timeout = Duration::ZERO;
        let props = SessionProperties::from_config(&config).unwrap();
        assert_eq!(props.get(MAIL_SMTP_FROM), Some("bounces@example.com"));
        assert_eq!(props.get(MAIL_SMTP_TIMEOUT), None);
    }

    #[test]
    fn test_session_exposes_properties() {
        let props = SessionProperties::from_config(&config()).unwrap();
        let session = Session::new(props.clone(), Some(Authenticator::new("u", "p")));
        assert_eq!(session.property(MAIL_HOST), Some("smtp.example.com"));
        assert_eq!(session.properties(), &props);
        assert_eq!(session.authenticator().unwrap().username, "u");
    }
}
