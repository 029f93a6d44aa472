//! Integration tests for the email composer.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use mailforge::session::{MAIL_HOST, MAIL_PORT, MAIL_SMTP_AUTH, MAIL_SMTP_SSL_ENABLE};
use mailforge::{Email, State, TransportConfig};
use mailforge_mime::RecipientType;
use proptest::prelude::*;

const TEST_EMAILS: [&str; 4] = [
    "ab@cd.com",
    "a.b@c.org",
    "abcdefjhjkmnoprstuof@com.bd",
    "ghknb@inet.com",
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn address_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,10}(\\.[a-z0-9]{1,5})?@[a-z]{1,10}\\.(com|org|net)"
}

#[test]
fn test_add_bccs() {
    let mut email = Email::new();
    email.add_bccs(TEST_EMAILS).unwrap();
    assert_eq!(email.bcc_addresses().len(), TEST_EMAILS.len());
    assert_eq!(email.bcc_addresses().addresses(), TEST_EMAILS.to_vec());
}

#[test]
fn test_add_ccs() {
    let mut email = Email::new();
    email.add_ccs(TEST_EMAILS).unwrap();
    assert_eq!(email.cc_addresses().len(), TEST_EMAILS.len());
}

#[test]
fn test_add_ccs_missing_list() {
    let mut email = Email::new();

    let err = email.add_ccs(None::<&str>).unwrap_err();
    assert!(err.is_invalid_address());
    assert_eq!(err.to_string(), "Address List invalid");

    let err = email.add_ccs(Vec::<String>::new()).unwrap_err();
    assert_eq!(err.to_string(), "Address List invalid");
}

#[test]
fn test_add_list_is_all_or_nothing() {
    let mut email = Email::new();
    let err = email
        .add_tos(["good@example.com", "invalidEmail"])
        .unwrap_err();
    assert_eq!(err.to_string(), "Address List invalid");
    assert!(email.to_addresses().is_empty());
    assert_eq!(email.state(), State::Empty);
}

#[test]
fn test_add_reply_to() {
    let mut email = Email::new();
    for address in TEST_EMAILS {
        email.add_reply_to(address).unwrap();
    }
    assert_eq!(email.reply_to_addresses().len(), TEST_EMAILS.len());

    let mut email = Email::new();
    email.add_reply_to_named(TEST_EMAILS[0], "Reply Name").unwrap();
    let entry = email.reply_to_addresses().get(TEST_EMAILS[0]).unwrap();
    assert_eq!(entry.address(), TEST_EMAILS[0]);
    assert_eq!(entry.name(), Some("Reply Name"));
}

#[test]
fn test_duplicate_recipient_is_kept_once() {
    let mut email = Email::new();
    email
        .add_to("a@example.com")
        .unwrap()
        .add_to("b@example.com")
        .unwrap()
        .add_to("a@EXAMPLE.COM")
        .unwrap();
    assert_eq!(
        email.to_addresses().addresses(),
        vec!["a@EXAMPLE.COM", "b@example.com"]
    );
}

#[test]
fn test_add_header_missing_name() {
    let mut email = Email::new();

    let err = email.add_header(None, "value").unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(err.to_string(), "name can not be null or empty");

    let err = email.add_header("", "value").unwrap_err();
    assert_eq!(err.to_string(), "name can not be null or empty");
}

#[test]
fn test_add_header_missing_value() {
    let mut email = Email::new();

    let err = email.add_header("X-Test", None).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(err.to_string(), " Value can not be null or empty");

    let err = email.add_header("X-Test", "").unwrap_err();
    assert_eq!(err.to_string(), "Value can not be empty");
}

#[test]
fn test_add_header_overwrites() {
    let mut email = Email::new();
    email.add_header("X-Priority", "1").unwrap();
    email.add_header("X-Priority", "3").unwrap();
    assert_eq!(email.headers().len(), 1);
    assert_eq!(email.headers().get("X-Priority").unwrap(), "3");
}

#[test]
fn test_sent_date_defaults_to_now() {
    let email = Email::new();
    let before = Utc::now();
    let date = email.sent_date();
    let after = Utc::now();
    assert!(before <= date && date <= after);
}

#[test]
fn test_sent_date_is_copied() {
    let date = Utc::now();
    let mut email = Email::new();
    email.set_sent_date(date).unwrap();

    let mut returned = email.sent_date();
    assert_eq!(returned, date);

    returned += chrono::Duration::days(1);
    assert_ne!(returned, date);
    assert_eq!(email.sent_date(), date);
}

#[test]
fn test_set_from() {
    let mut email = Email::new();
    email.set_from("test@example.com").unwrap();
    assert_eq!(email.from_address().unwrap().address(), "test@example.com");

    let err = email.set_from("invalidEmail").unwrap_err();
    assert!(err.is_invalid_address());
    assert!(!err.to_string().is_empty());
    assert_eq!(email.from_address().unwrap().address(), "test@example.com");
}

#[test]
fn test_build_mime_message() {
    init_tracing();

    let mut email = Email::new();
    email
        .set_host_name("smtp.example.com")
        .unwrap()
        .set_smtp_port(587)
        .unwrap()
        .set_from("from@example.com")
        .unwrap()
        .add_to("to@example.com")
        .unwrap()
        .add_cc("cc@example.com")
        .unwrap()
        .add_bcc("bcc@example.com")
        .unwrap()
        .set_subject("Test Subject")
        .unwrap()
        .set_msg("Test message")
        .unwrap();

    email.build_mime_message().unwrap();
    assert_eq!(email.state(), State::Built);

    let message = email.mime_message().unwrap();
    assert_eq!(message.subject().as_deref(), Some("Test Subject"));
    assert_eq!(message.body_text().unwrap().trim(), "Test message");
    assert_eq!(message.recipients(RecipientType::Bcc).len(), 1);
    assert_eq!(message.all_recipients().count(), 3);

    let rendered = message.to_string();
    assert!(rendered.contains("From: from@example.com\r\n"));
    assert!(rendered.contains("To: to@example.com\r\n"));
    assert!(rendered.contains("Cc: cc@example.com\r\n"));
    assert!(!rendered.contains("bcc@example.com"));
    assert!(rendered.contains("Date: "));

    let session = email.mail_session().unwrap();
    assert_eq!(session.property(MAIL_HOST), Some("smtp.example.com"));
    assert_eq!(session.property(MAIL_PORT), Some("587"));
}

#[test]
fn test_mime_message_before_build() {
    let email = Email::new();
    assert!(email.mime_message().unwrap_err().is_illegal_state());
}

#[test]
fn test_invalid_host_name() {
    let mut email = Email::new();
    email.set_host_name("").unwrap();

    let err = email.mail_session().unwrap_err();
    assert!(err.is_invalid_transport_config());
    assert!(err.to_string().contains("Invalid hostname"));
}

#[test]
fn test_ssl_port_after_build() {
    init_tracing();

    let mut email = Email::new();
    email
        .set_host_name("smtp.example.com")
        .unwrap()
        .set_ssl_smtp_port(465)
        .unwrap()
        .set_ssl_on_connect(true)
        .unwrap()
        .set_authentication("user", "password")
        .unwrap()
        .set_from("from@example.com")
        .unwrap()
        .add_to("to@example.com")
        .unwrap();
    email.build_mime_message().unwrap();

    let session = email.mail_session().unwrap();
    assert_eq!(session.property(MAIL_PORT), Some("465"));
    assert_eq!(session.property(MAIL_SMTP_SSL_ENABLE), Some("true"));
    assert_eq!(session.property(MAIL_SMTP_AUTH), Some("true"));
    assert_eq!(session.authenticator().unwrap().username, "user");
}

#[test]
fn test_from_config_builds() {
    let mut config = TransportConfig::new("smtp.example.com");
    config.start_tls_enabled = true;

    let mut email = Email::from_config(config);
    email.set_from("from@example.com").unwrap();
    email.add_to("to@example.com").unwrap();
    email.build_mime_message().unwrap();
    assert!(email.is_start_tls_enabled());
}

#[test]
fn test_transport_setters_round_trip() {
    let mut email = Email::new();
    email
        .set_start_tls_required(true)
        .unwrap()
        .set_ssl_check_server_identity(true)
        .unwrap()
        .set_send_partial(true)
        .unwrap()
        .set_socket_timeout(Duration::from_secs(5))
        .unwrap();

    assert!(email.is_start_tls_required());
    assert!(email.is_ssl_check_server_identity());
    assert!(email.is_send_partial());
    assert_eq!(email.socket_timeout(), Duration::from_secs(5));
    assert_eq!(email.socket_connection_timeout(), Duration::from_secs(60));
    assert_eq!(email.smtp_port(), 25);
}

proptest! {
    #[test]
    fn prop_add_tos_counts_unique_addresses(
        addresses in prop::collection::btree_set(address_strategy(), 1..20)
    ) {
        let addresses: Vec<String> = addresses.into_iter().collect();
        let mut email = Email::new();
        email.add_tos(&addresses).unwrap();
        prop_assert_eq!(email.to_addresses().len(), addresses.len());
        prop_assert_eq!(
            email.to_addresses().addresses(),
            addresses.iter().map(String::as_str).collect::<Vec<_>>()
        );
    }

    #[test]
    fn prop_header_round_trip(
        name in "[A-Za-z][A-Za-z0-9-]{0,20}",
        value in "[ -~]{1,40}",
    ) {
        let mut email = Email::new();
        email.add_header(name.as_str(), value.as_str()).unwrap();
        prop_assert_eq!(email.headers().get(&name), Some(&value));
    }

    #[test]
    fn prop_socket_connection_timeout_round_trip(millis in any::<u64>()) {
        let timeout = Duration::from_millis(millis);
        let mut email = Email::new();
        email.set_socket_connection_timeout(timeout).unwrap();
        prop_assert_eq!(email.socket_connection_timeout(), timeout);
    }
}
