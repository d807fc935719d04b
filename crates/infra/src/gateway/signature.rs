//! Notification signature: `SHA512(order_ref + status_code + gross_amount + server_key)`,
//! hex encoded.

use sha2::{Digest, Sha512};

pub fn notification_signature(
    order_ref: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_ref.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a received signature against the expected one, ignoring hex case.
pub fn verify_notification_signature(
    order_ref: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    received: &str,
) -> bool {
    let expected = notification_signature(order_ref, status_code, gross_amount, server_key);
    let received = received.trim().to_ascii_lowercase();
    if expected.len() != received.len() {
        return false;
    }
    expected
        .bytes()
        .zip(received.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_lower_hex_sha512() {
        let sig = notification_signature("EGG-1", "200", "28000.00", "SB-key");
        assert_eq!(sig.len(), 128);
        assert!(sig.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn verifies_matching_signature() {
        let sig = notification_signature("EGG-1", "200", "28000.00", "SB-key");
        assert!(verify_notification_signature("EGG-1", "200", "28000.00", "SB-key", &sig));
        assert!(verify_notification_signature(
            "EGG-1",
            "200",
            "28000.00",
            "SB-key",
            &sig.to_ascii_uppercase()
        ));
    }

    #[test]
    fn rejects_tampered_fields() {
        let sig = notification_signature("EGG-1", "200", "28000.00", "SB-key");
        assert!(!verify_notification_signature("EGG-1", "200", "1.00", "SB-key", &sig));
        assert!(!verify_notification_signature("EGG-1", "200", "28000.00", "other", &sig));
        assert!(!verify_notification_signature("EGG-1", "200", "28000.00", "SB-key", "abc"));
    }
}
