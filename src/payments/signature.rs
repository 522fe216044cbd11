//! PayFast signature generation and verification
//!
//! PayFast signs a parameter string: `key=value` pairs joined by `&` in the
//! order they were posted, values encoded the way PHP's `urlencode` does
//! (space as `+`, uppercase percent escapes, only `-_.` left bare), with
//! `passphrase=...` appended when the merchant has one configured. The
//! signature is the lowercase hex MD5 of that string.

use crate::payments::notification::PayfastNotification;
use url::form_urlencoded;

const SIGNATURE_FIELD: &str = "signature";

fn encode(value: &str) -> String {
    // form encoding leaves `*` bare, PHP escapes it
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

/// Builds the parameter string for the given pairs, skipping `signature`
pub fn param_string<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .filter(|(key, _)| *key != SIGNATURE_FIELD)
        .map(|(key, value)| format!("{}={}", key, encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parameter string of a received notification's posted body, without
/// passphrase
pub fn notification_param_string(notification: &PayfastNotification) -> String {
    param_string(
        notification
            .signed_fields()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    )
}

/// Computes the signature of a notification
pub fn generate_signature(notification: &PayfastNotification, passphrase: Option<&str>) -> String {
    let mut data = notification_param_string(notification);
    if let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) {
        data.push_str("&passphrase=");
        data.push_str(&encode(passphrase));
    }
    format!("{:x}", md5::compute(data.as_bytes()))
}

/// Checks the posted `signature` field against the computed one
pub fn verify_signature(notification: &PayfastNotification, passphrase: Option<&str>) -> bool {
    let provided = match notification.signature() {
        Some(signature) => signature.trim().to_ascii_lowercase(),
        None => return false,
    };
    let computed = generate_signature(notification, passphrase);

    if computed.len() != provided.len() {
        return false;
    }

    computed
        .as_bytes()
        .iter()
        .zip(provided.as_bytes().iter())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}
