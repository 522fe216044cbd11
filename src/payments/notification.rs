//! Inbound PayFast notification data
//!
//! PayFast signs the posted fields in the order it sent them, so the
//! notification keeps the raw pairs instead of deserializing into a struct.
//! Only the posted body is signed; query string pairs are readable but
//! never part of the signed data.

use url::form_urlencoded;

/// Form data posted by PayFast to the notify URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayfastNotification {
    fields: Vec<(String, String)>,
    /// Leading pairs that came from the query string
    query_len: usize,
}

impl PayfastNotification {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            query_len: 0,
        }
    }

    /// Parses an `application/x-www-form-urlencoded` payload
    pub fn parse(body: &[u8]) -> Self {
        Self::from_pairs(form_urlencoded::parse(body).into_owned())
    }

    /// Query string pairs followed by body pairs
    pub fn from_request_parts(query: Option<&str>, body: &[u8]) -> Self {
        let mut notification = query
            .map(|q| Self::parse(q.as_bytes()))
            .unwrap_or_default();
        notification.query_len = notification.fields.len();
        notification.fields.extend(Self::parse(body).fields);
        notification
    }

    /// All pairs in received order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Pairs covered by the gateway signature, the posted body only
    pub fn signed_fields(&self) -> &[(String, String)] {
        &self.fields[self.query_len..]
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First value posted for `key`; empty values read as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn m_payment_id(&self) -> Option<&str> {
        self.get("m_payment_id")
    }

    pub fn pf_payment_id(&self) -> Option<&str> {
        self.get("pf_payment_id")
    }

    /// Gateway transaction id: `pf_payment_id`, else a legacy `txn_id`
    pub fn txn_id(&self) -> Option<&str> {
        self.pf_payment_id().or_else(|| self.get("txn_id"))
    }

    pub fn payment_status(&self) -> Option<&str> {
        self.get("payment_status")
    }

    pub fn payment_date(&self) -> Option<&str> {
        self.get("payment_date")
    }

    pub fn pending_reason(&self) -> Option<&str> {
        self.get("pending_reason")
    }

    pub fn notify_version(&self) -> Option<&str> {
        self.get("notify_version")
    }

    pub fn is_test(&self) -> bool {
        self.get("test_ipn").is_some()
    }

    pub fn merchant_id(&self) -> Option<&str> {
        self.get("merchant_id")
    }

    pub fn amount_gross(&self) -> Option<&str> {
        self.get("amount_gross")
    }

    pub fn signature(&self) -> Option<&str> {
        self.get("signature")
    }
}
