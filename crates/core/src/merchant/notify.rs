//! Merchant webhook payloads.

use rust_decimal::Decimal;
use url::{Host, Url};

use crate::ledger::LedgerError;
use crate::merchant::signature::{self, SIGN_TYPE_MD5};
use crate::money::format_money;

/// `trade_status` value for a settled order.
pub const TRADE_SUCCESS: &str = "TRADE_SUCCESS";
/// Payment type reported to merchants.
pub const PAY_TYPE_EPAY: &str = "epay";

/// The order facts a merchant is told about.
#[derive(Debug, Clone)]
pub struct NotificationInput<'a> {
    /// Merchant client id.
    pub client_id: &'a str,
    /// Internal order id.
    pub order_id: i64,
    /// Merchant's own order reference.
    pub merchant_order_no: &'a str,
    /// Payment type.
    pub pay_type: &'a str,
    /// Order display name.
    pub name: &'a str,
    /// Order amount.
    pub amount: Decimal,
}

/// Builds the signed webhook parameters, `sign` last.
#[must_use]
pub fn notification_params(
    input: &NotificationInput<'_>,
    secret: &str,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("pid", input.client_id.to_string()),
        ("trade_no", input.order_id.to_string()),
        ("out_trade_no", input.merchant_order_no.to_string()),
        ("type", input.pay_type.to_string()),
        ("name", input.name.to_string()),
        ("money", format_money(input.amount)),
        ("trade_status", TRADE_SUCCESS.to_string()),
        ("sign_type", SIGN_TYPE_MD5.to_string()),
    ];
    let sign = signature::sign(params.iter().map(|(k, v)| (*k, v.as_str())), secret);
    params.push(("sign", sign));
    params
}

/// Appends the parameters to the merchant's notify URL as a query string.
///
/// # Errors
///
/// Returns `LedgerError::Internal` if the notify URL is not a valid URL.
pub fn notification_url(
    notify_url: &str,
    params: &[(&'static str, String)],
) -> Result<Url, LedgerError> {
    let mut url = Url::parse(notify_url)
        .map_err(|e| LedgerError::Internal(format!("invalid notify url {notify_url}: {e}")))?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    Ok(url)
}

/// A delivery succeeds only on HTTP 200 with a body of `success`, ignoring case and whitespace.
#[must_use]
pub fn is_delivery_success(status: u16, body: &str) -> bool {
    status == 200 && body.trim().eq_ignore_ascii_case("success")
}

/// Returns true if the URL points at the local machine.
#[must_use]
pub fn is_loopback(url: &str) -> bool {
    let Ok(url) = Url::parse(url) else {
        return false;
    };
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> NotificationInput<'static> {
        NotificationInput {
            client_id: "client-1",
            order_id: 42,
            merchant_order_no: "M-42",
            pay_type: PAY_TYPE_EPAY,
            name: "coffee",
            amount: dec!(10),
        }
    }

    #[test]
    fn test_params_are_signed() {
        let params = notification_params(&input(), "secret");
        let sign = params.last().map(|(_, v)| v.clone()).unwrap();
        assert!(signature::verify(
            params.iter().map(|(k, v)| (*k, v.as_str())),
            "secret",
            &sign
        ));
        assert!(params.contains(&("money", "10.00".to_string())));
        assert!(params.contains(&("trade_no", "42".to_string())));
        assert!(params.contains(&("trade_status", "TRADE_SUCCESS".to_string())));
    }

    #[test]
    fn test_notification_url_appends_query() {
        let params = notification_params(&input(), "secret");
        let plain = notification_url("https://shop.test/notify", &params).unwrap();
        assert!(plain.as_str().starts_with("https://shop.test/notify?pid=client-1&"));

        let existing = notification_url("https://shop.test/notify?shop=7", &params).unwrap();
        assert!(existing.as_str().starts_with("https://shop.test/notify?shop=7&pid=client-1&"));
    }

    #[test]
    fn test_notification_url_rejects_garbage() {
        assert!(notification_url("not a url", &[]).is_err());
    }

    #[test]
    fn test_delivery_success() {
        assert!(is_delivery_success(200, "success"));
        assert!(is_delivery_success(200, "  SUCCESS\n"));
        assert!(!is_delivery_success(200, "ok"));
        assert!(!is_delivery_success(200, "success!"));
        assert!(!is_delivery_success(500, "success"));
        assert!(!is_delivery_success(201, "success"));
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback("http://localhost:8080/notify"));
        assert!(is_loopback("http://127.0.0.1/notify"));
        assert!(is_loopback("http://[::1]:9000/cb"));
        assert!(!is_loopback("https://shop.test/notify"));
        assert!(!is_loopback("garbage"));
    }
}
