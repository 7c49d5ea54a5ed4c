//! Signed order submission from a merchant.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ledger::LedgerError;
use crate::merchant::signature;
use crate::money::{format_money, validate_amount};

/// Form fields of an epay `submit` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    /// Merchant client id.
    pub pid: String,
    /// Payment type.
    #[serde(rename = "type", default)]
    pub pay_type: String,
    /// Merchant's order reference.
    pub out_trade_no: String,
    /// Webhook URL for this order.
    #[serde(default)]
    pub notify_url: String,
    /// Browser return URL.
    #[serde(default)]
    pub return_url: String,
    /// Order display name.
    pub name: String,
    /// Amount as text.
    pub money: String,
    /// Client device hint.
    #[serde(default)]
    pub device: String,
    /// Request signature.
    pub sign: String,
    /// Signature type, always `MD5`.
    #[serde(default)]
    pub sign_type: String,
}

impl SubmitRequest {
    /// Parses and validates the amount, then checks the signature.
    ///
    /// The signature covers the amount re-rendered with two fixed decimals,
    /// which is what a conforming merchant signs.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for a bad amount and
    /// `LedgerError::InvalidSignature` if the signature does not verify.
    pub fn verify(&self, client_secret: &str) -> Result<Decimal, LedgerError> {
        let amount = Decimal::from_str(self.money.trim())
            .map_err(|_| LedgerError::InvalidAmount(format!("unparseable amount {}", self.money)))?;
        let amount = validate_amount(amount)?;
        let money = format_money(amount);

        let fields = [
            ("pid", self.pid.as_str()),
            ("type", self.pay_type.as_str()),
            ("out_trade_no", self.out_trade_no.as_str()),
            ("notify_url", self.notify_url.as_str()),
            ("return_url", self.return_url.as_str()),
            ("name", self.name.as_str()),
            ("money", money.as_str()),
            ("device", self.device.as_str()),
        ];
        if signature::verify(fields, client_secret, &self.sign) {
            Ok(amount)
        } else {
            Err(LedgerError::InvalidSignature)
        }
    }
}
