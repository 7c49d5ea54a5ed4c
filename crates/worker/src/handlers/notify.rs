//! Merchant settlement webhooks.

use std::time::Duration;

use credit_core::ledger::OrderStatus;
use credit_core::merchant::{
    NotificationInput, PAY_TYPE_EPAY, is_delivery_success, is_loopback, notification_params,
    notification_url,
};
use credit_db::{MerchantRepository, OrderRepository};

use super::Attempt;
use crate::error::WorkerError;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Delivers signed settlement notifications to merchants.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    orders: OrderRepository,
    merchants: MerchantRepository,
    http: reqwest::Client,
    skip_loopback: bool,
}

impl NotificationDispatcher {
    /// Creates a dispatcher.
    ///
    /// With `skip_loopback`, notify URLs pointing at the local machine are
    /// acknowledged without a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        orders: OrderRepository,
        merchants: MerchantRepository,
        skip_loopback: bool,
    ) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            orders,
            merchants,
            http,
            skip_loopback,
        })
    }

    /// Notifies the merchant that `order_id` settled.
    ///
    /// Orders that are no longer settled, and merchants that no longer
    /// exist, are acknowledged without a request.
    pub async fn deliver(
        &self,
        order_id: i64,
        client_id: &str,
        attempt: Attempt,
    ) -> Result<(), WorkerError> {
        let Some(order) = self
            .orders
            .find_in_status(order_id, OrderStatus::Success)
            .await?
        else {
            tracing::info!(order_id, "Order no longer settled, skipping notification");
            return Ok(());
        };
        let Some(credential) = self.merchants.find_by_client_id(client_id).await? else {
            tracing::warn!(order_id, client_id, "Merchant credential gone, skipping notification");
            return Ok(());
        };
        if credential.notify_url.trim().is_empty() {
            return Ok(());
        }
        if self.skip_loopback && is_loopback(&credential.notify_url) {
            tracing::debug!(order_id, client_id, "Loopback notify URL skipped");
            return Ok(());
        }

        let pay_type = if order.payment_type.is_empty() {
            PAY_TYPE_EPAY
        } else {
            order.payment_type.as_str()
        };
        let params = notification_params(
            &NotificationInput {
                client_id,
                order_id: order.id,
                merchant_order_no: order.merchant_order_no.as_deref().unwrap_or_default(),
                pay_type,
                name: &order.order_name,
                amount: order.amount,
            },
            &credential.client_secret,
        );
        let url = notification_url(&credential.notify_url, &params)?;

        send_notification(&self.http, url.as_str()).await?;
        tracing::info!(
            order_id,
            client_id,
            attempt = attempt.number,
            "Merchant notified"
        );
        Ok(())
    }
}

/// Sends one notification; succeeds only on an acknowledged delivery.
pub async fn send_notification(http: &reqwest::Client, url: &str) -> Result<(), WorkerError> {
    let response = http.get(url).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    if is_delivery_success(status, &body) {
        return Ok(());
    }
    Err(WorkerError::Rejected {
        status,
        body: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_success_acknowledgement() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/notify")
            .match_query(Matcher::UrlEncoded(
                "trade_status".into(),
                "TRADE_SUCCESS".into(),
            ))
            .with_status(200)
            .with_body(" SUCCESS\n")
            .create_async()
            .await;

        let url = format!("{}/notify?trade_status=TRADE_SUCCESS", server.url());
        send_notification(&reqwest::Client::new(), &url).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_wrong_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/notify")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let url = format!("{}/notify", server.url());
        let err = send_notification(&reqwest::Client::new(), &url)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Rejected { status: 200, ref body } if body == "ok"));
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/notify")
            .with_status(500)
            .with_body("success")
            .create_async()
            .await;

        let url = format!("{}/notify", server.url());
        assert!(matches!(
            send_notification(&reqwest::Client::new(), &url).await,
            Err(WorkerError::Rejected { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_merchant_is_an_error() {
        let err = send_notification(&reqwest::Client::new(), "http://127.0.0.1:9/notify")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Http(_)));
    }
}
