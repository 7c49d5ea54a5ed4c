//! Merchant credentials and payment links.

use chrono::Utc;
use credit_core::ledger::LedgerError;
use credit_core::money::validate_amount;
use rand::RngCore;
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use subtle::ConstantTimeEq;

use crate::entities::{merchant_credentials, payment_links};
use crate::error::SettlementError;

/// Longest product name a link may carry, in characters.
pub const LINK_PRODUCT_NAME_MAX: usize = 30;
/// Longest link remark, in characters.
pub const LINK_REMARK_MAX: usize = 100;

/// A payment link to create.
#[derive(Debug, Clone)]
pub struct NewPaymentLink {
    /// Fixed price.
    pub amount: Decimal,
    /// Name shown to the payer and used as the order name.
    pub product_name: String,
    /// Note shown on the link page.
    pub remark: String,
    /// Successful payments allowed in total; `None` is unlimited.
    pub total_limit: Option<i32>,
    /// Successful payments allowed per payer; `None` is unlimited.
    pub user_limit: Option<i32>,
}

impl NewPaymentLink {
    /// Checks the text fields and limits; callers validate before creating.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first field out of bounds.
    pub fn validate(&self) -> Result<(), String> {
        let name_len = self.product_name.trim().chars().count();
        if name_len == 0 || name_len > LINK_PRODUCT_NAME_MAX {
            return Err(format!(
                "product_name must be 1 to {LINK_PRODUCT_NAME_MAX} characters"
            ));
        }
        if self.remark.chars().count() > LINK_REMARK_MAX {
            return Err(format!("remark must be at most {LINK_REMARK_MAX} characters"));
        }
        if self.total_limit.is_some_and(|n| n < 0) || self.user_limit.is_some_and(|n| n < 0) {
            return Err("limits must not be negative".to_string());
        }
        Ok(())
    }
}

/// A live link with the credential that sells through it.
#[derive(Debug, Clone)]
pub struct LinkDetail {
    /// The link.
    pub link: payment_links::Model,
    /// Application name of the owning credential.
    pub app_name: String,
}

/// Merchant repository.
#[derive(Debug, Clone)]
pub struct MerchantRepository {
    db: DatabaseConnection,
}

impl MerchantRepository {
    /// Creates a new merchant repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a live credential by client id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<merchant_credentials::Model>, DbErr> {
        Self::find_credential_by_client_id(&self.db, client_id).await
    }

    /// Finds a live credential by client id on any connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_credential_by_client_id<C: ConnectionTrait>(
        conn: &C,
        client_id: &str,
    ) -> Result<Option<merchant_credentials::Model>, DbErr> {
        merchant_credentials::Entity::find()
            .filter(merchant_credentials::Column::ClientId.eq(client_id))
            .filter(merchant_credentials::Column::DeletedAt.is_null())
            .one(conn)
            .await
    }

    /// Finds a live credential by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_credential<C: ConnectionTrait>(
        conn: &C,
        id: i64,
    ) -> Result<Option<merchant_credentials::Model>, DbErr> {
        merchant_credentials::Entity::find_by_id(id)
            .filter(merchant_credentials::Column::DeletedAt.is_null())
            .one(conn)
            .await
    }

    /// Returns the credential if `client_secret` matches.
    ///
    /// The secret is compared in constant time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn authenticate<C: ConnectionTrait>(
        conn: &C,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Option<merchant_credentials::Model>, DbErr> {
        let credential = Self::find_credential_by_client_id(conn, client_id).await?;
        Ok(credential.filter(|c| {
            bool::from(c.client_secret.as_bytes().ct_eq(client_secret.as_bytes()))
        }))
    }

    /// Finds a live credential owned by `account_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_owned_credential(
        &self,
        account_id: i64,
        credential_id: i64,
    ) -> Result<Option<merchant_credentials::Model>, DbErr> {
        Ok(Self::find_credential(&self.db, credential_id)
            .await?
            .filter(|credential| credential.account_id == account_id))
    }

    /// Creates a payment link under a credential with a fresh random token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a bad price, `Internal` for input that
    /// [`NewPaymentLink::validate`] rejects, or a database error.
    pub async fn create_link(
        &self,
        credential: &merchant_credentials::Model,
        new: NewPaymentLink,
    ) -> Result<payment_links::Model, SettlementError> {
        let amount = validate_amount(new.amount)?;
        new.validate().map_err(LedgerError::Internal)?;

        let now = Utc::now().into();
        let link = payment_links::ActiveModel {
            merchant_credential_id: Set(credential.id),
            token: Set(generate_link_token()),
            amount: Set(amount),
            product_name: Set(new.product_name.trim().to_string()),
            remark: Set(new.remark),
            total_limit: Set(new.total_limit),
            user_limit: Set(new.user_limit),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            link_id = link.id,
            client_id = %credential.client_id,
            "Payment link created"
        );
        Ok(link)
    }

    /// Live links of a credential, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_links(
        &self,
        credential_id: i64,
    ) -> Result<Vec<payment_links::Model>, DbErr> {
        payment_links::Entity::find()
            .filter(payment_links::Column::MerchantCredentialId.eq(credential_id))
            .filter(payment_links::Column::DeletedAt.is_null())
            .order_by_desc(payment_links::Column::CreatedAt)
            .order_by_desc(payment_links::Column::Id)
            .all(&self.db)
            .await
    }

    /// A live link and its application name, by token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn link_detail(&self, token: &str) -> Result<Option<LinkDetail>, DbErr> {
        let Some(link) = Self::find_link_by_token(&self.db, token).await? else {
            return Ok(None);
        };
        let credential = Self::find_credential(&self.db, link.merchant_credential_id).await?;
        Ok(credential.map(|credential| LinkDetail {
            link,
            app_name: credential.app_name,
        }))
    }

    /// Soft-deletes a credential's link. Returns false if there was none live.
    ///
    /// Orders already paid through the link keep their reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn delete_link(&self, credential_id: i64, link_id: i64) -> Result<bool, DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = payment_links::Entity::update_many()
            .col_expr(payment_links::Column::DeletedAt, Expr::value(now))
            .col_expr(payment_links::Column::UpdatedAt, Expr::value(now))
            .filter(payment_links::Column::Id.eq(link_id))
            .filter(payment_links::Column::MerchantCredentialId.eq(credential_id))
            .filter(payment_links::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Finds a live payment link by its public token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_link_by_token<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<Option<payment_links::Model>, DbErr> {
        payment_links::Entity::find()
            .filter(payment_links::Column::Token.eq(token))
            .filter(payment_links::Column::DeletedAt.is_null())
            .one(conn)
            .await
    }
}

fn generate_link_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
