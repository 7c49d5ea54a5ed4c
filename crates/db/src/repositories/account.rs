//! Account repository.

use chrono::Utc;
use credit_core::auth::hash_pay_key;
use credit_core::ledger::{DailyWindow, LedgerError, OrderStatus, OrderType};
use credit_core::money::validate_amount;
use rand::RngCore;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};

use crate::entities::{accounts, orders};
use crate::error::SettlementError;
use crate::repositories::OrderRepository;

/// Order name of the provisioning grant.
pub const INITIAL_CREDIT_NAME: &str = "initial credit";

/// Input for provisioning an account issued by the identity provider.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Account id assigned by the identity provider.
    pub id: i64,
    /// Username.
    pub username: String,
    /// Starting balance, granted as a community order.
    pub initial_balance: Decimal,
    /// Optional payment secret.
    pub pay_key: Option<String>,
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<accounts::Model>, DbErr> {
        accounts::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds an active account on any connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active<C: ConnectionTrait>(
        conn: &C,
        id: i64,
    ) -> Result<Option<accounts::Model>, DbErr> {
        accounts::Entity::find_by_id(id)
            .filter(accounts::Column::IsActive.eq(true))
            .one(conn)
            .await
    }

    /// Finds an active account whose id and username both match.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id_and_username<C: ConnectionTrait>(
        conn: &C,
        id: i64,
        username: &str,
    ) -> Result<Option<accounts::Model>, DbErr> {
        accounts::Entity::find_by_id(id)
            .filter(accounts::Column::Username.eq(username))
            .filter(accounts::Column::IsActive.eq(true))
            .one(conn)
            .await
    }

    /// Creates an account with a fresh signing key.
    ///
    /// A positive starting balance is granted in the same transaction as a
    /// `community` order paid by the system account 0.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for a malformed starting balance,
    /// or a database error (including a duplicate id or username).
    pub async fn provision(&self, input: NewAccount) -> Result<accounts::Model, SettlementError> {
        if input.initial_balance != Decimal::ZERO {
            validate_amount(input.initial_balance)?;
        }
        let pay_key_hash = input
            .pay_key
            .as_deref()
            .map(hash_pay_key)
            .transpose()
            .map_err(LedgerError::from)?;

        let now = Utc::now().into();
        let txn = self.db.begin().await?;

        let account = accounts::ActiveModel {
            id: Set(input.id),
            username: Set(input.username),
            pay_score: Set(0),
            pay_key_hash: Set(pay_key_hash),
            sign_key: Set(generate_sign_key()),
            total_receive: Set(input.initial_balance),
            total_payment: Set(Decimal::ZERO),
            total_transfer: Set(Decimal::ZERO),
            total_community: Set(Decimal::ZERO),
            community_balance: Set(Decimal::ZERO),
            available_balance: Set(input.initial_balance),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        if input.initial_balance > Decimal::ZERO {
            orders::ActiveModel {
                order_name: Set(INITIAL_CREDIT_NAME.to_string()),
                payer_id: Set(0),
                payee_id: Set(account.id),
                amount: Set(input.initial_balance),
                status: Set(OrderStatus::Success.into()),
                order_type: Set(OrderType::Community.into()),
                trade_time: Set(Some(now)),
                expires_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        tracing::info!(
            account_id = account.id,
            initial_balance = %account.available_balance,
            "Account provisioned"
        );
        Ok(account)
    }

    /// Replaces the payment secret.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` for an unknown account.
    pub async fn set_pay_key(&self, id: i64, pay_key: &str) -> Result<(), SettlementError> {
        let hash = hash_pay_key(pay_key).map_err(LedgerError::from)?;
        let account = self
            .find_by_id(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;

        let mut active: accounts::ActiveModel = account.into();
        active.pay_key_hash = Set(Some(hash));
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await?;
        Ok(())
    }

    /// Amount spent today that counts toward the daily limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn today_spent(
        &self,
        account_id: i64,
        tz: chrono_tz::Tz,
    ) -> Result<Decimal, DbErr> {
        let window = DailyWindow::containing(Utc::now(), tz);
        OrderRepository::spent_between(&self.db, account_id, &window).await
    }
}

fn generate_sign_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
