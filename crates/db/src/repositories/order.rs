//! Order repository: lookups, limit counters and expiry.

use chrono::{DateTime, Utc};
use credit_core::ledger::{DailyWindow, OrderStatus as CoreOrderStatus};
use credit_shared::PageRequest;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;

use crate::entities::orders;
use crate::entities::sea_orm_active_enums::{OrderStatus, OrderType};

/// Which side of an account's history to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryView {
    /// Merchant payments the account received.
    Receive,
    /// Merchant payments the account made.
    Payment,
    /// Transfers the account sent.
    Transfer,
    /// Community score orders of the account.
    Community,
}

/// Filter options for an account's order history.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Restrict to one view; `None` lists everything the account is party to.
    pub view: Option<HistoryView>,
    /// Filter by status.
    pub status: Option<CoreOrderStatus>,
    /// Filter by merchant credential.
    pub client_id: Option<String>,
    /// Created at or after.
    pub from: Option<DateTime<Utc>>,
    /// Created at or before.
    pub to: Option<DateTime<Utc>>,
}

/// Order repository.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: DatabaseConnection,
}

impl OrderRepository {
    /// Creates a new order repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<orders::Model>, DbErr> {
        orders::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds an order issued through a merchant credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_for_client(
        &self,
        id: i64,
        client_id: &str,
    ) -> Result<Option<orders::Model>, DbErr> {
        orders::Entity::find_by_id(id)
            .filter(orders::Column::ClientId.eq(client_id))
            .one(&self.db)
            .await
    }

    /// Finds a merchant's order by the merchant's own reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_merchant_order_no(
        &self,
        client_id: &str,
        merchant_order_no: &str,
    ) -> Result<Option<orders::Model>, DbErr> {
        orders::Entity::find()
            .filter(orders::Column::ClientId.eq(client_id))
            .filter(orders::Column::MerchantOrderNo.eq(merchant_order_no))
            .order_by_desc(orders::Column::Id)
            .one(&self.db)
            .await
    }

    /// Finds an order in the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_in_status(
        &self,
        id: i64,
        status: CoreOrderStatus,
    ) -> Result<Option<orders::Model>, DbErr> {
        orders::Entity::find_by_id(id)
            .filter(orders::Column::Status.eq(OrderStatus::from(status)))
            .one(&self.db)
            .await
    }

    /// Lists an account's orders, newest first, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_history(
        &self,
        account_id: i64,
        filter: &HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<orders::Model>, u64), DbErr> {
        let merchant = [OrderType::Payment, OrderType::Online];
        let party = match filter.view {
            None => Condition::any()
                .add(orders::Column::PayerId.eq(account_id))
                .add(orders::Column::PayeeId.eq(account_id)),
            Some(HistoryView::Receive) => Condition::all()
                .add(orders::Column::OrderType.is_in(merchant))
                .add(orders::Column::PayeeId.eq(account_id)),
            Some(HistoryView::Payment) => Condition::all()
                .add(orders::Column::OrderType.is_in(merchant))
                .add(orders::Column::PayerId.eq(account_id)),
            Some(HistoryView::Transfer) => Condition::all()
                .add(orders::Column::OrderType.eq(OrderType::Transfer))
                .add(orders::Column::PayerId.eq(account_id)),
            Some(HistoryView::Community) => Condition::all()
                .add(orders::Column::OrderType.eq(OrderType::Community))
                .add(orders::Column::PayeeId.eq(account_id)),
        };

        let mut query = orders::Entity::find().filter(party);
        if let Some(status) = filter.status {
            query = query.filter(orders::Column::Status.eq(OrderStatus::from(status)));
        }
        if let Some(client_id) = &filter.client_id {
            query = query.filter(orders::Column::ClientId.eq(client_id.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(orders::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(orders::Column::CreatedAt.lte(to));
        }

        let total = query.clone().count(&self.db).await?;
        let rows = query
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;
        Ok((rows, total))
    }

    /// Sum of the payer's successful payments inside a local day.
    ///
    /// Counts `payment` and `online` orders; transfers, community grants and
    /// test-mode orders are excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn spent_between<C: ConnectionTrait>(
        conn: &C,
        payer_id: i64,
        window: &DailyWindow,
    ) -> Result<Decimal, DbErr> {
        let spent: Option<Option<Decimal>> = orders::Entity::find()
            .select_only()
            .column_as(orders::Column::Amount.sum(), "spent")
            .filter(orders::Column::PayerId.eq(payer_id))
            .filter(orders::Column::Status.eq(OrderStatus::Success))
            .filter(orders::Column::OrderType.is_in([OrderType::Payment, OrderType::Online]))
            .filter(orders::Column::IsTest.eq(false))
            .filter(orders::Column::TradeTime.gte(window.start))
            .filter(orders::Column::TradeTime.lt(window.end))
            .into_tuple()
            .one(conn)
            .await?;

        Ok(spent.flatten().unwrap_or(Decimal::ZERO))
    }

    /// Successful payments through a link, optionally for one payer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_link_successes<C: ConnectionTrait>(
        conn: &C,
        link_id: i64,
        payer_id: Option<i64>,
    ) -> Result<u64, DbErr> {
        let mut query = orders::Entity::find()
            .filter(orders::Column::PaymentLinkId.eq(link_id))
            .filter(orders::Column::Status.eq(OrderStatus::Success));
        if let Some(payer_id) = payer_id {
            query = query.filter(orders::Column::PayerId.eq(payer_id));
        }
        query.count(conn).await
    }

    /// Expires every pending order whose expiry time has passed.
    ///
    /// Idempotent: a second run finds nothing left to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DbErr> {
        let result = orders::Entity::update_many()
            .set(expired_at(now))
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .filter(orders::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Expires one order if it is still pending and overdue.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn expire_one(&self, id: i64, now: DateTime<Utc>) -> Result<bool, DbErr> {
        let result = orders::Entity::update_many()
            .set(expired_at(now))
            .filter(orders::Column::Id.eq(id))
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .filter(orders::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

fn expired_at(now: DateTime<Utc>) -> orders::ActiveModel {
    orders::ActiveModel {
        status: Set(OrderStatus::Expired),
        updated_at: Set(now.into()),
        ..Default::default()
    }
}
