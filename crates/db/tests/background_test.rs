//! Integration tests for the pieces the background worker drives:
//! the durable job queue, order expiry and community score sync.

#![allow(clippy::uninlined_format_args)]

mod common;

use chrono::{Duration, Utc};
use credit_core::jobs::JobPayload;
use credit_core::score::ExternalScore;
use credit_db::entities::sea_orm_active_enums::{JobStatus, OrderStatus, OrderType};
use credit_db::entities::{accounts, jobs, orders};
use credit_db::repositories::{RetryOutcome, decode_payload, score_sync::COMMUNITY_ORDER_NAME};
use credit_db::settlement::NewMerchantOrder;
use credit_db::{JobRepository, OrderRepository, ScoreSyncRepository};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use common::*;

#[tokio::test]
async fn test_enqueue_unique_deduplicates_by_key() {
    let Some(db) = connect().await else { return };
    let repo = JobRepository::new(db.clone());
    let key = format!("expire_orders:test-{}", fresh_id());

    assert!(repo.enqueue_unique(&JobPayload::ExpireOrders, 3, &key).await.unwrap());
    assert!(!repo.enqueue_unique(&JobPayload::ExpireOrders, 3, &key).await.unwrap());
}

#[tokio::test]
async fn test_prune_done_keeps_recent_and_failed_jobs() {
    let Some(db) = connect().await else { return };
    let repo = JobRepository::new(db.clone());
    let payload = |order_id: i64| JobPayload::MerchantNotify {
        order_id,
        client_id: "client-retention".to_string(),
    };

    let old_done = JobRepository::enqueue(&db, &payload(fresh_id()), 3).await.unwrap();
    let recent_done = JobRepository::enqueue(&db, &payload(fresh_id()), 3).await.unwrap();
    let old_failed = JobRepository::enqueue(&db, &payload(fresh_id()), 3).await.unwrap();
    let old_pending = JobRepository::enqueue(&db, &payload(fresh_id()), 3).await.unwrap();
    repo.complete(old_done).await.unwrap();
    repo.complete(recent_done).await.unwrap();
    repo.fail(old_failed, "HTTP 500").await.unwrap();

    let long_ago: DateTimeWithTimeZone = (Utc::now() - Duration::days(30)).into();
    jobs::Entity::update_many()
        .col_expr(jobs::Column::UpdatedAt, Expr::value(long_ago))
        .filter(jobs::Column::Id.is_in([old_done, old_failed, old_pending]))
        .exec(&db)
        .await
        .unwrap();

    let pruned = repo.prune_done(Utc::now() - Duration::days(7)).await.unwrap();
    assert!(pruned >= 1);
    assert!(repo.find_by_id(old_done).await.unwrap().is_none());
    assert!(repo.find_by_id(recent_done).await.unwrap().is_some());
    assert!(repo.find_by_id(old_failed).await.unwrap().is_some());
    assert!(repo.find_by_id(old_pending).await.unwrap().is_some());
    repo.complete(old_pending).await.unwrap();
}

#[tokio::test]
async fn test_retry_then_terminal_failure() {
    let Some(db) = connect().await else { return };
    let repo = JobRepository::new(db.clone());
    let payload = JobPayload::MerchantNotify {
        order_id: fresh_id(),
        client_id: "client-retry".to_string(),
    };
    let id = JobRepository::enqueue(&db, &payload, 2).await.unwrap();
    let mut job = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(decode_payload(&job).unwrap(), payload);

    job.attempts = 1;
    let before = Utc::now();
    match repo.retry_or_fail(&job, "HTTP 500").await.unwrap() {
        RetryOutcome::Retrying { run_at } => {
            assert!(run_at >= before + Duration::seconds(10));
            assert!(run_at <= Utc::now() + Duration::seconds(11));
        }
        RetryOutcome::Failed => panic!("first failure must be retried"),
    }
    let stored = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.last_error.as_deref(), Some("HTTP 500"));

    job.attempts = 2;
    assert_eq!(
        repo.retry_or_fail(&job, "HTTP 502").await.unwrap(),
        RetryOutcome::Failed
    );
    let stored = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("HTTP 502"));
}

#[tokio::test]
async fn test_expiry_is_idempotent() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);
    let repo = OrderRepository::new(db.clone());
    let (_, credential) = create_merchant(&db, false).await;

    let issued = engine
        .create_merchant_order(
            &credential,
            NewMerchantOrder {
                order_name: "Stale".to_string(),
                merchant_order_no: format!("S{}", fresh_id()),
                amount: dec!(5.00),
                payment_type: "epay".to_string(),
                remark: String::new(),
            },
        )
        .await
        .unwrap();

    // Not overdue yet.
    assert!(!repo.expire_one(issued.order.id, Utc::now()).await.unwrap());

    let past: DateTimeWithTimeZone = (Utc::now() - Duration::minutes(1)).into();
    orders::Entity::update_many()
        .col_expr(orders::Column::ExpiresAt, Expr::value(past))
        .filter(orders::Column::Id.eq(issued.order.id))
        .exec(&db)
        .await
        .unwrap();

    let now = Utc::now();
    assert!(repo.expire_overdue(now).await.unwrap() >= 1);
    let order = repo.find_by_id(issued.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Expired);

    // Both paths are no-ops the second time.
    assert!(!repo.expire_one(issued.order.id, now).await.unwrap());
    repo.expire_overdue(now).await.unwrap();
    let order_after = repo.find_by_id(issued.order.id).await.unwrap().unwrap();
    assert_eq!(order_after.status, OrderStatus::Expired);
    assert_eq!(order_after.updated_at, order.updated_at);
}

#[tokio::test]
async fn test_expiry_never_touches_settled_orders() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);
    let repo = OrderRepository::new(db.clone());
    let (_, credential) = create_merchant(&db, false).await;
    let payer = create_account(&db, dec!(10.00), UNLIMITED_SCORE).await;

    let issued = engine
        .create_merchant_order(
            &credential,
            NewMerchantOrder {
                order_name: "Paid".to_string(),
                merchant_order_no: format!("P{}", fresh_id()),
                amount: dec!(5.00),
                payment_type: "epay".to_string(),
                remark: String::new(),
            },
        )
        .await
        .unwrap();
    engine
        .pay_merchant_order(payer.id, &issued.token, PAY_KEY)
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(11);
    assert!(!repo.expire_one(issued.order.id, later).await.unwrap());
    let order = repo.find_by_id(issued.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Success);
}

async fn community_orders(db: &sea_orm::DatabaseConnection, account_id: i64) -> Vec<orders::Model> {
    orders::Entity::find()
        .filter(orders::Column::PayeeId.eq(account_id))
        .filter(orders::Column::OrderType.eq(OrderType::Community))
        .filter(orders::Column::OrderName.eq(COMMUNITY_ORDER_NAME))
        .order_by_asc(orders::Column::Id)
        .all(db)
        .await
        .unwrap()
}

fn score(account: &accounts::Model, value: i64) -> ExternalScore {
    ExternalScore {
        account_id: account.id,
        username: account.username.clone(),
        score: value,
    }
}

#[tokio::test]
async fn test_score_sync_protects_new_accounts() {
    let Some(db) = connect().await else { return };
    let repo = ScoreSyncRepository::new(db.clone());
    let account = create_account(&db, dec!(200.00), UNLIMITED_SCORE).await;
    let now = Utc::now();

    // First sync records the score without paying it out.
    let summary = repo.apply_batch(&[score(&account, 100)], 7, now).await.unwrap();
    assert_eq!(summary.initialized, 1);
    let after = reload(&db, account.id).await;
    assert_eq!(after.community_balance, dec!(100));
    assert_eq!(after.available_balance, dec!(200.00));

    // Day 5 of a 7-day protection: the score moves, the balance does not.
    let summary = repo
        .apply_batch(&[score(&account, 40)], 7, now + Duration::days(5))
        .await
        .unwrap();
    assert_eq!(summary.suppressed, 1);
    let after = reload(&db, account.id).await;
    assert_eq!(after.community_balance, dec!(40));
    assert_eq!(after.total_community, Decimal::ZERO);
    assert_eq!(after.available_balance, dec!(200.00));
    let recorded = community_orders(&db, account.id).await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].amount, Decimal::ZERO);
    assert!(!recorded[0].remark.is_empty());

    // Repeated syncs inside the window see no change and write nothing.
    for day in [5, 6] {
        let summary = repo
            .apply_batch(&[score(&account, 40)], 7, now + Duration::days(day))
            .await
            .unwrap();
        assert_eq!(summary.unchanged, 1);
    }
    assert_eq!(community_orders(&db, account.id).await.len(), 1);

    // After the window the absorbed drop is never debited.
    let summary = repo
        .apply_batch(&[score(&account, 40)], 7, now + Duration::days(10))
        .await
        .unwrap();
    assert_eq!(summary.unchanged, 1);
    let after = reload(&db, account.id).await;
    assert_eq!(after.available_balance, dec!(200.00));
    assert_eq!(after.community_balance, dec!(40));

    // A fresh drop after the window applies in full.
    let summary = repo
        .apply_batch(&[score(&account, 30)], 7, now + Duration::days(11))
        .await
        .unwrap();
    assert_eq!(summary.applied, 1);
    let after = reload(&db, account.id).await;
    assert_eq!(after.community_balance, dec!(30));
    assert_eq!(after.total_community, dec!(-10));
    assert_eq!(after.available_balance, dec!(190.00));
    assert_eq!(community_orders(&db, account.id).await.len(), 2);
}

#[tokio::test]
async fn test_score_sync_drop_can_overdraw_spendable_balance() {
    let Some(db) = connect().await else { return };
    let repo = ScoreSyncRepository::new(db.clone());
    let account = create_account(&db, dec!(5.00), UNLIMITED_SCORE).await;
    let now = Utc::now();

    repo.apply_batch(&[score(&account, 100)], 7, now).await.unwrap();
    let summary = repo
        .apply_batch(&[score(&account, 20)], 7, now + Duration::days(30))
        .await
        .unwrap();
    assert_eq!(summary.applied, 1);

    // The drop is owed in full even when the account already spent its funds.
    let after = reload(&db, account.id).await;
    assert_eq!(after.available_balance, dec!(-75.00));
    assert_eq!(after.community_balance, dec!(20));
    assert_eq!(community_orders(&db, account.id).await[0].amount, dec!(-80));
}

#[tokio::test]
async fn test_score_sync_rises_apply_immediately() {
    let Some(db) = connect().await else { return };
    let repo = ScoreSyncRepository::new(db.clone());
    let account = create_account(&db, dec!(10.00), UNLIMITED_SCORE).await;
    let now = Utc::now();

    repo.apply_batch(&[score(&account, 50)], 7, now).await.unwrap();
    let summary = repo
        .apply_batch(
            &[score(&account, 75), ExternalScore {
                account_id: fresh_id(),
                username: "stranger".to_string(),
                score: 1,
            }],
            7,
            now + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.unknown, 1);

    let after = reload(&db, account.id).await;
    assert_eq!(after.community_balance, dec!(75));
    assert_eq!(after.available_balance, dec!(35.00));

    let summary = repo
        .apply_batch(&[score(&account, 75)], 7, now + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(summary.unchanged, 1);
}
