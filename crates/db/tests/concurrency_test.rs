//! Concurrent settlement stress tests.
//!
//! These tests verify that:
//! - Racing debits never overdraw an account
//! - The daily limit holds when payments race within one day
//! - A merchant order settles at most once however many payers race for it
//! - A payment link never sells past its total limit
//! - Value is conserved across a burst of random transfers

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

mod common;

use std::sync::Arc;

use credit_core::ledger::LedgerError;
use credit_db::OrderRepository;
use credit_db::settlement::{NewMerchantOrder, PayLinkRequest, TransferRequest};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use common::*;

fn is_expected_rejection(err: &LedgerError) -> bool {
    matches!(
        err,
        LedgerError::InsufficientBalance
            | LedgerError::DailyLimitExceeded { .. }
            | LedgerError::ConcurrentSettlement
            | LedgerError::OrderNotFound
    )
}

#[tokio::test]
async fn test_concurrent_transfers_cannot_overdraw() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);
    let payer = create_account(&db, dec!(100.00), UNLIMITED_SCORE).await;
    let first = create_account(&db, Decimal::ZERO, UNLIMITED_SCORE).await;
    let second = create_account(&db, Decimal::ZERO, UNLIMITED_SCORE).await;

    let payer_id = payer.id;
    let barrier = Arc::new(Barrier::new(2));
    let tasks = [&first, &second].map(|recipient| {
        let engine = engine.clone();
        let barrier = barrier.clone();
        let request = TransferRequest {
            recipient_id: recipient.id,
            recipient_username: recipient.username.clone(),
            amount: dec!(60.00),
            pay_key: PAY_KEY.to_string(),
            remark: String::new(),
        };
        tokio::spawn(async move {
            barrier.wait().await;
            engine.transfer(payer_id, request).await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one 60.00 transfer fits in 100.00");
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err.as_ledger(), Some(LedgerError::InsufficientBalance)));
        }
    }

    let payer_after = reload(&db, payer.id).await;
    assert_eq!(payer_after.available_balance, dec!(40.00));
    let received = reload(&db, first.id).await.available_balance
        + reload(&db, second.id).await.available_balance;
    assert_eq!(received, dec!(60.00));
}

#[tokio::test]
async fn test_concurrent_payments_respect_daily_limit() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);
    let (_, credential) = create_merchant(&db, false).await;
    let payer = create_account(&db, dec!(1000.00), LIMITED_SCORE).await;
    let link = create_link(&db, &credential, dec!(30.00), None, None).await;

    // 10 x 30.00 against a 100.00 limit: at most 3 may pass.
    let payer_id = payer.id;
    let barrier = Arc::new(Barrier::new(10));
    let tasks = (0..10).map(|_| {
        let engine = engine.clone();
        let barrier = barrier.clone();
        let request = PayLinkRequest {
            token: link.token.clone(),
            pay_key: PAY_KEY.to_string(),
            remark: String::new(),
        };
        tokio::spawn(async move {
            barrier.wait().await;
            engine.pay_link(payer_id, request).await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 3);
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err.as_ledger(), Some(LedgerError::DailyLimitExceeded { .. })),
                "unexpected error: {:?}",
                err
            );
        }
    }
    assert_eq!(reload(&db, payer.id).await.available_balance, dec!(910.00));
}

#[tokio::test]
async fn test_merchant_order_settles_at_most_once() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);
    let (merchant, credential) = create_merchant(&db, false).await;
    let issued = engine
        .create_merchant_order(
            &credential,
            NewMerchantOrder {
                order_name: "Race".to_string(),
                merchant_order_no: format!("R{}", fresh_id()),
                amount: dec!(10.00),
                payment_type: "epay".to_string(),
                remark: String::new(),
            },
        )
        .await
        .unwrap();

    let mut payers = Vec::new();
    for _ in 0..5 {
        payers.push(create_account(&db, dec!(50.00), UNLIMITED_SCORE).await);
    }

    let barrier = Arc::new(Barrier::new(payers.len()));
    let tasks = payers.iter().map(|payer| {
        let engine = engine.clone();
        let barrier = barrier.clone();
        let token = issued.token.clone();
        let payer_id = payer.id;
        tokio::spawn(async move {
            barrier.wait().await;
            engine.pay_merchant_order(payer_id, &token, PAY_KEY).await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in &results {
        if let Err(err) = result {
            let ledger = err.as_ledger().expect("business rejection");
            assert!(is_expected_rejection(ledger), "unexpected error: {:?}", ledger);
        }
    }

    let mut total = Decimal::ZERO;
    for payer in &payers {
        total += reload(&db, payer.id).await.available_balance;
    }
    assert_eq!(total, dec!(240.00));
    assert_eq!(reload(&db, merchant.id).await.available_balance, dec!(9.00));
}

#[tokio::test]
async fn test_payment_link_total_limit_holds_under_race() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);
    let (merchant, credential) = create_merchant(&db, false).await;
    let link = create_link(&db, &credential, dec!(5.00), Some(3), None).await;

    let mut payers = Vec::new();
    for _ in 0..8 {
        payers.push(create_account(&db, dec!(10.00), UNLIMITED_SCORE).await);
    }

    let barrier = Arc::new(Barrier::new(payers.len()));
    let tasks = payers.iter().map(|payer| {
        let engine = engine.clone();
        let barrier = barrier.clone();
        let payer_id = payer.id;
        let request = PayLinkRequest {
            token: link.token.clone(),
            pay_key: PAY_KEY.to_string(),
            remark: String::new(),
        };
        tokio::spawn(async move {
            barrier.wait().await;
            engine.pay_link(payer_id, request).await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 3, "the link sells exactly its total limit");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err.as_ledger(),
                    Some(LedgerError::PaymentLinkTotalLimitExceeded { .. })
                ),
                "unexpected error: {:?}",
                err
            );
        }
    }

    let sold = OrderRepository::count_link_successes(&db, link.id, None)
        .await
        .unwrap();
    assert_eq!(sold, 3);

    let mut spent = Decimal::ZERO;
    for payer in &payers {
        spent += dec!(10.00) - reload(&db, payer.id).await.available_balance;
    }
    assert_eq!(spent, dec!(15.00));
    let merchant_after = reload(&db, merchant.id).await;
    assert!(merchant_after.available_balance > Decimal::ZERO);
    assert!(merchant_after.available_balance <= dec!(15.00));
}

#[tokio::test]
async fn test_random_transfers_conserve_value() {
    let Some(db) = connect().await else { return };
    let engine = engine(&db);

    let mut accounts = Vec::new();
    for _ in 0..4 {
        accounts.push(create_account(&db, dec!(50.00), UNLIMITED_SCORE).await);
    }
    let start: Decimal = accounts.iter().map(|a| a.available_balance).sum();

    let tasks = (0..40).map(|i| {
        let engine = engine.clone();
        let from = accounts[i % accounts.len()].id;
        let to = &accounts[(i * 7 + 1) % accounts.len()];
        let request = TransferRequest {
            recipient_id: to.id,
            recipient_username: to.username.clone(),
            amount: Decimal::new(rand::random_range(1..4_000), 2),
            pay_key: PAY_KEY.to_string(),
            remark: String::new(),
        };
        tokio::spawn(async move { engine.transfer(from, request).await })
    });

    for result in join_all(tasks).await {
        if let Err(err) = result.expect("task panicked") {
            let ledger = err.into_ledger();
            assert!(
                matches!(
                    ledger,
                    LedgerError::InsufficientBalance | LedgerError::CannotTransferToSelf
                ),
                "unexpected error: {:?}",
                ledger
            );
        }
    }

    let mut end = Decimal::ZERO;
    for account in &accounts {
        let balance = reload(&db, account.id).await.available_balance;
        assert!(balance >= Decimal::ZERO, "balance went negative: {}", balance);
        end += balance;
    }
    assert_eq!(start, end);
}
