//! Database seeder for credit ledger development and testing.
//!
//! Seeds the pay tiers, a demo merchant with a credential and a payment
//! link, and a demo payer. Running it twice leaves the data unchanged.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{Duration, Utc};
use credit_db::entities::{merchant_credentials, pay_configs, payment_links};
use credit_db::{AccountRepository, MerchantRepository, NewAccount};
use credit_shared::auth::Claims;
use credit_shared::config::AppConfig;
use credit_shared::jwt::JwtService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

const MERCHANT_ID: i64 = 1;
const MERCHANT_USERNAME: &str = "demo-shop";
const PAYER_ID: i64 = 2;
const PAYER_USERNAME: &str = "demo-payer";
const DEMO_PAY_KEY: &str = "123456";

const CLIENT_ID: &str = "demo-client";
const CLIENT_SECRET: &str = "demo-secret-change-me";
const LINK_TOKEN: &str = "demo-link";

/// Level, min score, max score, daily limit, fee rate, score rate.
type TierRow = (i16, i64, Option<i64>, Option<Decimal>, Decimal, Decimal);

const TIERS: [TierRow; 4] = [
    (0, 0, Some(1_000), Some(dec!(100)), dec!(0.05), dec!(0)),
    (1, 1_000, Some(10_000), Some(dec!(1000)), dec!(0.03), dec!(0.1)),
    (2, 10_000, Some(100_000), Some(dec!(10000)), dec!(0.02), dec!(0.2)),
    (3, 100_000, None, None, dec!(0.01), dec!(0.3)),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("Connecting to database...");
    let db = credit_db::connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    println!("Seeding pay tiers...");
    seed_tiers(&db).await?;

    println!("Seeding demo accounts...");
    seed_account(&db, MERCHANT_ID, MERCHANT_USERNAME, Decimal::ZERO).await?;
    seed_account(&db, PAYER_ID, PAYER_USERNAME, dec!(500.00)).await?;

    println!("Seeding merchant credential...");
    let credential = seed_credential(&db).await?;

    println!("Seeding payment link...");
    seed_link(&db, &credential).await?;

    let jwt = JwtService::new(&config.jwt.secret);
    let claims = Claims::new(PAYER_ID, PAYER_USERNAME, Utc::now() + Duration::days(7));
    let token = jwt.sign(&claims).context("Failed to sign demo token")?;

    println!("Seeding complete!");
    println!();
    println!("  merchant client_id:     {CLIENT_ID}");
    println!("  merchant client_secret: {CLIENT_SECRET}");
    println!("  payment link token:     {LINK_TOKEN}");
    println!("  payer pay key:          {DEMO_PAY_KEY}");
    println!("  payer bearer token:     {token}");
    Ok(())
}

async fn seed_tiers(db: &DatabaseConnection) -> anyhow::Result<()> {
    for (level, min_score, max_score, daily_limit, fee_rate, score_rate) in TIERS {
        let now = Utc::now().into();
        let inserted = pay_configs::Entity::insert(pay_configs::ActiveModel {
            level: Set(level),
            min_score: Set(min_score),
            max_score: Set(max_score),
            daily_limit: Set(daily_limit),
            fee_rate: Set(fee_rate),
            score_rate: Set(score_rate),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(pay_configs::Column::Level)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

        if inserted == 0 {
            println!("  Tier {level} already exists, skipping");
        } else {
            println!("  Created tier {level}");
        }
    }
    Ok(())
}

async fn seed_account(
    db: &DatabaseConnection,
    id: i64,
    username: &str,
    initial_balance: Decimal,
) -> anyhow::Result<()> {
    let repo = AccountRepository::new(db.clone());
    if repo.find_by_id(id).await?.is_some() {
        println!("  Account {username} already exists, skipping");
        return Ok(());
    }

    repo.provision(NewAccount {
        id,
        username: username.to_string(),
        initial_balance,
        pay_key: Some(DEMO_PAY_KEY.to_string()),
    })
    .await
    .with_context(|| format!("Failed to provision {username}"))?;
    println!("  Created account {username} (id {id})");
    Ok(())
}

async fn seed_credential(db: &DatabaseConnection) -> anyhow::Result<merchant_credentials::Model> {
    if let Some(existing) = MerchantRepository::find_credential_by_client_id(db, CLIENT_ID).await? {
        println!("  Credential {CLIENT_ID} already exists, skipping");
        return Ok(existing);
    }

    let now = Utc::now().into();
    let credential = merchant_credentials::ActiveModel {
        account_id: Set(MERCHANT_ID),
        client_id: Set(CLIENT_ID.to_string()),
        client_secret: Set(CLIENT_SECRET.to_string()),
        app_name: Set("Demo Shop".to_string()),
        notify_url: Set("http://localhost:3000/notify".to_string()),
        redirect_uri: Set("http://localhost:3000/return".to_string()),
        is_test_mode: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    println!("  Created credential {CLIENT_ID}");
    Ok(credential)
}

async fn seed_link(
    db: &DatabaseConnection,
    credential: &merchant_credentials::Model,
) -> anyhow::Result<()> {
    let existing = payment_links::Entity::find()
        .filter(payment_links::Column::Token.eq(LINK_TOKEN))
        .one(db)
        .await?;
    if existing.is_some() {
        println!("  Link {LINK_TOKEN} already exists, skipping");
        return Ok(());
    }

    let now = Utc::now().into();
    payment_links::ActiveModel {
        merchant_credential_id: Set(credential.id),
        token: Set(LINK_TOKEN.to_string()),
        amount: Set(dec!(9.90)),
        product_name: Set("Sticker pack".to_string()),
        remark: Set(String::new()),
        total_limit: Set(Some(100)),
        user_limit: Set(Some(2)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    println!("  Created link {LINK_TOKEN}");
    Ok(())
}
