//! Ledger schema: accounts, pay tiers, merchants, payment links, orders.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: ACCOUNTS & PAY TIERS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(PAY_CONFIGS_SQL).await?;

        // ============================================================
        // PART 3: MERCHANTS
        // ============================================================
        db.execute_unprepared(MERCHANT_CREDENTIALS_SQL).await?;
        db.execute_unprepared(PAYMENT_LINKS_SQL).await?;

        // ============================================================
        // PART 4: ORDERS
        // ============================================================
        db.execute_unprepared(ORDERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE order_status AS ENUM (
    'pending',
    'success',
    'expired',
    'failed',
    'disputing',
    'refund',
    'refused'
);

CREATE TYPE order_type AS ENUM ('payment', 'online', 'transfer', 'community');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id BIGINT PRIMARY KEY,
    username VARCHAR(255) NOT NULL UNIQUE,
    pay_score BIGINT NOT NULL DEFAULT 0,
    pay_key_hash VARCHAR(255),
    sign_key VARCHAR(128) NOT NULL,
    total_receive NUMERIC(20,2) NOT NULL DEFAULT 0,
    total_payment NUMERIC(20,2) NOT NULL DEFAULT 0,
    total_transfer NUMERIC(20,2) NOT NULL DEFAULT 0,
    total_community NUMERIC(20,2) NOT NULL DEFAULT 0,
    community_balance NUMERIC(20,2) NOT NULL DEFAULT 0,
    available_balance NUMERIC(20,2) NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_accounts_active ON accounts(id) WHERE is_active = true;
";

const PAY_CONFIGS_SQL: &str = r"
CREATE TABLE pay_configs (
    id BIGSERIAL PRIMARY KEY,
    level SMALLINT NOT NULL UNIQUE,
    min_score BIGINT NOT NULL,
    max_score BIGINT,
    daily_limit NUMERIC(20,2),
    fee_rate NUMERIC(5,4) NOT NULL DEFAULT 0 CHECK (fee_rate >= 0 AND fee_rate <= 1),
    score_rate NUMERIC(5,4) NOT NULL DEFAULT 0 CHECK (score_rate >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_pay_configs_band CHECK (max_score IS NULL OR max_score > min_score)
);
";

const MERCHANT_CREDENTIALS_SQL: &str = r"
CREATE TABLE merchant_credentials (
    id BIGSERIAL PRIMARY KEY,
    account_id BIGINT NOT NULL REFERENCES accounts(id),
    client_id VARCHAR(64) NOT NULL UNIQUE,
    client_secret VARCHAR(128) NOT NULL,
    app_name VARCHAR(255) NOT NULL,
    notify_url VARCHAR(1024) NOT NULL DEFAULT '',
    redirect_uri VARCHAR(1024) NOT NULL DEFAULT '',
    is_test_mode BOOLEAN NOT NULL DEFAULT false,
    deleted_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_merchant_credentials_account ON merchant_credentials(account_id)
    WHERE deleted_at IS NULL;
";

const PAYMENT_LINKS_SQL: &str = r"
CREATE TABLE payment_links (
    id BIGSERIAL PRIMARY KEY,
    merchant_credential_id BIGINT NOT NULL REFERENCES merchant_credentials(id),
    token VARCHAR(64) NOT NULL UNIQUE,
    amount NUMERIC(20,2) NOT NULL CHECK (amount > 0),
    product_name VARCHAR(255) NOT NULL,
    remark VARCHAR(255) NOT NULL DEFAULT '',
    total_limit INTEGER CHECK (total_limit IS NULL OR total_limit >= 0),
    user_limit INTEGER CHECK (user_limit IS NULL OR user_limit >= 0),
    deleted_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const ORDERS_SQL: &str = r"
CREATE TABLE orders (
    id BIGSERIAL PRIMARY KEY,
    order_name VARCHAR(255) NOT NULL,
    merchant_order_no VARCHAR(128),
    client_id VARCHAR(64),
    payer_id BIGINT NOT NULL DEFAULT 0,
    payee_id BIGINT NOT NULL DEFAULT 0,
    amount NUMERIC(20,2) NOT NULL,
    fee NUMERIC(20,2) NOT NULL DEFAULT 0,
    payee_score_delta BIGINT NOT NULL DEFAULT 0,
    status order_status NOT NULL DEFAULT 'pending',
    type order_type NOT NULL,
    remark VARCHAR(512) NOT NULL DEFAULT '',
    payment_type VARCHAR(32) NOT NULL DEFAULT '',
    payment_link_id BIGINT REFERENCES payment_links(id),
    is_test BOOLEAN NOT NULL DEFAULT false,
    trade_time TIMESTAMPTZ,
    expires_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Daily limit: payer's successful spending in a time range
CREATE INDEX idx_orders_payer_trade_time ON orders(payer_id, trade_time)
    WHERE status = 'success';

-- Payment link limits
CREATE INDEX idx_orders_payment_link ON orders(payment_link_id, payer_id)
    WHERE payment_link_id IS NOT NULL;

-- Expiry sweep
CREATE INDEX idx_orders_pending_expiry ON orders(expires_at)
    WHERE status = 'pending';

-- Merchant query/refund
CREATE INDEX idx_orders_client ON orders(client_id, id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS orders CASCADE;
DROP TABLE IF EXISTS payment_links CASCADE;
DROP TABLE IF EXISTS merchant_credentials CASCADE;
DROP TABLE IF EXISTS pay_configs CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TYPE IF EXISTS order_type;
DROP TYPE IF EXISTS order_status;
";
