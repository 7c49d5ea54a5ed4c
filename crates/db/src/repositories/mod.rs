//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Functions generic over `ConnectionTrait` also run inside a caller's transaction.

pub mod account;
pub mod balance;
pub mod job;
pub mod merchant;
pub mod order;
pub mod pay_config;
pub mod score_sync;

pub use account::{AccountRepository, NewAccount};
pub use job::{JobError, JobRepository, RetryOutcome, decode_payload};
pub use merchant::{LinkDetail, MerchantRepository, NewPaymentLink};
pub use order::{HistoryFilter, HistoryView, OrderRepository};
pub use pay_config::PayConfigRepository;
pub use score_sync::{BatchSummary, ScoreSyncRepository};
