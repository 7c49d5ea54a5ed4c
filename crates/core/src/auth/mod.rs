//! Payment secret hashing.

mod pay_key;

pub use pay_key::{PayKeyError, hash_pay_key, verify_pay_key};
