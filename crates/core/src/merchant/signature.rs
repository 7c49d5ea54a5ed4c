//! Epay-style MD5 request signatures.
//!
//! Parameters are sorted by name, `sign`, `sign_type` and empty values are
//! skipped, the rest are joined as `k=v` with `&`, the merchant secret is
//! appended, and the MD5 digest is hex-encoded in lowercase.

use std::collections::BTreeMap;

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

/// Name of the signature parameter.
pub const SIGN_FIELD: &str = "sign";
/// Name of the signature-type parameter.
pub const SIGN_TYPE_FIELD: &str = "sign_type";
/// The only supported signature type.
pub const SIGN_TYPE_MD5: &str = "MD5";

/// Builds the canonical string that is hashed (without the secret).
pub fn canonical_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = params
        .into_iter()
        .filter(|(key, value)| *key != SIGN_FIELD && *key != SIGN_TYPE_FIELD && !value.is_empty())
        .collect();

    sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Computes the signature of `params` under `secret`.
pub fn sign<'a, I>(params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = Md5::new();
    hasher.update(canonical_query(params).as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies `signature` against `params`, case-insensitively and in constant time.
pub fn verify<'a, I>(params: I, secret: &str, signature: &str) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let expected = sign(params, secret);
    let provided = signature.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
