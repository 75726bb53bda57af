use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// Options applied when signing. Every field is optional; unset fields
/// fall back to the provider defaults, and fields unset in both places
/// leave the corresponding claim or header entry out entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignOptions {
    pub algorithm: Option<Algorithm>,
    /// Token lifetime in seconds; `exp` is written as now + expires_in.
    pub expires_in: Option<i64>,
    /// Offset in seconds; `nbf` is written as now + not_before.
    pub not_before: Option<i64>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub jwt_id: Option<String>,
    /// Written into the JWT header as `kid`.
    pub key_id: Option<String>,
}

impl SignOptions {
    /// Shallow, field-by-field merge. Fields set on `self` (the call
    /// site) win; absent fields inherit from `defaults`.
    pub fn merged_over(&self, defaults: &SignOptions) -> SignOptions {
        SignOptions {
            algorithm: self.algorithm.or(defaults.algorithm),
            expires_in: self.expires_in.or(defaults.expires_in),
            not_before: self.not_before.or(defaults.not_before),
            issuer: self.issuer.clone().or_else(|| defaults.issuer.clone()),
            subject: self.subject.clone().or_else(|| defaults.subject.clone()),
            audience: self.audience.clone().or_else(|| defaults.audience.clone()),
            jwt_id: self.jwt_id.clone().or_else(|| defaults.jwt_id.clone()),
            key_id: self.key_id.clone().or_else(|| defaults.key_id.clone()),
        }
    }
}

/// Options applied when verifying. Same merge semantics as
/// [`SignOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyOptions {
    /// Allowed algorithms; the token's `alg` must be one of them.
    pub algorithms: Option<Vec<Algorithm>>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    /// Clock tolerance in seconds for `exp`/`nbf` checks.
    pub leeway: Option<u64>,
    /// Maximum accepted token age in seconds, measured from `iat`.
    pub max_age: Option<i64>,
}

impl VerifyOptions {
    pub fn merged_over(&self, defaults: &VerifyOptions) -> VerifyOptions {
        VerifyOptions {
            algorithms: self
                .algorithms
                .clone()
                .or_else(|| defaults.algorithms.clone()),
            issuer: self.issuer.clone().or_else(|| defaults.issuer.clone()),
            subject: self.subject.clone().or_else(|| defaults.subject.clone()),
            audience: self.audience.clone().or_else(|| defaults.audience.clone()),
            leeway: self.leeway.or(defaults.leeway),
            max_age: self.max_age.or(defaults.max_age),
        }
    }
}
