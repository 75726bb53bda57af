/*
 * Responsibility
 * - Single authoritative holder of secret material and default options
 * - sign / verify / decode in sync and async forms
 * - Classify every primitive failure into the AuthError contract
 */
mod options;
mod secret;

pub use options::{SignOptions, VerifyOptions};
pub use secret::Secret;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{AuthError, ORIGIN_DECODE, ORIGIN_SIGN, ORIGIN_VERIFY};
use crate::payload::Payload;

/// Unverified token structure, the complete form of decoding.
///
/// The signature is the raw base64url segment as transmitted; nothing
/// here has been checked against a key.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: Header,
    pub payload: Payload,
    pub signature: String,
}

/// Issues, verifies and decodes signed tokens.
///
/// One instance owns one secret and one pair of default option sets.
/// Configuration (`set_secret`, `set_default_*_options`) is expected to
/// happen once at startup, before the provider is shared with request
/// handling; the setters take `&mut self` so the type system enforces
/// exactly that once the provider sits behind an `Arc`.
#[derive(Debug, Default)]
pub struct TokenProvider {
    secret: Option<Secret>,
    default_sign: SignOptions,
    default_verify: VerifyOptions,
}

impl TokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the secret used by all subsequent operations. Key
    /// strength is not validated here; the primitive library rejects
    /// keys it cannot use at call time.
    pub fn set_secret(&mut self, secret: Secret) {
        self.secret = Some(secret);
    }

    pub fn set_default_sign_options(&mut self, options: SignOptions) {
        self.default_sign = options;
    }

    pub fn set_default_verify_options(&mut self, options: VerifyOptions) {
        self.default_verify = options;
    }

    fn secret(&self, origin: &'static str) -> Result<&Secret, AuthError> {
        self.secret.as_ref().ok_or_else(|| AuthError::missing_secret(origin))
    }

    fn prepare_sign(
        &self,
        payload: &Payload,
        options: Option<&SignOptions>,
    ) -> Result<(Header, Payload, EncodingKey), AuthError> {
        let opts = match options {
            Some(call_site) => call_site.merged_over(&self.default_sign),
            None => self.default_sign.clone(),
        };

        let secret = self.secret(ORIGIN_SIGN)?;
        let algorithm = opts.algorithm.unwrap_or(Algorithm::HS256);
        let key = secret.encoding_key(algorithm, ORIGIN_SIGN)?;

        let mut header = Header::new(algorithm);
        header.kid = opts.key_id.clone();

        Ok((header, finalize_claims(payload, &opts), key))
    }

    /// Sign a payload into a compact token.
    ///
    /// Fails with 500/"sign" when the secret is unset or the primitive
    /// signing step reports any error (its message is preserved).
    pub fn sign(
        &self,
        payload: &Payload,
        options: Option<&SignOptions>,
    ) -> Result<String, AuthError> {
        let (header, body, key) = self.prepare_sign(payload, options)?;
        encode_token(&header, &body, &key)
    }

    /// Same contract as [`sign`](Self::sign); the signing call itself
    /// runs on the blocking pool so the request loop is not held up.
    pub async fn sign_async(
        &self,
        payload: &Payload,
        options: Option<&SignOptions>,
    ) -> Result<String, AuthError> {
        let (header, body, key) = self.prepare_sign(payload, options)?;
        tokio::task::spawn_blocking(move || encode_token(&header, &body, &key))
            .await
            .map_err(|e| AuthError::internal(format!("signing task failed: {e}"), ORIGIN_SIGN))?
    }

    fn prepare_verify(
        &self,
        options: Option<&VerifyOptions>,
    ) -> Result<(DecodingKey, Validation, VerifyOptions), AuthError> {
        let opts = match options {
            Some(call_site) => call_site.merged_over(&self.default_verify),
            None => self.default_verify.clone(),
        };

        let secret = self.secret(ORIGIN_VERIFY)?;
        let algorithms = opts
            .algorithms
            .clone()
            .unwrap_or_else(|| vec![Algorithm::HS256]);
        let first = algorithms
            .first()
            .copied()
            .ok_or_else(|| AuthError::internal("allowed algorithm list is empty", ORIGIN_VERIFY))?;
        let key = secret.decoding_key(first, ORIGIN_VERIFY)?;

        let mut validation = Validation::new(first);
        validation.algorithms = algorithms;
        // exp/nbf stay optional claims; when present they are enforced.
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;
        validation.leeway = opts.leeway.unwrap_or(0);
        validation.validate_aud = false;
        if let Some(aud) = &opts.audience {
            validation.set_audience(&[aud]);
            validation.validate_aud = true;
        }
        if let Some(iss) = &opts.issuer {
            validation.set_issuer(&[iss]);
        }
        if let Some(sub) = &opts.subject {
            validation.sub = Some(sub.clone());
        }

        Ok((key, validation, opts))
    }

    /// Verify a token's signature and claims and return its payload.
    ///
    /// Expired and not-yet-valid tokens classify as 401 with the
    /// relevant timestamp in the message; every other failure (bad
    /// signature, malformed token, algorithm or issuer/audience/subject
    /// mismatch) classifies as 500 with the underlying message.
    pub fn verify(
        &self,
        token: &str,
        options: Option<&VerifyOptions>,
    ) -> Result<Payload, AuthError> {
        let (key, validation, opts) = self.prepare_verify(options)?;
        let payload = decode_verified(token, &key, &validation)?;
        check_max_age(&payload, &opts)?;
        Ok(payload)
    }

    /// Same semantics as [`verify`](Self::verify); the signature check
    /// runs on the blocking pool.
    pub async fn verify_async(
        &self,
        token: &str,
        options: Option<&VerifyOptions>,
    ) -> Result<Payload, AuthError> {
        let (key, validation, opts) = self.prepare_verify(options)?;
        let token = token.to_owned();
        let payload =
            tokio::task::spawn_blocking(move || decode_verified(&token, &key, &validation))
                .await
                .map_err(|e| {
                    AuthError::internal(format!("verification task failed: {e}"), ORIGIN_VERIFY)
                })??;
        check_max_age(&payload, &opts)?;
        Ok(payload)
    }

    /// Parse a token without verifying signature, expiry or any other
    /// claim. No secret is required.
    ///
    /// Policy for broken input: a string without exactly three segments
    /// decodes to `Ok(None)`; a three-segment token whose header or
    /// payload cannot be decoded fails with 500/"decode".
    pub fn decode(&self, token: &str) -> Result<Option<Payload>, AuthError> {
        Ok(self.decode_complete(token)?.map(|t| t.payload))
    }

    /// Like [`decode`](Self::decode), but returns header and signature
    /// segment alongside the payload.
    pub fn decode_complete(&self, token: &str) -> Result<Option<DecodedToken>, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Ok(None);
        };

        let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|e| {
            AuthError::internal(format!("invalid header segment: {e}"), ORIGIN_DECODE)
        })?;
        let header: Header = serde_json::from_slice(&header_bytes).map_err(|e| {
            AuthError::internal(format!("invalid header segment: {e}"), ORIGIN_DECODE)
        })?;

        let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            AuthError::internal(format!("invalid payload segment: {e}"), ORIGIN_DECODE)
        })?;
        // A body that is not JSON at all is still a legal string payload.
        let payload = match serde_json::from_slice::<Payload>(&payload_bytes) {
            Ok(payload) => payload,
            Err(_) => Payload::Text(String::from_utf8(payload_bytes).map_err(|e| {
                AuthError::internal(
                    format!("payload segment is neither JSON nor UTF-8: {e}"),
                    ORIGIN_DECODE,
                )
            })?),
        };

        Ok(Some(DecodedToken {
            header,
            payload,
            signature: signature.to_string(),
        }))
    }
}

fn encode_token(header: &Header, body: &Payload, key: &EncodingKey) -> Result<String, AuthError> {
    jsonwebtoken::encode(header, body, key).map_err(|e| {
        error!(error = %e, "failed to sign token");
        AuthError::internal(e.to_string(), ORIGIN_SIGN)
    })
}

/// Copy the payload and fill in the claims the options ask for. An
/// explicit claim already present in the payload always wins over the
/// option of the same name. String bodies carry no claims and pass
/// through untouched.
fn finalize_claims(payload: &Payload, opts: &SignOptions) -> Payload {
    let mut map = match payload {
        Payload::Claims(map) => map.clone(),
        Payload::Text(s) => return Payload::Text(s.clone()),
    };

    let now = Utc::now().timestamp();
    if !map.contains_key("iat") {
        map.insert("iat".to_string(), Value::from(now));
    }
    if let Some(ttl) = opts.expires_in {
        if !map.contains_key("exp") {
            map.insert("exp".to_string(), Value::from(now + ttl));
        }
    }
    if let Some(offset) = opts.not_before {
        if !map.contains_key("nbf") {
            map.insert("nbf".to_string(), Value::from(now + offset));
        }
    }
    for (claim, value) in [
        ("iss", &opts.issuer),
        ("sub", &opts.subject),
        ("aud", &opts.audience),
        ("jti", &opts.jwt_id),
    ] {
        if let Some(value) = value {
            if !map.contains_key(claim) {
                map.insert(claim.to_string(), Value::from(value.clone()));
            }
        }
    }

    Payload::Claims(map)
}

fn decode_verified(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<Payload, AuthError> {
    match jsonwebtoken::decode::<Payload>(token, key, validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => Err(classify_verify_error(token, &e)),
    }
}

fn classify_verify_error(token: &str, err: &jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => {
            let at = unverified_claim_timestamp(token, "exp");
            warn!(expired_at = ?at, "token expired");
            AuthError::unauthorized(temporal_message("token expired", at), ORIGIN_VERIFY)
        }
        ErrorKind::ImmatureSignature => {
            let at = unverified_claim_timestamp(token, "nbf");
            warn!(not_before = ?at, "token not yet valid");
            AuthError::unauthorized(temporal_message("token not yet valid", at), ORIGIN_VERIFY)
        }
        _ => {
            warn!(error = %err, "token verification failed");
            AuthError::internal(err.to_string(), ORIGIN_VERIFY)
        }
    }
}

/// The primitive error does not carry the offending timestamp, so pull
/// it from the (already rejected, unverified) payload for the message.
fn unverified_claim_timestamp(token: &str, claim: &str) -> Option<i64> {
    let payload_b64 = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let payload: Payload = serde_json::from_slice(&bytes).ok()?;
    payload.claim(claim).and_then(Value::as_i64)
}

fn temporal_message(what: &str, at: Option<i64>) -> String {
    match at.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)) {
        Some(ts) => format!("{what} at {} ({})", ts.timestamp(), ts.to_rfc3339()),
        None => what.to_string(),
    }
}

/// Post-verification age check against `iat`, classified like other
/// temporal failures. The primitive has no built-in max-age notion.
fn check_max_age(payload: &Payload, opts: &VerifyOptions) -> Result<(), AuthError> {
    let Some(max_age) = opts.max_age else {
        return Ok(());
    };
    let Some(iat) = payload.issued_at() else {
        return Err(AuthError::internal(
            "max_age verification requires an iat claim",
            ORIGIN_VERIFY,
        ));
    };

    let leeway = opts.leeway.unwrap_or(0) as i64;
    let valid_until = iat + max_age;
    if Utc::now().timestamp() >= valid_until + leeway {
        warn!(valid_until, "token older than allowed max age");
        return Err(AuthError::unauthorized(
            temporal_message("token age exceeded max allowed", Some(valid_until)),
            ORIGIN_VERIFY,
        ));
    }
    Ok(())
}
