use chrono::{Duration, Utc};
use chrono_tz::Asia::Shanghai;
use jsonwebtoken::{
    decode as jwt_decode, encode as jwt_encode, Algorithm, DecodingKey, EncodingKey, Header,
    TokenData, Validation,
};
use serde::{Deserialize, Serialize};

pub const ISSUER: &str = "oauthhub";

/// The claim set carried by every JWT this service issues (session tokens,
/// OAuth access/refresh tokens, and ID tokens alike). Only `iat/exp/sub/aud`
/// are required; `iss/scope/jti` are passed through when the caller
/// supplies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iat: i64,
    pub exp: i64,
    pub sub: String,
    pub aud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Optional claims a caller may attach on top of the required set.
#[derive(Debug, Clone, Default)]
pub struct Extras {
    pub iss: Option<String>,
    pub scope: Option<String>,
    pub jti: Option<String>,
}

/// How a decode attempt failed. Kept distinct from `expired` because the
/// two map to different response codes (`TOKEN_EXPIRE` vs `TOKEN_ERROR`).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or the signature/audience does not match")]
    Invalid,
}

/// Signs a JWT. `secret` is the HMAC key: the process-wide shared secret
/// for end-user/admin session tokens, or a client's own `client_secret` for
/// OAuth tokens. This function is parametric over which applies and never
/// chooses for the caller.
///
/// `exp` is computed by advancing the current instant by `expires_in`
/// seconds in the `Asia/Shanghai` wall clock, per the source system's
/// original timestamp convention.
fn build_claims(expires_in_seconds: i64, subject: &str, audience: &str, extras: Extras) -> Claims {
    let now = Utc::now();
    let now_shanghai = now.with_timezone(&Shanghai);
    let exp_shanghai = now_shanghai + Duration::seconds(expires_in_seconds);

    Claims {
        iat: now.timestamp(),
        exp: exp_shanghai.timestamp(),
        sub: subject.to_string(),
        aud: audience.to_string(),
        iss: extras.iss,
        scope: extras.scope,
        jti: extras.jti,
    }
}

pub fn generate(secret: &str, expires_in_seconds: i64, subject: &str, audience: &str, extras: Extras) -> String {
    let claims = build_claims(expires_in_seconds, subject, audience, extras);

    jwt_encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 encoding with a valid key never fails")
}

/// Signs an OIDC ID token: the standard claim set plus `user_claims`
/// (`{id, username, email?}`) flattened alongside it, per scope.
pub fn generate_id_token(
    secret: &str,
    expires_in_seconds: i64,
    subject: &str,
    audience: &str,
    extras: Extras,
    user_claims: serde_json::Value,
) -> String {
    let claims = build_claims(expires_in_seconds, subject, audience, extras);
    let mut merged = serde_json::to_value(&claims).expect("claims always serialize");

    if let (serde_json::Value::Object(base), serde_json::Value::Object(extra)) =
        (&mut merged, user_claims)
    {
        base.extend(extra);
    }

    jwt_encode(
        &Header::new(Algorithm::HS256),
        &merged,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 encoding with a valid key never fails")
}

/// Verifies signature and `aud`, and distinguishes an expired token from
/// any other decode failure.
pub fn decode(token: &str, secret: &str, audience: &str) -> Result<Claims, DecodeError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.validate_exp = false; // checked manually so expiry reports distinctly

    let TokenData { claims, .. } = jwt_decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| DecodeError::Invalid)?;

    if claims.aud != audience {
        return Err(DecodeError::Invalid);
    }

    if Utc::now().timestamp() >= claims.exp {
        return Err(DecodeError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_required_claims() {
        let secret = "shared-secret";
        let token = generate(secret, 3600, "alice", "client-1", Extras::default());

        let claims = decode(&token, secret, "client-1").unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.aud, "client-1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn decode_rejects_wrong_audience() {
        let secret = "shared-secret";
        let token = generate(secret, 3600, "alice", "client-1", Extras::default());

        let result = decode(&token, secret, "client-2");
        assert!(matches!(result, Err(DecodeError::Invalid)));
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let token = generate("secret-a", 3600, "alice", "client-1", Extras::default());

        let result = decode(&token, "secret-b", "client-1");
        assert!(matches!(result, Err(DecodeError::Invalid)));
    }

    #[test]
    fn decode_reports_expired_distinctly() {
        let secret = "shared-secret";
        let token = generate(secret, -1, "alice", "client-1", Extras::default());

        let result = decode(&token, secret, "client-1");
        assert!(matches!(result, Err(DecodeError::Expired)));
    }

    #[test]
    fn extras_round_trip() {
        let secret = "shared-secret";
        let extras = Extras {
            iss: Some(ISSUER.to_string()),
            scope: Some("openid email".to_string()),
            jti: Some("abc123".to_string()),
        };
        let token = generate(secret, 3600, "alice", "client-1", extras);

        let claims = decode(&token, secret, "client-1").unwrap();
        assert_eq!(claims.iss.as_deref(), Some(ISSUER));
        assert_eq!(claims.scope.as_deref(), Some("openid email"));
        assert_eq!(claims.jti.as_deref(), Some("abc123"));
    }

    #[test]
    fn shanghai_wall_clock_arithmetic_matches_utc_duration() {
        // exp - iat must equal the requested lifetime regardless of which
        // wall clock the intermediate arithmetic runs through, since exp
        // and iat are both absolute epoch seconds.
        let secret = "shared-secret";
        let token = generate(secret, 604_800, "alice", "client-1", Extras::default());
        let claims = decode(&token, secret, "client-1").unwrap();
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn id_token_carries_flattened_user_claims() {
        let secret = "shared-secret";
        let user_claims = serde_json::json!({ "id": "u-1", "username": "alice", "email": "alice@example.com" });
        let token = generate_id_token(secret, 3600, "alice", "client-1", Extras::default(), user_claims);

        let claims = decode(&token, secret, "client-1").unwrap();
        assert_eq!(claims.sub, "alice");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["client-1"]);
        validation.validate_exp = false;
        let decoded: TokenData<serde_json::Value> =
            jwt_decode(&token, &DecodingKey::from_secret(secret.as_bytes()), &validation).unwrap();
        assert_eq!(decoded.claims["email"], "alice@example.com");
    }
}
