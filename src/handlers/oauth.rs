use axum::extract::{Extension, OriginalUri, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::AppState;
use crate::dto::oauth::{
    AuthorizeQuery, IntrospectRequest, IntrospectResponse, RefreshTokenRequest, RevokeRequest,
    TokenRequest as TokenRequestDto, TokenResponse,
};
use crate::error::{AppError, Envelope};
use crate::middleware::UserSession;
use crate::services::grant::{AuthorizeOutcome, AuthorizeRequest, IssuedTokens, TokenRequest};
use crate::utils::query_coerce::TolerantQuery;

/// Decodes a `client_secret_basic` `Authorization: Basic base64(id:secret)`
/// header, used when the token request body omits `client_secret`.
fn client_secret_from_basic(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_client_id, secret) = decoded.split_once(':')?;
    Some(secret.to_string())
}

fn issued_to_response(issued: IssuedTokens) -> TokenResponse {
    TokenResponse {
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
        id_token: issued.id_token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
        scope: issued.scope,
    }
}

/// GET /oauth2/authorize. Drives the authorize-step state machine and
/// redirects the browser to whichever of login, consent, or the client's
/// `redirect_uri` the current state calls for.
pub async fn authorize_handler(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    OriginalUri(original_uri): OriginalUri,
    TolerantQuery(query): TolerantQuery<AuthorizeQuery>,
) -> Result<Response, AppError> {
    let req = AuthorizeRequest {
        response_type: query.response_type,
        client_id: query.client_id,
        redirect_uri: query.redirect_uri,
        scope: query.scope,
        state: query.state,
        nonce: query.nonce,
        code_challenge: query.code_challenge,
        code_challenge_method: query.code_challenge_method,
        original_uri: original_uri.to_string(),
    };

    let outcome = state.grant_engine().authorize(req, session.username.as_deref()).await?;

    Ok(match outcome {
        AuthorizeOutcome::Issued { redirect_uri } => Redirect::to(&redirect_uri).into_response(),
        AuthorizeOutcome::RedirectConsent { consent_uri } => Redirect::to(&consent_uri).into_response(),
        AuthorizeOutcome::RedirectLogin { login_uri } => Redirect::to(&login_uri).into_response(),
    })
}

/// POST /oauth2/token. Dispatches to whichever grant `grant_type` names.
pub async fn token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TokenRequestDto>,
) -> Result<Envelope<TokenResponse>, AppError> {
    let client_secret = req
        .client_secret
        .or_else(|| client_secret_from_basic(&headers))
        .ok_or(AppError::TokenError)?;

    let grant_req = TokenRequest {
        grant_type: req.grant_type,
        client_id: req.client_id,
        client_secret,
        code: req.code,
        redirect_uri: req.redirect_uri,
        code_verifier: req.code_verifier,
        refresh_token: req.refresh_token,
        username: req.username,
        password: req.password,
        scope: req.scope,
    };

    let issued = state.grant_engine().token(grant_req).await?;
    Ok(Envelope::with_data(issued_to_response(issued)))
}

/// POST /oauth2/refresh-token. A dedicated grant-type-fixed alias of the
/// `refresh_token` branch of the token endpoint.
pub async fn refresh_token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Envelope<TokenResponse>, AppError> {
    let client_secret = req.client_secret.or_else(|| client_secret_from_basic(&headers)).ok_or(AppError::TokenError)?;

    let grant_req = TokenRequest {
        grant_type: "refresh_token".to_string(),
        client_id: req.client_id,
        client_secret,
        code: None,
        redirect_uri: None,
        code_verifier: None,
        refresh_token: Some(req.refresh_token),
        username: None,
        password: None,
        scope: None,
    };

    let issued = state.grant_engine().token(grant_req).await?;
    Ok(Envelope::with_data(issued_to_response(issued)))
}

/// POST /oauth2/revoke-token (RFC 7009).
pub async fn revoke_handler(
    State(state): State<AppState>,
    Json(req): Json<RevokeRequest>,
) -> Result<Envelope<()>, AppError> {
    state.token_service().revoke(&req.token).await?;
    Ok(Envelope::ok())
}

/// POST /oauth2/introspect (RFC 7662). An invalid, expired, or unrecognized
/// token reports `active: false` rather than an error, per the RFC.
pub async fn introspect_handler(
    State(state): State<AppState>,
    Json(req): Json<IntrospectRequest>,
) -> Result<Envelope<IntrospectResponse>, AppError> {
    match state.token_service().introspect(&req.token, &req.client_id).await {
        Ok(introspected) => Ok(Envelope::with_data(IntrospectResponse {
            active: true,
            username: introspected.username,
            scope: introspected.scope,
            client_id: introspected.client_id,
        })),
        Err(AppError::TokenError) | Err(AppError::TokenExpire) | Err(AppError::NoData) => {
            Ok(Envelope::with_data(IntrospectResponse {
                active: false,
                username: String::new(),
                scope: String::new(),
                client_id: req.client_id,
            }))
        }
        Err(other) => Err(other),
    }
}
