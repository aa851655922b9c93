use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::config::AppState;
use crate::dto::app::{ClientResponse, CreateClientRequest, UpdateClientRequest};
use crate::error::{AppError, Envelope};
use crate::middleware::AdminSession;

/// GET /oauth2/applications. Every client owned by the caller.
pub async fn list_applications_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminSession>,
) -> Result<Envelope<Vec<ClientResponse>>, AppError> {
    let owner_username = admin.username.ok_or(AppError::AuthError)?;

    let clients = state.app_service().list_by_owner(&owner_username).await?;
    let response = clients.into_iter().map(ClientResponse::new).collect();

    Ok(Envelope::with_data(response))
}

/// POST /oauth2/applications/register
pub async fn create_application_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminSession>,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Envelope<ClientResponse>), AppError> {
    let owner_username = admin.username.ok_or(AppError::AuthError)?;

    let (client, client_secret) = state.app_service().create(&owner_username, &req.app_name, req.metadata).await?;

    Ok((StatusCode::CREATED, Envelope::with_data(ClientResponse::with_secret(client, client_secret))))
}

/// GET /oauth2/applications/<client_id>
pub async fn get_application_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminSession>,
    Path(client_id): Path<String>,
) -> Result<Envelope<ClientResponse>, AppError> {
    let owner_username = admin.username.ok_or(AppError::AuthError)?;

    let client = state.app_service().get(&client_id, &owner_username).await?;
    Ok(Envelope::with_data(ClientResponse::new(client)))
}

/// PUT /oauth2/applications/<client_id>
pub async fn update_application_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminSession>,
    Path(client_id): Path<String>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Envelope<ClientResponse>, AppError> {
    let owner_username = admin.username.ok_or(AppError::AuthError)?;

    let client = state.app_service().update_metadata(&client_id, &owner_username, req.metadata).await?;
    Ok(Envelope::with_data(ClientResponse::new(client)))
}

/// DELETE /oauth2/applications/<client_id>
pub async fn delete_application_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminSession>,
    Path(client_id): Path<String>,
) -> Result<Envelope<()>, AppError> {
    let owner_username = admin.username.ok_or(AppError::AuthError)?;

    state.app_service().delete(&client_id, &owner_username).await?;
    Ok(Envelope::ok())
}
