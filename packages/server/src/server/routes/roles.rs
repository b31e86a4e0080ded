use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::common::{GrantId, SubjectId};
use crate::domains::roles::{RevokeOutcome, RoleGrant, RoleGrantRequest};
use crate::server::app::AppState;
use crate::server::errors::ApiError;
use crate::server::middleware::{AuthUser, Origin};

/// POST /roles/grants
pub async fn grant_role_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Origin(origin): Origin,
    Json(request): Json<RoleGrantRequest>,
) -> Result<(StatusCode, Json<RoleGrant>), ApiError> {
    let grant = state
        .server_deps
        .gateway
        .grant_role(&user.subject_id, request, origin)
        .await?;

    Ok((StatusCode::CREATED, Json(grant)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    pub grant_id: GrantId,
    pub outcome: RevokeOutcome,
}

/// POST /roles/grants/:id/revoke
pub async fn revoke_role_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Origin(origin): Origin,
    Path(grant_id): Path<GrantId>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let outcome = state
        .server_deps
        .gateway
        .revoke_role(&user.subject_id, grant_id, origin)
        .await?;

    Ok(Json(RevokeResponse { grant_id, outcome }))
}

/// GET /roles/subjects/:subject/effective
pub async fn effective_grants_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Origin(origin): Origin,
    Path(subject): Path<SubjectId>,
) -> Result<Json<Vec<RoleGrant>>, ApiError> {
    let grants = state
        .server_deps
        .gateway
        .list_effective(&user.subject_id, &subject, origin)
        .await?;

    Ok(Json(grants))
}
