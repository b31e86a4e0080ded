use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::auth::{AuditContext, Decision, EffectivePolicy, Requirement};
use crate::common::SubjectId;
use crate::domains::audit::ResourceRef;
use crate::server::app::AppState;
use crate::server::errors::ApiError;
use crate::server::middleware::{AuthUser, Origin};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub requirement: Requirement,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource: Option<ResourceRef>,
    #[serde(default)]
    pub details: Option<Value>,
}

/// POST /authz/check
///
/// With `action` and `resource` this is the authoritative, audited check;
/// without them it only reports what the decision would be.
pub async fn check_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Origin(origin): Origin,
    Json(body): Json<CheckRequest>,
) -> Result<Json<Decision>, ApiError> {
    let gateway = &state.server_deps.gateway;

    let decision = match (body.action, body.resource) {
        (Some(action), Some(resource)) => {
            let mut context = AuditContext::from_origin(origin);
            if let Some(details) = body.details {
                context = context.with_details(details);
            }
            gateway
                .check_and_log(&user.subject_id, &body.requirement, &action, resource, context)
                .await?
        }
        (None, None) => gateway.check(&user.subject_id, &body.requirement).await?,
        _ => {
            return Err(ApiError::validation(
                "action and resource must be given together",
            ))
        }
    };

    Ok(Json(decision))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub subject_id: SubjectId,
    #[serde(flatten)]
    pub policy: EffectivePolicy,
}

/// GET /authz/me - presentation hint for menus; never authoritative.
pub async fn me_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let policy = state
        .server_deps
        .gateway
        .effective_policy(&user.subject_id)
        .await?;

    Ok(Json(MeResponse {
        subject_id: user.subject_id,
        policy,
    }))
}
