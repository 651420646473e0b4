use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
    application::use_cases::capabilities::TrialStatus,
    application::use_cases::subscription_lifecycle::ActorContext,
    domain::entities::audit::AuditSource,
    domain::entities::entitlement::{EntitlementValue, LimitCheck},
    domain::entities::membership::OrgRole,
    domain::entities::membership::TenantAction,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{org_id}/capabilities", get(list_capabilities))
        .route("/{org_id}/capabilities/{key}", get(get_capability))
        .route("/{org_id}/entitlements/{key}", get(get_entitlement))
        .route("/{org_id}/trial-status", get(get_trial_status))
        .route("/{org_id}/subscription", get(get_subscription))
        .route("/{org_id}/subscription/trial", post(start_trial))
        .route("/{org_id}/subscription/upgrade", post(upgrade_subscription))
        .route("/{org_id}/subscription/cancel", post(cancel_subscription))
        .route("/{org_id}/members", get(list_members))
        .route("/{org_id}/members/{user_id}", delete(remove_member))
        .route("/{org_id}/members/{user_id}/role", put(change_member_role))
}

// ============================================================================
// Capability Endpoints
// ============================================================================

#[derive(Serialize)]
struct CapabilitiesResponse {
    capabilities: BTreeMap<String, bool>,
}

async fn list_capabilities(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(org_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    require_member(&app_state, user_id, org_id).await?;

    let capabilities = app_state
        .capability_use_cases
        .resolve_capabilities(org_id)
        .await?;
    Ok(Json(CapabilitiesResponse { capabilities }))
}

#[derive(Serialize)]
struct CapabilityResponse {
    key: String,
    available: bool,
}

async fn get_capability(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path((org_id, key)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    require_member(&app_state, user_id, org_id).await?;

    let available = app_state.capability_use_cases.has_feature(org_id, &key).await?;
    Ok(Json(CapabilityResponse { key, available }))
}

#[derive(Deserialize)]
struct EntitlementParams {
    usage: Option<i64>,
}

#[derive(Serialize)]
struct EntitlementResponse {
    key: String,
    #[serde(flatten)]
    value: EntitlementValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    check: Option<LimitCheck>,
}

async fn get_entitlement(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path((org_id, key)): Path<(Uuid, String)>,
    Query(params): Query<EntitlementParams>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    require_member(&app_state, user_id, org_id).await?;

    let value = app_state
        .capability_use_cases
        .resolve_entitlement(org_id, &key)
        .await?;
    let check = match params.usage {
        Some(usage) => Some(
            app_state
                .capability_use_cases
                .check_entitlement_limit(org_id, &key, usage)
                .await?,
        ),
        None => None,
    };
    Ok(Json(EntitlementResponse { key, value, check }))
}

async fn get_trial_status(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(org_id): Path<Uuid>,
) -> AppResult<Json<TrialStatus>> {
    let user_id = current_user(&jar, &app_state)?;
    require_member(&app_state, user_id, org_id).await?;

    let status = app_state.capability_use_cases.trial_status(org_id).await?;
    Ok(Json(status))
}

// ============================================================================
// Subscription Endpoints
// ============================================================================

#[derive(Serialize)]
struct SubscriptionResponse {
    id: Uuid,
    status: String,
    plan: Option<String>,
    subscription_model_id: Option<Uuid>,
    trial_expires_at: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
}

impl SubscriptionResponse {
    fn from_subscription(sub: &crate::domain::entities::subscription::Subscription) -> Self {
        SubscriptionResponse {
            id: sub.id,
            status: sub.status.as_str().to_string(),
            plan: sub.plan.map(|p| p.as_str().to_string()),
            subscription_model_id: sub.subscription_model_id,
            trial_expires_at: sub.trial_expires_at,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }
}

async fn get_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(org_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    require_member(&app_state, user_id, org_id).await?;

    let sub = app_state
        .subscription_use_cases
        .current(org_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(SubscriptionResponse::from_subscription(&sub)))
}

#[derive(Deserialize)]
struct SelectModelPayload {
    subscription_model_id: Uuid,
}

async fn start_trial(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<SelectModelPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let role = require_action(&app_state, user_id, org_id, TenantAction::EditOrganization).await?;

    let actor = tenant_actor(user_id, role, &headers, &app_state);
    let sub = app_state
        .subscription_use_cases
        .start_trial(org_id, payload.subscription_model_id, &actor)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from_subscription(&sub)),
    ))
}

async fn upgrade_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<SelectModelPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let role = require_action(&app_state, user_id, org_id, TenantAction::EditOrganization).await?;

    let actor = tenant_actor(user_id, role, &headers, &app_state);
    let sub = app_state
        .subscription_use_cases
        .upgrade(org_id, payload.subscription_model_id, &actor)
        .await?;
    Ok(Json(SubscriptionResponse::from_subscription(&sub)))
}

#[derive(Deserialize)]
struct CancelPayload {
    #[serde(default)]
    at_period_end: bool,
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CancelPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let role = require_action(&app_state, user_id, org_id, TenantAction::EditOrganization).await?;

    let actor = tenant_actor(user_id, role, &headers, &app_state);
    let sub = app_state
        .subscription_use_cases
        .cancel(org_id, payload.at_period_end, &actor)
        .await?;
    Ok(Json(SubscriptionResponse::from_subscription(&sub)))
}

// ============================================================================
// Member Endpoints
// ============================================================================

#[derive(Serialize)]
struct MemberResponse {
    user_id: Uuid,
    role: String,
}

async fn list_members(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(org_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    require_member(&app_state, user_id, org_id).await?;

    let members = app_state
        .tenant_permission_use_cases
        .list_members(org_id)
        .await?;
    let body: Vec<MemberResponse> = members
        .iter()
        .map(|m| MemberResponse {
            user_id: m.user_id,
            role: m.role.as_str().to_string(),
        })
        .collect();
    Ok(Json(body))
}

async fn remove_member(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path((org_id, target_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;

    app_state
        .tenant_permission_use_cases
        .remove_member(user_id, org_id, target_id, client_ip(&headers, &app_state))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ChangeRolePayload {
    role: OrgRole,
}

async fn change_member_role(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path((org_id, target_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ChangeRolePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;

    let membership = app_state
        .tenant_permission_use_cases
        .change_role(
            user_id,
            org_id,
            target_id,
            payload.role,
            client_ip(&headers, &app_state),
        )
        .await?;
    Ok(Json(MemberResponse {
        user_id: membership.user_id,
        role: membership.role.as_str().to_string(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn current_user(jar: &CookieJar, app_state: &AppState) -> AppResult<Uuid> {
    let Some(access_cookie) = jar.get("access_token") else {
        return Err(AppError::Unauthorized);
    };
    let claims = jwt::verify(access_cookie.value(), &app_state.config.jwt_secret)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)
}

async fn require_member(app_state: &AppState, user_id: Uuid, org_id: Uuid) -> AppResult<OrgRole> {
    app_state
        .tenant_permission_use_cases
        .role_of(user_id, org_id)
        .await?
        .ok_or(AppError::Forbidden)
}

async fn require_action(
    app_state: &AppState,
    user_id: Uuid,
    org_id: Uuid,
    action: TenantAction,
) -> AppResult<OrgRole> {
    let role = require_member(app_state, user_id, org_id).await?;
    if !crate::application::use_cases::tenant_permissions::role_allows(role, action) {
        return Err(AppError::Forbidden);
    }
    Ok(role)
}

fn tenant_actor(
    user_id: Uuid,
    role: OrgRole,
    headers: &HeaderMap,
    app_state: &AppState,
) -> ActorContext {
    ActorContext {
        actor_id: Some(user_id),
        actor_role: Some(role.as_str().to_string()),
        source: AuditSource::Ui,
        ip_address: client_ip(headers, app_state),
    }
}

/// First X-Forwarded-For entry, only honored behind a trusted proxy.
pub(crate) fn client_ip(headers: &HeaderMap, app_state: &AppState) -> Option<String> {
    if !app_state.config.trust_proxy {
        return None;
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}
