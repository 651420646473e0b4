use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    adapters::http::routes::org::client_ip,
    app_error::{AppError, AppResult},
    application::use_cases::audit::AuditLogFilter,
    application::use_cases::policy_admin::{
        AdminActor, CreateFeatureInput, CreateModelInput, CreatePlanInput, NewPriceInput,
        UpdateFeatureInput,
    },
    domain::entities::entitlement::EntitlementKind,
};

pub fn router() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        // Feature registry
        .route("/feature-registry", get(list_features))
        .route("/feature-registry", post(create_feature))
        .route("/feature-registry/{id}", patch(update_feature))
        .route("/feature-registry/{id}", delete(delete_feature))
        // Entitlement catalog
        .route("/entitlements", get(list_entitlements))
        .route("/entitlements", post(create_entitlement))
        // Pricing
        .route("/pricing/plans", get(list_plans))
        .route("/pricing/plans", post(create_plan))
        .route("/pricing/plans/{plan_id}/models", get(list_models))
        .route("/pricing/plans/{plan_id}/entitlements", get(list_plan_entitlements))
        .route(
            "/pricing/plans/{plan_id}/entitlements/{key}",
            put(set_plan_entitlement),
        )
        .route("/pricing/models", post(create_model))
        .route("/pricing/models/{model_id}/prices", get(list_prices))
        .route("/pricing/models/{model_id}/prices", post(add_price))
        // Trial overrides
        .route("/trial-overrides/models/{model_id}", get(list_trial_overrides))
        .route(
            "/trial-overrides/models/{model_id}/features/{key}",
            put(set_trial_feature_override),
        )
        .route(
            "/trial-overrides/models/{model_id}/entitlements/{key}",
            put(set_trial_entitlement_override),
        )
        .route(
            "/trial-overrides/features/{id}",
            delete(delete_trial_feature_override),
        )
        .route(
            "/trial-overrides/entitlements/{id}",
            delete(delete_trial_entitlement_override),
        )
        // Subscription repair
        .route("/subscriptions/invalid", get(list_invalid_subscriptions))
        .route("/subscriptions/cleanup", post(cleanup_subscriptions))
        // Audit
        .route("/audit-logs", get(query_audit_logs))
}

// ============================================================================
// Auth Endpoints
// ============================================================================

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    role: String,
}

async fn login(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(&headers, &app_state);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let result = app_state
        .super_admin_auth_use_cases
        .login(&payload.email, &payload.password, ip, user_agent)
        .await?;
    Ok(Json(LoginResponse {
        token: result.token,
        role: result.admin.role.as_str().to_string(),
    }))
}

/// Always 204, even with a garbage or already dead token.
async fn logout(State(app_state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = bearer_token(&headers) {
        app_state.super_admin_auth_use_cases.logout(token).await;
    }
    StatusCode::NO_CONTENT
}

// ============================================================================
// Feature Registry Endpoints
// ============================================================================

async fn list_features(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let features = app_state
        .policy_admin_use_cases
        .list_features(actor.role)
        .await?;
    Ok(Json(features))
}

async fn create_feature(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateFeatureInput>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let entry = app_state
        .policy_admin_use_cases
        .create_feature(actor, input)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_feature(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateFeatureInput>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let entry = app_state
        .policy_admin_use_cases
        .update_feature(actor, id, input)
        .await?;
    Ok(Json(entry))
}

async fn delete_feature(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    app_state
        .policy_admin_use_cases
        .delete_feature(actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Entitlement Catalog Endpoints
// ============================================================================

async fn list_entitlements(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let entitlements = app_state
        .policy_admin_use_cases
        .list_entitlements(actor.role)
        .await?;
    Ok(Json(entitlements))
}

#[derive(Deserialize)]
struct CreateEntitlementPayload {
    key: String,
    kind: EntitlementKind,
    unit: Option<String>,
}

async fn create_entitlement(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateEntitlementPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let entitlement = app_state
        .policy_admin_use_cases
        .create_entitlement(actor, &payload.key, payload.kind, payload.unit.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(entitlement)))
}

// ============================================================================
// Pricing Endpoints
// ============================================================================

async fn list_plans(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let plans = app_state.policy_admin_use_cases.list_plans(actor.role).await?;
    Ok(Json(plans))
}

async fn create_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreatePlanInput>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let plan = app_state
        .policy_admin_use_cases
        .create_plan(actor, input)
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_models(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(plan_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let models = app_state
        .policy_admin_use_cases
        .list_models(actor.role, plan_id)
        .await?;
    Ok(Json(models))
}

async fn list_plan_entitlements(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(plan_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let values = app_state
        .policy_admin_use_cases
        .list_plan_entitlements(actor.role, plan_id)
        .await?;
    Ok(Json(values))
}

#[derive(Deserialize)]
struct PlanEntitlementPayload {
    value: serde_json::Value,
}

async fn set_plan_entitlement(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((plan_id, key)): Path<(Uuid, String)>,
    Json(payload): Json<PlanEntitlementPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let row = app_state
        .policy_admin_use_cases
        .set_plan_entitlement(actor, plan_id, &key, payload.value)
        .await?;
    Ok(Json(row))
}

async fn create_model(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateModelInput>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let model = app_state
        .policy_admin_use_cases
        .create_model(actor, input)
        .await?;
    Ok((StatusCode::CREATED, Json(model)))
}

async fn list_prices(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(model_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let prices = app_state
        .policy_admin_use_cases
        .list_prices(actor.role, model_id)
        .await?;
    Ok(Json(prices))
}

#[derive(Deserialize)]
struct AddPricePayload {
    amount_cents: i32,
    currency: String,
    valid_from: chrono::DateTime<chrono::Utc>,
    valid_to: Option<chrono::DateTime<chrono::Utc>>,
}

async fn add_price(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(model_id): Path<Uuid>,
    Json(payload): Json<AddPricePayload>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let input = NewPriceInput {
        subscription_model_id: model_id,
        amount_cents: payload.amount_cents,
        currency: payload.currency,
        valid_from: payload.valid_from,
        valid_to: payload.valid_to,
    };
    let price = app_state.policy_admin_use_cases.add_price(actor, input).await?;
    Ok((StatusCode::CREATED, Json(price)))
}

// ============================================================================
// Trial Override Endpoints
// ============================================================================

#[derive(Serialize)]
struct TrialOverridesResponse {
    features: Vec<crate::domain::entities::trial_override::TrialFeatureOverride>,
    entitlements: Vec<crate::domain::entities::trial_override::TrialEntitlementOverride>,
}

async fn list_trial_overrides(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(model_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let (features, entitlements) = app_state
        .policy_admin_use_cases
        .list_trial_overrides(actor.role, model_id)
        .await?;
    Ok(Json(TrialOverridesResponse {
        features,
        entitlements,
    }))
}

#[derive(Deserialize)]
struct FeatureOverridePayload {
    enabled: bool,
}

async fn set_trial_feature_override(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((model_id, key)): Path<(Uuid, String)>,
    Json(payload): Json<FeatureOverridePayload>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let row = app_state
        .policy_admin_use_cases
        .set_trial_feature_override(actor, model_id, &key, payload.enabled)
        .await?;
    Ok(Json(row))
}

#[derive(Deserialize)]
struct EntitlementOverridePayload {
    value: serde_json::Value,
}

async fn set_trial_entitlement_override(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((model_id, key)): Path<(Uuid, String)>,
    Json(payload): Json<EntitlementOverridePayload>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let row = app_state
        .policy_admin_use_cases
        .set_trial_entitlement_override(actor, model_id, &key, payload.value)
        .await?;
    Ok(Json(row))
}

async fn delete_trial_feature_override(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    app_state
        .policy_admin_use_cases
        .delete_trial_feature_override(actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_trial_entitlement_override(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    app_state
        .policy_admin_use_cases
        .delete_trial_entitlement_override(actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Subscription Repair Endpoints
// ============================================================================

async fn list_invalid_subscriptions(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let invalid = app_state
        .subscription_use_cases
        .detect_invalid_states(&actor)
        .await?;
    Ok(Json(invalid))
}

#[derive(Deserialize)]
struct CleanupPayload {
    reason: String,
    #[serde(default)]
    confirm: bool,
}

async fn cleanup_subscriptions(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CleanupPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let report = app_state
        .subscription_use_cases
        .cleanup_invalid_states(&actor, &payload.reason, payload.confirm)
        .await?;
    Ok(Json(report))
}

// ============================================================================
// Audit Endpoints
// ============================================================================

async fn query_audit_logs(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<AuditLogFilter>,
) -> AppResult<impl IntoResponse> {
    let actor = authenticate(&headers, &app_state).await?;
    let page = app_state
        .audit_use_cases
        .query(actor.role, &filter)
        .await?;
    Ok(Json(page))
}

// ============================================================================
// Helpers
// ============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn authenticate(headers: &HeaderMap, app_state: &AppState) -> AppResult<AdminActor> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let auth = app_state.super_admin_auth_use_cases.verify(token).await?;
    Ok(AdminActor {
        id: auth.admin.id,
        role: auth.admin.role,
        ip_address: client_ip(headers, app_state),
    })
}
