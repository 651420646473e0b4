pub mod org;
pub mod super_admin;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/org", org::router())
        .nest("/admin", super_admin::router())
}
