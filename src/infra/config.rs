use std::net::SocketAddr;

use axum::http::HeaderValue;
use chrono::Duration;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub jwt_secret: SecretString,
    /// Tenant access token lifetime.
    pub access_token_ttl: Duration,
    /// Super admin session lifetime; also the admin JWT expiry.
    pub super_admin_session_ttl: Duration,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Whether to trust X-Forwarded-For headers. Only enable behind a
    /// reverse proxy; otherwise clients can spoof the audited IP.
    pub trust_proxy: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());

        let access_token_ttl_secs: i64 = get_env_default("ACCESS_TOKEN_TTL_SECS", 86_400);
        let super_admin_session_ttl_hours: i64 =
            get_env_default("SUPER_ADMIN_SESSION_TTL_HOURS", 8);

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        // Default to false for security. Must be explicitly enabled when
        // running behind a trusted proxy.
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);

        Self {
            jwt_secret,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            super_admin_session_ttl: Duration::hours(super_admin_session_ttl_hours),
            cors_origin,
            bind_addr,
            database_url,
            trust_proxy,
        }
    }
}
