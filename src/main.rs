use axum::{
    http::HeaderValue,
    middleware as axum_mw,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

mod cache;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;

use cache::Cache;
use config::Config;
use middleware::rate_limit::RateLimiter;
use services::mpesa::MpesaClient;
use services::sms::SmsClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub cache: Cache,
    pub config: Arc<Config>,
    pub mpesa: Option<MpesaClient>,
    pub sms: Option<SmsClient>,
    pub rate_limiter: RateLimiter,
    pub auth_rate_limiter: RateLimiter,
}

/// Parse the configured CORS allowlist. A literal "*" anywhere in the list
/// means any origin; entries that are not valid header values are skipped.
fn allowed_origins(origins: &[String]) -> Option<Vec<HeaderValue>> {
    if origins.iter().any(|o| o == "*") {
        return None;
    }
    Some(
        origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect(),
    )
}

fn build_router(state: AppState) -> Router {
    let cors = match allowed_origins(&state.config.cors_origins) {
        None => CorsLayer::new().allow_origin(Any),
        Some(origins) => CorsLayer::new().allow_origin(origins),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    // --- Auth routes (no auth required, tighter rate limit) ---
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::auth_rate_limit,
        ))
        .route(
            "/account",
            delete(routes::auth::delete_account).layer(axum_mw::from_fn_with_state(
                state.clone(),
                middleware::auth::authenticate,
            )),
        );

    // --- Webhook routes (gateway callbacks, no auth) ---
    let webhook_routes = Router::new().route("/mpesa", post(routes::webhooks::mpesa_callback));

    // --- Authenticated routes ---
    let me_routes = Router::new()
        .route("/dashboard", get(routes::auth::dashboard))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let chama_routes = Router::new()
        .route(
            "/",
            post(routes::chamas::create_chama).get(routes::chamas::list_chamas),
        )
        .route("/join", post(routes::chamas::join_chama))
        .route("/:id", get(routes::chamas::get_chama))
        .route("/:id/stats", get(routes::chamas::chama_stats))
        .route("/:id/members", get(routes::chamas::list_members))
        .route("/:id/remind", post(routes::chamas::send_reminders))
        .route(
            "/:id/contributions",
            post(routes::contributions::contribute).get(routes::contributions::list_contributions),
        )
        .route(
            "/:id/contributions/:cid/confirm",
            post(routes::contributions::confirm_contribution),
        )
        .route(
            "/:id/expenses",
            post(routes::expenses::create_expense).get(routes::expenses::list_expenses),
        )
        .route(
            "/:id/goals",
            post(routes::goals::create_goal).get(routes::goals::list_goals),
        )
        .route(
            "/:id/goals/:gid/progress",
            post(routes::goals::update_progress),
        )
        .route("/:id/goals/:gid/achieve", post(routes::goals::achieve_goal))
        .route(
            "/:id/votes",
            post(routes::votes::create_vote).get(routes::votes::list_votes),
        )
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let vote_routes = Router::new()
        .route("/:id", get(routes::votes::get_vote))
        .route("/:id/ballot", post(routes::votes::submit_ballot))
        .route("/:id/results", get(routes::votes::vote_results))
        .route("/:id/close", post(routes::votes::close_vote))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // --- Compose full API ---
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/me", me_routes)
        .nest("/chamas", chama_routes)
        .nest("/votes", vote_routes)
        .nest("/webhooks", webhook_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        // Global middleware
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let pool = db::create_pool(&config).await;
    let cache = Cache::new(&config).await;
    let mpesa = MpesaClient::new(&config.mpesa);
    let sms = SmsClient::new(&config.sms);
    let rate_limiter =
        RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);
    let auth_rate_limiter =
        RateLimiter::new(config.rate_limit.auth_max, config.rate_limit.window_secs);

    let port = config.port;
    tracing::info!("ChamaStack API initialized (Rust/Axum)");

    let state = AppState {
        db: pool,
        cache,
        config: Arc::new(config),
        mpesa,
        sms,
        rate_limiter,
        auth_rate_limiter,
    };

    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    tracing::info!("listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::allowed_origins;

    #[test]
    fn wildcard_disables_the_allowlist() {
        let origins = vec!["https://app.example.com".to_string(), "*".to_string()];
        assert!(allowed_origins(&origins).is_none());
    }

    #[test]
    fn parses_configured_origins_and_skips_garbage() {
        let origins = vec![
            "https://app.example.com".to_string(),
            "not a header\nvalue".to_string(),
            "http://localhost:8080".to_string(),
        ];
        let parsed = allowed_origins(&origins).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], "https://app.example.com");
        assert_eq!(parsed[1], "http://localhost:8080");
    }
}
