use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::middleware::auth::AuthMember;
use crate::AppState;

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, WindowEntry>>>,
    max_requests: u32,
    window_secs: u64,
}

struct WindowEntry {
    count: u32,
    reset_at: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_secs,
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        // A clock before the epoch degrades to 0 rather than panicking a
        // request task.
        let now = std::time::UNIX_EPOCH
            .elapsed()
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut windows = self.windows.lock().await;

        let entry = windows.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: now + self.window_secs,
        });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window_secs;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }
}

fn get_client_key(req: &Request) -> String {
    // Use member ID if authenticated, otherwise IP
    if let Some(member) = req.extensions().get::<AuthMember>() {
        return format!("member:{}", member.id);
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }
    // Fallback: check forwarded headers
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| format!("ip:{}", v.split(',').next().unwrap_or("unknown").trim()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Middleware: general rate limiter.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("global:{}", get_client_key(&req));
    if !state.rate_limiter.check(&key).await {
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}

/// Middleware: stricter limiter for credential endpoints.
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("auth:{}", get_client_key(&req));
    if !state.auth_rate_limiter.check(&key).await {
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::RateLimiter;

    #[tokio::test]
    async fn blocks_after_window_budget_is_spent() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check("member:a").await);
        assert!(limiter.check("member:a").await);
        assert!(!limiter.check("member:a").await);
        // Other keys keep their own window.
        assert!(limiter.check("member:b").await);
    }
}
