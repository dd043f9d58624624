use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Sliding-window request counter per client address
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Records the request and returns whether it is within the limit
    pub async fn check_request(&self, client: &str) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();

        let request_times = requests.entry(client.to_string()).or_default();
        request_times.retain(|&time| now.duration_since(time) < self.window);

        if request_times.len() < self.max_requests {
            request_times.push(now);
            true
        } else {
            warn!("Rate limit exceeded for client: {}", client);
            false
        }
    }

    /// Forgets clients without requests inside the window
    pub async fn cleanup(&self) {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();

        requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.window);
            !times.is_empty()
        });
    }

    pub async fn tracked_clients(&self) -> usize {
        self.requests.lock().await.len()
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer IP
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded_for.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
            return ip.to_string();
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Client address of a request, peer taken from the connection info extension
pub fn request_client_address(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_address(request.headers(), peer)
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = request_client_address(&request);

    if !limiter.check_request(&client).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "Too many requests. Please try again later."
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Creates a limiter and its periodic cleanup task, stopped by `cancellation_token`
pub fn rate_limit_layer(max_requests: usize, window_seconds: u64, cancellation_token: CancellationToken) -> RateLimiter {
    let limiter = RateLimiter::new(max_requests, Duration::from_secs(window_seconds));

    let cleanup_limiter = limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => cleanup_limiter.cleanup().await,
            }
        }
    });

    limiter
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_window_limits_each_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check_request("1.1.1.1").await);
        assert!(limiter.check_request("1.1.1.1").await);
        assert!(!limiter.check_request("1.1.1.1").await);
        assert!(limiter.check_request("2.2.2.2").await);
    }

    #[tokio::test]
    async fn test_cleanup_forgets_expired_clients() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        limiter.check_request("1.1.1.1").await;
        assert_eq!(limiter.tracked_clients().await, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[test]
    fn test_client_address_precedence() {
        let peer: SocketAddr = "192.168.1.9:50432".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, Some(peer)), "192.168.1.9");
        assert_eq!(client_address(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_address(&headers, Some(peer)), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_address(&headers, Some(peer)), "203.0.113.5");
    }
}
