//! Application state management

use crate::auth::AuthService;
use authgate_core::AppConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Endpoint business logic and its stores
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Requests per matched route
    pub endpoint_counts: RwLock<HashMap<String, u64>>,
}

impl AppState {
    pub fn new(config: AppConfig, auth: AuthService) -> Self {
        Self {
            config,
            auth,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            endpoint_counts: RwLock::new(HashMap::new()),
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Count one request against a route
    pub async fn record_request(&self, endpoint: &str) {
        self.increment_requests();
        let mut counts = self.endpoint_counts.write().await;
        *counts.entry(endpoint.to_string()).or_insert(0) += 1;
    }

    /// Snapshot of per-route request counts
    pub async fn endpoint_counts(&self) -> HashMap<String, u64> {
        self.endpoint_counts.read().await.clone()
    }
}
