//! Rate Limiting for the Control API using GCRA
//!
//! Limits requests per peer IP with tower_governor. Requires the service to
//! be served with `into_make_service_with_connect_info::<SocketAddr>()`.

use crate::settings::ServerConfig;
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Governor config keyed by peer IP, adding X-RateLimit-* headers
pub type ControlGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request
    pub per_second: u64,
    /// Requests allowed in a burst
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 2,
            burst_size: 5,
        }
    }
}

impl From<&ServerConfig> for RateLimitConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            per_second: server.replenish_secs,
            burst_size: server.burst,
        }
    }
}

/// Build the governor config; `None` if the quota is zero
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<ControlGovernorConfig>> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}
