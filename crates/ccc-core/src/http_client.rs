use std::time::Duration;

use crate::config::ClientConfig;

const TCP_KEEPALIVE: Duration = Duration::from_secs(60);
const POOL_IDLE: Duration = Duration::from_secs(90);

fn user_agent() -> String {
    format!("ccc-client/{}", env!("CARGO_PKG_VERSION"))
}

/// Base client builder with harmonized defaults. Apply per-call `.timeout(...)` as needed.
pub fn builder(config: &ClientConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(user_agent())
        .connect_timeout(config.connect_timeout())
        .tcp_keepalive(TCP_KEEPALIVE)
        .pool_idle_timeout(POOL_IDLE)
}

/// Client honoring the configured request timeout.
pub fn client(config: &ClientConfig) -> Result<reqwest::Client, reqwest::Error> {
    builder(config).timeout(config.http_timeout()).build()
}
