// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use anyhow::bail;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:1234";
pub const DEFAULT_PATH: &str = "/write";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 20_000_000;
pub const DEFAULT_META_STATS_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

pub const HEALTHCHECK_PATH: &str = "/healthcheck";
pub const METRICS_PATH: &str = "/metrics";
// Paths served next to the write path.
pub const RESERVED_PATHS: &[&str] = &[HEALTHCHECK_PATH, METRICS_PATH];

//
// PromRemoteWriteConfig
//

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PromRemoteWriteConfig {
  // Address to listen on, host:port.
  pub bind: String,
  // Path that accepts write requests.
  pub path: String,
  // Bound on the whole request, including the forward to the sink.
  #[serde(with = "humantime_serde")]
  pub request_timeout: Duration,
  // Largest compressed body accepted.
  pub max_request_bytes: usize,
}

impl PromRemoteWriteConfig {
  pub fn validate(&self) -> anyhow::Result<()> {
    if !self.path.starts_with('/') {
      bail!("write path '{}' must start with '/'", self.path);
    }
    if RESERVED_PATHS.contains(&self.path.as_str()) {
      bail!("write path '{}' collides with a built in endpoint", self.path);
    }
    // The router treats these as captures or wildcards. The write path is always literal.
    if self
      .path
      .split('/')
      .any(|segment| segment.starts_with([':', '*']) || segment.contains(['{', '}']))
    {
      bail!(
        "write path '{}' must be literal, ':', '*', '{{' and '}}' are not allowed",
        self.path
      );
    }
    if self.request_timeout.is_zero() {
      bail!("request_timeout must be greater than zero");
    }
    if self.max_request_bytes == 0 {
      bail!("max_request_bytes must be greater than zero");
    }
    Ok(())
  }
}

impl Default for PromRemoteWriteConfig {
  fn default() -> Self {
    Self {
      bind: DEFAULT_BIND.to_string(),
      path: DEFAULT_PATH.to_string(),
      request_timeout: DEFAULT_REQUEST_TIMEOUT,
      max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
    }
  }
}

//
// MetaStatsConfig
//

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MetaStatsConfig {
  pub enabled: bool,
  #[serde(with = "humantime_serde")]
  pub flush_interval: Duration,
}

impl MetaStatsConfig {
  pub fn validate(&self) -> anyhow::Result<()> {
    if self.enabled && self.flush_interval.is_zero() {
      bail!("meta stats flush_interval must be greater than zero");
    }
    Ok(())
  }
}

impl Default for MetaStatsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      flush_interval: DEFAULT_META_STATS_FLUSH_INTERVAL,
    }
  }
}
