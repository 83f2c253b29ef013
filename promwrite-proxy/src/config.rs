// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use promwrite_ingest::pipeline::config::{MetaStatsConfig, PromRemoteWriteConfig};
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub inflow: PromRemoteWriteConfig,
  pub meta_stats: MetaStatsConfig,
}

impl Config {
  pub fn validate(&self) -> anyhow::Result<()> {
    self.inflow.validate()?;
    self.meta_stats.validate()
  }
}

pub fn load_from_file(path: &str) -> anyhow::Result<Config> {
  let config: Config = promwrite_common::config::load_from_file(path)?;
  config.validate()?;
  Ok(config)
}
