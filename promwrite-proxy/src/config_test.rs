// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::Duration;

fn load(contents: &str) -> anyhow::Result<Config> {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  file.write_all(contents.as_bytes()).unwrap();
  load_from_file(file.path().to_str().unwrap())
}

#[test]
fn full_config() {
  let config = load(
    r"
inflow:
  bind: 0.0.0.0:9091
  path: /api/v1/write
  request_timeout: 10s
meta_stats:
  flush_interval: 30s
",
  )
  .unwrap();
  assert_eq!(
    Config {
      inflow: PromRemoteWriteConfig {
        bind: "0.0.0.0:9091".to_string(),
        path: "/api/v1/write".to_string(),
        request_timeout: Duration::from_secs(10),
        ..Default::default()
      },
      meta_stats: MetaStatsConfig {
        enabled: true,
        flush_interval: Duration::from_secs(30),
      },
    },
    config
  );
}

#[test]
fn empty_config() {
  assert_eq!(Config::default(), load("").unwrap());
}

#[test]
fn invalid_config() {
  assert!(load("outflow: {}").is_err());
  assert!(load("inflow:\n  path: /metrics").is_err());
  assert!(load_from_file("/does/not/exist.yaml").is_err());
}
