// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use serde::de::DeserializeOwned;

// Convert a YAML string into a config struct. An empty document is treated as an empty mapping so
// that every field falls back to its default.
pub fn yaml_to_config<T: DeserializeOwned>(yaml: &str) -> anyhow::Result<T> {
  let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
  let value = match value {
    serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
    value => value,
  };
  Ok(serde_yaml::from_value(value)?)
}

pub fn load_from_file<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
  let file_contents = std::fs::read_to_string(path)?;
  yaml_to_config(&file_contents)
}
