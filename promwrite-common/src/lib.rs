// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod bind_resolver;
pub mod config;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  global_initialize();
}

// Install the process wide logger. RUST_LOG controls filtering and defaults to info. This can be
// called more than once (binary plus test ctors), only the first call has an effect.
pub fn global_initialize() {
  let _ignored =
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
      .format_timestamp_micros()
      .try_init();
}

pub trait LossyIntoToFloat {
  fn lossy_to_f64(self) -> f64;
}

impl LossyIntoToFloat for u64 {
  #[allow(clippy::cast_precision_loss)]
  fn lossy_to_f64(self) -> f64 {
    self as f64
  }
}

impl LossyIntoToFloat for usize {
  #[allow(clippy::cast_precision_loss)]
  fn lossy_to_f64(self) -> f64 {
    self as f64
  }
}

impl LossyIntoToFloat for u128 {
  #[allow(clippy::cast_precision_loss)]
  fn lossy_to_f64(self) -> f64 {
    self as f64
  }
}
