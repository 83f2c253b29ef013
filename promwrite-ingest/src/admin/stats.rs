// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./stats_test.rs"]
mod stats_test;

use crate::pipeline::time::{RealTimeProvider, TimeProvider};
use crate::protos::datapoint::{Datapoint, DatapointValue, Dimensions, MetricKind};
use crate::protos::prom::Conversion;
use crate::rolling_bucket::{DEFAULT_BUCKET_WIDTH, DEFAULT_RESERVOIR_SIZE, RollingBucket};
use prometheus::{IntCounter, Registry};
use promwrite_common::LossyIntoToFloat;
use std::sync::Arc;
use std::time::Duration;

pub const INVALID_REQUESTS: &str = "prometheus.invalid_requests";
pub const TOTAL_NAN_SAMPLES: &str = "prometheus.total_NAN_samples";
pub const TOTAL_INFINITE_SAMPLES: &str = "prometheus.total_infinite_samples";
pub const TOTAL_BAD_DATAPOINTS: &str = "prometheus.total_bad_datapoints";
pub const REQUEST_TIME: &str = "prometheus.request_time.ns";
pub const DRAIN_SIZE: &str = "prometheus.drain_size";

// Prometheus metric names cannot contain dots.
fn registry_name(name: &str) -> String {
  name.replace('.', "_")
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> anyhow::Result<IntCounter> {
  let counter = IntCounter::new(registry_name(name), help)?;
  registry.register(Box::new(counter.clone()))?;
  Ok(counter)
}

//
// DecoderStats
//

// Self observability for a decoder. Owned by a single decoder so that independent decoders keep
// independent tallies. Counters are atomic and the distributions are internally locked, so all
// updates are safe from concurrent requests.
pub struct DecoderStats {
  total_errors: IntCounter,
  total_nans: IntCounter,
  total_infinities: IntCounter,
  total_bad_datapoints: IntCounter,
  request_time: RollingBucket,
  drain_size: RollingBucket,
  time_provider: Arc<dyn TimeProvider>,
}

impl DecoderStats {
  pub fn new(
    registry: &Registry,
    time_provider: Arc<dyn TimeProvider>,
    bucket_width: time::Duration,
  ) -> anyhow::Result<Self> {
    Ok(Self {
      total_errors: register_counter(
        registry,
        INVALID_REQUESTS,
        "Requests that failed to read, decode or forward",
      )?,
      total_nans: register_counter(registry, TOTAL_NAN_SAMPLES, "Samples dropped for being NaN")?,
      total_infinities: register_counter(
        registry,
        TOTAL_INFINITE_SAMPLES,
        "Samples dropped for being infinite",
      )?,
      total_bad_datapoints: register_counter(
        registry,
        TOTAL_BAD_DATAPOINTS,
        "Samples dropped because their series had no metric name",
      )?,
      request_time: RollingBucket::new(
        REQUEST_TIME,
        bucket_width,
        DEFAULT_RESERVOIR_SIZE,
        time_provider.clone(),
      ),
      drain_size: RollingBucket::new(
        DRAIN_SIZE,
        bucket_width,
        DEFAULT_RESERVOIR_SIZE,
        time_provider.clone(),
      ),
      time_provider,
    })
  }

  pub fn with_defaults(registry: &Registry) -> anyhow::Result<Self> {
    Self::new(registry, Arc::new(RealTimeProvider {}), DEFAULT_BUCKET_WIDTH)
  }

  pub fn record_error(&self) {
    self.total_errors.inc();
  }

  pub fn record_conversion(&self, conversion: &Conversion) {
    self.total_nans.inc_by(conversion.nan_samples);
    self.total_infinities.inc_by(conversion.infinite_samples);
    self
      .total_bad_datapoints
      .inc_by(conversion.missing_name_samples);
  }

  pub fn record_drain_size(&self, batch_size: usize) {
    self.drain_size.add(batch_size.lossy_to_f64());
  }

  pub fn record_request_time(&self, elapsed: Duration) {
    self.request_time.add(elapsed.as_nanos().lossy_to_f64());
  }

  #[must_use]
  pub fn total_errors(&self) -> u64 {
    self.total_errors.get()
  }

  #[must_use]
  pub fn total_nans(&self) -> u64 {
    self.total_nans.get()
  }

  #[must_use]
  pub fn total_infinities(&self) -> u64 {
    self.total_infinities.get()
  }

  #[must_use]
  pub fn total_bad_datapoints(&self) -> u64 {
    self.total_bad_datapoints.get()
  }

  #[must_use]
  pub const fn request_time(&self) -> &RollingBucket {
    &self.request_time
  }

  #[must_use]
  pub const fn drain_size(&self) -> &RollingBucket {
    &self.drain_size
  }

  // Report the current state as datapoints: both distributions followed by the cumulative
  // counters.
  #[must_use]
  pub fn datapoints(&self) -> Vec<Datapoint> {
    let mut datapoints = self.request_time.datapoints();
    datapoints.extend(self.drain_size.datapoints());

    let timestamp = self.time_provider.now_utc().unix_timestamp_nanos();
    let dimensions = Arc::new(Dimensions::new());
    datapoints.extend(
      [
        (INVALID_REQUESTS, &self.total_errors),
        (TOTAL_NAN_SAMPLES, &self.total_nans),
        (TOTAL_INFINITE_SAMPLES, &self.total_infinities),
        (TOTAL_BAD_DATAPOINTS, &self.total_bad_datapoints),
      ]
      .into_iter()
      .map(|(name, counter)| {
        Datapoint::new(
          name.into(),
          dimensions.clone(),
          DatapointValue::Int(i64::try_from(counter.get()).unwrap_or(i64::MAX)),
          MetricKind::CumulativeCounter,
          timestamp,
        )
      }),
    );
    datapoints
  }
}
