// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./datapoint_test.rs"]
mod datapoint_test;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use time::OffsetDateTime;

const NANOS_PER_MILLI: i128 = 1_000_000;

// 2^63. Exactly representable as an f64 but one past i64::MAX, so it is an exclusive bound.
const I64_RANGE_END: f64 = 9_223_372_036_854_775_808.0;

// Dimensions attached to a datapoint. Ordered so that equality and display are deterministic.
pub type Dimensions = BTreeMap<String, String>;

#[must_use]
pub const fn millis_to_nanos(millis: i64) -> i128 {
  millis as i128 * NANOS_PER_MILLI
}

#[must_use]
pub const fn nanos_to_millis(nanos: i128) -> i128 {
  nanos / NANOS_PER_MILLI
}

//
// MetricKind
//

// How downstream consumers should aggregate a metric.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MetricKind {
  // Monotonic values inferred from the metric name.
  Counter,
  Gauge,
  // Process lifetime tallies reported by the decoder about itself.
  CumulativeCounter,
}

impl Display for MetricKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Counter => "counter",
      Self::Gauge => "gauge",
      Self::CumulativeCounter => "cumulative_counter",
    };
    f.write_str(name)
  }
}

//
// DatapointValue
//

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DatapointValue {
  Int(i64),
  Float(f64),
}

impl DatapointValue {
  // Values with no fractional part that fit in an i64 are stored as integers, everything else as
  // floats. This never looks at the metric kind.
  #[must_use]
  pub fn from_f64(value: f64) -> Self {
    if value.fract() == 0.0 && (-I64_RANGE_END .. I64_RANGE_END).contains(&value) {
      #[allow(clippy::cast_possible_truncation)]
      let value = value as i64;
      Self::Int(value)
    } else {
      Self::Float(value)
    }
  }

  #[must_use]
  pub fn as_f64(&self) -> f64 {
    match self {
      #[allow(clippy::cast_precision_loss)]
      Self::Int(value) => *value as f64,
      Self::Float(value) => *value,
    }
  }
}

impl Display for DatapointValue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Int(value) => write!(f, "{value}"),
      Self::Float(value) => write!(f, "{value}"),
    }
  }
}

//
// Datapoint
//

// A single converted sample. The name and dimensions are shared by every datapoint produced from
// the same series.
#[derive(Clone, Debug, PartialEq)]
pub struct Datapoint {
  metric: Arc<str>,
  dimensions: Arc<Dimensions>,
  value: DatapointValue,
  kind: MetricKind,
  timestamp_nanos: i128,
}

impl Datapoint {
  #[must_use]
  pub fn new(
    metric: Arc<str>,
    dimensions: Arc<Dimensions>,
    value: DatapointValue,
    kind: MetricKind,
    timestamp_nanos: i128,
  ) -> Self {
    debug_assert!(!metric.is_empty());
    Self {
      metric,
      dimensions,
      value,
      kind,
      timestamp_nanos,
    }
  }

  #[must_use]
  pub fn metric(&self) -> &str {
    &self.metric
  }

  #[must_use]
  pub fn dimensions(&self) -> &Dimensions {
    &self.dimensions
  }

  #[must_use]
  pub const fn value(&self) -> DatapointValue {
    self.value
  }

  #[must_use]
  pub const fn kind(&self) -> MetricKind {
    self.kind
  }

  #[must_use]
  pub const fn timestamp_nanos(&self) -> i128 {
    self.timestamp_nanos
  }

  #[must_use]
  pub const fn timestamp_millis(&self) -> i128 {
    nanos_to_millis(self.timestamp_nanos)
  }

  // The timestamp as a date, or None if it falls outside what the time crate can represent.
  // Out of range timestamps are still forwarded as is.
  #[must_use]
  pub fn timestamp(&self) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(self.timestamp_nanos).ok()
  }
}

impl Display for Datapoint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}{{", self.metric)?;
    for (i, (key, value)) in self.dimensions.iter().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      write!(f, "{key}={value}")?;
    }
    write!(
      f,
      "}} {} {} {}",
      self.value, self.kind, self.timestamp_nanos
    )
  }
}
