// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./prom_test.rs"]
mod prom_test;

use super::datapoint::{Datapoint, DatapointValue, Dimensions, MetricKind, millis_to_nanos};
use promwrite_protobuf::prompb::{Label, Sample, TimeSeries, WriteRequest};
use protobuf::Message;
use std::sync::Arc;

// Reserved label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

pub const PROM_REMOTE_WRITE_HEADERS: &[(&str, &str)] = &[
  ("content-type", CONTENT_TYPE_PROTOBUF),
  ("content-encoding", "snappy"),
  ("X-Prometheus-Remote-Write-Version", "0.1.0"),
];

// Metric kinds are encoded into metric names by convention, first match wins. See
// https://prometheus.io/docs/practices/naming/ and
// https://prometheus.io/docs/concepts/metric_types/
//
// _sum is intentionally absent. It acts mostly like a counter but can contain negative
// observations, so it is sent as a gauge along with everything else.
const METRIC_KIND_SUFFIXES: &[(&str, MetricKind)] = &[
  // _total is the naming convention for counters.
  ("_total", MetricKind::Counter),
  // Cumulative counters for histogram observation buckets, <basename>_bucket{le="..."}.
  ("_bucket", MetricKind::Counter),
  // Count of observed events, <basename>_count.
  ("_count", MetricKind::Counter),
];

#[must_use]
pub fn classify_metric_name(name: &str) -> MetricKind {
  METRIC_KIND_SUFFIXES
    .iter()
    .find(|(suffix, _)| name.ends_with(suffix))
    .map_or(MetricKind::Gauge, |(_, kind)| *kind)
}

// Build dimensions from wire labels. Labels are not guaranteed unique on the wire; when a name
// repeats, the last occurrence in wire order wins.
#[must_use]
pub fn labels_to_dimensions(labels: Vec<Label>) -> Dimensions {
  labels
    .into_iter()
    .map(|label| (label.name, label.value))
    .collect()
}

// Remove the metric name from the dimensions so that name and dimensions never overlap. Returns
// None if the label is not present. An empty name is returned as is and left to the caller.
pub fn take_metric_name(dimensions: &mut Dimensions) -> Option<String> {
  dimensions.remove(METRIC_NAME_LABEL)
}

//
// SampleRejection
//

#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleRejection {
  #[error("sample value is NaN")]
  NaN,
  #[error("sample value is infinite")]
  Infinite,
}

pub fn sample_to_datapoint(
  sample: &Sample,
  metric: &Arc<str>,
  dimensions: &Arc<Dimensions>,
  kind: MetricKind,
) -> Result<Datapoint, SampleRejection> {
  if sample.value.is_nan() {
    return Err(SampleRejection::NaN);
  }
  if sample.value.is_infinite() {
    return Err(SampleRejection::Infinite);
  }

  Ok(Datapoint::new(
    metric.clone(),
    dimensions.clone(),
    DatapointValue::from_f64(sample.value),
    kind,
    millis_to_nanos(sample.timestamp),
  ))
}

//
// Conversion
//

// The result of converting a write request, along with tallies of everything that was dropped.
// Each input sample ends up in exactly one of these.
#[derive(Debug, Default)]
pub struct Conversion {
  pub datapoints: Vec<Datapoint>,
  pub nan_samples: u64,
  pub infinite_samples: u64,
  pub missing_name_samples: u64,
}

impl Conversion {
  fn add_timeseries(&mut self, timeseries: TimeSeries) {
    let mut dimensions = labels_to_dimensions(timeseries.labels);
    let metric: Arc<str> = match take_metric_name(&mut dimensions) {
      Some(name) if !name.is_empty() => name.into(),
      _ => {
        self.missing_name_samples += timeseries.samples.len() as u64;
        return;
      },
    };
    let kind = classify_metric_name(&metric);
    let dimensions = Arc::new(dimensions);

    for sample in &timeseries.samples {
      match sample_to_datapoint(sample, &metric, &dimensions, kind) {
        Ok(datapoint) => self.datapoints.push(datapoint),
        Err(SampleRejection::NaN) => self.nan_samples += 1,
        Err(SampleRejection::Infinite) => self.infinite_samples += 1,
      }
    }
  }
}

#[must_use]
pub fn write_request_to_datapoints(write_request: WriteRequest) -> Conversion {
  let total_samples = write_request
    .timeseries
    .iter()
    .map(|timeseries| timeseries.samples.len())
    .sum();
  let mut conversion = Conversion {
    datapoints: Vec::with_capacity(total_samples),
    ..Default::default()
  };
  for timeseries in write_request.timeseries {
    conversion.add_timeseries(timeseries);
  }
  conversion
}

#[must_use]
pub fn make_label(name: &str, value: &str) -> Label {
  Label {
    name: name.to_string(),
    value: value.to_string(),
    ..Default::default()
  }
}

// Build a series. The name label is appended after the other labels when present.
#[must_use]
pub fn make_timeseries(
  name: Option<&str>,
  labels: &[(&str, &str)],
  samples: &[(f64, i64)],
) -> TimeSeries {
  let mut labels: Vec<Label> = labels
    .iter()
    .map(|(name, value)| make_label(name, value))
    .collect();
  if let Some(name) = name {
    labels.push(make_label(METRIC_NAME_LABEL, name));
  }
  TimeSeries {
    labels,
    samples: samples
      .iter()
      .map(|(value, timestamp)| Sample {
        value: *value,
        timestamp: *timestamp,
        ..Default::default()
      })
      .collect(),
    ..Default::default()
  }
}

pub fn compress_write_request(write_request: &WriteRequest) -> anyhow::Result<Vec<u8>> {
  let proto_encoded = write_request.write_to_bytes()?;
  let proto_compressed = snap::raw::Encoder::new().compress_vec(&proto_encoded)?;
  log::debug!(
    "compressed WriteRequest {} bytes to {} bytes",
    proto_encoded.len(),
    proto_compressed.len()
  );
  Ok(proto_compressed)
}
