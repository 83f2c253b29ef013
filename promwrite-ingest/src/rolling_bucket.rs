// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./rolling_bucket_test.rs"]
mod rolling_bucket_test;

use crate::pipeline::time::TimeProvider;
use crate::protos::datapoint::{Datapoint, DatapointValue, Dimensions, MetricKind};
use parking_lot::Mutex;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro128StarStar;
use std::cell::RefCell;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub const DEFAULT_BUCKET_WIDTH: Duration = Duration::seconds(10);
pub const DEFAULT_RESERVOIR_SIZE: u32 = 1024;

const QUANTILES: &[(f64, &str)] = &[(0.5, "p50"), (0.9, "p90"), (0.99, "p99")];

//
// Reservoir
//

// Basic reservoir sampling adapted from statsrelay. The reservoir keeps a maximum number of
// samples per window. Extra samples randomly replace existing ones with a chance that decreases
// as the number of overall samples increases.
struct Reservoir {
  samples: Vec<f64>,
  seen: u64,
  size: u32,
}

impl Reservoir {
  fn new(size: u32) -> Self {
    let size = size.max(1);
    Self {
      samples: Vec::with_capacity(size as usize),
      seen: 0,
      size,
    }
  }

  fn add(&mut self, value: f64) {
    thread_local! {
      // Fast non crypto rng.
      static RANDOM: RefCell<Xoshiro128StarStar> =
        RefCell::new(Xoshiro128StarStar::seed_from_u64(rand::random()));
    }

    // Do an initial fill if we haven't filled the full reservoir.
    if self.samples.len() < self.size as usize {
      self.samples.push(value);
    } else {
      let idx = RANDOM.with(|r| r.borrow_mut().next_u64()) % (self.seen + 1);
      if idx < u64::from(self.size) {
        #[allow(clippy::cast_possible_truncation)]
        let idx = idx as usize;
        self.samples[idx] = value;
      }
    }
    self.seen += 1;
  }
}

//
// Window
//

struct Window {
  started_at: OffsetDateTime,
  min: f64,
  max: f64,
  reservoir: Reservoir,
}

impl Window {
  fn new(started_at: OffsetDateTime, reservoir_size: u32) -> Self {
    Self {
      started_at,
      min: f64::INFINITY,
      max: f64::NEG_INFINITY,
      reservoir: Reservoir::new(reservoir_size),
    }
  }

  fn add(&mut self, value: f64) {
    self.min = self.min.min(value);
    self.max = self.max.max(value);
    self.reservoir.add(value);
  }

  fn snapshot(&self) -> WindowSnapshot {
    let mut sorted = self.reservoir.samples.clone();
    sorted.sort_unstable_by(f64::total_cmp);
    WindowSnapshot {
      min: self.min,
      max: self.max,
      sorted,
    }
  }
}

//
// WindowSnapshot
//

// A finished window, with the reservoir sorted for quantile lookup.
#[derive(Clone, Default)]
struct WindowSnapshot {
  min: f64,
  max: f64,
  sorted: Vec<f64>,
}

impl WindowSnapshot {
  // Nearest rank quantile.
  fn quantile(&self, quantile: f64) -> f64 {
    #[allow(
      clippy::cast_precision_loss,
      clippy::cast_sign_loss,
      clippy::cast_possible_truncation
    )]
    let rank = (quantile * self.sorted.len() as f64).ceil() as usize;
    self.sorted[rank.clamp(1, self.sorted.len()) - 1]
  }
}

//
// BucketState
//

struct BucketState {
  count: u64,
  sum: f64,
  sum_of_squares: f64,
  current: Window,
  last_completed: Option<WindowSnapshot>,
}

impl BucketState {
  fn maybe_roll(&mut self, now: OffsetDateTime, bucket_width: Duration, reservoir_size: u32) {
    let elapsed = now - self.current.started_at;
    if elapsed < bucket_width {
      return;
    }

    let finished = std::mem::replace(&mut self.current, Window::new(now, reservoir_size));
    // If more than one width passed, the most recent completed window saw nothing.
    self.last_completed = Some(if elapsed < bucket_width * 2 {
      finished.snapshot()
    } else {
      WindowSnapshot::default()
    });
  }
}

//
// RollingBucket
//

// A concurrently updated distribution. Count, sum and sum of squares are cumulative for the life
// of the bucket. Min, max and quantiles are reported for the most recently completed window, or
// for the current window if none has completed yet.
pub struct RollingBucket {
  name: String,
  bucket_width: Duration,
  reservoir_size: u32,
  time_provider: Arc<dyn TimeProvider>,
  state: Mutex<BucketState>,
}

impl RollingBucket {
  #[must_use]
  pub fn new(
    name: impl Into<String>,
    bucket_width: Duration,
    reservoir_size: u32,
    time_provider: Arc<dyn TimeProvider>,
  ) -> Self {
    let now = time_provider.now_utc();
    Self {
      name: name.into(),
      bucket_width,
      reservoir_size,
      time_provider,
      state: Mutex::new(BucketState {
        count: 0,
        sum: 0.0,
        sum_of_squares: 0.0,
        current: Window::new(now, reservoir_size),
        last_completed: None,
      }),
    }
  }

  pub fn add(&self, value: f64) {
    let now = self.time_provider.now_utc();
    let mut state = self.state.lock();
    state.maybe_roll(now, self.bucket_width, self.reservoir_size);
    state.count += 1;
    state.sum += value;
    state.sum_of_squares += value * value;
    state.current.add(value);
  }

  #[must_use]
  pub fn count(&self) -> u64 {
    self.state.lock().count
  }

  #[must_use]
  pub fn sum(&self) -> f64 {
    self.state.lock().sum
  }

  #[must_use]
  pub fn datapoints(&self) -> Vec<Datapoint> {
    let now = self.time_provider.now_utc();
    let (count, sum, sum_of_squares, snapshot) = {
      let mut state = self.state.lock();
      state.maybe_roll(now, self.bucket_width, self.reservoir_size);
      let snapshot = state
        .last_completed
        .clone()
        .unwrap_or_else(|| state.current.snapshot());
      (state.count, state.sum, state.sum_of_squares, snapshot)
    };

    let timestamp = now.unix_timestamp_nanos();
    let dimensions = Arc::new(Dimensions::new());
    let make = |suffix: &str, value, kind| {
      Datapoint::new(
        format!("{}.{suffix}", self.name).into(),
        dimensions.clone(),
        value,
        kind,
        timestamp,
      )
    };

    let mut datapoints = vec![
      make(
        "count",
        DatapointValue::Int(i64::try_from(count).unwrap_or(i64::MAX)),
        MetricKind::CumulativeCounter,
      ),
      make(
        "sum",
        DatapointValue::Float(sum),
        MetricKind::CumulativeCounter,
      ),
      make(
        "sumsquare",
        DatapointValue::Float(sum_of_squares),
        MetricKind::CumulativeCounter,
      ),
    ];

    if !snapshot.sorted.is_empty() {
      datapoints.push(make(
        "min",
        DatapointValue::Float(snapshot.min),
        MetricKind::Gauge,
      ));
      datapoints.push(make(
        "max",
        DatapointValue::Float(snapshot.max),
        MetricKind::Gauge,
      ));
      for (quantile, suffix) in QUANTILES {
        datapoints.push(make(
          *suffix,
          DatapointValue::Float(snapshot.quantile(*quantile)),
          MetricKind::Gauge,
        ));
      }
    }

    datapoints
  }
}
