// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::admin::stats::DecoderStats;
use crate::pipeline::DatapointSink;
use crate::pipeline::config::PromRemoteWriteConfig;
use crate::pipeline::inflow::prom_remote_write::PromRemoteWriteDecoder;
use crate::pipeline::time::TestTimeProvider;
use crate::protos::prom::compress_write_request;
use crate::rolling_bucket::DEFAULT_BUCKET_WIDTH;
use promwrite_protobuf::prompb::{TimeSeries, WriteRequest};
use std::sync::Arc;

#[must_use]
pub fn make_write_request(timeseries: Vec<TimeSeries>) -> WriteRequest {
  WriteRequest {
    timeseries,
    ..Default::default()
  }
}

#[must_use]
pub fn make_body(timeseries: Vec<TimeSeries>) -> Vec<u8> {
  compress_write_request(&make_write_request(timeseries)).unwrap()
}

//
// DecoderHelper
//

// A decoder wired to a test clock and a private registry.
pub struct DecoderHelper {
  pub decoder: Arc<PromRemoteWriteDecoder>,
  pub registry: prometheus::Registry,
  pub time_provider: Arc<TestTimeProvider>,
}

impl DecoderHelper {
  #[must_use]
  pub fn new(config: &PromRemoteWriteConfig, sink: Arc<dyn DatapointSink>) -> Self {
    let registry = prometheus::Registry::new();
    let time_provider = Arc::new(TestTimeProvider::default());
    let stats = DecoderStats::new(&registry, time_provider.clone(), DEFAULT_BUCKET_WIDTH).unwrap();
    Self {
      decoder: Arc::new(PromRemoteWriteDecoder::new(config, sink, stats)),
      registry,
      time_provider,
    }
  }
}
