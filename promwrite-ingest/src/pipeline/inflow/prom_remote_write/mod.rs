// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt


use super::http_inflow::DecodeError;
use crate::admin::stats::DecoderStats;
use crate::pipeline::DatapointSink;
use crate::pipeline::config::PromRemoteWriteConfig;
use crate::protos::datapoint::Datapoint;
use crate::protos::prom::write_request_to_datapoints;
use axum::body::Body;
use http::StatusCode;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use log::{debug, warn};
use promwrite_protobuf::prompb::WriteRequest;
use protobuf::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

//
// IngestError
//

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
  #[error("failed to read body: {0}")]
  Read(BoxError),
  #[error("body exceeds limit ({0} bytes)")]
  PayloadTooLarge(usize),
  #[error("body failed to decode: {0}")]
  Decode(#[from] DecodeError),
  #[error("failed to forward datapoints: {0}")]
  SinkForward(anyhow::Error),
  #[error("request timed out after {0:?}")]
  Timeout(Duration),
}

impl IngestError {
  // Malformed payloads are the client's fault. Everything else is on our side.
  #[must_use]
  pub const fn status_code(&self) -> StatusCode {
    match self {
      Self::Decode(_) => StatusCode::BAD_REQUEST,
      Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      Self::Read(_) | Self::SinkForward(_) | Self::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

//
// InFlightRequest
//

// Tracks a single request. Latency is recorded when the request finishes however it finishes,
// and a request that never completes successfully counts as exactly one error. This includes the
// request future being dropped part way through.
struct InFlightRequest<'a> {
  stats: &'a DecoderStats,
  received_at: Instant,
  completed: bool,
}

impl<'a> InFlightRequest<'a> {
  fn new(stats: &'a DecoderStats) -> Self {
    Self {
      stats,
      received_at: Instant::now(),
      completed: false,
    }
  }

  const fn complete(&mut self) {
    self.completed = true;
  }
}

impl Drop for InFlightRequest<'_> {
  fn drop(&mut self) {
    self.stats.record_request_time(self.received_at.elapsed());
    if !self.completed {
      self.stats.record_error();
    }
  }
}

//
// PromRemoteWriteDecoder
//

// Turns remote write request bodies into datapoints and forwards each request's datapoints to the
// sink as one batch. Requests are independent and may be ingested concurrently; the only shared
// state is the stats.
pub struct PromRemoteWriteDecoder {
  sink: Arc<dyn DatapointSink>,
  stats: DecoderStats,
  request_timeout: Duration,
  max_request_bytes: usize,
}

impl PromRemoteWriteDecoder {
  #[must_use]
  pub fn new(
    config: &PromRemoteWriteConfig,
    sink: Arc<dyn DatapointSink>,
    stats: DecoderStats,
  ) -> Self {
    Self {
      sink,
      stats,
      request_timeout: config.request_timeout,
      max_request_bytes: config.max_request_bytes,
    }
  }

  #[must_use]
  pub const fn stats(&self) -> &DecoderStats {
    &self.stats
  }

  // Current self observability datapoints.
  #[must_use]
  pub fn datapoints(&self) -> Vec<Datapoint> {
    self.stats.datapoints()
  }

  // Ingest one request body. Returns the number of datapoints forwarded.
  pub async fn ingest(&self, body: Body) -> Result<usize, IngestError> {
    let mut in_flight = InFlightRequest::new(&self.stats);
    let result = tokio::time::timeout(self.request_timeout, self.ingest_inner(body))
      .await
      .unwrap_or(Err(IngestError::Timeout(self.request_timeout)));

    match &result {
      Ok(batch_size) => {
        in_flight.complete();
        debug!("remote write request produced {batch_size} datapoint(s)");
      },
      Err(e) => warn!("prometheus remote write request failed: {e}"),
    }
    result
  }

  async fn ingest_inner(&self, body: Body) -> Result<usize, IngestError> {
    let body = Limited::new(body, self.max_request_bytes)
      .collect()
      .await
      .map_err(|e| {
        if e.is::<LengthLimitError>() {
          IngestError::PayloadTooLarge(self.max_request_bytes)
        } else {
          IngestError::Read(e)
        }
      })?
      .to_bytes();

    let write_request = decode_body_into_write_request(&body)?;
    log::trace!("WriteRequest received: {write_request}");

    let conversion = write_request_to_datapoints(write_request);
    self.stats.record_conversion(&conversion);
    let batch_size = conversion.datapoints.len();
    // Recorded before the forward so that a failed forward still shows the intended size.
    self.stats.record_drain_size(batch_size);

    if batch_size > 0 {
      self
        .sink
        .add_datapoints(conversion.datapoints)
        .await
        .map_err(IngestError::SinkForward)?;
    }
    Ok(batch_size)
  }
}

pub fn decode_body_into_write_request(body: &[u8]) -> Result<WriteRequest, DecodeError> {
  let decompressed = snap::raw::Decoder::new().decompress_vec(body)?;
  debug!(
    "decompressed WriteRequest from {} bytes to {} bytes",
    body.len(),
    decompressed.len()
  );
  Ok(WriteRequest::parse_from_bytes(&decompressed)?)
}
