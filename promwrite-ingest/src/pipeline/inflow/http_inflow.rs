// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./http_inflow_test.rs"]
mod http_inflow_test;

use super::prom_remote_write::PromRemoteWriteDecoder;
use crate::pipeline::config::{HEALTHCHECK_PATH, METRICS_PATH, PromRemoteWriteConfig};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use http::StatusCode;
use http::header::CONTENT_TYPE;
use log::{info, warn};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use promwrite_common::bind_resolver::{BindResolver, BoundTcpSocket};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

//
// Stats
//

struct Stats {
  requests_total: IntCounter,
  requests_4xx: IntCounter,
  requests_5xx: IntCounter,
}

impl Stats {
  fn new(registry: &Registry) -> anyhow::Result<Self> {
    let counter = |name: &str, help: &str| -> anyhow::Result<IntCounter> {
      let counter = IntCounter::new(name, help)?;
      registry.register(Box::new(counter.clone()))?;
      Ok(counter)
    };

    Ok(Self {
      requests_total: counter("requests_total", "Remote write requests received")?,
      requests_4xx: counter("requests_4xx", "Remote write requests answered with a 4xx")?,
      requests_5xx: counter("requests_5xx", "Remote write requests answered with a 5xx")?,
    })
  }
}

//
// DecodeError
//

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
  #[error("snappy decode error: {0}")]
  SnappyDecode(#[from] snap::Error),
  #[error("protobuf decode error: {0}")]
  ProtobufDecode(#[from] protobuf::Error),
}

//
// HttpInflow
//

struct InflowState {
  stats: Stats,
  decoder: Arc<PromRemoteWriteDecoder>,
  registry: Registry,
}

// HTTP front end for a decoder. Serves the write path plus health and metrics endpoints.
pub struct HttpInflow {
  state: Arc<InflowState>,
  path: String,
  socket: BoundTcpSocket,
}

impl HttpInflow {
  pub async fn new(
    config: &PromRemoteWriteConfig,
    decoder: Arc<PromRemoteWriteDecoder>,
    registry: Registry,
    bind_resolver: &dyn BindResolver,
  ) -> anyhow::Result<Self> {
    config.validate()?;
    let stats = Stats::new(&registry)?;
    let socket = bind_resolver.resolve_tcp(&config.bind).await?;
    Ok(Self {
      state: Arc::new(InflowState {
        stats,
        decoder,
        registry,
      }),
      path: config.path.clone(),
      socket,
    })
  }

  #[must_use]
  pub fn local_addr(&self) -> SocketAddr {
    self.socket.local_addr()
  }

  // Start serving. The server stops accepting new connections once shutdown is signalled and the
  // returned task completes when in flight requests have drained.
  pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let router = Router::new()
      .route(HEALTHCHECK_PATH, get(|| async { "OK" }))
      .route(METRICS_PATH, get(metrics_handler))
      .route(&self.path, post(remote_write_handler))
      .layer(DefaultBodyLimit::disable())
      .with_state(self.state);

    let local_addr = self.socket.local_addr();
    info!("remote write server starting at {local_addr}");
    let listener = self.socket.listen();
    tokio::spawn(async move {
      let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
          let _ignored = shutdown.wait_for(|shutdown| *shutdown).await;
        })
        .await;
      if let Err(e) = result {
        warn!("remote write server at {local_addr} failed: {e}");
      }
      info!("terminated remote write server running at {local_addr}");
    })
  }
}

pub fn make_error_response(status: StatusCode, message: String) -> Response {
  Response::builder()
    .status(status)
    .body(message.into())
    .expect("status and string body always build")
}

async fn remote_write_handler(State(state): State<Arc<InflowState>>, req: Request) -> Response {
  state.stats.requests_total.inc();
  match state.decoder.ingest(req.into_body()).await {
    Ok(_) => StatusCode::OK.into_response(),
    Err(e) => {
      let status = e.status_code();
      if status.is_client_error() {
        state.stats.requests_4xx.inc();
      } else {
        state.stats.requests_5xx.inc();
      }
      make_error_response(status, e.to_string())
    },
  }
}

async fn metrics_handler(State(state): State<Arc<InflowState>>) -> Response {
  let encoder = TextEncoder::new();
  match encoder.encode_to_string(&state.registry.gather()) {
    Ok(body) => ([(CONTENT_TYPE, encoder.format_type().to_string())], body).into_response(),
    Err(e) => make_error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
  }
}
