// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::*;
use crate::pipeline::MockDatapointSink;
use crate::protos::prom::{PROM_REMOTE_WRITE_HEADERS, make_timeseries};
use crate::test::{DecoderHelper, make_body};
use pretty_assertions::assert_eq;
use promwrite_common::bind_resolver::{MockBindResolver, RealBindResolver};

struct Helper {
  address: SocketAddr,
  client: reqwest::Client,
  shutdown_tx: watch::Sender<bool>,
  server: JoinHandle<()>,
  decoder: DecoderHelper,
}

impl Helper {
  async fn new(sink: MockDatapointSink) -> Self {
    let config = PromRemoteWriteConfig {
      bind: "127.0.0.1:0".to_string(),
      ..Default::default()
    };
    let decoder = DecoderHelper::new(&config, Arc::new(sink));
    let inflow = HttpInflow::new(
      &config,
      decoder.decoder.clone(),
      decoder.registry.clone(),
      &RealBindResolver {},
    )
    .await
    .unwrap();
    let address = inflow.local_addr();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = inflow.start(shutdown_rx);

    Self {
      address,
      client: reqwest::Client::new(),
      shutdown_tx,
      server,
      decoder,
    }
  }

  async fn write(&self, body: Vec<u8>) -> (reqwest::StatusCode, String) {
    let mut request = self.client.post(format!("http://{}/write", self.address));
    for (name, value) in PROM_REMOTE_WRITE_HEADERS {
      request = request.header(*name, *value);
    }
    let response = request.body(body).send().await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
  }

  async fn get(&self, path: &str) -> (reqwest::StatusCode, String) {
    let response = self
      .client
      .get(format!("http://{}{path}", self.address))
      .send()
      .await
      .unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
  }

  async fn shutdown(self) {
    self.shutdown_tx.send(true).unwrap();
    self.server.await.unwrap();
  }
}

#[tokio::test]
async fn write_and_observe() {
  let mut sink = MockDatapointSink::new();
  sink
    .expect_add_datapoints()
    .times(1)
    .withf(|datapoints| datapoints.len() == 2)
    .returning(|_| Ok(()));
  let helper = Helper::new(sink).await;

  let (status, body) = helper
    .write(make_body(vec![make_timeseries(
      Some("http_requests_total"),
      &[("method", "GET")],
      &[(1.0, 1000), (2.0, 2000)],
    )]))
    .await;
  assert_eq!(reqwest::StatusCode::OK, status);
  assert_eq!("", body);

  let (status, body) = helper.write(b"not snappy at all".to_vec()).await;
  assert_eq!(reqwest::StatusCode::BAD_REQUEST, status);
  assert!(body.starts_with("body failed to decode"), "{body}");
  assert_eq!(1, helper.decoder.decoder.stats().total_errors());

  let (status, body) = helper.get("/healthcheck").await;
  assert_eq!(reqwest::StatusCode::OK, status);
  assert_eq!("OK", body);

  let (status, body) = helper.get("/metrics").await;
  assert_eq!(reqwest::StatusCode::OK, status);
  assert!(body.contains("requests_total 2"), "{body}");
  assert!(body.contains("requests_4xx 1"), "{body}");
  assert!(body.contains("prometheus_invalid_requests 1"), "{body}");

  helper.shutdown().await;
}

#[tokio::test]
async fn sink_failure_is_server_error() {
  let mut sink = MockDatapointSink::new();
  sink
    .expect_add_datapoints()
    .times(1)
    .returning(|_| Err(anyhow::anyhow!("downstream unavailable")));
  let helper = Helper::new(sink).await;

  let (status, body) = helper
    .write(make_body(vec![make_timeseries(
      Some("foo"),
      &[],
      &[(1.0, 1000)],
    )]))
    .await;
  assert_eq!(reqwest::StatusCode::INTERNAL_SERVER_ERROR, status);
  assert!(body.contains("downstream unavailable"), "{body}");

  let (_, body) = helper.get("/metrics").await;
  assert!(body.contains("requests_5xx 1"), "{body}");

  helper.shutdown().await;
}

#[tokio::test]
async fn wrong_method() {
  let helper = Helper::new(MockDatapointSink::new()).await;
  let (status, _) = helper.get("/write").await;
  assert_eq!(reqwest::StatusCode::METHOD_NOT_ALLOWED, status);
  helper.shutdown().await;
}

#[tokio::test]
async fn invalid_paths() {
  let decoder = DecoderHelper::new(
    &PromRemoteWriteConfig::default(),
    Arc::new(MockDatapointSink::new()),
  );
  for path in ["write", "/healthcheck", "/metrics", "/api/:tenant", "/{tenant}"] {
    let config = PromRemoteWriteConfig {
      path: path.to_string(),
      ..Default::default()
    };
    // The path is validated before anything is bound.
    let bind_resolver = MockBindResolver::new();
    assert!(
      HttpInflow::new(
        &config,
        decoder.decoder.clone(),
        prometheus::Registry::new(),
        &bind_resolver
      )
      .await
      .is_err()
    );
  }
}
