// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::config::Config;
use crate::{ServerHooks, run_server};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use promwrite_common::bind_resolver::RealBindResolver;
use promwrite_ingest::pipeline::MockDatapointSink;
use promwrite_ingest::pipeline::config::{MetaStatsConfig, PromRemoteWriteConfig};
use promwrite_ingest::protos::datapoint::{Datapoint, DatapointValue};
use promwrite_ingest::protos::prom::{PROM_REMOTE_WRITE_HEADERS, make_timeseries};
use promwrite_ingest::test::make_body;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

struct ChannelHooks {
  started_tx: mpsc::UnboundedSender<SocketAddr>,
}

#[async_trait::async_trait]
impl ServerHooks for ChannelHooks {
  async fn server_started(&self, local_addr: SocketAddr) {
    self.started_tx.send(local_addr).unwrap();
  }
}

fn make_config(meta_stats_enabled: bool) -> Config {
  Config {
    inflow: PromRemoteWriteConfig {
      bind: "127.0.0.1:0".to_string(),
      ..Default::default()
    },
    meta_stats: MetaStatsConfig {
      enabled: meta_stats_enabled,
      flush_interval: Duration::from_secs(3600),
    },
  }
}

fn capturing_sink() -> (MockDatapointSink, Arc<Mutex<Vec<Vec<Datapoint>>>>) {
  let batches = Arc::new(Mutex::new(Vec::new()));
  let cloned_batches = batches.clone();
  let mut sink = MockDatapointSink::new();
  sink.expect_add_datapoints().returning(move |datapoints| {
    cloned_batches.lock().push(datapoints);
    Ok(())
  });
  (sink, batches)
}

#[tokio::test]
async fn end_to_end() {
  let (sink, batches) = capturing_sink();
  let (started_tx, mut started_rx) = mpsc::unbounded_channel();
  let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

  let server = run_server(
    make_config(true),
    false,
    || async move {
      let _ignored = shutdown_rx.await;
    },
    ChannelHooks { started_tx },
    Arc::new(RealBindResolver {}),
    Arc::new(sink),
  );

  let client = async move {
    let address = started_rx.recv().await.unwrap();
    let mut request = reqwest::Client::new().post(format!("http://{address}/write"));
    for (name, value) in PROM_REMOTE_WRITE_HEADERS {
      request = request.header(*name, *value);
    }
    let response = request
      .body(make_body(vec![
        make_timeseries(Some("http_requests_total"), &[("method", "GET")], &[(5.0, 1000)]),
        make_timeseries(None, &[("method", "GET")], &[(1.0, 1000)]),
      ]))
      .send()
      .await
      .unwrap();
    assert_eq!(reqwest::StatusCode::OK, response.status());
    shutdown_tx.send(()).unwrap();
  };

  let (result, ()) = tokio::join!(server, client);
  result.unwrap();

  // The write request batch followed by the final meta stats flush.
  let batches = batches.lock();
  assert_eq!(2, batches.len());
  assert_eq!(1, batches[0].len());
  assert_eq!("http_requests_total", batches[0][0].metric());
  assert_eq!(DatapointValue::Int(5), batches[0][0].value());

  let bad_datapoints = batches[1]
    .iter()
    .find(|datapoint| datapoint.metric() == "prometheus.total_bad_datapoints")
    .unwrap();
  assert_eq!(DatapointValue::Int(1), bad_datapoints.value());
}

#[tokio::test]
async fn config_check_only() {
  let mut sink = MockDatapointSink::new();
  sink.expect_add_datapoints().never();
  let (started_tx, mut started_rx) = mpsc::unbounded_channel();

  run_server(
    make_config(true),
    true,
    std::future::pending::<()>,
    ChannelHooks { started_tx },
    Arc::new(RealBindResolver {}),
    Arc::new(sink),
  )
  .await
  .unwrap();
  assert!(started_rx.try_recv().is_err());
}

#[tokio::test]
async fn invalid_config_fails() {
  let (started_tx, _started_rx) = mpsc::unbounded_channel();
  let mut config = make_config(false);
  config.inflow.path = "/healthcheck".to_string();

  assert!(
    run_server(
      config,
      false,
      || async {},
      ChannelHooks { started_tx },
      Arc::new(RealBindResolver {}),
      Arc::new(MockDatapointSink::new()),
    )
    .await
    .is_err()
  );
}
