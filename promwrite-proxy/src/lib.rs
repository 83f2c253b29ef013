// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod config;

#[cfg(test)]
mod test;

use config::Config;
use log::info;
use prometheus::Registry;
use promwrite_common::bind_resolver::BindResolver;
use promwrite_ingest::admin::meta_stats::MetaStatsEmitter;
use promwrite_ingest::admin::stats::DecoderStats;
use promwrite_ingest::pipeline::DatapointSink;
use promwrite_ingest::pipeline::inflow::http_inflow::HttpInflow;
use promwrite_ingest::pipeline::inflow::prom_remote_write::PromRemoteWriteDecoder;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  use promwrite_common::global_initialize;

  global_initialize();
}

//
// ServerHooks
//

#[async_trait::async_trait]
pub trait ServerHooks {
  async fn server_started(&self, local_addr: SocketAddr);
}

pub async fn run_server<ShutdownFuture: Future<Output = ()>>(
  config: Config,
  config_check_only: bool,
  shutdown: impl FnOnce() -> ShutdownFuture,
  hooks: impl ServerHooks,
  bind_resolver: Arc<dyn BindResolver>,
  sink: Arc<dyn DatapointSink>,
) -> anyhow::Result<()> {
  config.validate()?;
  if config_check_only {
    info!("--config-check-and-exit set, exiting");
    return Ok(());
  }

  let registry = Registry::new();
  let decoder = Arc::new(PromRemoteWriteDecoder::new(
    &config.inflow,
    sink.clone(),
    DecoderStats::with_defaults(&registry)?,
  ));
  let inflow = HttpInflow::new(
    &config.inflow,
    decoder.clone(),
    registry,
    bind_resolver.as_ref(),
  )
  .await?;
  let local_addr = inflow.local_addr();

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let server = inflow.start(shutdown_rx.clone());

  let meta_stats = config.meta_stats.enabled.then(|| {
    let emitter = MetaStatsEmitter::new(
      decoder,
      sink,
      config.meta_stats.flush_interval,
      shutdown_rx,
    );
    info!("spawned meta stats emitter");
    tokio::spawn(emitter.run())
  });

  hooks.server_started(local_addr).await;
  shutdown().await;

  info!("shutting down");
  // Receivers are owned by the tasks below, which are still running.
  let _ignored = shutdown_tx.send(true);
  server.await?;
  if let Some(meta_stats) = meta_stats {
    meta_stats.await?;
  }
  info!("runtime terminated");
  Ok(())
}
