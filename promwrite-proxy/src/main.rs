// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use anyhow::Context;
use clap::Parser;
use log::info;
use promwrite_common::bind_resolver::RealBindResolver;
use promwrite_common::global_initialize;
use promwrite_ingest::pipeline::outflow::LoggingSink;
use promwrite_proxy::run_server;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};

#[derive(Parser, Debug, Clone)]
struct Options {
  #[arg(short = 'c', long = "config")]
  pub config: String,

  #[arg(long = "config-check-and-exit")]
  pub config_check: bool,
}

struct NullHooks {}

#[async_trait::async_trait]
impl promwrite_proxy::ServerHooks for NullHooks {
  async fn server_started(&self, _local_addr: SocketAddr) {}
}

fn main() -> anyhow::Result<()> {
  global_initialize();
  let opts = Options::parse();

  let config = promwrite_proxy::config::load_from_file(&opts.config)
    .with_context(|| format!("can't load config file from {}", opts.config))?;
  info!("loaded config file {}", opts.config);

  let num_threads = std::thread::available_parallelism().unwrap_or_else(|_| {
    log::warn!("could not determine number of CPUs. Defaulting to 1");
    NonZeroUsize::MIN
  });
  info!("running server with {num_threads} workers");
  let runtime = tokio::runtime::Builder::new_multi_thread()
    .worker_threads(num_threads.into())
    .enable_all()
    .build()?;

  runtime.block_on(async {
    // Install the handlers before anything is served so that an early signal is not missed.
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    run_server(
      config,
      opts.config_check,
      || async move {
        // Trap ctrl+c and sigterm messages and perform a clean shutdown
        select! {
          _ = sigint.recv() => info!("received sigint"),
          _ = sigterm.recv() => info!("received sigterm"),
        }
      },
      NullHooks {},
      Arc::new(RealBindResolver {}),
      Arc::new(LoggingSink::default()),
    )
    .await
  })
}
