// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./meta_stats_test.rs"]
mod meta_stats_test;

use crate::pipeline::DatapointSink;
use crate::pipeline::inflow::prom_remote_write::PromRemoteWriteDecoder;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

//
// MetaStatsEmitter
//

// Periodically forwards the decoder's own datapoints to a sink.
pub struct MetaStatsEmitter {
  decoder: Arc<PromRemoteWriteDecoder>,
  sink: Arc<dyn DatapointSink>,
  flush_interval: Duration,
  shutdown: watch::Receiver<bool>,
}

impl MetaStatsEmitter {
  #[must_use]
  pub fn new(
    decoder: Arc<PromRemoteWriteDecoder>,
    sink: Arc<dyn DatapointSink>,
    flush_interval: Duration,
    shutdown: watch::Receiver<bool>,
  ) -> Self {
    Self {
      decoder,
      sink,
      flush_interval,
      shutdown,
    }
  }

  async fn send_meta_stats(&self) {
    let datapoints = self.decoder.datapoints();
    debug!("flushing {} meta stat datapoint(s)", datapoints.len());
    if let Err(e) = self.sink.add_datapoints(datapoints).await {
      warn!("error writing meta stats to sink due to: {e}");
    }
  }

  pub async fn run(self) {
    let mut shutdown = self.shutdown.clone();
    let mut interval =
      tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        () = async {
          let _ignored = shutdown.wait_for(|shutdown| *shutdown).await;
        } => break,
        _ = interval.tick() => self.send_meta_stats().await,
      }
    }

    // Do a final flush at shutdown.
    self.send_meta_stats().await;
  }
}
