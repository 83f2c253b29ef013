// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::DatapointSink;
use crate::protos::datapoint::Datapoint;
use async_trait::async_trait;
use log::{debug, info, log_enabled};

//
// LoggingSink
//

// Sink that writes every batch to the log. Never fails.
#[derive(Default)]
pub struct LoggingSink {}

#[async_trait]
impl DatapointSink for LoggingSink {
  async fn add_datapoints(&self, datapoints: Vec<Datapoint>) -> anyhow::Result<()> {
    info!("received batch of {} datapoint(s)", datapoints.len());
    if log_enabled!(log::Level::Debug) {
      for datapoint in &datapoints {
        debug!("{datapoint}");
      }
    }
    Ok(())
  }
}
