// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::protos::datapoint::Datapoint;
use async_trait::async_trait;
use mockall::automock;

pub mod config;
pub mod inflow;
pub mod outflow;
pub mod time;

//
// DatapointSink
//

// The downstream target for converted batches. A batch is handed over as a single unit and the
// sink owns any delivery or retry behavior. Callers bound the call with a timeout and may drop the
// returned future, which abandons the forward.
#[automock]
#[async_trait]
pub trait DatapointSink: Send + Sync {
  async fn add_datapoints(&self, datapoints: Vec<Datapoint>) -> anyhow::Result<()>;
}
