// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

// Generated remote write messages. The generated mod.rs declares one module per .proto file, so
// the schema in proto/prometheus/prompb.proto is reachable as `promwrite_protobuf::prompb`.
include!(concat!(env!("OUT_DIR"), "/protos/mod.rs"));
