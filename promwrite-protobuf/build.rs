// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use protobuf_codegen::Customize;
use std::path::{Path, PathBuf};

fn collect_inputs(root_path: &Path, partial_path: &Path, inputs: &mut Vec<PathBuf>) {
  for file in std::fs::read_dir(root_path.join(partial_path)).unwrap() {
    let file = file.unwrap();
    if file.file_type().unwrap().is_dir() {
      collect_inputs(root_path, &partial_path.join(file.file_name()), inputs);
    } else if file.file_type().unwrap().is_file() {
      inputs.push(file.path());
    }
  }
}

fn main() {
  println!("cargo:rerun-if-changed=proto/");

  let mut inputs = Vec::new();
  collect_inputs(Path::new("proto"), Path::new(""), &mut inputs);

  // The pure parser is used so that building does not depend on a system protoc.
  protobuf_codegen::Codegen::new()
    .pure()
    .customize(Customize::default().gen_mod_rs(true))
    .include("proto")
    .inputs(inputs)
    .cargo_out_dir("protos")
    .run_from_script();
}
