// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Print the CustomResourceDefinitions the controller serves, as one YAML stream.

use kube::CustomResourceExt;
use riff_controller::types::{Container, Function, Processor, RequestProcessor};

fn main() -> anyhow::Result<()> {
    let crds = [
        Container::crd(),
        Function::crd(),
        Processor::crd(),
        RequestProcessor::crd(),
    ];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
