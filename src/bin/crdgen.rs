// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates CRD YAML files for the machine resources from the Rust types in
//! src/crd.rs, so a bare test cluster can serve the API the scenarios talk to.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use kube::CustomResourceExt;
use machine_e2e::crd::{Machine, MachineDeployment, MachineSet};
use serde_json::Value;
use std::fs;
use std::path::Path;

const GENERATED_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<MachineDeployment>("machinedeployments.crd.yaml", output_dir)?;
    generate_crd::<MachineSet>("machinesets.crd.yaml", output_dir)?;
    generate_crd::<Machine>("machines.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let crd = T::crd();

    let mut crd_json: Value = serde_json::to_value(&crd)?;

    // The controller under test owns scaling; expose the scale and status
    // subresources it writes through.
    if let Some(versions) = crd_json["spec"]["versions"].as_array_mut() {
        for version in versions {
            version["subresources"]["status"] = Value::Object(serde_json::Map::new());
            if filename != "machines.crd.yaml" {
                version["subresources"]["scale"] = serde_json::json!({
                    "specReplicasPath": ".spec.replicas",
                    "statusReplicasPath": ".status.replicas",
                });
            }
        }
    }

    let yaml = serde_yaml::to_string(&crd_json)?;
    let content = format!("{GENERATED_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
