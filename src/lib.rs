// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # machine-e2e - MachineDeployment rolling-update verification
//!
//! machine-e2e drives a `MachineDeployment` (`cluster.k8s.io/v1alpha1`) through its
//! lifecycle against a live control plane and checks that the external machine
//! controller converges at every step.
//!
//! ## Overview
//!
//! The rolling-update scenario:
//!
//! - creates a deployment with one replica and waits for a ready node
//! - changes the machine template to trigger a rolling update
//! - waits for a second `MachineSet`, its machine, and that machine's ready node
//! - waits for the old `MachineSet` to scale to zero and release its machine
//! - scales the deployment to zero, deletes it, and waits for it to disappear
//!
//! ## Modules
//!
//! - [`crd`] - Client-side models of the machine resources
//! - [`context`] - Kubernetes client and poll settings shared by scenarios
//! - [`poll`] - Bounded fixed-interval polling
//! - [`retry`] - Backoff for transient API errors and write conflicts
//! - [`selector`] - Ownership and node readiness lookups
//! - [`manifest`] - Manifest loading with placeholder substitution
//! - [`scenarios`] - The end-to-end scenarios
//!
//! ## Example
//!
//! ```rust,no_run
//! use machine_e2e::context::Context;
//! use machine_e2e::manifest::{load_machine_deployment, parse_parameters};
//! use machine_e2e::poll::PollSettings;
//! use machine_e2e::scenarios::verify_create_update_and_delete;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), machine_e2e::errors::VerifyError> {
//! let ctx = Context::from_kubeconfig(None, PollSettings::default()).await?;
//! let params = parse_parameters(&["<< OS_NAME >>=ubuntu".to_string()])?;
//! let md = load_machine_deployment(Path::new("machinedeployment.yaml"), &params).await?;
//!
//! verify_create_update_and_delete(&ctx, md).await?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod manifest;
pub mod poll;
pub mod retry;
pub mod scenarios;
pub mod selector;
