// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all scenarios.
//!
//! A [`Context`] bundles the Kubernetes client with the poll settings every wait
//! in a scenario uses, and hands out typed API handles for the resources the
//! scenarios touch.

use k8s_openapi::api::core::v1::Node;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::constants::{KUBE_CONNECT_TIMEOUT_SECS, KUBE_READ_TIMEOUT_SECS};
use crate::crd::{Machine, MachineDeployment, MachineSet};
use crate::errors::{Result, VerifyError};
use crate::poll::PollSettings;

/// Shared context passed to all scenarios.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Interval and deadline for every wait
    pub poll: PollSettings,
}

impl Context {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client, poll: PollSettings) -> Self {
        Self { client, poll }
    }

    /// Build a context from a kubeconfig file.
    ///
    /// `None` falls back to the default inference chain (`KUBECONFIG`,
    /// `~/.kube/config`, in-cluster service account).
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Manifest`] when the kubeconfig cannot be read, or the
    /// client construction error.
    pub async fn from_kubeconfig(path: Option<&Path>, poll: PollSettings) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!(kubeconfig = %path.display(), "Loading kubeconfig");
                let kubeconfig =
                    Kubeconfig::read_from(path).map_err(|e| VerifyError::Manifest {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| VerifyError::Manifest {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })?
            }
            None => Config::infer()
                .await
                .map_err(|e| VerifyError::UnexpectedState(format!("no kubeconfig found: {e}")))?,
        };

        config.connect_timeout = Some(Duration::from_secs(KUBE_CONNECT_TIMEOUT_SECS));
        config.read_timeout = Some(Duration::from_secs(KUBE_READ_TIMEOUT_SECS));

        let client = Client::try_from(config)?;
        debug!("Kubernetes client initialized successfully");

        Ok(Self::new(client, poll))
    }

    /// `MachineDeployment` API in `namespace`
    #[must_use]
    pub fn machine_deployments(&self, namespace: &str) -> Api<MachineDeployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// `MachineSet` API in `namespace`
    #[must_use]
    pub fn machine_sets(&self, namespace: &str) -> Api<MachineSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// `Machine` API in `namespace`
    #[must_use]
    pub fn machines(&self, namespace: &str) -> Api<Machine> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Cluster-scoped `Node` API
    #[must_use]
    pub fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
