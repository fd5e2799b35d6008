// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for verification scenarios.
//!
//! Kubernetes API errors are carried through unchanged or wrapped with the name
//! of the object being written. Poll deadlines surface as [`VerifyError::Timeout`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::constants::HTTP_NOT_FOUND;

/// Errors raised while driving a scenario against the control plane.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Kubernetes API call failed
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// A poll condition did not hold before the deadline
    #[error("timed out after {timeout:?} waiting for {description}")]
    Timeout {
        /// What the poll was waiting for
        description: String,
        /// The deadline that elapsed
        timeout: Duration,
    },

    /// Manifest could not be read or decoded
    #[error("failed to load manifest {path}: {reason}")]
    Manifest {
        /// Manifest file path
        path: PathBuf,
        /// Read or decode failure
        reason: String,
    },

    /// Substitution parameter is not of the form `placeholder=value`
    #[error("invalid parameter '{0}', expected <placeholder>=<value>")]
    InvalidParameter(String),

    /// The control plane returned objects in a shape the scenario cannot continue from
    #[error("unexpected state: {0}")]
    UnexpectedState(String),

    /// A `MachineDeployment` was created but never reached its desired machines
    #[error("failed to verify creation of MachineDeployment {name}: {source}")]
    Create {
        /// Deployment name
        name: String,
        /// Underlying failure
        #[source]
        source: Box<VerifyError>,
    },

    /// Updating a `MachineDeployment` failed
    #[error("failed to update MachineDeployment {name}: {source}")]
    Update {
        /// Deployment name
        name: String,
        /// Underlying failure
        #[source]
        source: Box<VerifyError>,
    },

    /// Deleting a `MachineDeployment` failed
    #[error("failed to delete MachineDeployment {name}: {source}")]
    Delete {
        /// Deployment name
        name: String,
        /// Underlying API failure
        #[source]
        source: kube::Error,
    },
}

impl VerifyError {
    /// Whether this error is the API server reporting a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(err) if is_not_found(err))
    }

    /// Whether this error is, or wraps, a poll deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Create { source, .. } | Self::Update { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Whether a Kubernetes error is a 404 Not Found from the API server.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == HTTP_NOT_FOUND)
}

/// Convenience alias used across the library
pub type Result<T, E = VerifyError> = std::result::Result<T, E>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
