// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the machine-e2e verifier.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Namespace used when a manifest does not set one
pub const DEFAULT_NAMESPACE: &str = "kube-system";

// ============================================================================
// Polling Constants
// ============================================================================

/// Interval between two evaluations of a poll condition (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Overall time budget for each poll step (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

// ============================================================================
// Kubernetes Client Constants
// ============================================================================

/// Connect timeout for the Kubernetes client (seconds)
pub const KUBE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Read timeout for the Kubernetes client (seconds)
pub const KUBE_READ_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Scenario Constants
// ============================================================================

/// Template label set on the deployment to trigger a rolling update
pub const TEST_UPDATE_LABEL: &str = "testUpdate";

/// Value of [`TEST_UPDATE_LABEL`]
pub const TEST_UPDATE_LABEL_VALUE: &str = "true";

/// Node condition type that signals readiness
pub const NODE_CONDITION_READY: &str = "Ready";

/// Condition status value for a satisfied condition
pub const CONDITION_STATUS_TRUE: &str = "True";

// ============================================================================
// HTTP Status Codes
// ============================================================================

/// Resource not found
pub const HTTP_NOT_FOUND: u16 = 404;

/// Write rejected because the resource version is stale
pub const HTTP_CONFLICT: u16 = 409;

/// Rate limited by the API server
pub const HTTP_TOO_MANY_REQUESTS: u16 = 429;
