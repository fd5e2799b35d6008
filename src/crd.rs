// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Client-side models of the machine API resources under test.
//!
//! The resources are owned by an external controller (`cluster.k8s.io/v1alpha1`).
//! These types mirror only the fields the verifier reads or writes; unknown fields
//! are ignored when decoding.
//!
//! # Resource Types
//!
//! - [`MachineDeployment`] - Declarative pool of machines with rolling updates
//! - [`MachineSet`] - One generation of machines produced by a deployment
//! - [`Machine`] - A single compute unit backed by a Kubernetes node
//!
//! # Example: Building a MachineDeployment
//!
//! ```rust,no_run
//! use machine_e2e::crd::{LabelSelector, MachineDeploymentSpec, MachineTemplateSpec};
//! use std::collections::BTreeMap;
//!
//! let labels = BTreeMap::from([("name".to_string(), "workers".to_string())]);
//!
//! let spec = MachineDeploymentSpec {
//!     replicas: Some(1),
//!     selector: LabelSelector {
//!         match_labels: Some(labels.clone()),
//!         match_expressions: None,
//!     },
//!     template: MachineTemplateSpec::with_labels(labels),
//!     strategy: None,
//!     min_ready_seconds: None,
//!     revision_history_limit: None,
//!     paused: None,
//!     progress_deadline_seconds: None,
//! };
//! ```

use k8s_openapi::api::core::v1::{NodeAddress, ObjectReference, Taint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector to match Kubernetes resources.
///
/// A label selector is a label query over a set of resources. The result of matchLabels and
/// matchExpressions are `ANDed`. An empty label selector matches all objects.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. A single {key,value} in the matchLabels map is equivalent
    /// to an element of matchExpressions, whose key field is "key", the operator is "In",
    /// and the values array contains only "value". All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key, and an operator
/// that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values.
    /// Valid operators are In, `NotIn`, Exists and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. If the operator is In or `NotIn`,
    /// the values array must be non-empty. If the operator is Exists or `DoesNotExist`,
    /// the values array must be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl LabelSelector {
    /// Whether the selector has neither labels nor expressions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
            && self.match_expressions.as_ref().is_none_or(Vec::is_empty)
    }

    /// Check whether a label set satisfies this selector.
    ///
    /// Unknown operators never match.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let labels_match = self.match_labels.as_ref().is_none_or(|wanted| {
            wanted
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
        });

        labels_match
            && self
                .match_expressions
                .as_ref()
                .is_none_or(|exprs| exprs.iter().all(|expr| expr.matches(labels)))
    }
}

impl LabelSelectorRequirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let values = self.values.as_deref().unwrap_or_default();
        match self.operator.as_str() {
            "In" => labels.get(&self.key).is_some_and(|v| values.contains(v)),
            "NotIn" => labels.get(&self.key).is_none_or(|v| !values.contains(v)),
            "Exists" => labels.contains_key(&self.key),
            "DoesNotExist" => !labels.contains_key(&self.key),
            _ => false,
        }
    }
}

/// Provider-specific machine configuration, passed through untouched.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Inline provider configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Reference to a source the provider configuration is read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<serde_json::Value>,
}

/// Kubernetes component versions a machine runs.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineVersionInfo {
    /// Kubelet version.
    pub kubelet: String,

    /// Control plane version, set only on control plane machines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<String>,
}

/// Desired state of a single [`Machine`].
///
/// Machine is one compute unit; once provisioned, `status.nodeRef` names its node.
/// The same spec is embedded in [`MachineTemplateSpec`].
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "Machine",
    namespaced,
    shortname = "ma",
    doc = "Machine represents a single compute instance that joins the cluster as a node."
)]
#[kube(status = "MachineStatus")]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Metadata propagated to the node backing this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    /// Taints applied to the node backing this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,

    /// Cloud provider configuration.
    #[serde(default)]
    pub provider_spec: ProviderSpec,

    /// Kubernetes versions to install.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<MachineVersionInfo>,

    /// Dynamic kubelet config source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_source: Option<serde_json::Value>,

    /// Provider-assigned identifier of the instance.
    #[serde(rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Template from which machine sets and machines are stamped out.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    /// Labels and annotations copied onto each machine.
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Spec of each machine.
    #[serde(default)]
    pub spec: MachineSpec,
}

impl MachineTemplateSpec {
    /// Template whose machines carry the given labels and an empty spec.
    #[must_use]
    pub fn with_labels(labels: BTreeMap<String, String>) -> Self {
        Self {
            metadata: ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            },
            spec: MachineSpec::default(),
        }
    }
}

/// Rolling update parameters; integers or percentages.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineRollingUpdateDeployment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<serde_json::Value>,
}

/// How a deployment replaces old machines with new ones.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentStrategy {
    /// Only `RollingUpdate` is supported upstream.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<MachineRollingUpdateDeployment>,
}

/// MachineDeployment describes a pool of identical machines that is rolled over
/// to a new [`MachineSet`] whenever its template changes.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "MachineDeployment",
    namespaced,
    shortname = "md",
    doc = "MachineDeployment rolls out machines from a template through successive MachineSets."
)]
#[kube(status = "MachineDeploymentStatus")]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    /// Number of desired machines. Defaults to 1 when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Label selector for machines owned by this deployment.
    pub selector: LabelSelector,

    /// Template describing the machines that will be created.
    pub template: MachineTemplateSpec,

    /// Replacement strategy for existing machines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MachineDeploymentStrategy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ready_seconds: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_deadline_seconds: Option<i32>,
}

/// Observed state of a [`MachineDeployment`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_replicas: Option<i32>,
}

/// MachineSet keeps a stable number of machines from one template generation.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "MachineSet",
    namespaced,
    shortname = "ms",
    doc = "MachineSet keeps a replica count of machines created from a single template."
)]
#[kube(status = "MachineSetStatus")]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    /// Number of desired machines. Defaults to 1 when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ready_seconds: Option<i32>,

    /// Which machines are removed first when scaling down (`Random`, `Newest`, `Oldest`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_policy: Option<String>,

    pub selector: LabelSelector,

    #[serde(default)]
    pub template: MachineTemplateSpec,
}

/// Observed state of a [`MachineSet`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetStatus {
    #[serde(default)]
    pub replicas: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_labeled_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Observed state of a [`Machine`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Node that joined the cluster for this machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<ObjectReference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<MachineVersionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<NodeAddress>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl MachineDeployment {
    /// Desired replica count, applying the upstream default of 1.
    #[must_use]
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }
}

impl MachineSet {
    /// Desired replica count, applying the upstream default of 1.
    #[must_use]
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
