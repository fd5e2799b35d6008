// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership and readiness lookups over the machine API.
//!
//! Generations are linked through controller owner references:
//! `MachineDeployment` → `MachineSet` → `Machine`, and a machine points at its
//! node through `status.nodeRef`. These helpers walk that chain with plain list
//! and get calls; nothing is cached between polls.

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::{Resource, ResourceExt};
use tracing::debug;

use crate::constants::{CONDITION_STATUS_TRUE, DEFAULT_NAMESPACE, NODE_CONDITION_READY};
use crate::context::Context;
use crate::crd::{Machine, MachineDeployment, MachineSet};
use crate::errors::{Result, VerifyError};
use crate::retry::retry_api_call;

/// Whether `meta` carries a controller owner reference pointing at `owner_uid`.
#[must_use]
pub fn is_controlled_by(meta: &ObjectMeta, owner_uid: &str) -> bool {
    meta.owner_references.as_ref().is_some_and(|refs| {
        refs.iter()
            .any(|r| r.controller == Some(true) && r.uid == owner_uid)
    })
}

/// Keep only the objects controlled by `owner_uid`.
#[must_use]
pub fn controlled_by<K: Resource>(items: Vec<K>, owner_uid: &str) -> Vec<K> {
    items
        .into_iter()
        .filter(|item| is_controlled_by(item.meta(), owner_uid))
        .collect()
}

/// UID of an object read back from the API server.
///
/// # Errors
///
/// Returns [`VerifyError::UnexpectedState`] when the object has never been persisted.
pub fn uid_of<K>(obj: &K) -> Result<String>
where
    K: Resource,
    K::DynamicType: Default,
{
    obj.meta().uid.clone().ok_or_else(|| {
        VerifyError::UnexpectedState(format!(
            "{} {} has no uid, it was not read from the API server",
            K::kind(&K::DynamicType::default()),
            obj.meta().name.as_deref().unwrap_or("<unnamed>")
        ))
    })
}

/// Namespace of an object, defaulting like the manifest loader does.
#[must_use]
pub fn namespace_of<K: Resource>(obj: &K) -> String {
    obj.meta()
        .namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

/// List the `MachineSet`s controlled by a deployment.
///
/// # Errors
///
/// Returns the list error, or [`VerifyError::UnexpectedState`] for an unpersisted deployment.
pub async fn machine_sets_for_deployment(
    ctx: &Context,
    md: &MachineDeployment,
) -> Result<Vec<MachineSet>> {
    let uid = uid_of(md)?;
    let api = ctx.machine_sets(&namespace_of(md));

    let lp = ListParams::default();
    let list = retry_api_call(|| api.list(&lp), "list machinesets").await?;
    let sets = controlled_by(list.items, &uid);

    debug!(
        machine_deployment = %md.name_any(),
        count = sets.len(),
        "Listed MachineSets of MachineDeployment"
    );
    Ok(sets)
}

/// List the `Machine`s controlled by a machine set.
///
/// # Errors
///
/// Returns the list error, or [`VerifyError::UnexpectedState`] for an unpersisted set.
pub async fn machines_for_machine_set(ctx: &Context, ms: &MachineSet) -> Result<Vec<Machine>> {
    let uid = uid_of(ms)?;
    let api = ctx.machines(&namespace_of(ms));

    let lp = ListParams::default();
    let list = retry_api_call(|| api.list(&lp), "list machines").await?;
    Ok(controlled_by(list.items, &uid))
}

/// List every `Machine` of a deployment.
///
/// A machine belongs to the deployment when one of its `MachineSet`s controls
/// it, or when its labels match the deployment's selector. The selector match
/// keeps machines visible after the deployment is deleted and its sets have
/// been garbage collected while the machines are still terminating.
///
/// # Errors
///
/// Returns the first list error.
pub async fn machines_for_deployment(
    ctx: &Context,
    md: &MachineDeployment,
) -> Result<Vec<Machine>> {
    let sets = machine_sets_for_deployment(ctx, md).await?;
    let set_uids = sets.iter().map(uid_of).collect::<Result<Vec<_>>>()?;

    let api = ctx.machines(&namespace_of(md));
    let lp = ListParams::default();
    let list = retry_api_call(|| api.list(&lp), "list machines").await?;

    Ok(list
        .items
        .into_iter()
        .filter(|m| {
            set_uids.iter().any(|uid| is_controlled_by(&m.metadata, uid))
                || selected_by(md, m)
        })
        .collect())
}

/// Whether the deployment's selector picks a machine by its labels.
///
/// An empty selector selects nothing here; it would otherwise claim every
/// machine in the namespace.
#[must_use]
pub fn selected_by(md: &MachineDeployment, machine: &Machine) -> bool {
    let selector = &md.spec.selector;
    !selector.is_empty() && selector.matches(machine.labels())
}

/// Whether a node reports the `Ready` condition as `True`.
#[must_use]
pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == NODE_CONDITION_READY && c.status == CONDITION_STATUS_TRUE)
        })
}

/// Whether a machine has joined the cluster with a ready node.
///
/// The machine is re-read so a caller holding a stale copy still sees the
/// current `nodeRef`. A machine or node that does not exist (yet) counts as
/// not ready.
///
/// # Errors
///
/// Returns API errors other than Not Found.
pub async fn machine_has_ready_node(ctx: &Context, machine: &Machine) -> Result<bool> {
    let name = machine.name_any();
    let api = ctx.machines(&namespace_of(machine));

    let Some(current) = retry_api_call(|| api.get_opt(&name), "get machine").await? else {
        debug!(machine = %name, "Machine does not exist");
        return Ok(false);
    };

    let Some(node_name) = current
        .status
        .as_ref()
        .and_then(|s| s.node_ref.as_ref())
        .and_then(|r| r.name.clone())
    else {
        debug!(machine = %name, "Machine has no nodeRef yet");
        return Ok(false);
    };

    let nodes = ctx.nodes();
    let Some(node) = retry_api_call(|| nodes.get_opt(&node_name), "get node").await? else {
        debug!(machine = %name, node = %node_name, "Node referenced by machine does not exist yet");
        return Ok(false);
    };

    let ready = node_is_ready(&node);
    debug!(machine = %name, node = %node_name, ready = ready, "Checked node readiness");
    Ok(ready)
}

/// Split the two generations of a rolling update into `(newest, oldest)`.
///
/// Unless the first set is strictly older than the second, it is taken as the
/// newest.
///
/// # Errors
///
/// Returns [`VerifyError::UnexpectedState`] unless exactly two sets are given.
pub fn split_newest(sets: Vec<MachineSet>) -> Result<(MachineSet, MachineSet)> {
    let [first, second]: [MachineSet; 2] = sets.try_into().map_err(|sets: Vec<MachineSet>| {
        VerifyError::UnexpectedState(format!("expected 2 MachineSets, found {}", sets.len()))
    })?;

    if first.metadata.creation_timestamp < second.metadata.creation_timestamp {
        Ok((second, first))
    } else {
        Ok((first, second))
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
