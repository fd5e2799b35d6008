// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rolling update of a `MachineDeployment` to a second `MachineSet` generation.
//!
//! The scenario relies on a single replica: after the template changes, the
//! controller must surge a new set to one machine, get its node ready, then
//! scale the old set to zero and reclaim its machine.

use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::info;

use crate::constants::{TEST_UPDATE_LABEL, TEST_UPDATE_LABEL_VALUE};
use crate::context::Context;
use crate::crd::{MachineDeployment, MachineSet};
use crate::errors::Result;
use crate::poll::{poll_for, poll_until};
use crate::retry::retry_api_call;
use crate::selector::{
    machine_has_ready_node, machine_sets_for_deployment, machines_for_machine_set, namespace_of,
    split_newest,
};

use super::{create_and_assure, delete_and_wait, update_machine_deployment, wait_for_no_machines};

/// Create a deployment, roll it to a new template, scale it to zero and delete it.
///
/// The deployment's replica count is forced to 1.
///
/// # Errors
///
/// Returns the first failing step: an API error, a wrapped create/update/delete
/// failure, or a [`crate::errors::VerifyError::Timeout`] naming the wait that expired.
pub async fn verify_create_update_and_delete(ctx: &Context, md: MachineDeployment) -> Result<()> {
    let mut md = md;
    md.spec.replicas = Some(1);

    let md = create_and_assure(ctx, &md).await?;
    let name = md.name_any();

    update_machine_deployment(ctx, &md, |md| {
        md.spec
            .template
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(
                TEST_UPDATE_LABEL.to_string(),
                TEST_UPDATE_LABEL_VALUE.to_string(),
            );
    })
    .await?;

    info!(machine_deployment = %name, "Waiting for second MachineSet to appear after updating MachineDeployment");
    let md_ref = &md;
    let machine_sets = poll_for(
        ctx.poll,
        &format!("second MachineSet of MachineDeployment {name}"),
        || async move {
            let sets = machine_sets_for_deployment(ctx, md_ref).await?;
            let surged = sets.len() == 2 && sets.iter().all(|ms| ms.desired_replicas() == 1);
            Ok(surged.then_some(sets))
        },
    )
    .await?;
    info!(machine_deployment = %name, "Found second MachineSet for MachineDeployment");

    let (newest, oldest) = split_newest(machine_sets)?;
    wait_for_new_generation(ctx, &newest).await?;
    wait_for_old_generation_drained(ctx, &oldest).await?;

    info!(machine_deployment = %name, "Setting replicas of MachineDeployment to 0");
    update_machine_deployment(ctx, &md, |md| md.spec.replicas = Some(0)).await?;
    info!(machine_deployment = %name, "Successfully set replicas of MachineDeployment to 0");

    wait_for_no_machines(ctx, &md).await?;
    delete_and_wait(ctx, &md).await
}

/// Wait for the new set's single machine and for that machine's node to be ready.
async fn wait_for_new_generation(ctx: &Context, newest: &MachineSet) -> Result<()> {
    let set_name = newest.name_any();

    info!(machine_set = %set_name, "Waiting for new MachineSet's machine to appear");
    let machines = poll_for(
        ctx.poll,
        &format!("one machine of MachineSet {set_name}"),
        || async move {
            let machines = machines_for_machine_set(ctx, newest).await?;
            Ok((machines.len() == 1).then_some(machines))
        },
    )
    .await?;
    info!(machine_set = %set_name, machines = machines.len(), "New MachineSet appeared with machines");

    let machine = &machines[0];
    info!(machine_set = %set_name, machine = %machine.name_any(), "Waiting for new MachineSet to get a ready node");
    poll_until(
        ctx.poll,
        &format!("ready node for MachineSet {set_name}"),
        || machine_has_ready_node(ctx, machine),
    )
    .await?;
    info!(machine_set = %set_name, "Found ready node for MachineSet");
    Ok(())
}

/// Wait for the old set to be scaled to zero with no machines left.
async fn wait_for_old_generation_drained(ctx: &Context, oldest: &MachineSet) -> Result<()> {
    let set_name = oldest.name_any();
    let api = ctx.machine_sets(&namespace_of(oldest));

    info!(machine_set = %set_name, "Waiting for old MachineSet to be scaled down and have no associated machines");
    let (api, set_name_ref) = (&api, &set_name);
    poll_until(
        ctx.poll,
        &format!("old MachineSet {set_name} to scale down"),
        || async move {
            let current = retry_api_call(|| api.get(set_name_ref), "get machineset").await?;
            if current.desired_replicas() != 0 {
                return Ok(false);
            }
            Ok(machines_for_machine_set(ctx, &current).await?.is_empty())
        },
    )
    .await?;
    info!(machine_set = %set_name, "Old MachineSet got scaled down and has no associated machines anymore");
    Ok(())
}
