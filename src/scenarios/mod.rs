// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end scenarios driven against the machine API.
//!
//! Each scenario is a flat sequence of writes followed by bounded polls. The
//! controller under test does all reconciliation; these functions only observe
//! that it converges.
//!
//! - [`verify_create_update_and_delete`] - rolling update to a second `MachineSet`
//! - [`verify_create_and_delete`] - plain provisioning and teardown
//!
//! Shared steps live here so both scenarios log and fail the same way.

pub mod create_delete;
pub mod rolling_update;

pub use create_delete::verify_create_and_delete;
pub use rolling_update::verify_create_update_and_delete;

use kube::api::{DeleteParams, PostParams};
use kube::ResourceExt;
use tracing::info;

use crate::context::Context;
use crate::crd::MachineDeployment;
use crate::errors::{is_not_found, Result, VerifyError};
use crate::poll::poll_until;
use crate::retry::{retry_api_call, retry_on_conflict};
use crate::selector::{machine_has_ready_node, machines_for_deployment, namespace_of};

/// Create a `MachineDeployment` and wait until every desired machine has a ready node.
///
/// Returns the object as persisted by the API server.
///
/// # Errors
///
/// Returns the create error, or [`VerifyError::Create`] wrapping the poll failure.
pub async fn create_and_assure(ctx: &Context, md: &MachineDeployment) -> Result<MachineDeployment> {
    let name = md.name_any();
    let api = ctx.machine_deployments(&namespace_of(md));

    info!(machine_deployment = %name, replicas = md.desired_replicas(), "Creating MachineDeployment");
    let created = api.create(&PostParams::default(), md).await?;

    assure_machines_ready(ctx, &created)
        .await
        .map_err(|e| VerifyError::Create {
            name: name.clone(),
            source: Box::new(e),
        })?;

    info!(machine_deployment = %name, "MachineDeployment has all machines with ready nodes");
    Ok(created)
}

async fn assure_machines_ready(ctx: &Context, md: &MachineDeployment) -> Result<()> {
    let name = md.name_any();
    let replicas = usize::try_from(md.desired_replicas()).unwrap_or_default();

    info!(machine_deployment = %name, replicas = replicas, "Waiting for machines to appear");
    poll_until(
        ctx.poll,
        &format!("{replicas} machines of MachineDeployment {name}"),
        || async move { Ok(machines_for_deployment(ctx, md).await?.len() == replicas) },
    )
    .await?;

    info!(machine_deployment = %name, "Waiting for machines to get ready nodes");
    poll_until(
        ctx.poll,
        &format!("ready nodes for MachineDeployment {name}"),
        || async move {
            let machines = machines_for_deployment(ctx, md).await?;
            if machines.len() != replicas {
                return Ok(false);
            }
            for machine in &machines {
                if !machine_has_ready_node(ctx, machine).await? {
                    return Ok(false);
                }
            }
            Ok(true)
        },
    )
    .await
}

/// Re-read a deployment, apply `modify` and write it back, retrying on conflicts.
///
/// # Errors
///
/// Returns [`VerifyError::Update`] wrapping the failed read or write.
pub async fn update_machine_deployment<F>(
    ctx: &Context,
    md: &MachineDeployment,
    modify: F,
) -> Result<MachineDeployment>
where
    F: Fn(&mut MachineDeployment),
{
    let name = md.name_any();
    let api = ctx.machine_deployments(&namespace_of(md));
    let (api, name_ref, modify) = (&api, &name, &modify);

    retry_on_conflict(
        || async move {
            let mut current = retry_api_call(|| api.get(name_ref), "get machinedeployment").await?;
            modify(&mut current);
            Ok(api.replace(name_ref, &PostParams::default(), &current).await?)
        },
        "update machinedeployment",
    )
    .await
    .map_err(|e| VerifyError::Update {
        name,
        source: Box::new(e),
    })
}

/// Wait until no machine belongs to the deployment any more.
///
/// # Errors
///
/// Returns the poll failure.
pub async fn wait_for_no_machines(ctx: &Context, md: &MachineDeployment) -> Result<()> {
    let name = md.name_any();
    info!(machine_deployment = %name, "Waiting for MachineDeployment to not have any associated machines");

    poll_until(
        ctx.poll,
        &format!("MachineDeployment {name} to have no machines"),
        || async move { Ok(machines_for_deployment(ctx, md).await?.is_empty()) },
    )
    .await?;

    info!(machine_deployment = %name, "MachineDeployment has no associated machines");
    Ok(())
}

/// Delete a deployment and wait until the API server reports it Not Found.
///
/// # Errors
///
/// Returns [`VerifyError::Delete`] when the delete call fails, or the poll failure.
pub async fn delete_and_wait(ctx: &Context, md: &MachineDeployment) -> Result<()> {
    let name = md.name_any();
    let api = ctx.machine_deployments(&namespace_of(md));

    info!(machine_deployment = %name, "Deleting MachineDeployment and waiting for it to disappear");
    api.delete(&name, &DeleteParams::default())
        .await
        .map_err(|source| VerifyError::Delete {
            name: name.clone(),
            source,
        })?;

    let (api, name_ref) = (&api, &name);
    poll_until(
        ctx.poll,
        &format!("MachineDeployment {name} to be deleted"),
        || async move {
            match api.get(name_ref).await {
                Ok(_) => Ok(false),
                Err(e) if is_not_found(&e) => Ok(true),
                Err(e) => Err(e.into()),
            }
        },
    )
    .await?;

    info!(machine_deployment = %name, "Successfully deleted MachineDeployment");
    Ok(())
}
