// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provisioning and teardown of a `MachineDeployment` without updates.

use kube::ResourceExt;
use tracing::info;

use crate::context::Context;
use crate::crd::MachineDeployment;
use crate::errors::Result;

use super::{create_and_assure, delete_and_wait, wait_for_no_machines};

/// Create a deployment, wait for its nodes, delete it and wait for its machines
/// and the deployment itself to disappear.
///
/// # Errors
///
/// Returns the first failing step.
pub async fn verify_create_and_delete(ctx: &Context, md: MachineDeployment) -> Result<()> {
    let md = create_and_assure(ctx, &md).await?;
    info!(machine_deployment = %md.name_any(), "MachineDeployment provisioned, tearing it down");

    delete_and_wait(ctx, &md).await?;
    wait_for_no_machines(ctx, &md).await
}
