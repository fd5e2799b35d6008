// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Loading `MachineDeployment` manifests for a scenario run.
//!
//! Manifests are YAML templates with placeholders such as `<< OS_NAME >>`.
//! Each parameter `placeholder=value` replaces every occurrence of the
//! placeholder text before the document is decoded.
//!
//! # Example
//!
//! ```rust
//! use machine_e2e::manifest::{parse_parameters, render_manifest};
//!
//! let params = parse_parameters(&["<< OS_NAME >>=ubuntu".to_string()]).unwrap();
//! let rendered = render_manifest("operatingSystem: << OS_NAME >>", &params);
//! assert_eq!(rendered, "operatingSystem: ubuntu");
//! ```

use std::path::Path;
use tracing::{debug, info};

use crate::constants::DEFAULT_NAMESPACE;
use crate::crd::MachineDeployment;
use crate::errors::{Result, VerifyError};

/// One placeholder substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    /// Literal text to replace
    pub placeholder: String,
    /// Replacement text
    pub value: String,
}

/// Parse `placeholder=value` pairs, splitting on the first `=`.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidParameter`] for an entry without `=` or with an
/// empty placeholder.
pub fn parse_parameters(raw: &[String]) -> Result<Vec<Parameter>> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((placeholder, value)) if !placeholder.is_empty() => Ok(Parameter {
                placeholder: placeholder.to_string(),
                value: value.to_string(),
            }),
            _ => Err(VerifyError::InvalidParameter(entry.clone())),
        })
        .collect()
}

/// Apply every parameter to a manifest, in order.
#[must_use]
pub fn render_manifest(template: &str, params: &[Parameter]) -> String {
    params.iter().fold(template.to_string(), |text, param| {
        text.replace(&param.placeholder, &param.value)
    })
}

/// Decode a rendered manifest into a `MachineDeployment`.
///
/// A missing namespace defaults to `kube-system`.
///
/// # Errors
///
/// Returns [`VerifyError::Manifest`] when the document does not decode or has no name.
pub fn decode_machine_deployment(path: &Path, rendered: &str) -> Result<MachineDeployment> {
    let mut md: MachineDeployment =
        serde_yaml::from_str(rendered).map_err(|e| VerifyError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if md.metadata.name.as_deref().is_none_or(str::is_empty) {
        return Err(VerifyError::Manifest {
            path: path.to_path_buf(),
            reason: "MachineDeployment has no metadata.name".to_string(),
        });
    }

    if md.metadata.namespace.as_deref().is_none_or(str::is_empty) {
        md.metadata.namespace = Some(DEFAULT_NAMESPACE.to_string());
    }

    Ok(md)
}

/// Read, render and decode a `MachineDeployment` manifest file.
///
/// # Errors
///
/// Returns [`VerifyError::Manifest`] when the file cannot be read or decoded.
pub async fn load_machine_deployment(path: &Path, params: &[Parameter]) -> Result<MachineDeployment> {
    let template = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| VerifyError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let rendered = render_manifest(&template, params);
    debug!(manifest = %path.display(), parameters = params.len(), "Rendered manifest");

    let md = decode_machine_deployment(path, &rendered)?;
    info!(
        manifest = %path.display(),
        name = md.metadata.name.as_deref().unwrap_or_default(),
        namespace = md.metadata.namespace.as_deref().unwrap_or_default(),
        "Loaded MachineDeployment manifest"
    );
    Ok(md)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod manifest_tests;
