//! Configuration validation
//!
//! Field-level rules come from the `Validate` derives on the contract types.
//! Cross-field rules checked here:
//! - camera id and name unique
//! - contour and midpoint bands non-empty
//! - canny thresholds ordered
//! - detector labels known
//! - sink names present and unique

use std::collections::HashSet;

use contracts::{ContractError, DeploymentBlueprint, ObjectClass};
use validator::Validate;

/// Validate a DeploymentBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &DeploymentBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;
    validate_cameras(blueprint)?;
    validate_analysis(blueprint)?;
    validate_labels(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_cameras(blueprint: &DeploymentBlueprint) -> Result<(), ContractError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for camera in &blueprint.cameras {
        if camera.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("cameras[name={}].id", camera.name),
                "camera id cannot be empty",
            ));
        }
        if !ids.insert(camera.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("cameras[id={}]", camera.id),
                "duplicate camera id",
            ));
        }
        if !names.insert(camera.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("cameras[id={}].name", camera.id),
                format!("duplicate camera name '{}'", camera.name),
            ));
        }
    }
    Ok(())
}

fn validate_analysis(blueprint: &DeploymentBlueprint) -> Result<(), ContractError> {
    let fo = &blueprint.analysis.foreign_object;
    if fo.min_contour_points >= fo.max_contour_points {
        return Err(ContractError::config_validation(
            "analysis.foreign_object.min_contour_points",
            format!(
                "min_contour_points ({}) must be < max_contour_points ({})",
                fo.min_contour_points, fo.max_contour_points
            ),
        ));
    }
    if fo.min_midpoint_distance_px >= fo.max_midpoint_distance_px {
        return Err(ContractError::config_validation(
            "analysis.foreign_object.min_midpoint_distance_px",
            format!(
                "min_midpoint_distance_px ({}) must be < max_midpoint_distance_px ({})",
                fo.min_midpoint_distance_px, fo.max_midpoint_distance_px
            ),
        ));
    }
    if fo.canny_low > fo.canny_high {
        return Err(ContractError::config_validation(
            "analysis.foreign_object.canny_low",
            "canny_low must be <= canny_high",
        ));
    }
    Ok(())
}

fn validate_labels(blueprint: &DeploymentBlueprint) -> Result<(), ContractError> {
    for (idx, label) in blueprint.detector.labels.iter().enumerate() {
        label.parse::<ObjectClass>().map_err(|e| {
            ContractError::config_validation(format!("detector.labels[{idx}]"), e)
        })?;
    }
    Ok(())
}

fn validate_sinks(blueprint: &DeploymentBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
