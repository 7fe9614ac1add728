//! Immutable tuning records
//!
//! Configuration is loaded once (typically from RON authored alongside the
//! sandbox content) and consumed read-only at constraint construction and
//! migration. The core never mutates these records.

use serde::{Deserialize, Serialize};

use crate::physics::{HingeLimits, HingeMotor, HingeSpring, ProjectionMode};

/// Tuning for damper (slider) joints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamperConfig {
    /// Rest length of the damper
    pub default_length: f32,
    pub spring_force: f32,
    pub damper: f32,
    pub min_distance_multiplier: f32,
    pub max_distance_multiplier: f32,
    pub tolerance: f32,
    /// Diameter of the visual cylinder proxy
    pub cylinder_diameter: f32,
    pub projection_mode: ProjectionMode,
    pub projection_distance: f32,
    pub projection_angle: f32,
    pub configured_in_world_space: bool,
    pub swap_bodies: bool,
    pub break_force: f32,
    pub break_torque: f32,
}

impl Default for DamperConfig {
    fn default() -> Self {
        Self {
            default_length: 3.0,
            spring_force: 100.0,
            damper: 5.0,
            min_distance_multiplier: 0.1,
            max_distance_multiplier: 1.0,
            tolerance: 0.1,
            cylinder_diameter: 0.2,
            projection_mode: ProjectionMode::PositionAndRotation,
            projection_distance: 0.0,
            projection_angle: 0.0,
            configured_in_world_space: false,
            swap_bodies: false,
            break_force: f32::INFINITY,
            break_torque: f32::INFINITY,
        }
    }
}

impl DamperConfig {
    /// Parse a config from RON text
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }
}

/// Tuning for bearing (hinge) joints. All features default to off, which
/// matches a free-spinning hinge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BearingConfig {
    pub limits: Option<HingeLimits>,
    pub spring: Option<HingeSpring>,
    pub motor: Option<HingeMotor>,
}

impl BearingConfig {
    /// Parse a config from RON text
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }
}

/// Defaults applied to every assembly rigid body at creation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblySettings {
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            linear_damping: 0.0,
            angular_damping: 0.05,
        }
    }
}

/// Configuration parsing errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damper_defaults() {
        let config = DamperConfig::default();
        assert_eq!(config.default_length, 3.0);
        assert_eq!(config.spring_force, 100.0);
        assert!(config.break_force.is_infinite());
        assert_eq!(config.projection_mode, ProjectionMode::PositionAndRotation);
    }

    #[test]
    fn test_damper_partial_ron_overrides() {
        let config =
            DamperConfig::from_ron_str("(default_length: 5.0, spring_force: 250.0)").unwrap();
        assert_eq!(config.default_length, 5.0);
        assert_eq!(config.spring_force, 250.0);
        // Unspecified fields keep their defaults.
        assert_eq!(config.damper, 5.0);
    }

    #[test]
    fn test_bearing_ron_with_limits() {
        let config =
            BearingConfig::from_ron_str("(limits: Some((min: -45.0, max: 45.0)))").unwrap();
        let limits = config.limits.unwrap();
        assert_eq!(limits.min, -45.0);
        assert_eq!(limits.max, 45.0);
        assert!(config.motor.is_none());
    }

    #[test]
    fn test_invalid_ron_is_an_error() {
        assert!(DamperConfig::from_ron_str("(default_length: )").is_err());
    }
}
