//! Camera pose types
//!
//! The viewer exposes its camera as three attributes, each with a small
//! unit-suffixed text syntax:
//!
//! - orbit: `"<theta>deg <phi>deg <radius>m"`
//! - target: `"<x>m <y>m <z>m"`
//! - field of view: `"<angle>deg"`
//!
//! Angles are stored in degrees and lengths in metres. Parsing also accepts
//! `rad` for angles and `cm`/`mm` for lengths, converting on the way in.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when comparing camera components
pub const POSE_EPSILON: f64 = 1e-4;

/// Spherical camera position around the target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraOrbit {
    /// Azimuth in degrees
    pub theta_deg: f64,
    /// Polar angle in degrees
    pub phi_deg: f64,
    /// Distance from the target in metres
    pub radius_m: f64,
}

/// Look-at point in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Vertical field of view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    pub degrees: f64,
}

/// Full camera pose as reported by (or applied to) the viewer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub orbit: CameraOrbit,
    pub target: CameraTarget,
    pub fov: FieldOfView,
}

impl CameraOrbit {
    pub fn new(theta_deg: f64, phi_deg: f64, radius_m: f64) -> Self {
        Self {
            theta_deg,
            phi_deg,
            radius_m,
        }
    }

    /// True when the two orbits sit at the same distance from the target
    pub fn same_radius(&self, other: &CameraOrbit) -> bool {
        (self.radius_m - other.radius_m).abs() < POSE_EPSILON
    }
}

impl CameraTarget {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise comparison within [`POSE_EPSILON`]
    pub fn approx_eq(&self, other: &CameraTarget) -> bool {
        (self.x - other.x).abs() < POSE_EPSILON
            && (self.y - other.y).abs() < POSE_EPSILON
            && (self.z - other.z).abs() < POSE_EPSILON
    }
}

impl FieldOfView {
    pub fn new(degrees: f64) -> Self {
        Self { degrees }
    }
}

impl CameraPose {
    pub fn new(orbit: CameraOrbit, target: CameraTarget, fov: FieldOfView) -> Self {
        Self { orbit, target, fov }
    }

    /// Pose applied after a load when the user has not framed anything yet
    pub fn default_view() -> Self {
        Self {
            orbit: CameraOrbit::new(0.0, 50.0, 0.25),
            target: CameraTarget::new(0.0, 0.01, 0.0),
            fov: FieldOfView::new(45.0),
        }
    }
}

fn parse_angle(token: &str) -> Result<f64> {
    let (number, factor) = if let Some(n) = token.strip_suffix("deg") {
        (n, 1.0)
    } else if let Some(n) = token.strip_suffix("rad") {
        (n, 180.0 / std::f64::consts::PI)
    } else {
        return Err(Error::InvalidInput(format!("Angle without unit: {token}")));
    };
    number
        .parse::<f64>()
        .map(|v| v * factor)
        .map_err(|e| Error::InvalidInput(format!("Invalid angle '{token}': {e}")))
}

fn parse_length(token: &str) -> Result<f64> {
    // "mm" and "cm" must be checked before the bare "m" suffix
    let (number, factor) = if let Some(n) = token.strip_suffix("mm") {
        (n, 0.001)
    } else if let Some(n) = token.strip_suffix("cm") {
        (n, 0.01)
    } else if let Some(n) = token.strip_suffix('m') {
        (n, 1.0)
    } else {
        return Err(Error::InvalidInput(format!("Length without unit: {token}")));
    };
    number
        .parse::<f64>()
        .map(|v| v * factor)
        .map_err(|e| Error::InvalidInput(format!("Invalid length '{token}': {e}")))
}

fn split_three(s: &str) -> Result<[&str; 3]> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    match parts.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(Error::InvalidInput(format!(
            "Expected three components, got '{s}'"
        ))),
    }
}

impl fmt::Display for CameraOrbit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}deg {}deg {}m", self.theta_deg, self.phi_deg, self.radius_m)
    }
}

impl FromStr for CameraOrbit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let [theta, phi, radius] = split_three(s)?;
        Ok(Self::new(
            parse_angle(theta)?,
            parse_angle(phi)?,
            parse_length(radius)?,
        ))
    }
}

impl fmt::Display for CameraTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m {}m {}m", self.x, self.y, self.z)
    }
}

impl FromStr for CameraTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let [x, y, z] = split_three(s)?;
        Ok(Self::new(parse_length(x)?, parse_length(y)?, parse_length(z)?))
    }
}

impl fmt::Display for FieldOfView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}deg", self.degrees)
    }
}

impl FromStr for FieldOfView {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_angle(s.trim()).map(Self::new)
    }
}
