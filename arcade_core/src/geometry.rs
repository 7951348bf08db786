use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// World position in metres as reported by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Strictly closer than `tolerance`.
    pub fn is_near(&self, other: &Point3, tolerance: f64) -> bool {
        self.distance(other) < tolerance
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3},{:.3},{:.3})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PointParseError {
    #[error("expected three comma separated coordinates, got '{0}'")]
    Arity(String),
    #[error("invalid coordinate '{value}': {source}")]
    Coordinate {
        value: String,
        #[source]
        source: ParseFloatError,
    },
}

impl FromStr for Point3 {
    type Err = PointParseError;

    /// Parses `x,y,z`, tolerating surrounding whitespace and parentheses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(PointParseError::Arity(s.to_string()));
        }
        let coord = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|source| PointParseError::Coordinate {
                    value: value.to_string(),
                    source,
                })
        };
        Ok(Point3 {
            x: coord(parts[0])?,
            y: coord(parts[1])?,
            z: coord(parts[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_coordinates() {
        let point: Point3 = "133960.969,83.157,185100.344".parse().unwrap();
        assert_eq!(point, Point3::new(133960.969, 83.157, 185100.344));
        let wrapped: Point3 = "(1.0, 2.0, 3.0)".parse().unwrap();
        assert_eq!(wrapped, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn rejects_wrong_arity_and_garbage() {
        assert!(matches!(
            "1.0,2.0".parse::<Point3>(),
            Err(PointParseError::Arity(_))
        ));
        assert!(matches!(
            "1.0,abc,2.0".parse::<Point3>(),
            Err(PointParseError::Coordinate { .. })
        ));
    }

    #[test]
    fn nearness_is_strict() {
        let origin = Point3::default();
        let edge = Point3::new(50.0, 0.0, 0.0);
        assert!(!origin.is_near(&edge, 50.0));
        assert!(origin.is_near(&edge, 50.001));
        assert!((Point3::new(3.0, 4.0, 0.0).distance(&origin) - 5.0).abs() < f64::EPSILON);
    }
}
