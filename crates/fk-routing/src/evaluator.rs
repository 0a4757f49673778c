//! Edge evaluators: how a path traversal is weighted.
//!
//! Configured as a list of string keys; the weight of an edge is the
//! saturating sum of every configured evaluator.

use std::str::FromStr;

use fk_core::{Orientation, Path, Vehicle};

use crate::RoutingError;

/// A single edge-weight component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdgeEvaluator {
    /// Path length in millimetres.
    Distance,
    /// Travel time in milliseconds at the lower of path and vehicle velocity.
    TravelTime,
    /// One per edge.
    Hops,
    /// The path's explicit routing cost for the travel direction; falls back
    /// to the path length when none is set.
    Explicit,
}

impl EdgeEvaluator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Distance   => "DISTANCE",
            Self::TravelTime => "TRAVELTIME",
            Self::Hops       => "HOPS",
            Self::Explicit   => "EXPLICIT",
        }
    }

    /// Weight of travelling `path` in `orientation` with `vehicle`.
    pub fn evaluate(self, path: &Path, vehicle: &Vehicle, orientation: Orientation) -> u64 {
        match self {
            Self::Distance => path.length_mm,
            Self::Hops => 1,
            Self::TravelTime => {
                let velocity = match orientation {
                    Orientation::Forward  => path.max_velocity.min(vehicle.max_velocity),
                    Orientation::Backward => path.max_reverse_velocity.min(vehicle.max_reverse_velocity),
                };
                // Graph construction drops zero-velocity directions, so this
                // is only a guard against direct callers.
                if velocity == 0 {
                    return fk_core::INFINITE_COSTS;
                }
                path.length_mm.saturating_mul(1_000) / velocity as u64
            }
            Self::Explicit => {
                let explicit = match orientation {
                    Orientation::Forward  => path.explicit_cost,
                    Orientation::Backward => path.explicit_reverse_cost,
                };
                explicit.unwrap_or(path.length_mm)
            }
        }
    }

    /// Resolve a list of configuration keys, preserving order.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Result<Vec<EdgeEvaluator>, RoutingError> {
        keys.iter().map(|k| k.as_ref().parse()).collect()
    }
}

impl FromStr for EdgeEvaluator {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISTANCE"   => Ok(Self::Distance),
            "TRAVELTIME" => Ok(Self::TravelTime),
            "HOPS"       => Ok(Self::Hops),
            "EXPLICIT"   => Ok(Self::Explicit),
            other        => Err(RoutingError::UnknownEvaluator(other.to_owned())),
        }
    }
}
