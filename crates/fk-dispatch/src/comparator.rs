//! Candidate ranking: an ordered chain of comparators.
//!
//! The chain is lexicographic.  The first comparator that distinguishes two
//! candidates decides; later ones only break ties.  `BY_NAME` is appended
//! when the configuration omits it so the ranking is total and independent
//! of input order.
//!
//! | Key                         | Prefers                                  |
//! |-----------------------------|------------------------------------------|
//! | `DEADLINE_AT_RISK_FIRST`    | orders whose deadline is at risk         |
//! | `BY_DEADLINE`               | earlier deadlines                        |
//! | `BY_AGE`                    | older orders                             |
//! | `BY_INITIAL_ROUTING_COSTS`  | cheaper route to the first destination   |
//! | `BY_COMPLETE_ROUTING_COSTS` | cheaper routes over all destinations     |
//! | `BY_ENERGY_LEVEL`           | vehicles with more energy                |
//! | `IDLE_FIRST`                | vehicles without any order               |
//! | `BY_NAME`                   | order name, then vehicle name            |

use std::cmp::Ordering;
use std::str::FromStr;

use crate::{AssignmentCandidate, DispatchError, DispatchResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CandidateComparator {
    DeadlineAtRiskFirst,
    ByDeadline,
    ByAge,
    ByInitialRoutingCosts,
    ByCompleteRoutingCosts,
    ByEnergyLevel,
    IdleFirst,
    ByName,
}

impl CandidateComparator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeadlineAtRiskFirst    => "DEADLINE_AT_RISK_FIRST",
            Self::ByDeadline             => "BY_DEADLINE",
            Self::ByAge                  => "BY_AGE",
            Self::ByInitialRoutingCosts  => "BY_INITIAL_ROUTING_COSTS",
            Self::ByCompleteRoutingCosts => "BY_COMPLETE_ROUTING_COSTS",
            Self::ByEnergyLevel          => "BY_ENERGY_LEVEL",
            Self::IdleFirst              => "IDLE_FIRST",
            Self::ByName                 => "BY_NAME",
        }
    }

    /// `Less` means `a` ranks before `b`.
    pub fn compare(self, a: &AssignmentCandidate, b: &AssignmentCandidate) -> Ordering {
        match self {
            Self::DeadlineAtRiskFirst    => b.deadline_at_risk.cmp(&a.deadline_at_risk),
            Self::ByDeadline             => a.deadline.cmp(&b.deadline),
            Self::ByAge                  => a.creation_time.cmp(&b.creation_time),
            Self::ByInitialRoutingCosts  => a.initial_routing_costs.cmp(&b.initial_routing_costs),
            Self::ByCompleteRoutingCosts => a.complete_routing_costs.cmp(&b.complete_routing_costs),
            Self::ByEnergyLevel          => b.energy_level.cmp(&a.energy_level),
            Self::IdleFirst              => b.vehicle_idle.cmp(&a.vehicle_idle),
            Self::ByName => a
                .order_name
                .cmp(&b.order_name)
                .then_with(|| a.vehicle_name.cmp(&b.vehicle_name))
                .then_with(|| a.order.cmp(&b.order))
                .then_with(|| a.vehicle.cmp(&b.vehicle)),
        }
    }
}

impl FromStr for CandidateComparator {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEADLINE_AT_RISK_FIRST"    => Ok(Self::DeadlineAtRiskFirst),
            "BY_DEADLINE"               => Ok(Self::ByDeadline),
            "BY_AGE"                    => Ok(Self::ByAge),
            "BY_INITIAL_ROUTING_COSTS"  => Ok(Self::ByInitialRoutingCosts),
            "BY_COMPLETE_ROUTING_COSTS" => Ok(Self::ByCompleteRoutingCosts),
            "BY_ENERGY_LEVEL"           => Ok(Self::ByEnergyLevel),
            "IDLE_FIRST"                => Ok(Self::IdleFirst),
            "BY_NAME"                   => Ok(Self::ByName),
            other                       => Err(DispatchError::UnknownComparator(other.to_owned())),
        }
    }
}

// ── ComparatorChain ───────────────────────────────────────────────────────────

/// Immutable, ordered list of comparators resolved from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComparatorChain {
    links: Vec<CandidateComparator>,
}

impl ComparatorChain {
    /// Build from explicit comparators; `BY_NAME` is appended if absent.
    pub fn new(mut links: Vec<CandidateComparator>) -> Self {
        if !links.contains(&CandidateComparator::ByName) {
            links.push(CandidateComparator::ByName);
        }
        Self { links }
    }

    /// Resolve configuration keys, most significant first.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownComparator`] for an unrecognised key.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> DispatchResult<Self> {
        let links = keys
            .iter()
            .map(|k| k.as_ref().parse::<CandidateComparator>())
            .collect::<DispatchResult<Vec<_>>>()?;
        Ok(Self::new(links))
    }

    pub fn links(&self) -> &[CandidateComparator] {
        &self.links
    }

    pub fn compare(&self, a: &AssignmentCandidate, b: &AssignmentCandidate) -> Ordering {
        self.links
            .iter()
            .map(|c| c.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Sort `candidates` best first.
    pub fn sort(&self, candidates: &mut [AssignmentCandidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}
