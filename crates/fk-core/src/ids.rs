//! Strongly typed, zero-cost identifier wrappers.
//!
//! Plant-model objects (points, paths, locations, blocks) are numbered densely
//! from 0 by [`PlantBuilder`][crate::PlantBuilder], so their IDs double as
//! `Vec` indices.  Kernel objects (vehicles, orders, jobs) are numbered by the
//! object store that creates them.  All IDs are `Copy + Ord + Hash`; the
//! `Ord` impl is what every deterministic tie-break in the kernel falls back
//! to.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID".
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a plant-model point (a node vehicles can stop on).
    pub struct PointId(u32);
}

typed_id! {
    /// Index of a directed plant-model path between two points.
    pub struct PathId(u32);
}

typed_id! {
    /// Index of a location (station) where operations are performed.
    pub struct LocationId(u32);
}

typed_id! {
    /// Index of a block (named resource group with an allocation policy).
    pub struct BlockId(u32);
}

typed_id! {
    /// Identifier of a vehicle known to the kernel.
    pub struct VehicleId(u32);
}

typed_id! {
    /// Identifier of a transport order.
    pub struct OrderId(u32);
}

typed_id! {
    /// Identifier of an order sequence.
    pub struct SequenceId(u32);
}

typed_id! {
    /// Identifier of a peripheral job.
    pub struct PeripheralJobId(u32);
}

typed_id! {
    /// Identifier of a scheduler client (usually one per vehicle controller).
    pub struct ClientId(u32);
}
