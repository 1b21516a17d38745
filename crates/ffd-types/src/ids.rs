//! Type-safe identifier wrappers.
//!
//! Records and workers each get a strongly-typed ID so the two cannot be
//! mixed up at compile time. Record IDs come from the store (the seed file
//! or the backing database); worker IDs are handed out by the worker
//! registry from a monotonic counter.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around an unsigned integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a giveaway record in the store.
    ///
    /// Ordering on this type is the tie-breaker when two records sit at the
    /// same distance from a requester.
    RecordId(u32)
}

define_id! {
    /// Unique identifier for a connection worker.
    WorkerId(u64)
}
