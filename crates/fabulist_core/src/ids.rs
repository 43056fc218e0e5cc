//! Typed record identifiers.
//!
//! Every record is keyed by an `i64` assigned by the content store. The
//! newtypes keep a board id from being passed where a role id belongs.

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            derive_more::Display,
            derive_more::From,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw store key.
            pub fn get(self) -> i64 {
                self.0
            }
        }
    };
}

record_id!(
    /// Identifies a [`Story`](crate::Story).
    StoryId
);
record_id!(
    /// Identifies a [`Storyboard`](crate::Storyboard).
    BoardId
);
record_id!(
    /// Identifies a [`Scene`](crate::Scene).
    SceneId
);
record_id!(
    /// Identifies a [`Role`](crate::Role).
    RoleId
);
record_id!(
    /// Identifies a [`GenerationTask`](crate::GenerationTask).
    TaskId
);
record_id!(
    /// Identifies an [`Activity`](crate::Activity).
    ActivityId
);
