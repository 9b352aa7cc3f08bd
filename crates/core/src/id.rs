//! Unique identifiers for Academia entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a Program
    ProgramId
);
entity_id!(
    /// Unique identifier for a Block
    BlockId
);
entity_id!(
    /// Unique identifier for a Module
    ModuleId
);
entity_id!(
    /// Unique identifier for an Exam
    ExamId
);
entity_id!(
    /// Unique identifier for a Grade
    GradeId
);
entity_id!(
    /// Unique identifier for a Student
    StudentId
);
entity_id!(
    /// Unique identifier for a Cohort
    CohortId
);
entity_id!(
    /// Unique identifier for an Enrollment
    EnrollmentId
);
