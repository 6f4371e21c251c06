//! # Identifier Newtypes
//!
//! UUID-backed identifiers for the records both engines own. Each is a
//! distinct type; serde sees a plain UUID string.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse from user input, naming the field in the error.
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                s.trim()
                    .parse::<Uuid>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidUuid {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of an employee on a company roster.
    EmployeeId,
    "employee_id"
);

uuid_newtype!(
    /// Identifier of a tenant company.
    CompanyId,
    "company_id"
);

uuid_newtype!(
    /// Identifier of a registered KPI module.
    ModuleId,
    "module_id"
);

uuid_newtype!(
    /// Identifier of a single KPI definition.
    KpiId,
    "kpi_id"
);
