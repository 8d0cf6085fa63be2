//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod address;
pub mod parent;
pub mod reference;
pub mod student;

pub use validation::ValidationError;
pub use address::AddressFields;
pub use parent::{ParentDetail, ParentDni, ParentRecord, ParentRegistration};
pub use reference::{RefEntry, RefKind, RefName};
pub use student::{AddressInput, StudentDetail, StudentDni, StudentRecord, StudentRegistration};
