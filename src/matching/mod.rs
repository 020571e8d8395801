//! Employee matching.
//!
//! Resolves valid staging records onto canonical employees supplied by an
//! [`EmployeeDirectory`]. Matching never modifies employees.

mod directory;
mod matcher;

pub use directory::{EmployeeDirectory, InMemoryEmployeeDirectory};
pub use matcher::EmployeeMatcher;
