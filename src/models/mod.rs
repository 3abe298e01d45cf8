pub mod diagnostic;
pub mod requirement;
pub mod specifier;
pub mod version;

pub use diagnostic::{Diagnostic, Severity};
pub use requirement::{Requirement, normalize_name};
pub use specifier::{Comparator, Specifier, SpecifierSet};
pub use version::Version;
