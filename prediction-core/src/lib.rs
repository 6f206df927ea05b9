pub mod analytics;
pub mod errors;
pub mod random_source;
pub mod reconciliation;
pub mod scoring;
pub mod validation;

// Re-export main components
pub use analytics::*;
pub use errors::*;
pub use random_source::*;
pub use scoring::*;
pub use validation::*;
