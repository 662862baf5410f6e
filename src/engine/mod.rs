mod filter;
mod matcher;
pub mod rules;
pub mod source;
pub mod state;
mod traits;

pub use filter::FilterEngine;
pub use matcher::{host_matches, HashedMatcher};
pub use rules::{RuleSnapshot, RuleStore};
pub use state::{FilterState, FilterStateStore};
pub use traits::DomainMatcher;
