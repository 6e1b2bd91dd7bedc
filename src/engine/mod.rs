mod mode;
mod ruleset;
mod traits;

pub use mode::{ModeChanged, ModeController};
pub use ruleset::RulesetRegistry;
pub use traits::{MatchedRequest, RuleEngine};
