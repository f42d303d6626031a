pub mod matcher;
pub mod rules;

pub use matcher::{MAX_INCLUDE_DEPTH, MatchOutcome, Matcher, match_template};
pub use rules::{RuleSet, glob_match};
