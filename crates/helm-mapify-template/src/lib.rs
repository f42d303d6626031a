pub mod analyze;
pub mod defines;
pub mod expr;
pub mod rewrite;
pub mod scan;

pub use analyze::{ParsedTemplate, TemplateDirective, analyze};
pub use defines::{DefineEntry, DefineIndex};
pub use expr::{Expr, Target, UsagePattern, ValuesUsage};
pub use rewrite::{
    HELPER_FILE, HELPER_NAME, HELPER_TEMPLATE, Idiom, Rewrite, RewriteOutcome, RewriteRequest,
    rewrite,
};
