//! The conversational action protocol: bracket tokens in assistant replies
//! are parsed into raw actions, validated into typed [`Action`]s and applied
//! against the store for one user.

mod executor;
pub mod parser;
pub mod types;

pub use executor::ActionExecutor;
#[cfg(test)]
pub use executor::ActionOutcome;
pub use parser::{parse_actions, strip_actions};

#[cfg(test)]
mod tests;
