//! Error taxonomy for the dispatch path

use thiserror::Error;

/// A failed dispatch attempt.
///
/// Per-route matching failures are not represented here: a route whose
/// pattern cannot be compiled or applied is logged and skipped so one bad
/// plugin route cannot block the others.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The agent reference resolved to no live runtime; fatal to the attempt
    #[error("no runtime found for agent '{agent_ref}'")]
    RuntimeNotFound { agent_ref: String },

    /// The matched handler failed; the caller owns the user-visible response
    #[error("plugin handler failed")]
    Handler(#[source] anyhow::Error),
}
