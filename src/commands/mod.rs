//! Chat commands.
//!
//! Messages starting with the configured prefix are parsed by the
//! [`Dispatcher`], looked up in the [`CommandRegistry`] and run by the
//! built-in handler the descriptor is bound to. Handler errors never leave
//! the dispatcher; the invoker gets a failure reply instead.

mod builtin;
mod context;
mod dispatcher;
mod registry;

pub use context::CommandContext;
pub use dispatcher::Dispatcher;
pub use registry::{CommandRegistry, HandlerId};

use async_trait::async_trait;

use crate::error::CommandError;

/// Result type for command handlers.
pub type CommandResult = Result<(), CommandError>;

/// A built-in chat command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult;

    /// Reply sent to the invoker when `handle` fails.
    fn failure_reply(&self) -> &'static str {
        "Failed to execute command."
    }
}

/// The handler implementation bound to `id`.
pub fn handler_for(id: HandlerId) -> &'static dyn CommandHandler {
    match id {
        HandlerId::Ping => &builtin::PingHandler,
        HandlerId::Help => &builtin::HelpHandler,
        HandlerId::MassPoke => &builtin::MassPokeHandler,
        HandlerId::MassKick => &builtin::MassKickHandler,
        HandlerId::MassMove => &builtin::MassMoveHandler,
        HandlerId::Join => &builtin::JoinHandler,
    }
}
