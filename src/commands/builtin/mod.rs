//! Built-in command handlers.

mod info;
mod join;
mod mass;

pub use info::{HelpHandler, PingHandler};
pub use join::JoinHandler;
pub use mass::{MassKickHandler, MassMoveHandler, MassPokeHandler};

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
