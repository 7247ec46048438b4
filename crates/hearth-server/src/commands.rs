// Verb dispatch: the handler table and the built-in handlers.

use std::collections::HashMap;

use hearth_core::World;
use tracing::info;

use crate::describe::describe_room;
use crate::registry::SessionRegistry;
use crate::session::Session;

/// Shared state a handler may act on besides the acting session.
pub struct CommandContext<'a> {
    pub world: &'a World,
    pub registry: &'a SessionRegistry,
}

/// A verb handler. Receives every token of the line (verb included) and
/// returns `true` when the session should end.
pub type Handler = fn(&CommandContext<'_>, &Session, &[String]) -> bool;

pub const HELP_TEXT: &str = "\n\rAvailable Commands:\
\n\rquit - Quit the game\
\n\rsay <message> - Say something to all players\
\n\rlook - Look around the room\
\n\rhelp - Display available commands\n\r";

/// Table mapping verbs to handlers. Verbs without a handler get a
/// "not yet implemented" notice.
pub struct CommandExecutor {
    handlers: HashMap<&'static str, Handler>,
}

impl CommandExecutor {
    /// An executor with the built-in handlers registered.
    pub fn new() -> Self {
        let mut executor = Self {
            handlers: HashMap::new(),
        };
        executor.register("quit", quit);
        executor.register("say", say);
        executor.register("look", look);
        executor.register("help", help);
        executor
    }

    fn register(&mut self, verb: &'static str, handler: Handler) {
        self.handlers.insert(verb, handler);
    }

    /// Run the handler for `verb`. Returns the handler's terminate flag.
    pub fn execute(
        &self,
        ctx: &CommandContext<'_>,
        session: &Session,
        verb: &str,
        tokens: &[String],
    ) -> bool {
        match self.handlers.get(verb) {
            Some(handler) => handler(ctx, session, tokens),
            None => {
                session.send("\n\rCommand not yet implemented.\n\r");
                false
            }
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn quit(_ctx: &CommandContext<'_>, session: &Session, _tokens: &[String]) -> bool {
    info!("Player {} is quitting", session.name());
    session.send("\n\rGoodbye!");
    true
}

fn say(ctx: &CommandContext<'_>, session: &Session, tokens: &[String]) -> bool {
    if tokens.len() < 2 {
        session.send("\n\rWhat do you want to say?\n\r");
        return false;
    }

    let message = tokens[1..].join(" ");
    let broadcast = format!("\n\r{} says: {}\n\r", session.name(), message);
    ctx.registry.broadcast(Some(session.id()), |recipient| {
        format!("{broadcast}{}", recipient.prompt())
    });

    session.send(format!("\n\rYou say: {message}\n\r"));
    false
}

fn look(ctx: &CommandContext<'_>, session: &Session, _tokens: &[String]) -> bool {
    session.send(describe_room(ctx.world, ctx.registry, session));
    false
}

fn help(_ctx: &CommandContext<'_>, session: &Session, _tokens: &[String]) -> bool {
    session.send(HELP_TEXT);
    false
}
