// Session driver: connect, per-line dispatch and disconnect, shared by every
// transport.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use hearth_core::{RoomId, World};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::{CommandContext, CommandExecutor};
use crate::describe::describe_room;
use crate::registry::SessionRegistry;
use crate::router::CommandRouter;
use crate::session::{Mailbox, Session, SessionId};

/// Inbound lines from one connection, already split and decoded.
pub type LineStream = Pin<Box<dyn Stream<Item = String> + Send>>;

pub const NAME_PROMPT: &str = "\n\rBy what name do you wish to be known? ";

/// How long a closing connection may take to flush its mailbox.
pub(crate) const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Settings that shape every session.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub prompt: String,
    pub mailbox_capacity: usize,
    pub max_dropped: u64,
    pub start_room: RoomId,
    /// Banner sent once on entry, before the first room description.
    pub welcome: String,
}

/// The live game: an immutable world graph plus the connected sessions.
pub struct Server {
    world: World,
    registry: SessionRegistry,
    router: CommandRouter,
    executor: CommandExecutor,
    settings: ServerSettings,
    next_session: AtomicU64,
}

impl Server {
    pub fn new(world: World, settings: ServerSettings) -> Self {
        Self {
            world,
            registry: SessionRegistry::new(settings.max_dropped),
            router: CommandRouter::default(),
            executor: CommandExecutor::new(),
            settings,
            next_session: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// A fresh outbound mailbox sized from the settings. Transports open one
    /// per connection and drain the receiver to the socket.
    pub fn open_mailbox(&self) -> (Mailbox, mpsc::Receiver<String>) {
        Mailbox::channel(self.settings.mailbox_capacity)
    }

    /// Where new players appear: the configured start room, or the lowest
    /// room ID when that room does not exist.
    fn entry_room(&self) -> RoomId {
        let start = self.settings.start_room;
        if self.world.contains(start) {
            return start;
        }
        match self.world.first_room() {
            Some(first) => {
                warn!("Start room {start} not found, using room {first}");
                first
            }
            None => {
                warn!("World has no rooms; players start in the void");
                start
            }
        }
    }

    /// Register a named player and greet them.
    ///
    /// Fails, returning the mailbox, when another live session already uses
    /// the name (case-insensitive).
    pub fn connect(&self, name: &str, mailbox: Mailbox) -> Result<Arc<Session>, Mailbox> {
        let id = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        let session = Session::new(
            id,
            name,
            self.settings.prompt.clone(),
            self.entry_room(),
            mailbox,
        );
        let session = match self.registry.join(session) {
            Ok(session) => session,
            Err(refused) => {
                debug!("Name {name} is already in use");
                return Err(refused.into_mailbox());
            }
        };
        info!("Player {name} connected as session {id}");

        session.send(format!(
            "{}{}{}",
            self.settings.welcome,
            describe_room(&self.world, &self.registry, &session),
            session.prompt()
        ));

        let arrival = format!("\n\r{name} has entered the game.\n\r");
        self.registry.broadcast(Some(id), |recipient| {
            format!("{arrival}{}", recipient.prompt())
        });

        Ok(session)
    }

    /// Handle one input line. Returns `true` when the session should end.
    pub fn handle_line(&self, session: &Session, line: &str) -> bool {
        debug!("Session {} input: {:?}", session.id(), line);

        let command = match self.router.route(line) {
            Ok(command) => command,
            Err(e) => {
                session.send(e.to_string());
                session.send(session.prompt());
                return false;
            }
        };

        let ctx = CommandContext {
            world: &self.world,
            registry: &self.registry,
        };
        let terminate = self
            .executor
            .execute(&ctx, session, &command.verb, &command.tokens);
        if !terminate {
            session.send(session.prompt());
        }
        terminate
    }

    /// Remove a session and tell the others it is gone.
    pub fn disconnect(&self, session: &Session) {
        self.registry.leave(session.id());
        info!("Player {} disconnected (session {})", session.name(), session.id());

        let departure = format!("\n\r{} has left the game.\n\r", session.name());
        self.registry.broadcast(None, |recipient| {
            format!("{departure}{}", recipient.prompt())
        });
    }
}

/// Drive one connection from its first line to its last.
///
/// The first non-blank line that the registry accepts becomes the player's
/// name; a taken name is refused and the player is asked again. After that
/// every line goes through [`Server::handle_line`] until a command ends the
/// session, the stream ends, or the registry evicts the session. The session
/// is always removed before returning.
pub async fn run_session<S>(server: &Server, lines: &mut S, mut mailbox: Mailbox)
where
    S: Stream<Item = String> + Unpin,
{
    mailbox.send(NAME_PROMPT);
    let session = loop {
        let Some(line) = lines.next().await else {
            debug!("Connection closed before a name was given");
            return;
        };
        let name = line.trim();
        if name.is_empty() {
            mailbox.send(NAME_PROMPT);
            continue;
        }
        match server.connect(name, mailbox) {
            Ok(session) => break session,
            Err(returned) => {
                mailbox = returned;
                mailbox.send(format!("\n\rThe name {name} is already in use.\n\r"));
                mailbox.send(NAME_PROMPT);
            }
        }
    };

    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(line) => {
                    if server.handle_line(&session, &line) {
                        break;
                    }
                }
                None => {
                    info!("Player {} lost connection", session.name());
                    break;
                }
            },
            () = session.evicted() => {
                warn!("Session {} ({}) evicted", session.id(), session.name());
                break;
            }
        }
    }

    server.disconnect(&session);
}

/// Wait for a transport's writer task after its session has ended.
///
/// The mailbox sender is gone by now, so a healthy writer stops once the
/// queue is flushed. A writer still blocked on a client that stopped reading
/// after [`WRITER_GRACE`] is aborted, which drops its half of the socket.
pub(crate) async fn finish_writer(mut writer: JoinHandle<()>, transport: &str) {
    match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{transport} writer task failed: {e}"),
        Err(_) => {
            warn!("{transport} writer did not finish within {WRITER_GRACE:?}, aborting");
            writer.abort();
            let _ = writer.await;
        }
    }
}
