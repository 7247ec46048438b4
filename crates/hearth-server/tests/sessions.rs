// Integration tests for live play: a world loaded from an on-disk store,
// several concurrent sessions driven through the public session API, and a
// real TCP listener.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream;
use hearth_core::{import_str, IdAllocator, RoomId, SaveMode, World, WorldStore};
use hearth_server::listener;
use hearth_server::server::{run_session, LineStream, Server, ServerSettings};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ===========================================================================
// Test helpers
// ===========================================================================

const AUTHORING: &str = r#"{
    "rooms": {
        "1": {"area": "village", "title": "Village Green", "description": "Sheep graze here.",
              "exits": [{"direction": "north", "visible": true, "target_room": 2}]},
        "2": {"area": "village", "title": "Smithy", "description": "Hot and loud.",
              "exits": [{"direction": "south", "visible": true, "target_room": 1}]}
    }
}"#;

const WAIT: Duration = Duration::from_secs(5);

/// World built the way the server gets it: imported, saved, reopened.
fn stored_world() -> World {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("world.db");
    let path = path.to_str().unwrap();

    let mut world = World::new();
    import_str(AUTHORING, &mut world, &IdAllocator::new()).unwrap();
    WorldStore::open(path)
        .unwrap()
        .save(&world, SaveMode::Replace)
        .unwrap();

    WorldStore::open(path).unwrap().load().unwrap()
}

fn server(mailbox_capacity: usize, max_dropped: u64) -> Arc<Server> {
    Arc::new(Server::new(
        stored_world(),
        ServerSettings {
            prompt: "> ".into(),
            mailbox_capacity,
            max_dropped,
            start_room: RoomId(1),
            welcome: "\n\rWelcome!\n\r".into(),
        },
    ))
}

/// A player connected through channels instead of a socket.
struct Player {
    input: mpsc::UnboundedSender<String>,
    output: mpsc::Receiver<String>,
    task: JoinHandle<()>,
}

impl Player {
    fn spawn(server: &Arc<Server>, name: &str) -> Self {
        let (input, rx) = mpsc::unbounded_channel::<String>();
        let mut lines: LineStream = Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        }));
        let (mailbox, output) = server.open_mailbox();
        input.send(name.to_string()).unwrap();

        let server = Arc::clone(server);
        let task = tokio::spawn(async move {
            run_session(&server, &mut lines, mailbox).await;
        });
        Self {
            input,
            output,
            task,
        }
    }

    fn type_line(&self, line: &str) {
        self.input.send(line.to_string()).unwrap();
    }

    /// Read output until some message contains `needle`; returns everything
    /// read on the way.
    async fn read_until(&mut self, needle: &str) -> String {
        let mut seen = String::new();
        loop {
            let msg = tokio::time::timeout(WAIT, self.output.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; saw {seen:?}"))
                .unwrap_or_else(|| panic!("mailbox closed waiting for {needle:?}; saw {seen:?}"));
            seen.push_str(&msg);
            if msg.contains(needle) {
                return seen;
            }
        }
    }
}

async fn wait_for_players(server: &Server, n: usize) {
    tokio::time::timeout(WAIT, async {
        while server.registry().len() != n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("registry never reached the expected size");
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn say_reaches_every_other_player_with_their_prompt() {
    let server = server(32, 10);
    let mut ada = Player::spawn(&server, "Ada");
    ada.read_until("Village Green").await;

    let mut others = Vec::new();
    for name in ["Bob", "Cy", "Di"] {
        let mut player = Player::spawn(&server, name);
        player.read_until("Village Green").await;
        others.push(player);
    }
    wait_for_players(&server, 4).await;

    ada.type_line("say hello all");
    let echo = ada.read_until("You say: hello all").await;
    assert!(!echo.contains("Ada says"), "sender gets only the echo");

    for player in &mut others {
        let seen = player.read_until("Ada says").await;
        assert!(seen.ends_with("\n\rAda says: hello all\n\r> "));
    }

    ada.type_line("quit");
    ada.read_until("Goodbye!").await;
    tokio::time::timeout(WAIT, ada.task).await.unwrap().unwrap();
    wait_for_players(&server, 3).await;

    for player in &mut others {
        player.read_until("Ada has left the game.").await;
    }
}

#[tokio::test]
async fn bare_say_prompts_without_broadcast() {
    let server = server(32, 10);
    let mut ada = Player::spawn(&server, "Ada");
    ada.read_until("Village Green").await;
    let mut bob = Player::spawn(&server, "Bob");
    bob.read_until("Village Green").await;
    ada.read_until("Bob has entered").await;

    bob.type_line("say");
    bob.read_until("What do you want to say?").await;
    bob.type_line("look");
    bob.read_until("Ada is here.").await;

    // Ada hears nothing from the empty say.
    assert!(ada.output.try_recv().is_err());
}

#[tokio::test]
async fn slow_player_is_evicted_without_stalling_the_speaker() {
    let server = server(4, 3);

    // Never drained after the greeting arrives.
    let slow = Player::spawn(&server, "Slow");
    wait_for_players(&server, 1).await;
    let mut noisy = Player::spawn(&server, "Noisy");
    noisy.read_until("Village Green").await;

    for i in 0..10 {
        noisy.type_line(&format!("say message {i}"));
        noisy.read_until(&format!("You say: message {i}")).await;
    }

    tokio::time::timeout(WAIT, slow.task)
        .await
        .expect("evicted session should end")
        .unwrap();
    assert_eq!(server.registry().len(), 1);
    noisy.read_until("Slow has left the game.").await;
}

#[tokio::test]
async fn tcp_listener_serves_a_full_session() {
    let server = server(32, 10);
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let accept_loop = tokio::spawn(listener::run(tcp, Arc::clone(&server)));

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut read, mut write) = stream.into_split();
    write
        .write_all(b"Ada\r\nlook\r\nsay anyone?\r\nquit\r\n")
        .await
        .unwrap();

    let mut output = String::new();
    tokio::time::timeout(WAIT, read.read_to_string(&mut output))
        .await
        .expect("server should close the connection after quit")
        .unwrap();

    assert!(output.contains("Obvious exits: north"));
    assert!(output.contains("You say: anyone?"));
    assert!(output.ends_with("\n\rGoodbye!"));

    wait_for_players(&server, 0).await;
    accept_loop.abort();
}
