// World graph: rooms, the exits that connect them, and the whole-world map.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// World-wide unique room identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

/// Globally unique exit identity, handed out by [`crate::IdAllocator`].
///
/// Exit IDs are scoped to a snapshot: re-importing a room mints fresh IDs for
/// all of its exits, so an exit ID is never a stable external reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Exit
// ---------------------------------------------------------------------------

/// A one-way connection out of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub id: ExitId,
    /// Destination room. May name a room that is not loaded (yet); targets
    /// are never validated on load or import.
    pub target_room: RoomId,
    /// Hidden exits are left out of room descriptions.
    pub visible: bool,
    /// Direction word; always equal to this exit's key in the owning room.
    pub direction: String,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A single location in the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub area: String,
    pub title: String,
    pub description: String,
    exits: BTreeMap<String, Exit>,
}

impl Room {
    pub fn new(
        id: RoomId,
        area: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Room {
            id,
            area: area.into(),
            title: title.into(),
            description: description.into(),
            exits: BTreeMap::new(),
        }
    }

    /// Add an exit keyed by its own direction, replacing any exit that
    /// already leaves in that direction. Returns the replaced exit.
    pub fn insert_exit(&mut self, exit: Exit) -> Option<Exit> {
        self.exits.insert(exit.direction.clone(), exit)
    }

    pub fn remove_exit(&mut self, direction: &str) -> Option<Exit> {
        self.exits.remove(direction)
    }

    pub fn exit(&self, direction: &str) -> Option<&Exit> {
        self.exits.get(direction)
    }

    /// All exits, ordered by direction.
    pub fn exits(&self) -> impl Iterator<Item = &Exit> {
        self.exits.values()
    }

    /// Exits a player standing in the room can see.
    pub fn visible_exits(&self) -> impl Iterator<Item = &Exit> {
        self.exits.values().filter(|e| e.visible)
    }

    pub fn exit_count(&self) -> usize {
        self.exits.len()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The full room/exit graph, keyed by room ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct World {
    rooms: BTreeMap<RoomId, Room>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a room, replacing (wholesale) any room with the same ID.
    pub fn insert_room(&mut self, room: Room) -> Option<Room> {
        self.rooms.insert(room.id, room)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    pub fn contains(&self, id: RoomId) -> bool {
        self.rooms.contains_key(&id)
    }

    /// Rooms in ascending ID order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// The lowest room ID, used as a fallback entry point.
    pub fn first_room(&self) -> Option<RoomId> {
        self.rooms.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn exit_count(&self) -> usize {
        self.rooms.values().map(Room::exit_count).sum()
    }

    /// Highest exit ID anywhere in the graph, or `None` if there are no exits.
    pub fn max_exit_id(&self) -> Option<ExitId> {
        self.rooms
            .values()
            .flat_map(Room::exits)
            .map(|e| e.id)
            .max()
    }

    /// `(room, exit)` pairs whose target room is not part of the graph.
    pub fn dangling_exits(&self) -> Vec<(RoomId, &Exit)> {
        self.rooms
            .values()
            .flat_map(|room| room.exits().map(move |exit| (room.id, exit)))
            .filter(|(_, exit)| !self.rooms.contains_key(&exit.target_room))
            .collect()
    }
}
