// JSON authoring-file import: overlays hand-written rooms onto a loaded graph.
//
// File shape:
//
//   {"rooms": {"<room_id>": {"area": "...", "title": "...", "description": "...",
//     "exits": [{"direction": "north", "visible": true, "target_room": 2}, ...]}}}

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ImportError;
use crate::ids::IdAllocator;
use crate::model::{Exit, Room, RoomId, World};

// ---------------------------------------------------------------------------
// Authoring format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuthoringFile {
    rooms: HashMap<String, RoomEntry>,
}

#[derive(Debug, Deserialize)]
struct RoomEntry {
    #[serde(default)]
    area: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    exits: Vec<ExitEntry>,
}

#[derive(Debug, Deserialize)]
struct ExitEntry {
    direction: String,
    #[serde(default)]
    visible: bool,
    target_room: i64,
}

/// What an overlay changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rooms_created: usize,
    pub rooms_replaced: usize,
    pub exits_allocated: usize,
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Read the authoring file at `path` and overlay it onto `world`.
pub fn import_file(
    path: impl AsRef<Path>,
    world: &mut World,
    ids: &IdAllocator,
) -> Result<ImportSummary, ImportError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let summary = import_str(&text, world, ids)?;
    info!(
        "Imported {}: {} rooms created, {} replaced, {} exits allocated",
        path.display(),
        summary.rooms_created,
        summary.rooms_replaced,
        summary.exits_allocated
    );
    Ok(summary)
}

/// Overlay an authoring document onto `world`.
///
/// Each entry replaces its room wholesale: area, title and description are
/// overwritten and the exit map is rebuilt from scratch. Every exit gets a
/// freshly allocated ID, even when the room already had an exit in the same
/// direction; the old IDs are discarded.
///
/// All room keys are validated before the graph is touched, so a
/// [`ImportError::RoomKey`] leaves `world` unchanged.
pub fn import_str(
    text: &str,
    world: &mut World,
    ids: &IdAllocator,
) -> Result<ImportSummary, ImportError> {
    let file: AuthoringFile = serde_json::from_str(text)?;

    let mut entries = file
        .rooms
        .into_iter()
        .map(|(key, entry)| match key.parse::<i64>() {
            Ok(id) => Ok((RoomId(id), entry)),
            Err(source) => Err(ImportError::RoomKey { key, source }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|(id, _)| *id);

    // Existing exits must never collide with the ones minted below.
    ids.seed_from_graph(world);

    let mut summary = ImportSummary::default();
    for (room_id, entry) in entries {
        let mut room = Room::new(room_id, entry.area, entry.title, entry.description);
        for exit in entry.exits {
            room.insert_exit(Exit {
                id: ids.next_id()?,
                target_room: RoomId(exit.target_room),
                visible: exit.visible,
                direction: exit.direction,
            });
            summary.exits_allocated += 1;
        }

        debug!("Overlaying room {} with {} exits", room_id, room.exit_count());
        if world.insert_room(room).is_some() {
            summary.rooms_replaced += 1;
        } else {
            summary.rooms_created += 1;
        }
    }

    Ok(summary)
}
