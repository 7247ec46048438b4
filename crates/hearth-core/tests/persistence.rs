// Integration tests for the offline pipeline: load -> import overlay -> save
// -> reload, against an on-disk store.

use std::collections::{BTreeMap, HashSet};

use hearth_core::{
    import_file, import_str, Exit, ExitId, IdAllocator, Room, RoomId, SaveMode, StoreError, World,
    WorldStore,
};

// ===========================================================================
// Test helpers
// ===========================================================================

const AUTHORING: &str = r#"{
    "rooms": {
        "100": {
            "area": "harbour",
            "title": "Quay",
            "description": "Gulls wheel over the nets.",
            "exits": [
                {"direction": "east", "visible": true, "target_room": 101},
                {"direction": "west", "visible": true, "target_room": 102},
                {"direction": "under", "visible": false, "target_room": 900}
            ]
        },
        "101": {
            "area": "harbour",
            "title": "Fish Market",
            "description": "It smells exactly as expected.",
            "exits": [{"direction": "west", "visible": true, "target_room": 100}]
        },
        "102": {
            "area": "harbour",
            "title": "Lighthouse Steps",
            "description": "A long climb.",
            "exits": []
        }
    }
}"#;

/// Per-room exit content without identities: (direction, target, visible).
fn exit_content(world: &World) -> BTreeMap<RoomId, Vec<(String, RoomId, bool)>> {
    world
        .rooms()
        .map(|room| {
            let exits = room
                .exits()
                .map(|e| (e.direction.clone(), e.target_room, e.visible))
                .collect();
            (room.id, exits)
        })
        .collect()
}

fn exit_ids(world: &World) -> HashSet<ExitId> {
    world.rooms().flat_map(Room::exits).map(|e| e.id).collect()
}

/// One run of the offline tool: load (tolerating a fresh store), overlay,
/// save, reload.
fn run_pipeline(store: &WorldStore, authoring: &str) -> World {
    let mut world = match store.load() {
        Ok(world) => world,
        Err(StoreError::MissingBucket(_)) => World::new(),
        Err(e) => panic!("unexpected load failure: {e}"),
    };
    let ids = IdAllocator::new();
    import_str(authoring, &mut world, &ids).unwrap();
    store.save(&world, SaveMode::Replace).unwrap();
    store.load().unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn importing_twice_yields_disjoint_exit_ids_with_identical_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.bolt");
    let store = WorldStore::open(path.to_str().unwrap()).unwrap();

    let first = run_pipeline(&store, AUTHORING);
    let second = run_pipeline(&store, AUTHORING);

    let first_ids = exit_ids(&first);
    let second_ids = exit_ids(&second);
    assert_eq!(first_ids.len(), 4);
    assert_eq!(second_ids.len(), 4);
    assert!(
        first_ids.is_disjoint(&second_ids),
        "re-import must mint new exit ids: {first_ids:?} vs {second_ids:?}"
    );
    assert_eq!(exit_content(&first), exit_content(&second));
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.bolt");
    let path = path.to_str().unwrap();

    let saved = {
        let store = WorldStore::open(path).unwrap();
        run_pipeline(&store, AUTHORING)
    };

    let reopened = WorldStore::open(path).unwrap();
    let loaded = reopened.load().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.room(RoomId(100)).unwrap().title, "Quay");
}

#[test]
fn save_load_preserves_every_exit_field() {
    let store = WorldStore::open(":memory:").unwrap();
    let mut world = World::new();
    for r in 1..=5i64 {
        let mut room = Room::new(RoomId(r), "grid", format!("Cell {r}"), "");
        for (i, dir) in ["north", "south", "east", "west"].iter().take(r as usize % 5).enumerate() {
            room.insert_exit(Exit {
                id: ExitId(r * 10 + i as i64),
                target_room: RoomId((r % 5) + 1),
                visible: i % 2 == 0,
                direction: dir.to_string(),
            });
        }
        world.insert_room(room);
    }

    store.save(&world, SaveMode::Merge).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded.len(), world.len());
    for room in world.rooms() {
        let got = loaded.room(room.id).unwrap();
        let want: Vec<_> = room.exits().collect();
        let have: Vec<_> = got.exits().collect();
        assert_eq!(want, have, "exits differ for room {}", room.id);
    }
}

#[test]
fn orphaned_exit_row_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.bolt");
    let store = WorldStore::open(path.to_str().unwrap()).unwrap();
    let mut world = World::new();
    import_str(AUTHORING, &mut world, &IdAllocator::new()).unwrap();
    store.save(&world, SaveMode::Replace).unwrap();

    // Written behind the store's back, as another tool might.
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute(
            r#"INSERT INTO "Exits" (key, value) VALUES (?1, ?2)"#,
            [
                "555_north",
                r#"{"id":1000,"target_room":100,"visible":true,"direction":"north"}"#,
            ],
        )
        .unwrap();

    assert!(matches!(
        store.load(),
        Err(StoreError::OrphanExit { ref key }) if key == "555_north"
    ));
}

#[test]
fn import_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test_data.json");
    std::fs::write(&path, AUTHORING).unwrap();

    let mut world = World::new();
    let summary = import_file(&path, &mut world, &IdAllocator::new()).unwrap();

    assert_eq!(summary.rooms_created, 3);
    assert_eq!(summary.exits_allocated, 4);
    assert_eq!(world.dangling_exits().len(), 1);
}
