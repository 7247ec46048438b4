// Offline world builder: overlay an authoring JSON file onto a world store.
//
// Pipeline:
// 1. Load the existing snapshot (a store with no buckets starts an empty world;
//    any other load failure aborts before anything is written)
// 2. Import the authoring file on top of it
// 3. Save the result in one transaction
// 4. Reload to verify and report counts

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hearth_core::{
    import_file, IdAllocator, ImportSummary, SaveMode, StoreError, World, WorldStore,
};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "hearth-loader",
    about = "Import an authoring JSON file into a Hearth world store"
)]
struct Cli {
    /// Authoring JSON file to import.
    #[arg(short = 'j', long = "json", default_value = "test_data.json")]
    json: PathBuf,

    /// World store file to update.
    #[arg(short = 'b', long = "store", default_value = "test_data.bolt")]
    store: String,

    /// Keep stored rooms and exits the import does not overwrite instead of
    /// replacing the whole snapshot.
    #[arg(short = 'm', long)]
    merge: bool,
}

/// What one pipeline run did.
#[derive(Debug, Default)]
struct Outcome {
    loaded_existing: bool,
    import: Option<ImportSummary>,
    /// `(rooms, exits)` read back after saving, if the reload succeeded.
    verified: Option<(usize, usize)>,
    dangling: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;
    let outcome = run(&cli)?;

    println!(
        "Done: world {}, import {}, {} dangling exits",
        if outcome.loaded_existing { "updated" } else { "created" },
        if outcome.import.is_some() { "applied" } else { "skipped" },
        outcome.dangling
    );
    if outcome.verified.is_none() {
        anyhow::bail!("saved world could not be read back from {}", cli.store);
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let mut outcome = Outcome::default();

    let store = WorldStore::open(&cli.store)
        .with_context(|| format!("failed to open world store {}", cli.store))?;

    println!("Loading world from {}", cli.store);
    let mut world = match store.load() {
        Ok(world) => {
            println!("Loaded {} rooms, {} exits", world.len(), world.exit_count());
            outcome.loaded_existing = true;
            world
        }
        Err(StoreError::MissingBucket(bucket)) => {
            eprintln!("No {bucket} bucket in {}; starting a new world", cli.store);
            World::new()
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to load existing world from {}; nothing was saved", cli.store)
            });
        }
    };

    let ids = IdAllocator::new();
    println!("Importing {}", cli.json.display());
    match import_file(&cli.json, &mut world, &ids) {
        Ok(summary) => {
            println!(
                "Imported {} new rooms, replaced {}, allocated {} exits",
                summary.rooms_created, summary.rooms_replaced, summary.exits_allocated
            );
            outcome.import = Some(summary);
        }
        Err(e) => {
            eprintln!("Import failed: {e}");
            eprintln!("Saving the world as loaded");
        }
    }

    let mode = if cli.merge {
        SaveMode::Merge
    } else {
        SaveMode::Replace
    };
    store
        .save(&world, mode)
        .with_context(|| format!("failed to save world to {}", cli.store))?;
    println!(
        "Saved {} rooms, {} exits ({mode:?})",
        world.len(),
        world.exit_count()
    );

    match store.load() {
        Ok(reloaded) => {
            println!(
                "Verified {}: {} rooms, {} exits",
                cli.store,
                reloaded.len(),
                reloaded.exit_count()
            );
            let dangling = reloaded.dangling_exits();
            for (room, exit) in &dangling {
                warn!("Dangling exit {room}_{} -> {}", exit.direction, exit.target_room);
                eprintln!(
                    "Warning: exit {} of room {room} leads to missing room {}",
                    exit.direction, exit.target_room
                );
            }
            outcome.dangling = dangling.len();
            outcome.verified = Some((reloaded.len(), reloaded.exit_count()));
        }
        Err(e) => eprintln!("Verification reload failed: {e}"),
    }

    let (rooms, exits) = store
        .counts()
        .with_context(|| format!("failed to count entries in {}", cli.store))?;
    println!("Store holds {rooms} room entries, {exits} exit entries");

    Ok(outcome)
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const AUTHORING: &str = r#"{
        "rooms": {
            "1": {"area": "yard", "title": "Courtyard", "description": "Cobbles.",
                  "exits": [{"direction": "in", "visible": true, "target_room": 2},
                            {"direction": "well", "visible": false, "target_room": 77}]},
            "2": {"area": "yard", "title": "Stable", "description": "Hay.",
                  "exits": [{"direction": "out", "visible": true, "target_room": 1}]}
        }
    }"#;

    fn cli(dir: &Path, json: &str, merge: bool) -> Cli {
        Cli {
            json: dir.join(json),
            store: dir.join("world.db").to_string_lossy().into_owned(),
            merge,
        }
    }

    #[test]
    fn flag_defaults() {
        let cli = Cli::parse_from(["hearth-loader"]);
        assert_eq!(cli.json, PathBuf::from("test_data.json"));
        assert_eq!(cli.store, "test_data.bolt");
        assert!(!cli.merge);
    }

    #[test]
    fn short_flags() {
        let cli = Cli::parse_from(["hearth-loader", "-j", "a.json", "-b", "a.bolt", "-m"]);
        assert_eq!(cli.json, PathBuf::from("a.json"));
        assert_eq!(cli.store, "a.bolt");
        assert!(cli.merge);
    }

    #[test]
    fn fresh_store_is_built_from_json() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("rooms.json"), AUTHORING).unwrap();

        let outcome = run(&cli(tmp.path(), "rooms.json", false)).unwrap();

        assert!(!outcome.loaded_existing, "no buckets yet");
        assert_eq!(outcome.import.unwrap().rooms_created, 2);
        assert_eq!(outcome.verified, Some((2, 3)));
        assert_eq!(outcome.dangling, 1);
    }

    #[test]
    fn rerun_replaces_instead_of_accumulating() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("rooms.json"), AUTHORING).unwrap();
        let args = cli(tmp.path(), "rooms.json", false);

        run(&args).unwrap();
        let second = run(&args).unwrap();

        assert!(second.loaded_existing);
        assert_eq!(second.import.unwrap().rooms_replaced, 2);
        assert_eq!(second.verified, Some((2, 3)));
    }

    #[test]
    fn failed_import_still_saves_loaded_world() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("rooms.json"), AUTHORING).unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();

        run(&cli(tmp.path(), "rooms.json", false)).unwrap();
        let outcome = run(&cli(tmp.path(), "broken.json", false)).unwrap();

        assert!(outcome.import.is_none());
        assert_eq!(outcome.verified, Some((2, 3)));
    }

    #[test]
    fn unreadable_store_is_left_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("rooms.json"), AUTHORING).unwrap();
        std::fs::write(
            tmp.path().join("other.json"),
            r#"{"rooms": {"50": {"title": "Elsewhere"}}}"#,
        )
        .unwrap();
        let first = cli(tmp.path(), "rooms.json", false);
        run(&first).unwrap();

        // An exit whose room is gone makes the whole snapshot unloadable.
        rusqlite::Connection::open(&first.store)
            .unwrap()
            .execute(
                r#"INSERT INTO "Exits" (key, value) VALUES (?1, ?2)"#,
                [
                    "999_east",
                    r#"{"id":500,"target_room":1,"visible":true,"direction":"east"}"#,
                ],
            )
            .unwrap();

        let err = run(&cli(tmp.path(), "other.json", false)).unwrap_err();
        assert!(err.to_string().contains("failed to load existing world"));

        let store = WorldStore::open(&first.store).unwrap();
        assert_eq!(store.counts().unwrap(), (2, 4), "stored rows survive");
        assert!(matches!(store.load(), Err(StoreError::OrphanExit { .. })));
    }

    #[test]
    fn missing_json_on_fresh_store_saves_empty_world() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = run(&cli(tmp.path(), "absent.json", false)).unwrap();
        assert!(outcome.import.is_none());
        assert_eq!(outcome.verified, Some((0, 0)));
    }
}
