// Room description text, as seen by one player.

use hearth_core::World;

use crate::registry::SessionRegistry;
use crate::session::Session;

/// Describe the viewer's current room: title, description, visible exits and
/// the other players standing there.
pub fn describe_room(world: &World, registry: &SessionRegistry, viewer: &Session) -> String {
    let Some(room) = world.room(viewer.room()) else {
        return "\n\rYou are floating in a formless void.\n\r".to_string();
    };

    let mut out = String::new();
    out.push_str(&format!("\n\r{}\n\r{}\n\r", room.title, room.description));

    let exits: Vec<&str> = room.visible_exits().map(|e| e.direction.as_str()).collect();
    if exits.is_empty() {
        out.push_str("There are no obvious exits.\n\r");
    } else {
        out.push_str(&format!("Obvious exits: {}\n\r", exits.join(", ")));
    }

    for name in registry.names_in_room(room.id, viewer.id()) {
        out.push_str(&format!("{name} is here.\n\r"));
    }

    out
}
