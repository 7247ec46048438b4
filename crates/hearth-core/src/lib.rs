// Library root: the room/exit world graph, its identity source, the JSON
// authoring importer and the embedded key-value store.

pub mod error;
pub mod ids;
pub mod import;
pub mod model;
pub mod store;

pub use error::{IdExhausted, ImportError, StoreError};
pub use ids::IdAllocator;
pub use import::{import_file, import_str, ImportSummary};
pub use model::{Exit, ExitId, Room, RoomId, World};
pub use store::{SaveMode, WorldStore};
