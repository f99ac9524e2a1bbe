//! Local task list with a persisted dark/light preference.
//!
//! [`store::TaskStore`] and [`scheme::ColorScheme`] are independent; both
//! write through to an injected [`storage::Storage`].

pub mod coerce;
pub mod db;
pub mod ids;
pub mod scheme;
pub mod server;
pub mod storage;
pub mod store;
pub mod task;

pub use db::SqliteStorage;
pub use scheme::{
    AmbientSignal, ColorScheme, InvalidScheme, NoAmbient, RootClassList, Scheme, SchemeMarker,
};
pub use storage::{MemoryStorage, Storage, StorageError, StorageResult};
pub use store::{Counts, TaskStore};
pub use task::{Filter, InvalidPriority, NewTask, Priority, Task, TaskId};
