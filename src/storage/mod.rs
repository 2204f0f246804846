pub mod database;
pub mod field_store;
pub mod history;
pub mod session_store;

pub use database::Database;
pub use field_store::{FieldStore, MemoryFieldStore};
pub use history::{normalize, HistoryView, PromptHistory, HISTORY_CAPACITY};
pub use session_store::{Cookie, FileSessionStore, MemorySessionStore, SessionStore};
