pub mod actor_util;
pub mod lua_host;
pub mod settings;
pub mod store;
pub mod vfs;

pub use lua_host::{LuaContext, LuaHost};
pub use settings::{ModelSettings, Settings, SettingsError};
pub use store::{DialogueStore, FilteredDialogueStore};
