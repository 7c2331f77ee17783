pub mod dialogue;
pub mod esm;
pub mod plugin;
pub mod refid;

pub use dialogue::{DialInfo, Dialogue, DialogueType, InfoData, QuestStatus};
pub use plugin::{PluginFile, PluginHeader, PluginWriter};
pub use refid::RefId;
