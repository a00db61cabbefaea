use serde::{Deserialize, Serialize};

/// Kind of conversation a chat id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// One-to-one conversation.
    #[default]
    Direct,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Direct => "direct",
            ChatType::Group => "group",
        }
    }
}

/// Per-chat permissions set by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPermissions {
    pub notifications: bool,
    #[serde(default)]
    pub autodownload: bool,
    #[serde(default = "default_true")]
    pub display_picture: bool,
}

impl Default for ChatPermissions {
    fn default() -> Self {
        Self {
            notifications: true,
            autodownload: false,
            display_picture: true,
        }
    }
}

fn default_true() -> bool {
    true
}
