//! Execution environment binding.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An optional container image binding for command blocks.
///
/// When `image_tag` is set, command blocks run inside a fresh container
/// started from that image instead of on the local host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEnvironment {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image_tag: Option<String>,
}

impl ExecutionEnvironment {
    /// The image to run commands in, if any.
    pub fn container_image(&self) -> Option<&str> {
        self.image_tag.as_deref().filter(|tag| !tag.trim().is_empty())
    }
}
