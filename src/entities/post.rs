use serde::{Deserialize, Serialize};

use crate::core::strong_types::{now, Timestamp};

/// A timestamped url embedded in its owning user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub url: String,
    /// Stamped when the post is first written; never invented on read
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    /// Marked for exclusion on the owner's next save
    #[serde(skip)]
    removed: bool,
}

impl Post {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            created_at: now(),
            removed: false,
        }
    }

    /// Drop this post from its owner on the owner's next save.
    /// Nothing is written until then.
    pub fn remove(&mut self) {
        self.removed = true;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}
