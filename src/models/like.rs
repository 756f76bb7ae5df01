//! Like model

use serde::{Deserialize, Serialize};

/// Like count of an article together with whether the asking user liked it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeSummary {
    pub count: i64,
    pub liked: bool,
}
