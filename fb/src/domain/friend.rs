//! Friend list entries

use serde::Deserialize;

/// A friend whose farm can be visited
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Friend {
    /// Backend identifier
    pub id: u64,

    /// Display name
    pub name: String,
}
