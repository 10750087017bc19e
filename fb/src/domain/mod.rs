//! Plain data types for cached game entities
//!
//! These structs deserialize directly from decoded message values; field
//! names match the wire catalogue.

mod friend;
mod item;
mod plot;
mod task;

pub use friend::Friend;
pub use item::InventoryItem;
pub use plot::{GrowthStage, Plot};
pub use task::TaskRecord;
