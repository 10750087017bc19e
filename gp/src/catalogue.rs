//! The embedded message catalogue for this one backend
//!
//! The client automates a single game backend, so the catalogue ships inside
//! the binary. The JSON source stays loadable from a file for protocol-bump
//! experiments, but `default_registry` is what production code uses.

use crate::schema::{SchemaLoadError, SchemaRegistry};

/// Embedded catalogue source
pub const DEFAULT_CATALOGUE: &str = include_str!("catalogue.json");

/// Build a registry from the embedded catalogue
pub fn default_registry() -> Result<SchemaRegistry, SchemaLoadError> {
    SchemaRegistry::load(DEFAULT_CATALOGUE)
}

/// Message names as they appear in the catalogue
///
/// Session and loop code refers to messages through these constants so a
/// rename in the catalogue is a compile-visible change, not a stringly typo.
pub mod msg {
    pub const LOGIN_REQUEST: &str = "LoginRequest";
    pub const LOGIN_RESPONSE: &str = "LoginResponse";
    pub const KEEPALIVE: &str = "Keepalive";
    pub const KEEPALIVE_ACK: &str = "KeepaliveAck";

    pub const FARM_STATE_REQUEST: &str = "FarmStateRequest";
    pub const FARM_STATE_RESPONSE: &str = "FarmStateResponse";
    pub const PLOT_PUSH: &str = "PlotPush";
    pub const HARVEST_REQUEST: &str = "HarvestRequest";
    pub const HARVEST_RESPONSE: &str = "HarvestResponse";
    pub const SHOVEL_REQUEST: &str = "ShovelRequest";
    pub const SHOVEL_RESPONSE: &str = "ShovelResponse";
    pub const WATER_REQUEST: &str = "WaterRequest";
    pub const WATER_RESPONSE: &str = "WaterResponse";
    pub const WEED_REQUEST: &str = "WeedRequest";
    pub const WEED_RESPONSE: &str = "WeedResponse";
    pub const SPRAY_REQUEST: &str = "SprayRequest";
    pub const SPRAY_RESPONSE: &str = "SprayResponse";
    pub const PLANT_REQUEST: &str = "PlantRequest";
    pub const PLANT_RESPONSE: &str = "PlantResponse";
    pub const BUY_SEED_REQUEST: &str = "BuySeedRequest";
    pub const BUY_SEED_RESPONSE: &str = "BuySeedResponse";

    pub const FRIEND_LIST_REQUEST: &str = "FriendListRequest";
    pub const FRIEND_LIST_RESPONSE: &str = "FriendListResponse";
    pub const FRIEND_FARM_REQUEST: &str = "FriendFarmRequest";
    pub const FRIEND_FARM_RESPONSE: &str = "FriendFarmResponse";
    pub const HELP_REQUEST: &str = "HelpRequest";
    pub const HELP_RESPONSE: &str = "HelpResponse";
    pub const STEAL_REQUEST: &str = "StealRequest";
    pub const STEAL_RESPONSE: &str = "StealResponse";
    pub const FRIEND_PUSH: &str = "FriendPush";

    pub const TASK_LIST_REQUEST: &str = "TaskListRequest";
    pub const TASK_LIST_RESPONSE: &str = "TaskListResponse";
    pub const SHARE_TASK_REQUEST: &str = "ShareTaskRequest";
    pub const SHARE_TASK_RESPONSE: &str = "ShareTaskResponse";
    pub const CLAIM_TASK_REQUEST: &str = "ClaimTaskRequest";
    pub const CLAIM_TASK_RESPONSE: &str = "ClaimTaskResponse";
    pub const TASK_PUSH: &str = "TaskPush";

    pub const INVENTORY_REQUEST: &str = "InventoryRequest";
    pub const INVENTORY_RESPONSE: &str = "InventoryResponse";
    pub const SELL_ITEM_REQUEST: &str = "SellItemRequest";
    pub const SELL_ITEM_RESPONSE: &str = "SellItemResponse";
    pub const INVENTORY_PUSH: &str = "InventoryPush";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_catalogue_loads() {
        let registry = default_registry().unwrap();
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_every_msg_constant_resolves() {
        let registry = default_registry().unwrap();
        let names = [
            msg::LOGIN_REQUEST,
            msg::LOGIN_RESPONSE,
            msg::KEEPALIVE,
            msg::KEEPALIVE_ACK,
            msg::FARM_STATE_REQUEST,
            msg::FARM_STATE_RESPONSE,
            msg::PLOT_PUSH,
            msg::HARVEST_REQUEST,
            msg::HARVEST_RESPONSE,
            msg::SHOVEL_REQUEST,
            msg::SHOVEL_RESPONSE,
            msg::WATER_REQUEST,
            msg::WATER_RESPONSE,
            msg::WEED_REQUEST,
            msg::WEED_RESPONSE,
            msg::SPRAY_REQUEST,
            msg::SPRAY_RESPONSE,
            msg::PLANT_REQUEST,
            msg::PLANT_RESPONSE,
            msg::BUY_SEED_REQUEST,
            msg::BUY_SEED_RESPONSE,
            msg::FRIEND_LIST_REQUEST,
            msg::FRIEND_LIST_RESPONSE,
            msg::FRIEND_FARM_REQUEST,
            msg::FRIEND_FARM_RESPONSE,
            msg::HELP_REQUEST,
            msg::HELP_RESPONSE,
            msg::STEAL_REQUEST,
            msg::STEAL_RESPONSE,
            msg::FRIEND_PUSH,
            msg::TASK_LIST_REQUEST,
            msg::TASK_LIST_RESPONSE,
            msg::SHARE_TASK_REQUEST,
            msg::SHARE_TASK_RESPONSE,
            msg::CLAIM_TASK_REQUEST,
            msg::CLAIM_TASK_RESPONSE,
            msg::TASK_PUSH,
            msg::INVENTORY_REQUEST,
            msg::INVENTORY_RESPONSE,
            msg::SELL_ITEM_REQUEST,
            msg::SELL_ITEM_RESPONSE,
            msg::INVENTORY_PUSH,
        ];
        for name in names {
            assert!(registry.describe(name).is_ok(), "missing descriptor for {name}");
        }
    }

    #[test]
    fn test_login_round_trip_through_catalogue() {
        let registry = default_registry().unwrap();
        let value = json!({ "code": "0a1b2c", "platform": 2, "version": "1.4.7" });

        let payload = crate::codec::encode(&registry, msg::LOGIN_REQUEST, &value).unwrap();
        let decoded = crate::codec::decode(&registry, msg::LOGIN_REQUEST, &payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_farm_state_response_round_trip() {
        let registry = default_registry().unwrap();
        let value = json!({
            "plots": [
                { "index": 0, "crop": 101, "stage": 2, "dry": false, "weeds": true, "pests": false, "planted_at": 1754000000i64 },
                { "index": 1, "stage": 0 }
            ],
            "gold": 12345u64
        });

        let payload = crate::codec::encode(&registry, msg::FARM_STATE_RESPONSE, &value).unwrap();
        let decoded = crate::codec::decode(&registry, msg::FARM_STATE_RESPONSE, &payload).unwrap();
        assert_eq!(decoded, value);
    }
}
