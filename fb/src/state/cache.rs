//! StateCache - single-writer mirror of plots, friends, tasks, inventory
//!
//! Only the session's inbound dispatch path mutates the cache ([`apply`] is
//! `pub(crate)`), for both unsolicited pushes and confirmed command
//! responses. Loops take cloned snapshots at the start of a pass and never
//! write, which is what makes their concurrent passes safe without locks of
//! their own.
//!
//! [`apply`]: StateCache::apply

use std::collections::BTreeMap;
use std::sync::RwLock;

use gameproto::msg;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Friend, InventoryItem, Plot, TaskRecord};

/// In-memory game state, updated only from confirmed server data
#[derive(Debug, Default)]
pub struct StateCache {
    plots: RwLock<Vec<Plot>>,
    friends: RwLock<Vec<Friend>>,
    tasks: RwLock<Vec<TaskRecord>>,
    inventory: RwLock<BTreeMap<u32, InventoryItem>>,
}

impl StateCache {
    /// Snapshot of all plots, sorted by index
    pub fn plots(&self) -> Vec<Plot> {
        let mut plots = read(&self.plots).clone();
        plots.sort_by_key(|p| p.index);
        plots
    }

    /// Snapshot of the friend list
    pub fn friends(&self) -> Vec<Friend> {
        read(&self.friends).clone()
    }

    /// Snapshot of the task list
    pub fn tasks(&self) -> Vec<TaskRecord> {
        read(&self.tasks).clone()
    }

    /// Snapshot of the warehouse inventory
    pub fn inventory(&self) -> Vec<InventoryItem> {
        read(&self.inventory).values().cloned().collect()
    }

    /// Units held of one item, zero when the item is unknown
    pub fn item_quantity(&self, id: u32) -> u32 {
        read(&self.inventory).get(&id).map_or(0, |item| item.quantity)
    }

    /// Apply a decoded inbound message to the cache
    ///
    /// Called from the session dispatch path for every push and every
    /// correlated response. Messages without a handler are ignored; a
    /// malformed field set is logged and dropped rather than applied
    /// half-parsed.
    pub(crate) fn apply(&self, name: &str, value: &Value) {
        match name {
            msg::FARM_STATE_RESPONSE => {
                if let Some(plots) = parse::<Vec<Plot>>(name, value.get("plots")) {
                    *write(&self.plots) = plots;
                }
            }
            msg::PLOT_PUSH
            | msg::HARVEST_RESPONSE
            | msg::SHOVEL_RESPONSE
            | msg::WATER_RESPONSE
            | msg::WEED_RESPONSE
            | msg::SPRAY_RESPONSE
            | msg::PLANT_RESPONSE => {
                if let Some(plot) = parse::<Plot>(name, value.get("plot")) {
                    self.upsert_plot(plot);
                }
                // Harvest may also yield produce
                if name == msg::HARVEST_RESPONSE {
                    if let Some(item) = parse::<InventoryItem>(name, value.get("item")) {
                        self.upsert_item(item);
                    }
                }
            }
            msg::BUY_SEED_RESPONSE | msg::STEAL_RESPONSE => {
                if value.get("ok").and_then(Value::as_bool) == Some(true) {
                    if let Some(item) = parse::<InventoryItem>(name, value.get("item")) {
                        self.upsert_item(item);
                    }
                }
            }
            msg::FRIEND_LIST_RESPONSE | msg::FRIEND_PUSH => {
                if let Some(friends) = parse::<Vec<Friend>>(name, value.get("friends")) {
                    *write(&self.friends) = friends;
                }
            }
            msg::TASK_LIST_RESPONSE => {
                if let Some(tasks) = parse::<Vec<TaskRecord>>(name, value.get("tasks")) {
                    *write(&self.tasks) = tasks;
                }
            }
            msg::TASK_PUSH => {
                if let Some(task) = parse::<TaskRecord>(name, value.get("task")) {
                    let mut tasks = write(&self.tasks);
                    match tasks.iter_mut().find(|t| t.id == task.id) {
                        Some(existing) => *existing = task,
                        None => tasks.push(task),
                    }
                }
            }
            msg::CLAIM_TASK_RESPONSE => {
                if value.get("ok").and_then(Value::as_bool) == Some(true) {
                    if let Some(id) = value.get("task").and_then(Value::as_u64) {
                        let mut tasks = write(&self.tasks);
                        if let Some(task) = tasks.iter_mut().find(|t| u64::from(t.id) == id) {
                            task.reward_claimed = true;
                        }
                    }
                }
            }
            msg::INVENTORY_RESPONSE | msg::INVENTORY_PUSH => {
                if let Some(items) = parse::<Vec<InventoryItem>>(name, value.get("items")) {
                    *write(&self.inventory) = items.into_iter().map(|item| (item.id, item)).collect();
                }
            }
            msg::SELL_ITEM_RESPONSE => {
                if value.get("ok").and_then(Value::as_bool) == Some(true) {
                    if let Some(id) = value.get("item").and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()) {
                        let remaining = value.get("remaining").and_then(Value::as_u64).unwrap_or(0) as u32;
                        let mut inventory = write(&self.inventory);
                        if let Some(item) = inventory.get_mut(&id) {
                            item.quantity = remaining;
                        }
                    }
                }
            }
            other => {
                debug!(message = other, "no cache handler for message");
            }
        }
    }

    fn upsert_plot(&self, plot: Plot) {
        let mut plots = write(&self.plots);
        match plots.iter_mut().find(|p| p.index == plot.index) {
            Some(existing) => *existing = plot,
            None => plots.push(plot),
        }
    }

    fn upsert_item(&self, item: InventoryItem) {
        write(&self.inventory).insert(item.id, item);
    }
}

// A poisoned lock still holds valid data; the writer that panicked was the
// session dispatch task, and tearing down the whole process from a reader
// helps nobody.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn parse<T: DeserializeOwned>(context: &str, value: Option<&Value>) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(message = context, %error, "discarding malformed state update");
            None
        }
    }
}
