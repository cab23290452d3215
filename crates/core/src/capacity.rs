//! Cargo capacity derived from the ship's module loadout.

use serde_json::{Map, Value};
use tracing::debug;

/// Substring identifying cargo rack modules in an item identifier.
pub const CARGO_RACK_MARKER: &str = "cargorack";

/// Module slot name → module descriptor, as reported by the game.
pub type ModuleSnapshot = Map<String, Value>;

/// Sum the capacity of every cargo rack in `modules`.
///
/// A rack item such as `int_cargorack_size4_class1` holds `2^4` units. Racks
/// whose size cannot be read contribute nothing; the rest still count.
pub fn compute(modules: &ModuleSnapshot) -> u64 {
    modules
        .iter()
        .filter_map(|(slot, descriptor)| rack_capacity(slot, descriptor))
        .sum()
}

fn rack_capacity(slot: &str, descriptor: &Value) -> Option<u64> {
    let item = descriptor.get("Item")?.as_str()?.to_ascii_lowercase();
    if !item.contains(CARGO_RACK_MARKER) {
        return None;
    }
    match rack_size(&item) {
        Some(size) => Some(1u64 << size),
        None => {
            debug!(slot, item = %item, "skipping cargo rack with unreadable size");
            None
        }
    }
}

fn rack_size(item: &str) -> Option<u32> {
    item.split('_').nth(2)?.chars().last()?.to_digit(10)
}

/// Convert a journal `Loadout` record into a module snapshot keyed by slot.
///
/// Returns `None` when the record carries no module list.
pub fn module_snapshot_from_loadout(record: &Value) -> Option<ModuleSnapshot> {
    let modules = record.get("Modules")?.as_array()?;
    let snapshot = modules
        .iter()
        .filter_map(|module| {
            let slot = module.get("Slot")?.as_str()?;
            Some((slot.to_string(), module.clone()))
        })
        .collect();
    Some(snapshot)
}

/// Holds the most recently computed cargo capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityTracker {
    capacity: u64,
}

impl CapacityTracker {
    /// Tracker with unknown (zero) capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current capacity in cargo units.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Replace the capacity with the total computed from `modules`.
    pub fn refresh(&mut self, modules: &ModuleSnapshot) -> u64 {
        self.capacity = compute(modules);
        self.capacity
    }

    /// Refresh from a host state object carrying a `Modules` map.
    ///
    /// A state without modules resets the capacity to zero.
    pub fn refresh_from_state(&mut self, state: &Value) -> u64 {
        match state.get("Modules").and_then(Value::as_object) {
            Some(modules) => self.refresh(modules),
            None => {
                self.capacity = 0;
                0
            }
        }
    }
}
