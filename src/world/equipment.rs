//! Equipment module
//!
//! The six visible equipment slots of an entity and the loadout container
//! compared slot-by-slot when deciding whether the client needs an update.

use serde::{Deserialize, Serialize};

/// Number of visible equipment slots
pub const EQUIPMENT_SLOT_COUNT: usize = 6;

/// Visible equipment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EquipmentSlot {
    MainHand = 0,
    OffHand = 1,
    Feet = 2,
    Legs = 3,
    Chest = 4,
    Head = 5,
}

impl EquipmentSlot {
    /// All slots in protocol order
    pub const ALL: [EquipmentSlot; EQUIPMENT_SLOT_COUNT] = [
        EquipmentSlot::MainHand,
        EquipmentSlot::OffHand,
        EquipmentSlot::Feet,
        EquipmentSlot::Legs,
        EquipmentSlot::Chest,
        EquipmentSlot::Head,
    ];

    /// Slot index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Slot name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            EquipmentSlot::MainHand => "main_hand",
            EquipmentSlot::OffHand => "off_hand",
            EquipmentSlot::Feet => "feet",
            EquipmentSlot::Legs => "legs",
            EquipmentSlot::Chest => "chest",
            EquipmentSlot::Head => "head",
        }
    }
}

/// Item held in an equipment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item ID (0 = empty)
    pub item_id: u32,
    /// Stack size
    pub amount: u32,
}

impl ItemStack {
    /// Empty slot
    pub const EMPTY: ItemStack = ItemStack {
        item_id: 0,
        amount: 0,
    };

    /// Create a new item stack
    pub fn new(item_id: u32, amount: u32) -> Self {
        Self { item_id, amount }
    }

    /// Check if this slot is empty
    pub fn is_empty(&self) -> bool {
        self.item_id == 0 || self.amount == 0
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Full six-slot equipment loadout of an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquipmentLoadout {
    slots: [ItemStack; EQUIPMENT_SLOT_COUNT],
}

impl EquipmentLoadout {
    /// Create an empty loadout
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style slot assignment
    pub fn with(mut self, slot: EquipmentSlot, item: ItemStack) -> Self {
        self.set(slot, item);
        self
    }

    /// Get the item in a slot
    pub fn get(&self, slot: EquipmentSlot) -> ItemStack {
        self.slots[slot.index()]
    }

    /// Set the item in a slot
    pub fn set(&mut self, slot: EquipmentSlot, item: ItemStack) {
        self.slots[slot.index()] = item;
    }

    /// Every slot with its item, in protocol order
    pub fn entries(&self) -> Vec<(EquipmentSlot, ItemStack)> {
        EquipmentSlot::ALL
            .iter()
            .map(|&slot| (slot, self.get(slot)))
            .collect()
    }

    /// Slots whose item differs from `previous`, with the new items
    pub fn changed_since(&self, previous: &EquipmentLoadout) -> Vec<(EquipmentSlot, ItemStack)> {
        EquipmentSlot::ALL
            .iter()
            .filter(|&&slot| self.get(slot) != previous.get(slot))
            .map(|&slot| (slot, self.get(slot)))
            .collect()
    }

    /// Check if every slot is empty
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ItemStack::is_empty)
    }
}
