//! Update flags for entity view synchronization
//!
//! Tracks which aspects of a replicated entity differ from what the client
//! was last told and therefore need an operation this tick.

use bitflags::bitflags;

bitflags! {
    /// Flags indicating what part of an entity view needs to be resent
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewUpdateFlags: u8 {
        /// No updates needed
        const NONE = 0;
        /// Projected position changed
        const POSITION = 1 << 0;
        /// Quantized yaw or pitch changed
        const ROTATION = 1 << 1;
        /// At least one equipment slot changed
        const EQUIPMENT = 1 << 2;
    }
}

impl Default for ViewUpdateFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl ViewUpdateFlags {
    /// Check if any updates are flagged
    pub fn has_update(&self) -> bool {
        !self.is_empty()
    }

    /// Check if a position update is needed
    pub fn needs_position(&self) -> bool {
        self.contains(Self::POSITION)
    }

    /// Check if a rotation update is needed
    pub fn needs_rotation(&self) -> bool {
        self.contains(Self::ROTATION)
    }

    /// Check if an equipment update is needed
    pub fn needs_equipment(&self) -> bool {
        self.contains(Self::EQUIPMENT)
    }
}
