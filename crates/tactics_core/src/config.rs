//! Combat rules configuration.
//!
//! Loaded from RON so designers can tweak rules without a rebuild.
//!
//! # Example RON
//!
//! ```ron
//! CombatConfig(
//!     attack_confirmation: Ranged,
//!     max_search_nodes: 4096,
//!     enemy_respects_movement_range: true,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pathfinding::DEFAULT_MAX_SEARCH_NODES;

/// When a selected attack target needs an explicit confirm step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttackConfirmation {
    /// Selecting a valid target attacks immediately.
    #[default]
    Never,
    /// Only targets further than one cell away need confirmation.
    Ranged,
    /// Every attack needs confirmation.
    Always,
}

impl AttackConfirmation {
    /// Check whether an attack at `distance` needs a confirm step.
    #[must_use]
    pub const fn requires_confirmation(self, distance: u32) -> bool {
        match self {
            Self::Never => false,
            Self::Ranged => distance > 1,
            Self::Always => true,
        }
    }
}

/// Rules knobs for a combat session and the encounter layer around it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Confirmation policy for player attacks.
    pub attack_confirmation: AttackConfirmation,
    /// Node expansion cap for a single path search.
    pub max_search_nodes: usize,
    /// Truncate enemy approach paths to the enemy's movement range.
    pub enemy_respects_movement_range: bool,
    /// Manhattan radius at which an armed enemy notices the party.
    pub detection_radius: u32,
    /// Re-arm surviving enemies' triggers once combat is over.
    pub rearm_triggers_on_exit: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            attack_confirmation: AttackConfirmation::Never,
            max_search_nodes: DEFAULT_MAX_SEARCH_NODES,
            enemy_respects_movement_range: false,
            detection_radius: 2,
            rearm_triggers_on_exit: true,
        }
    }
}

impl CombatConfig {
    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_policy() {
        assert!(!AttackConfirmation::Never.requires_confirmation(5));
        assert!(!AttackConfirmation::Ranged.requires_confirmation(1));
        assert!(AttackConfirmation::Ranged.requires_confirmation(2));
        assert!(AttackConfirmation::Always.requires_confirmation(1));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = CombatConfig::from_ron_str("(attack_confirmation: Always)").unwrap();
        assert_eq!(config.attack_confirmation, AttackConfirmation::Always);
        assert_eq!(config.max_search_nodes, DEFAULT_MAX_SEARCH_NODES);
        assert!(!config.enemy_respects_movement_range);
        assert_eq!(config.detection_radius, 2);
    }

    #[test]
    fn test_named_struct_ron() {
        let config = CombatConfig::from_ron_str(
            "CombatConfig(max_search_nodes: 64, enemy_respects_movement_range: true)",
        )
        .unwrap();
        assert_eq!(config.max_search_nodes, 64);
        assert!(config.enemy_respects_movement_range);
    }

    #[test]
    fn test_bad_ron_is_error() {
        assert!(CombatConfig::from_ron_str("(attack_confirmation: Sometimes)").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combat.ron");
        std::fs::write(&path, "(detection_radius: 4)").unwrap();

        let config = CombatConfig::load(&path).unwrap();
        assert_eq!(config.detection_radius, 4);
        assert!(CombatConfig::load(dir.path().join("missing.ron")).is_err());
    }
}
