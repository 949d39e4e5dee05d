//! Replicated animation layer state
//!
//! At most one linked layer set exists per engine. Linking an item's
//! layers replaces whatever was linked before; unlinking restores the
//! host's configured baseline.

use serde::{Deserialize, Serialize};

use crate::core::types::{AssetRef, ItemDefId, ItemId};

/// Currently linked animation layer set, replicated as plain data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedAnimLayer {
    pub layers: Vec<AssetRef>,
    /// Definition that contributed the layers; `None` for the baseline set
    pub source_item_def: Option<ItemDefId>,
    pub owning_item: Option<ItemId>,
}

impl LinkedAnimLayer {
    pub fn from_item(layers: Vec<AssetRef>, item_def: ItemDefId, item: ItemId) -> Self {
        Self {
            layers,
            source_item_def: Some(item_def),
            owning_item: Some(item),
        }
    }

    /// Baseline set restored when an item's layers are unlinked
    pub fn baseline(layers: Vec<AssetRef>, item: Option<ItemId>) -> Self {
        Self {
            layers,
            source_item_def: None,
            owning_item: item,
        }
    }
}
