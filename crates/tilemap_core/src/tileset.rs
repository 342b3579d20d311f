//! Tileset configuration with per-tile properties

use crate::{Properties, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-tile custom metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TileProperties {
    /// Custom user-defined properties
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: Properties,
}

impl TileProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom property
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Get a custom property
    pub fn get_custom(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }
}

/// A tileset shared between maps. Cells refer to it by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tileset {
    pub id: Uuid,
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Per-tile properties, keyed by tile id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tile_properties: HashMap<u32, TileProperties>,
}

impl Tileset {
    /// Create a new tileset with a fresh id
    pub fn new(name: impl Into<String>, tile_width: u32, tile_height: u32) -> Self {
        Self::with_id(Uuid::new_v4(), name, tile_width, tile_height)
    }

    /// Create a tileset with a known id, e.g. when several maps share it
    pub fn with_id(id: Uuid, name: impl Into<String>, tile_width: u32, tile_height: u32) -> Self {
        Self {
            id,
            name: name.into(),
            tile_width,
            tile_height,
            tile_properties: HashMap::new(),
        }
    }

    /// Set a custom property on one tile
    pub fn set_tile_property(&mut self, tile_id: u32, key: impl Into<String>, value: impl Into<Value>) {
        let props = self.tile_properties.remove(&tile_id).unwrap_or_default();
        self.tile_properties
            .insert(tile_id, props.with_custom(key, value));
    }

    /// Get a custom property of one tile
    pub fn tile_property(&self, tile_id: u32, key: &str) -> Option<&Value> {
        self.tile_properties
            .get(&tile_id)
            .and_then(|props| props.get_custom(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_properties() {
        let mut tileset = Tileset::new("terrain", 16, 16);
        tileset.set_tile_property(4, "MatchType", "Empty");
        tileset.set_tile_property(4, "weight", 2);

        assert_eq!(
            tileset.tile_property(4, "MatchType").and_then(Value::as_string),
            Some("Empty")
        );
        assert_eq!(tileset.tile_property(4, "weight"), Some(&Value::Int(2)));
        assert_eq!(tileset.tile_property(5, "MatchType"), None);
    }
}
