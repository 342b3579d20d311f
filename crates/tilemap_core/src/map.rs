//! A complete tile map: layers, tilesets and map-level properties

use crate::{Cell, Layer, LayerData, ObjectGroup, Properties, Rect, TileLayer, Tileset, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A finite tile map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    pub id: Uuid,
    pub name: String,
    /// Size in tiles
    pub width: u32,
    pub height: u32,
    /// Tile size in pixels
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub tilesets: Vec<Tileset>,
    #[serde(default)]
    pub properties: Properties,
}

impl Map {
    /// Create an empty map with 16x16 pixel tiles
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            width,
            height,
            tile_width: 16,
            tile_height: 16,
            layers: Vec::new(),
            tilesets: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_tile_size(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Parse a map from JSON
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the map to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rect().contains(x, y)
    }

    /// Append a layer. Returns its index.
    pub fn add_layer(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn remove_layer(&mut self, id: Uuid) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(index))
    }

    pub fn get_layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn get_layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn layer_by_id(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_by_id_mut(&mut self, id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Index of the first tile layer called `name`
    pub fn tile_layer_index(&self, name: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|l| l.name == name && matches!(l.data, LayerData::Tiles(_)))
    }

    /// Index of the first object layer called `name`
    pub fn object_group_index(&self, name: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|l| l.name == name && matches!(l.data, LayerData::Objects(_)))
    }

    pub fn tile_layer(&self, name: &str) -> Option<&TileLayer> {
        self.tile_layer_index(name)
            .and_then(|i| self.layers[i].as_tile_layer())
    }

    pub fn object_group(&self, name: &str) -> Option<&ObjectGroup> {
        self.object_group_index(name)
            .and_then(|i| self.layers[i].as_object_group())
    }

    pub fn add_tileset(&mut self, tileset: Tileset) {
        if !self.has_tileset(tileset.id) {
            self.tilesets.push(tileset);
        }
    }

    pub fn tileset(&self, id: Uuid) -> Option<&Tileset> {
        self.tilesets.iter().find(|t| t.id == id)
    }

    pub fn has_tileset(&self, id: Uuid) -> bool {
        self.tileset(id).is_some()
    }

    /// Get the cell at `(x, y)` on the tile layer at `layer_index`
    pub fn get_tile(&self, layer_index: usize, x: i32, y: i32) -> Option<Cell> {
        self.get_layer(layer_index)
            .and_then(Layer::as_tile_layer)
            .and_then(|tiles| tiles.cell_at(x, y))
    }

    /// Set the cell at `(x, y)` on the tile layer at `layer_index`
    pub fn set_tile(&mut self, layer_index: usize, x: i32, y: i32, cell: Option<Cell>) -> bool {
        self.get_layer_mut(layer_index)
            .and_then(Layer::as_tile_layer_mut)
            .is_some_and(|tiles| tiles.set_cell(x, y, cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_lookup_by_name_and_type() {
        let mut map = Map::new("level", 4, 4);
        map.add_layer(Layer::new_object_layer("ground"));
        let tiles = map.add_layer(Layer::new_tile_layer("ground", 4, 4));

        assert_eq!(map.tile_layer_index("ground"), Some(tiles));
        assert_eq!(map.object_group_index("ground"), Some(0));
        assert!(map.tile_layer("walls").is_none());
    }

    #[test]
    fn test_get_and_set_tile() {
        let tileset = Tileset::new("terrain", 16, 16);
        let cell = Cell::new(tileset.id, 3);
        let mut map = Map::new("level", 4, 4);
        map.add_tileset(tileset.clone());
        map.add_tileset(tileset);
        map.add_layer(Layer::new_tile_layer("ground", 4, 4));

        assert!(map.set_tile(0, 1, 2, Some(cell)));
        assert!(!map.set_tile(1, 1, 2, Some(cell)));
        assert_eq!(map.get_tile(0, 1, 2), Some(cell));
        assert_eq!(map.tilesets.len(), 1);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut map = Map::new("level", 2, 2).with_property("DeleteTiles", true);
        let tileset = Tileset::new("terrain", 16, 16);
        let cell = Cell::new(tileset.id, 1).flipped(true, false);
        map.add_tileset(tileset);
        map.add_layer(Layer::new_tile_layer("ground", 2, 2));
        map.set_tile(0, 1, 1, Some(cell));

        let json = map.to_json_string().unwrap();
        let parsed = Map::from_json_str(&json).unwrap();

        assert_eq!(parsed.get_tile(0, 1, 1), Some(cell));
        assert_eq!(parsed.properties.get("DeleteTiles"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_json_rejects_short_tile_layer() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000010",
            "name": "rules",
            "width": 2,
            "height": 1,
            "tile_width": 16,
            "tile_height": 16,
            "layers": [
                { "id": "00000000-0000-0000-0000-000000000011", "name": "input_Ground", "visible": true,
                  "data": { "Tiles": { "width": 2, "height": 1, "cells": [null] } } }
            ]
        }"#;

        let err = Map::from_json_str(json).unwrap_err();

        assert!(err.to_string().contains("holds 1 cells, expected 2"), "{err}");
    }

    #[test]
    fn test_remove_layer() {
        let mut map = Map::new("level", 2, 2);
        map.add_layer(Layer::new_tile_layer("a", 2, 2));
        let id = map.layers[0].id;

        assert!(map.remove_layer(id).is_some());
        assert!(map.remove_layer(id).is_none());
        assert!(map.layer_by_id(id).is_none());
    }
}
