//! Fixtures shared by the unit tests.

use tilemap_core::{Cell, Layer, Map, Tileset};
use uuid::Uuid;

pub(crate) const TILESET: Uuid = Uuid::from_u128(1);

pub(crate) fn tile(id: u32) -> Cell {
    Cell::new(TILESET, id)
}

/// A tile layer drawn as text: `.` is empty, any base-36 digit is that tile id
pub(crate) fn tile_layer(name: &str, rows: &[&str]) -> Layer {
    let height = rows.len() as u32;
    let width = rows.first().map_or(0, |r| r.len()) as u32;
    let mut layer = Layer::new_tile_layer(name, width, height);
    if let Some(tiles) = layer.as_tile_layer_mut() {
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if let Some(id) = c.to_digit(36) {
                    tiles.set_cell(x as i32, y as i32, Some(tile(id)));
                }
            }
        }
    }
    layer
}

pub(crate) fn tileset() -> Tileset {
    Tileset::with_id(TILESET, "tiles", 16, 16)
}

/// A map sized after its first layer, with the shared tileset attached
pub(crate) fn map_with(name: &str, layers: &[(&str, &[&str])]) -> Map {
    let height = layers.first().map_or(0, |(_, rows)| rows.len()) as u32;
    let width = layers
        .first()
        .and_then(|(_, rows)| rows.first())
        .map_or(0, |r| r.len()) as u32;
    let mut map = Map::new(name, width, height);
    map.add_tileset(tileset());
    for (layer_name, rows) in layers {
        map.add_layer(tile_layer(layer_name, rows));
    }
    map
}
