//! Core data structures for tile maps
//!
//! This crate provides the fundamental types for representing tile-based maps:
//! - `Map` - A complete map with layers, tilesets and properties
//! - `Layer` - A single layer, either a `TileLayer` or an `ObjectGroup`
//! - `Cell` - A placed tile (tileset, tile id, flip flags)
//! - `Tileset` - Tile atlas description with per-tile custom properties
//! - `MapObject` - Objects placed on object layers
//! - `Rect` / `Region` - Cell rectangles and multi-rect cell regions
//! - `Value` - Generic property value type

mod layer;
mod map;
mod object;
mod region;
mod tileset;
mod value;

pub use layer::{Cell, Layer, LayerData, LayerType, ObjectGroup, TileLayer};
pub use map::Map;
pub use object::MapObject;
pub use region::{Rect, Region};
pub use tileset::{TileProperties, Tileset};
pub use value::{merge_properties, Properties, Value};
