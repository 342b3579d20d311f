//! Map objects placed on object layers

use crate::{Properties, Rect, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An object placed on an object layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    /// Unique identifier for this object
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    /// Type name (e.g., "Spawn", "Chest", "Door")
    pub type_name: String,
    /// Top-left position in pixels [x, y]
    pub position: [f32; 2],
    /// Size in pixels [width, height]; zero for point objects
    #[serde(default)]
    pub size: [f32; 2],
    #[serde(default)]
    pub properties: Properties,
}

impl MapObject {
    /// Create a new point object
    pub fn new(type_name: impl Into<String>, position: [f32; 2]) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            type_name: type_name.into(),
            position,
            size: [0.0, 0.0],
            properties: Properties::new(),
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = [width, height];
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// The cells covered by this object, at least one cell for point objects
    pub fn tile_rect(&self, tile_width: u32, tile_height: u32) -> Rect {
        let tw = tile_width.max(1) as f32;
        let th = tile_height.max(1) as f32;
        let left = (self.position[0] / tw).floor() as i32;
        let top = (self.position[1] / th).floor() as i32;
        let right = ((self.position[0] + self.size[0]) / tw).ceil() as i32;
        let bottom = ((self.position[1] + self.size[1]) / th).ceil() as i32;
        Rect::new(
            left,
            top,
            right.saturating_sub(left).max(1),
            bottom.saturating_sub(top).max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_object_covers_one_cell() {
        let object = MapObject::new("Spawn", [40.0, 8.0]);
        assert_eq!(object.tile_rect(16, 16), Rect::new(2, 0, 1, 1));
    }

    #[test]
    fn test_sized_object_tile_rect() {
        let object = MapObject::new("Area", [16.0, 16.0])
            .with_size(32.0, 20.0)
            .with_property("damage", 3);

        assert_eq!(object.tile_rect(16, 16), Rect::new(1, 1, 2, 2));
        assert_eq!(object.properties.get("damage"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_far_away_object_tile_rect_saturates() {
        let object = MapObject::new("Far", [-1e30, -1e30]).with_size(2e30, 2e30);
        let rect = object.tile_rect(16, 16);

        assert_eq!(rect.x, i32::MIN);
        assert_eq!(rect.width, i32::MAX);
    }
}
