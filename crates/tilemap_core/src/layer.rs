//! Layer types for tile layers and object groups

use crate::{MapObject, Properties, Rect, Region, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A placed tile: which tileset, which tile in it, and how it is flipped.
///
/// Two cells are the same identity only when all fields are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub tileset_id: Uuid,
    pub tile_id: u32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub flip_y: bool,
}

impl Cell {
    pub fn new(tileset_id: Uuid, tile_id: u32) -> Self {
        Self {
            tileset_id,
            tile_id,
            flip_x: false,
            flip_y: false,
        }
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }
}

/// A layer (tiles or objects)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    #[serde(default)]
    pub properties: Properties,
    pub data: LayerData,
}

impl Layer {
    /// Create a new, empty tile layer
    pub fn new_tile_layer(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_data(name, LayerData::Tiles(TileLayer::new(width, height)))
    }

    /// Create a new object layer
    pub fn new_object_layer(name: impl Into<String>) -> Self {
        Self::with_data(name, LayerData::Objects(ObjectGroup::default()))
    }

    pub fn with_data(name: impl Into<String>, data: LayerData) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            properties: Properties::new(),
            data,
        }
    }

    /// Builder-style custom property
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Get the type of this layer
    pub fn layer_type(&self) -> LayerType {
        match &self.data {
            LayerData::Tiles(_) => LayerType::Tiles,
            LayerData::Objects(_) => LayerType::Objects,
        }
    }

    pub fn as_tile_layer(&self) -> Option<&TileLayer> {
        match &self.data {
            LayerData::Tiles(tiles) => Some(tiles),
            LayerData::Objects(_) => None,
        }
    }

    pub fn as_tile_layer_mut(&mut self) -> Option<&mut TileLayer> {
        match &mut self.data {
            LayerData::Tiles(tiles) => Some(tiles),
            LayerData::Objects(_) => None,
        }
    }

    pub fn as_object_group(&self) -> Option<&ObjectGroup> {
        match &self.data {
            LayerData::Objects(group) => Some(group),
            LayerData::Tiles(_) => None,
        }
    }

    pub fn as_object_group_mut(&mut self) -> Option<&mut ObjectGroup> {
        match &mut self.data {
            LayerData::Objects(group) => Some(group),
            LayerData::Tiles(_) => None,
        }
    }
}

/// The type of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerType {
    Tiles,
    Objects,
}

/// The data contained in a layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LayerData {
    Tiles(TileLayer),
    Objects(ObjectGroup),
}

/// Row-major grid of cells; `None` is an empty cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTileLayer")]
pub struct TileLayer {
    width: u32,
    height: u32,
    cells: Vec<Option<Cell>>,
}

/// Unchecked serialized form of [`TileLayer`]
#[derive(Deserialize)]
struct RawTileLayer {
    width: u32,
    height: u32,
    cells: Vec<Option<Cell>>,
}

impl TryFrom<RawTileLayer> for TileLayer {
    type Error = String;

    fn try_from(raw: RawTileLayer) -> Result<Self, Self::Error> {
        let expected = raw.width as usize * raw.height as usize;
        if raw.cells.len() != expected {
            return Err(format!(
                "tile layer of {}x{} holds {} cells, expected {expected}",
                raw.width,
                raw.height,
                raw.cells.len()
            ));
        }
        Ok(Self {
            width: raw.width,
            height: raw.height,
            cells: raw.cells,
        })
    }
}

impl TileLayer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rect().contains(x, y)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.contains(x, y)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// The cell at `(x, y)`; out-of-bounds reads are empty
    pub fn cell_at(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y)
            .and_then(|i| self.cells.get(i).copied().flatten())
    }

    /// Write a cell. Returns `false` when `(x, y)` is outside the layer.
    pub fn set_cell(&mut self, x: i32, y: i32, cell: Option<Cell>) -> bool {
        match self.index(x, y).and_then(|i| self.cells.get_mut(i)) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Non-empty cells in scan order
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, Cell)> + '_ {
        let width = self.width.max(1) as usize;
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            cell.map(|c| ((i % width) as i32, (i / width) as i32, c))
        })
    }

    /// The region covered by non-empty cells
    pub fn region(&self) -> Region {
        let mut region = Region::new();
        for (x, y, _) in self.cells() {
            region.add_cell(x, y);
        }
        region
    }

    /// Whether any cell inside `region` is non-empty
    pub fn has_cells_in(&self, region: &Region) -> bool {
        region
            .intersected_rect(self.rect())
            .cells()
            .any(|(x, y)| self.cell_at(x, y).is_some())
    }

    /// Clear every cell inside `region`. Returns the number of cells cleared.
    pub fn erase(&mut self, region: &Region) -> usize {
        let mut erased = 0;
        for (x, y) in region.intersected_rect(self.rect()).cells() {
            let slot = self.index(x, y).and_then(|i| self.cells.get_mut(i));
            if slot.and_then(Option::take).is_some() {
                erased += 1;
            }
        }
        erased
    }
}

/// An object layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectGroup {
    #[serde(default)]
    pub objects: Vec<MapObject>,
}

impl ObjectGroup {
    pub fn add_object(&mut self, object: MapObject) {
        self.objects.push(object);
    }

    /// Objects whose tile footprint intersects `region`
    pub fn objects_in<'a>(
        &'a self,
        region: &'a Region,
        tile_width: u32,
        tile_height: u32,
    ) -> impl Iterator<Item = &'a MapObject> + 'a {
        self.objects
            .iter()
            .filter(move |o| region.intersects_rect(o.tile_rect(tile_width, tile_height)))
    }
}
