//! Staging area for one auto-mapping session.
//!
//! An [`AutoMappingContext`] borrows the target map read-only. Every edit the
//! engine makes lands here: cloned tile layers, new layers, new tilesets,
//! objects to add and remove, changed layer properties. The caller commits
//! the result, usually through [`AutoMappingContext::into_changes`] and
//! [`AutoMapChanges::apply_to`].

use std::collections::{BTreeSet, HashMap};

use tilemap_core::{
    merge_properties, Cell, Layer, LayerData, Map, MapObject, Properties, TileLayer, Tileset,
};
use uuid::Uuid;

/// Where a rules-map layer name was bound in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerRef {
    /// Index into the target map's layers.
    Target(usize),
    /// Index into the context's new layers.
    New(usize),
    /// No such tile layer; reads as an empty layer the size of the map.
    Missing,
}

/// An object to be added to a layer, existing or new.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObject {
    pub layer_id: Uuid,
    pub object: MapObject,
}

/// One cell that differs between the target map and the staged result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWrite {
    pub layer_id: Uuid,
    pub x: i32,
    pub y: i32,
    pub old: Option<Cell>,
    pub new: Option<Cell>,
}

/// Staged edits against one target map.
#[derive(Debug)]
pub struct AutoMappingContext<'map> {
    pub(crate) id: Uuid,
    target: &'map Map,

    pub new_tilesets: Vec<Tileset>,
    /// Layers created while binding output layers missing from the target.
    pub new_layers: Vec<Layer>,
    pub new_objects: Vec<NewObject>,
    /// Original target objects to remove, by object id.
    pub objects_to_remove: BTreeSet<Uuid>,
    /// Properties to merge into layers, by layer id.
    pub changed_properties: HashMap<Uuid, Properties>,
    /// Clones of target tile layers that were written to, by layer id.
    pub output_layers: HashMap<Uuid, TileLayer>,
    /// Target tile layers that were cloned while holding tiles.
    pub touched_tile_layers: Vec<Uuid>,

    input_layers: HashMap<String, LayerRef>,
    output_tile_layers: HashMap<String, LayerRef>,
    output_object_groups: HashMap<String, LayerRef>,
}

impl<'map> AutoMappingContext<'map> {
    pub fn new(target: &'map Map) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            new_tilesets: Vec::new(),
            new_layers: Vec::new(),
            new_objects: Vec::new(),
            objects_to_remove: BTreeSet::new(),
            changed_properties: HashMap::new(),
            output_layers: HashMap::new(),
            touched_tile_layers: Vec::new(),
            input_layers: HashMap::new(),
            output_tile_layers: HashMap::new(),
            output_object_groups: HashMap::new(),
        }
    }

    pub fn target(&self) -> &'map Map {
        self.target
    }

    /// Whether nothing has been staged
    pub fn is_empty(&self) -> bool {
        self.new_tilesets.is_empty()
            && self.new_objects.is_empty()
            && self.objects_to_remove.is_empty()
            && self.changed_properties.is_empty()
            && self.staged_cell_writes().is_empty()
    }

    // ─── Binding ─────────────────────────────────────────────────────────────

    /// Bind an output tile layer name, creating a layer when the target has none
    pub(crate) fn bind_output_tile_layer(&mut self, name: &str) -> LayerRef {
        if let Some(&bound) = self.output_tile_layers.get(name) {
            return bound;
        }
        let bound = match self.target.tile_layer_index(name) {
            Some(index) => LayerRef::Target(index),
            None => self.new_layer(Layer::new_tile_layer(
                name,
                self.target.width,
                self.target.height,
            )),
        };
        self.output_tile_layers.insert(name.to_string(), bound);
        bound
    }

    /// Bind an output object group name, creating a layer when the target has none
    pub(crate) fn bind_output_object_group(&mut self, name: &str) -> LayerRef {
        if let Some(&bound) = self.output_object_groups.get(name) {
            return bound;
        }
        let bound = match self.target.object_group_index(name) {
            Some(index) => LayerRef::Target(index),
            None => self.new_layer(Layer::new_object_layer(name)),
        };
        self.output_object_groups.insert(name.to_string(), bound);
        bound
    }

    /// Bind an input layer name. Outputs must be bound first, so that inputs
    /// can read layers created for outputs.
    pub(crate) fn bind_input_layer(&mut self, name: &str) -> LayerRef {
        if let Some(&bound) = self.input_layers.get(name) {
            return bound;
        }
        let bound = match self.target.tile_layer_index(name) {
            Some(index) => LayerRef::Target(index),
            None => self
                .output_tile_layers
                .get(name)
                .copied()
                .unwrap_or(LayerRef::Missing),
        };
        self.input_layers.insert(name.to_string(), bound);
        bound
    }

    pub(crate) fn input_binding(&self, name: &str) -> LayerRef {
        self.input_layers
            .get(name)
            .copied()
            .unwrap_or(LayerRef::Missing)
    }

    pub(crate) fn output_tile_binding(&self, name: &str) -> Option<LayerRef> {
        self.output_tile_layers.get(name).copied()
    }

    pub(crate) fn output_object_binding(&self, name: &str) -> Option<LayerRef> {
        self.output_object_groups.get(name).copied()
    }

    fn new_layer(&mut self, layer: Layer) -> LayerRef {
        tracing::debug!(target: "automap", "creating output layer '{}'", layer.name);
        self.new_layers.push(layer);
        LayerRef::New(self.new_layers.len() - 1)
    }

    // ─── Layer access ────────────────────────────────────────────────────────

    /// Id of a bound layer, existing or new
    pub fn layer_id(&self, layer: LayerRef) -> Option<Uuid> {
        match layer {
            LayerRef::Target(index) => self.target.get_layer(index).map(|l| l.id),
            LayerRef::New(index) => self.new_layers.get(index).map(|l| l.id),
            LayerRef::Missing => None,
        }
    }

    /// The unmodified tile layer, ignoring staged clones
    pub(crate) fn original_tile_layer(&self, layer: LayerRef) -> Option<&TileLayer> {
        match layer {
            LayerRef::Target(index) => self.target.get_layer(index)?.as_tile_layer(),
            LayerRef::New(index) => self.new_layers.get(index)?.as_tile_layer(),
            LayerRef::Missing => None,
        }
    }

    /// The tile layer with staged writes applied
    pub fn tile_layer(&self, layer: LayerRef) -> Option<&TileLayer> {
        match layer {
            LayerRef::Target(index) => {
                let original = self.target.get_layer(index)?;
                match self.output_layers.get(&original.id) {
                    Some(clone) => Some(clone),
                    None => original.as_tile_layer(),
                }
            }
            _ => self.original_tile_layer(layer),
        }
    }

    /// Writable tile layer. Target layers are cloned on first write, once.
    pub(crate) fn tile_layer_mut(&mut self, layer: LayerRef) -> Option<&mut TileLayer> {
        match layer {
            LayerRef::Target(index) => {
                let target = self.target;
                let original = target.get_layer(index)?;
                let tiles = original.as_tile_layer()?;
                let clone = self.output_layers.entry(original.id).or_insert_with(|| {
                    if !tiles.is_empty() {
                        self.touched_tile_layers.push(original.id);
                    }
                    tiles.clone()
                });
                Some(clone)
            }
            LayerRef::New(index) => self.new_layers.get_mut(index)?.as_tile_layer_mut(),
            LayerRef::Missing => None,
        }
    }

    /// Objects currently on a bound object group, without staged additions
    pub(crate) fn original_objects(&self, layer: LayerRef) -> &'_ [MapObject] {
        let group = match layer {
            LayerRef::Target(index) => self
                .target
                .get_layer(index)
                .and_then(Layer::as_object_group),
            LayerRef::New(index) => self.new_layers.get(index).and_then(Layer::as_object_group),
            LayerRef::Missing => None,
        };
        group.map(|g| g.objects.as_slice()).unwrap_or_default()
    }

    /// Register the tileset of `cell` unless the target or the context already has it
    pub(crate) fn register_tileset(&mut self, cell: &Cell, rules_map: &Map) {
        if self.target.has_tileset(cell.tileset_id)
            || self.new_tilesets.iter().any(|t| t.id == cell.tileset_id)
        {
            return;
        }
        if let Some(tileset) = rules_map.tileset(cell.tileset_id) {
            tracing::debug!(target: "automap", "adding tileset '{}'", tileset.name);
            self.new_tilesets.push(tileset.clone());
        }
    }

    pub(crate) fn merge_layer_properties(&mut self, layer_id: Uuid, properties: &Properties) {
        if properties.is_empty() {
            return;
        }
        merge_properties(
            self.changed_properties.entry(layer_id).or_default(),
            properties,
        );
    }

    // ─── Results ─────────────────────────────────────────────────────────────

    /// Every cell whose staged value differs from the target, layer by layer
    pub fn staged_cell_writes(&self) -> Vec<CellWrite> {
        cell_writes(self.target, &self.output_layers, &self.new_layers)
    }

    /// Release the borrow of the target map, keeping every staged edit
    pub fn into_changes(self) -> AutoMapChanges {
        AutoMapChanges {
            new_tilesets: self.new_tilesets,
            new_layers: self.new_layers,
            new_objects: self.new_objects,
            objects_to_remove: self.objects_to_remove,
            changed_properties: self.changed_properties,
            output_layers: self.output_layers,
            touched_tile_layers: self.touched_tile_layers,
        }
    }
}

/// Owned result of an auto-mapping session.
#[derive(Debug, Clone, Default)]
pub struct AutoMapChanges {
    pub new_tilesets: Vec<Tileset>,
    pub new_layers: Vec<Layer>,
    pub new_objects: Vec<NewObject>,
    pub objects_to_remove: BTreeSet<Uuid>,
    pub changed_properties: HashMap<Uuid, Properties>,
    pub output_layers: HashMap<Uuid, TileLayer>,
    pub touched_tile_layers: Vec<Uuid>,
}

impl AutoMapChanges {
    /// Cells that differ from `map`, which must be the map the session targeted
    pub fn staged_cell_writes(&self, map: &Map) -> Vec<CellWrite> {
        cell_writes(map, &self.output_layers, &self.new_layers)
    }

    /// Commit every staged edit to `map`.
    ///
    /// New layers are only added when something was placed on them.
    pub fn apply_to(self, map: &mut Map) {
        for tileset in self.new_tilesets {
            map.add_tileset(tileset);
        }

        for layer in &mut map.layers {
            match &mut layer.data {
                LayerData::Tiles(tiles) => {
                    if let Some(staged) = self.output_layers.get(&layer.id) {
                        *tiles = staged.clone();
                    }
                }
                LayerData::Objects(group) => group
                    .objects
                    .retain(|o| !self.objects_to_remove.contains(&o.id)),
            }
        }

        for layer in self.new_layers {
            let used = match &layer.data {
                LayerData::Tiles(tiles) => !tiles.is_empty(),
                LayerData::Objects(_) => self.new_objects.iter().any(|o| o.layer_id == layer.id),
            };
            if used {
                map.add_layer(layer);
            }
        }

        for new in self.new_objects {
            if let Some(group) = map
                .layer_by_id_mut(new.layer_id)
                .and_then(Layer::as_object_group_mut)
            {
                group.add_object(new.object);
            }
        }

        for (layer_id, properties) in &self.changed_properties {
            if let Some(layer) = map.layer_by_id_mut(*layer_id) {
                merge_properties(&mut layer.properties, properties);
            }
        }
    }
}

fn cell_writes(
    map: &Map,
    output_layers: &HashMap<Uuid, TileLayer>,
    new_layers: &[Layer],
) -> Vec<CellWrite> {
    let mut writes = Vec::new();

    for layer in &map.layers {
        let (Some(original), Some(staged)) = (layer.as_tile_layer(), output_layers.get(&layer.id))
        else {
            continue;
        };
        for (x, y) in staged.rect().cells() {
            let old = original.cell_at(x, y);
            let new = staged.cell_at(x, y);
            if old != new {
                writes.push(CellWrite {
                    layer_id: layer.id,
                    x,
                    y,
                    old,
                    new,
                });
            }
        }
    }

    for layer in new_layers {
        if let Some(tiles) = layer.as_tile_layer() {
            writes.extend(tiles.cells().map(|(x, y, cell)| CellWrite {
                layer_id: layer.id,
                x,
                y,
                old: None,
                new: Some(cell),
            }));
        }
    }

    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tile, tile_layer};

    fn target() -> Map {
        let mut map = Map::new("target", 3, 2);
        map.add_layer(tile_layer("Ground", &["a1.", "..."]));
        map.add_layer(Layer::new_object_layer("Things"));
        map
    }

    #[test]
    fn clones_each_layer_once() {
        let map = target();
        let mut context = AutoMappingContext::new(&map);
        let ground = context.bind_output_tile_layer("Ground");
        assert_eq!(ground, LayerRef::Target(0));

        if let Some(tiles) = context.tile_layer_mut(ground) {
            tiles.set_cell(2, 1, Some(tile(5)));
        }
        if let Some(tiles) = context.tile_layer_mut(ground) {
            tiles.set_cell(0, 1, Some(tile(6)));
        }

        assert_eq!(context.output_layers.len(), 1);
        assert_eq!(context.touched_tile_layers, vec![map.layers[0].id]);
        assert_eq!(
            context.tile_layer(ground).and_then(|t| t.cell_at(2, 1)),
            Some(tile(5))
        );
        assert_eq!(
            context.original_tile_layer(ground).and_then(|t| t.cell_at(2, 1)),
            None
        );
        assert_eq!(map.get_tile(0, 2, 1), None);
    }

    #[test]
    fn missing_outputs_become_new_layers() {
        let map = target();
        let mut context = AutoMappingContext::new(&map);

        let walls = context.bind_output_tile_layer("Walls");
        let again = context.bind_output_tile_layer("Walls");
        let markers = context.bind_output_object_group("Markers");

        assert_eq!(walls, LayerRef::New(0));
        assert_eq!(again, walls);
        assert_eq!(markers, LayerRef::New(1));
        assert_eq!(context.tile_layer(walls).map(TileLayer::width), Some(3));

        assert_eq!(context.bind_input_layer("Walls"), walls);
        assert_eq!(context.bind_input_layer("Ground"), LayerRef::Target(0));
        assert_eq!(context.bind_input_layer("Nowhere"), LayerRef::Missing);
    }

    #[test]
    fn staged_writes_and_commit() {
        let mut map = target();
        let things_id = map.layers[1].id;
        let removed = MapObject::new("old", [0.0, 0.0]);
        let removed_id = removed.id;
        if let Some(group) = map.layers[1].as_object_group_mut() {
            group.add_object(removed);
        }

        let changes = {
            let mut context = AutoMappingContext::new(&map);
            let ground = context.bind_output_tile_layer("Ground");
            let walls = context.bind_output_tile_layer("Walls");
            let unused = context.bind_output_object_group("Unused");
            assert_eq!(unused, LayerRef::New(1));

            if let Some(tiles) = context.tile_layer_mut(ground) {
                tiles.set_cell(0, 0, Some(tile(9)));
                tiles.set_cell(1, 0, Some(tile(1)));
            }
            if let Some(tiles) = context.tile_layer_mut(walls) {
                tiles.set_cell(2, 1, Some(tile(3)));
            }
            context.objects_to_remove.insert(removed_id);
            context.new_objects.push(NewObject {
                layer_id: things_id,
                object: MapObject::new("new", [16.0, 0.0]),
            });
            context.merge_layer_properties(
                things_id,
                &[("Lit".to_string(), true.into())].into_iter().collect(),
            );

            let writes = context.staged_cell_writes();
            assert_eq!(writes.len(), 2);
            assert_eq!(writes[0].old, Some(tile(10)));
            assert_eq!(writes[0].new, Some(tile(9)));
            assert_eq!((writes[1].x, writes[1].y), (2, 1));
            assert_eq!(writes[1].old, None);
            assert!(!context.is_empty());

            context.into_changes()
        };

        assert_eq!(changes.staged_cell_writes(&map).len(), 2);
        changes.apply_to(&mut map);

        assert_eq!(map.layers.len(), 3);
        assert_eq!(map.get_tile(0, 0, 0), Some(tile(9)));
        assert_eq!(map.tile_layer("Walls").and_then(|t| t.cell_at(2, 1)), Some(tile(3)));
        assert!(map.object_group("Unused").is_none());

        let things = &map.layers[1];
        let objects = &things.as_object_group().map(|g| g.objects.clone()).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].type_name, "new");
        assert_eq!(things.properties.get("Lit"), Some(&true.into()));
    }
}
