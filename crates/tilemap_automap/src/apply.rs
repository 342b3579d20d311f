//! Applies matched rules: skip chance, overlap check, output selection and
//! copying of tiles and objects into the context.

use std::collections::HashMap;

use rand::Rng;
use tilemap_core::{Layer, LayerData, Map, MapObject, Region};
use uuid::Uuid;

use crate::matcher::wrap_into;
use crate::{
    AutoMapperOptions, AutoMappingContext, EdgeHandling, LayerRef, NewObject, OutputSet, Rule,
};

/// What happened to one matched anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    Applied,
    SkippedByChance,
    Overlapping,
    NoOutput,
}

/// Per-scan bookkeeping of where outputs were written.
#[derive(Debug, Default)]
pub(crate) struct ApplyContext {
    pub applied_region: Region,
    applied_per_rule: HashMap<usize, Region>,
}

/// Statistics of one [`AutoMapper::auto_map`](crate::AutoMapper::auto_map) call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoMapReport {
    /// Target cells covered by applied output footprints.
    pub applied_region: Region,
    pub anchors_tested: usize,
    pub matched: usize,
    pub applied: usize,
    pub skipped_by_chance: usize,
    pub skipped_overlapping: usize,
    /// The caller aborted the scan.
    pub cancelled: bool,
}

impl AutoMapReport {
    pub(crate) fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::SkippedByChance => self.skipped_by_chance += 1,
            ApplyOutcome::Overlapping => self.skipped_overlapping += 1,
            ApplyOutcome::NoOutput => {}
        }
    }
}

/// Copies rule outputs from the rules map into a context.
pub(crate) struct Applier<'a> {
    pub rules_map: &'a Map,
    pub output_sets: &'a [OutputSet],
    pub options: &'a AutoMapperOptions,
}

impl Applier<'_> {
    /// Apply `rule` at a matched anchor.
    ///
    /// Randomness is drawn for the skip chance only when it is non-zero, and
    /// for the output set only when there is a choice.
    pub fn apply_rule(
        &self,
        rule: &Rule,
        anchor: (i32, i32),
        apply_context: &mut ApplyContext,
        context: &mut AutoMappingContext<'_>,
        rng: &mut impl Rng,
    ) -> ApplyOutcome {
        let options = &rule.options;
        if options.skip_chance > 0.0 && rng.gen_bool(options.skip_chance) {
            return ApplyOutcome::SkippedByChance;
        }

        let bounds = rule.input_bounds();
        let (dx, dy) = (anchor.0 - bounds.x, anchor.1 - bounds.y);
        let footprint = rule.output_region.translated(dx, dy);

        if options.no_overlapping_output
            && apply_context
                .applied_per_rule
                .get(&rule.index)
                .is_some_and(|applied| applied.intersects(&footprint))
        {
            return ApplyOutcome::Overlapping;
        }

        let chosen = match rule.output_sets.len() {
            0 => None,
            1 => rule.output_sets.first(),
            n => rule.output_sets.get(rng.gen_range(0..n)),
        };
        let Some(output_set) = chosen.and_then(|&i| self.output_sets.get(i)) else {
            return ApplyOutcome::NoOutput;
        };

        for output in &output_set.layers {
            let Some(layer) = self.rules_map.get_layer(output.layer_index) else {
                continue;
            };
            let bound = match &layer.data {
                LayerData::Tiles(_) => context.output_tile_binding(&output.target_name),
                LayerData::Objects(_) => context.output_object_binding(&output.target_name),
            };
            let Some((bound, layer_id)) =
                bound.and_then(|b| context.layer_id(b).map(|id| (b, id)))
            else {
                continue;
            };

            match &layer.data {
                LayerData::Tiles(_) => {
                    self.copy_tile_region(layer, &rule.output_region, (dx, dy), bound, context)
                }
                LayerData::Objects(_) => self.copy_object_region(
                    layer,
                    &rule.output_region,
                    &footprint,
                    (dx, dy),
                    (bound, layer_id),
                    context,
                ),
            }
            context.merge_layer_properties(layer_id, &layer.properties);
        }

        apply_context.applied_region.unite(&footprint);
        apply_context
            .applied_per_rule
            .entry(rule.index)
            .or_default()
            .unite(&footprint);
        ApplyOutcome::Applied
    }

    /// Copy the non-empty cells of `source` inside `region`, offset by `(dx, dy)`.
    fn copy_tile_region(
        &self,
        source: &Layer,
        region: &Region,
        (dx, dy): (i32, i32),
        bound: LayerRef,
        context: &mut AutoMappingContext<'_>,
    ) {
        let Some(tiles) = source.as_tile_layer() else {
            return;
        };
        let map_rect = context.target().rect();
        let wrap = self.options.edge_handling() == EdgeHandling::Wrap && !map_rect.is_empty();

        for (x, y) in region.cells() {
            let Some(cell) = tiles.cell_at(x, y) else {
                continue;
            };
            let (mut tx, mut ty) = (x + dx, y + dy);
            if !map_rect.contains(tx, ty) {
                if !wrap {
                    continue;
                }
                (tx, ty) = wrap_into(map_rect, tx, ty);
            }

            context.register_tileset(&cell, self.rules_map);
            if let Some(target) = context.tile_layer_mut(bound) {
                target.set_cell(tx, ty, Some(cell));
            }
        }
    }

    /// Replace the objects under `footprint` with translated copies of the
    /// objects of `source` inside `region`.
    fn copy_object_region(
        &self,
        source: &Layer,
        region: &Region,
        footprint: &Region,
        (dx, dy): (i32, i32),
        (bound, layer_id): (LayerRef, Uuid),
        context: &mut AutoMappingContext<'_>,
    ) {
        let Some(group) = source.as_object_group() else {
            return;
        };
        let target = context.target();

        let replaced: Vec<Uuid> = context
            .original_objects(bound)
            .iter()
            .filter(|o| {
                footprint.intersects_rect(o.tile_rect(target.tile_width, target.tile_height))
            })
            .map(|o| o.id)
            .collect();
        context.objects_to_remove.extend(replaced);

        let rules_tile = (
            self.rules_map.tile_width.max(1) as f32,
            self.rules_map.tile_height.max(1) as f32,
        );
        let target_tile = (target.tile_width as f32, target.tile_height as f32);

        let sources = group.objects_in(region, self.rules_map.tile_width, self.rules_map.tile_height);
        for object in sources {
            let copy = MapObject {
                id: Uuid::new_v4(),
                position: [
                    (object.position[0] / rules_tile.0 + dx as f32) * target_tile.0,
                    (object.position[1] / rules_tile.1 + dy as f32) * target_tile.1,
                ],
                size: [
                    object.size[0] / rules_tile.0 * target_tile.0,
                    object.size[1] / rules_tile.1 * target_tile.1,
                ],
                ..object.clone()
            };
            context.new_objects.push(NewObject {
                layer_id,
                object: copy,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{map_with, tile};
    use crate::{OutputLayer, RuleOptions};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use tilemap_core::Rect;

    fn seeded_rng() -> SmallRng {
        SmallRng::seed_from_u64(0)
    }

    fn rule(output: Rect, options: RuleOptions) -> Rule {
        Rule {
            index: 0,
            input_region: Region::from_rect(Rect::new(0, 0, 1, 1)),
            output_region: Region::from_rect(output),
            options,
            output_sets: vec![0],
        }
    }

    fn output_set(layer_index: usize, target_name: &str) -> Vec<OutputSet> {
        vec![OutputSet {
            name: String::new(),
            layers: vec![OutputLayer {
                layer_index,
                target_name: target_name.to_string(),
            }],
        }]
    }

    #[test]
    fn copy_never_writes_empty_cells() {
        let rules = map_with("rules", &[("output_Ground", &["7.", ".8"])]);
        let target = map_with("target", &[("Ground", &["1111", "1111", "1111"])]);
        let sets = output_set(0, "Ground");
        let options = AutoMapperOptions::default();
        let applier = Applier {
            rules_map: &rules,
            output_sets: &sets,
            options: &options,
        };

        let mut context = AutoMappingContext::new(&target);
        let ground = context.bind_output_tile_layer("Ground");
        let mut apply_context = ApplyContext::default();

        let outcome = applier.apply_rule(
            &rule(Rect::new(0, 0, 2, 2), RuleOptions::default()),
            (1, 1),
            &mut apply_context,
            &mut context,
            &mut seeded_rng(),
        );

        assert_eq!(outcome, ApplyOutcome::Applied);
        let staged = context.tile_layer(ground).unwrap();
        assert_eq!(staged.cell_at(1, 1), Some(tile(7)));
        assert_eq!(staged.cell_at(2, 1), Some(tile(1)));
        assert_eq!(staged.cell_at(1, 2), Some(tile(1)));
        assert_eq!(staged.cell_at(2, 2), Some(tile(8)));
        assert_eq!(apply_context.applied_region.cell_count(), 4);
    }

    #[test]
    fn overlapping_output_is_skipped_for_the_same_rule() {
        let rules = map_with("rules", &[("output_Ground", &["77", "77"])]);
        let target = map_with("target", &[("Ground", &["....", "....", "...."])]);
        let sets = output_set(0, "Ground");
        let options = AutoMapperOptions::default();
        let applier = Applier {
            rules_map: &rules,
            output_sets: &sets,
            options: &options,
        };
        let no_overlap = rule(
            Rect::new(0, 0, 2, 2),
            RuleOptions {
                no_overlapping_output: true,
                ..Default::default()
            },
        );

        let mut context = AutoMappingContext::new(&target);
        context.bind_output_tile_layer("Ground");
        let mut apply_context = ApplyContext::default();
        let mut rng = seeded_rng();

        let outcomes: Vec<_> = [(0, 0), (1, 1), (2, 0)]
            .into_iter()
            .map(|anchor| {
                applier.apply_rule(&no_overlap, anchor, &mut apply_context, &mut context, &mut rng)
            })
            .collect();

        assert_eq!(
            outcomes,
            vec![
                ApplyOutcome::Applied,
                ApplyOutcome::Overlapping,
                ApplyOutcome::Applied
            ]
        );
    }

    #[test]
    fn skip_chance_one_always_skips() {
        let rules = map_with("rules", &[("output_Ground", &["7"])]);
        let target = map_with("target", &[("Ground", &["."])]);
        let sets = output_set(0, "Ground");
        let options = AutoMapperOptions::default();
        let applier = Applier {
            rules_map: &rules,
            output_sets: &sets,
            options: &options,
        };
        let skipped = rule(
            Rect::new(0, 0, 1, 1),
            RuleOptions {
                skip_chance: 1.0,
                ..Default::default()
            },
        );

        let mut context = AutoMappingContext::new(&target);
        context.bind_output_tile_layer("Ground");

        let outcome = applier.apply_rule(
            &skipped,
            (0, 0),
            &mut ApplyContext::default(),
            &mut context,
            &mut seeded_rng(),
        );

        assert_eq!(outcome, ApplyOutcome::SkippedByChance);
        assert!(context.output_layers.is_empty());
    }

    #[test]
    fn wrap_border_wraps_writes() {
        let rules = map_with("rules", &[("output_Ground", &["77"])]);
        let target = map_with("target", &[("Ground", &["...", "..."])]);
        let sets = output_set(0, "Ground");
        let options = AutoMapperOptions {
            match_outside_map: true,
            wrap_border: true,
            ..Default::default()
        };
        let applier = Applier {
            rules_map: &rules,
            output_sets: &sets,
            options: &options,
        };

        let mut context = AutoMappingContext::new(&target);
        let ground = context.bind_output_tile_layer("Ground");
        applier.apply_rule(
            &rule(Rect::new(0, 0, 2, 1), RuleOptions::default()),
            (2, 1),
            &mut ApplyContext::default(),
            &mut context,
            &mut seeded_rng(),
        );

        let staged = context.tile_layer(ground).unwrap();
        assert_eq!(staged.cell_at(2, 1), Some(tile(7)));
        assert_eq!(staged.cell_at(0, 1), Some(tile(7)));
    }

    #[test]
    fn objects_replace_and_translate() {
        let mut rules = map_with("rules", &[("regions", &["1.", ".."])]);
        let mut spawns = Layer::new_object_layer("output_Spawns").with_property("Lit", true);
        if let Some(group) = spawns.as_object_group_mut() {
            group.add_object(MapObject::new("spawn", [4.0, 4.0]).with_size(8.0, 8.0));
            group.add_object(MapObject::new("elsewhere", [20.0, 20.0]));
        }
        let spawns_index = rules.add_layer(spawns);

        let mut target =
            map_with("target", &[("Ground", &["...", "...", "..."])]).with_tile_size(32, 32);
        let mut existing = Layer::new_object_layer("Spawns");
        let old = MapObject::new("old", [64.0, 64.0]);
        let old_id = old.id;
        if let Some(group) = existing.as_object_group_mut() {
            group.add_object(old);
            group.add_object(MapObject::new("kept", [0.0, 0.0]));
        }
        target.add_layer(existing);

        let sets = output_set(spawns_index, "Spawns");
        let options = AutoMapperOptions::default();
        let applier = Applier {
            rules_map: &rules,
            output_sets: &sets,
            options: &options,
        };

        let mut context = AutoMappingContext::new(&target);
        let bound = context.bind_output_object_group("Spawns");
        assert_eq!(bound, LayerRef::Target(1));

        applier.apply_rule(
            &rule(Rect::new(0, 0, 1, 1), RuleOptions::default()),
            (2, 2),
            &mut ApplyContext::default(),
            &mut context,
            &mut seeded_rng(),
        );

        assert_eq!(context.objects_to_remove.len(), 1);
        assert!(context.objects_to_remove.contains(&old_id));
        assert_eq!(context.new_objects.len(), 1);
        let placed = &context.new_objects[0];
        assert_eq!(placed.layer_id, target.layers[1].id);
        assert_eq!(placed.object.type_name, "spawn");
        assert_eq!(placed.object.position, [72.0, 72.0]);
        assert_eq!(placed.object.size, [16.0, 16.0]);
        assert_eq!(
            context
                .changed_properties
                .get(&target.layers[1].id)
                .and_then(|p| p.get("Lit")),
            Some(&true.into())
        );
    }
}
