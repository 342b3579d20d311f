//! Compiles the input layers of a rule into flat matchers.
//!
//! A [`RuleInputSet`] stores, per bound target layer, only the positions that
//! actually constrain the target. Each position points into one packed list
//! of cells: first its "any" cells, then its "none" cells.

use tilemap_core::{Cell, Map, Value};

use crate::{InputLayer, InputSet, LayerRef, MatchType, Rule};

/// A target layer and the number of positions checked on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInputLayer {
    pub target: LayerRef,
    pub pos_count: usize,
}

/// A position relative to the anchor.
///
/// The target cell must equal one of the `any_count` cells, if there are
/// any, and none of the `none_count` cells that follow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInputLayerPos {
    pub x: i32,
    pub y: i32,
    pub any_count: usize,
    pub none_count: usize,
}

/// One input set of one rule, compiled against one layer binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleInputSet {
    pub layers: Vec<RuleInputLayer>,
    pub positions: Vec<RuleInputLayerPos>,
    pub cells: Vec<Option<Cell>>,
}

impl RuleInputSet {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// The matchers of one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub rule_index: usize,
    pub input_sets: Vec<RuleInputSet>,
}

/// Compile every input set of `rule`.
///
/// `bind` resolves a target layer name. Input sets without a single
/// constrained position are dropped, so they never match.
pub fn compile_rule(
    rules_map: &Map,
    input_sets: &[InputSet],
    rule: &Rule,
    mut bind: impl FnMut(&str) -> LayerRef,
) -> Vec<RuleInputSet> {
    let used = used_cells(rules_map, input_sets, rule);
    let origin = rule.input_bounds();

    let mut compiled = Vec::with_capacity(input_sets.len());
    for input_set in input_sets {
        let mut set = RuleInputSet::default();

        for conditions in &input_set.layers {
            let mut pos_count = 0;

            for (x, y) in rule.input_region.cells() {
                let mut constraint = Constraint::default();
                for input in &conditions.list_yes {
                    constraint.add(rules_map, input, x, y, &used, false);
                }
                for input in &conditions.list_no {
                    constraint.add(rules_map, input, x, y, &used, true);
                }

                let Some((any, none)) = constraint.finish() else {
                    continue;
                };
                set.positions.push(RuleInputLayerPos {
                    x: x - origin.x,
                    y: y - origin.y,
                    any_count: any.len(),
                    none_count: none.len(),
                });
                set.cells.extend(any);
                set.cells.extend(none);
                pos_count += 1;
            }

            if pos_count > 0 {
                set.layers.push(RuleInputLayer {
                    target: bind(&conditions.layer_name),
                    pos_count,
                });
            }
        }

        if !set.is_empty() {
            compiled.push(set);
        }
    }
    compiled
}

/// The `MatchType` of a rules-map tile
pub(crate) fn match_type(rules_map: &Map, cell: &Cell) -> MatchType {
    rules_map
        .tileset(cell.tileset_id)
        .and_then(|t| t.tile_property(cell.tile_id, "MatchType"))
        .and_then(Value::as_string)
        .and_then(MatchType::parse)
        .unwrap_or_default()
}

/// Plain tiles used anywhere in the rule's input, in scan order
fn used_cells(rules_map: &Map, input_sets: &[InputSet], rule: &Rule) -> Vec<Option<Cell>> {
    let mut used = Vec::new();
    let inputs = input_sets
        .iter()
        .flat_map(|s| &s.layers)
        .flat_map(|c| c.list_yes.iter().chain(&c.list_no));

    for input in inputs {
        let Some(tiles) = rules_map
            .get_layer(input.layer_index)
            .and_then(|l| l.as_tile_layer())
        else {
            continue;
        };
        for (x, y) in rule.input_region.cells() {
            if let Some(cell) = tiles.cell_at(x, y) {
                if match_type(rules_map, &cell) == MatchType::Tile {
                    push_unique(&mut used, Some(cell));
                }
            }
        }
    }
    used
}

fn push_unique(cells: &mut Vec<Option<Cell>>, cell: Option<Cell>) {
    if !cells.contains(&cell) {
        cells.push(cell);
    }
}

/// Constraints collected for one position
#[derive(Default)]
struct Constraint {
    any: Vec<Option<Cell>>,
    none: Vec<Option<Cell>>,
    negate: bool,
}

impl Constraint {
    fn add(
        &mut self,
        rules_map: &Map,
        input: &InputLayer,
        x: i32,
        y: i32,
        used: &[Option<Cell>],
        inverted: bool,
    ) {
        let cell = rules_map
            .get_layer(input.layer_index)
            .and_then(|l| l.as_tile_layer())
            .and_then(|t| t.cell_at(x, y));

        let (any, none) = if inverted {
            (&mut self.none, &mut self.any)
        } else {
            (&mut self.any, &mut self.none)
        };

        let Some(cell) = cell else {
            if input.strict_empty {
                push_unique(any, None);
            }
            return;
        };

        match match_type(rules_map, &cell) {
            MatchType::Tile => push_unique(any, Some(cell)),
            MatchType::Empty => push_unique(any, None),
            MatchType::NonEmpty => push_unique(none, None),
            MatchType::Other => {
                for &other in used {
                    push_unique(none, other);
                }
                push_unique(none, None);
            }
            MatchType::Negate => self.negate = true,
            MatchType::Ignore => {}
        }
    }

    /// The final any/none lists, or `None` when the position is unconstrained
    fn finish(self) -> Option<(Vec<Option<Cell>>, Vec<Option<Cell>>)> {
        let (any, none) = if self.negate {
            (self.none, self.any)
        } else {
            (self.any, self.none)
        };
        if any.is_empty() && none.is_empty() {
            None
        } else {
            Some((any, none))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{map_with, tile};
    use crate::{InputConditions, RuleOptions};
    use tilemap_core::{Rect, Region};

    fn rule(area: Rect) -> Rule {
        Rule {
            index: 0,
            input_region: Region::from_rect(area),
            output_region: Region::from_rect(area),
            options: RuleOptions::default(),
            output_sets: vec![0],
        }
    }

    fn conditions(yes: &[(usize, bool)], no: &[(usize, bool)]) -> InputSet {
        let layer = |&(layer_index, strict_empty): &(usize, bool)| InputLayer {
            layer_index,
            strict_empty,
        };
        InputSet {
            name: String::new(),
            layers: vec![InputConditions {
                layer_name: "Ground".to_string(),
                list_yes: yes.iter().map(layer).collect(),
                list_no: no.iter().map(layer).collect(),
            }],
        }
    }

    fn bind(_: &str) -> LayerRef {
        LayerRef::Target(0)
    }

    #[test]
    fn unconstrained_positions_are_omitted() {
        let rules = map_with("rules", &[("input_Ground", &["....", ".1..", "...."])]);
        let sets = [conditions(&[(0, false)], &[])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(1, 1, 2, 2)), bind);

        assert_eq!(compiled.len(), 1);
        assert_eq!(
            compiled[0].layers,
            vec![RuleInputLayer {
                target: LayerRef::Target(0),
                pos_count: 1
            }]
        );
        assert_eq!(
            compiled[0].positions,
            vec![RuleInputLayerPos {
                x: 0,
                y: 0,
                any_count: 1,
                none_count: 0
            }]
        );
        assert_eq!(compiled[0].cells, vec![Some(tile(1))]);
    }

    #[test]
    fn strict_empty_constrains_empty_cells() {
        let rules = map_with("rules", &[("input_Ground", &["1."])]);
        let sets = [conditions(&[(0, true)], &[])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 2, 1)), bind);

        assert_eq!(compiled[0].positions.len(), 2);
        assert_eq!(compiled[0].cells, vec![Some(tile(1)), None]);
    }

    #[test]
    fn inputnot_cells_become_none_lists() {
        let rules = map_with(
            "rules",
            &[("input_Ground", &["1."]), ("inputnot_Ground", &["22"])],
        );
        let sets = [conditions(&[(0, false)], &[(1, false)])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 2, 1)), bind);

        let positions = &compiled[0].positions;
        assert_eq!((positions[0].any_count, positions[0].none_count), (1, 1));
        assert_eq!((positions[1].any_count, positions[1].none_count), (0, 1));
        assert_eq!(
            compiled[0].cells,
            vec![Some(tile(1)), Some(tile(2)), Some(tile(2))]
        );
    }

    #[test]
    fn match_type_tiles() {
        let mut rules = map_with("rules", &[("input_Ground", &["1234"])]);
        if let Some(tileset) = rules.tilesets.first_mut() {
            tileset.set_tile_property(2, "MatchType", "NonEmpty");
            tileset.set_tile_property(3, "MatchType", "Other");
            tileset.set_tile_property(4, "MatchType", "Ignore");
        }
        let sets = [conditions(&[(0, false)], &[])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 4, 1)), bind);

        let positions = &compiled[0].positions;
        assert_eq!(positions.len(), 3);
        assert_eq!((positions[1].any_count, positions[1].none_count), (0, 1));
        // "Other" excludes the plain tile used by the rule and emptiness
        assert_eq!((positions[2].any_count, positions[2].none_count), (0, 2));
        assert_eq!(
            compiled[0].cells,
            vec![Some(tile(1)), None, Some(tile(1)), None]
        );
    }

    #[test]
    fn empty_match_type_requires_empty_cell() {
        let mut rules = map_with("rules", &[("input_Ground", &["16"])]);
        if let Some(tileset) = rules.tilesets.first_mut() {
            tileset.set_tile_property(6, "MatchType", "Empty");
        }
        let sets = [conditions(&[(0, false)], &[])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 2, 1)), bind);

        let positions = &compiled[0].positions;
        assert_eq!(positions.len(), 2);
        assert_eq!((positions[1].any_count, positions[1].none_count), (1, 0));
        assert_eq!(compiled[0].cells, vec![Some(tile(1)), None]);
    }

    #[test]
    fn inputnot_inverts_match_types() {
        let mut rules = map_with(
            "rules",
            &[("input_Ground", &["1..."]), ("inputnot_Ground", &[".234"])],
        );
        if let Some(tileset) = rules.tilesets.first_mut() {
            tileset.set_tile_property(2, "MatchType", "Empty");
            tileset.set_tile_property(3, "MatchType", "NonEmpty");
            tileset.set_tile_property(4, "MatchType", "Other");
        }
        let sets = [conditions(&[(0, false)], &[(1, false)])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 4, 1)), bind);

        let counts: Vec<_> = compiled[0]
            .positions
            .iter()
            .map(|p| (p.any_count, p.none_count))
            .collect();
        // Tile 1, then not empty, then empty, then tile 1 or empty
        assert_eq!(counts, vec![(1, 0), (0, 1), (1, 0), (2, 0)]);
        assert_eq!(
            compiled[0].cells,
            vec![Some(tile(1)), None, None, Some(tile(1)), None]
        );
    }

    #[test]
    fn negate_swaps_constraints() {
        let mut rules = map_with(
            "rules",
            &[("input_Ground", &["1"]), ("input_Ground", &["5"])],
        );
        if let Some(tileset) = rules.tilesets.first_mut() {
            tileset.set_tile_property(5, "MatchType", "Negate");
        }
        let sets = [conditions(&[(0, false), (1, false)], &[])];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 1, 1)), bind);

        assert_eq!(compiled[0].positions[0].any_count, 0);
        assert_eq!(compiled[0].positions[0].none_count, 1);
    }

    #[test]
    fn empty_input_sets_are_dropped() {
        let rules = map_with(
            "rules",
            &[("input_Ground", &["1."]), ("input2_Ground", &[".."])],
        );
        let sets = [
            conditions(&[(1, false)], &[]),
            conditions(&[(0, false)], &[]),
        ];

        let compiled = compile_rule(&rules, &sets, &rule(Rect::new(0, 0, 2, 1)), bind);

        assert_eq!(compiled.len(), 1);
    }

    #[test]
    fn compilation_is_deterministic() {
        let rules = map_with(
            "rules",
            &[("input_Ground", &["12.", ".3."]), ("inputnot_Ground", &["..4", "..."])],
        );
        let sets = [conditions(&[(0, true)], &[(1, false)])];
        let area = rule(Rect::new(0, 0, 3, 2));

        let first = compile_rule(&rules, &sets, &area, bind);
        let second = compile_rule(&rules, &sets, &area, bind);

        assert_eq!(first, second);
        assert_eq!(first[0].positions.len(), 6);
    }
}
