//! Finds the anchors where a compiled rule matches.

use tilemap_core::{Cell, Rect, Region, TileLayer};

use crate::{AutoMapperOptions, AutoMappingContext, EdgeHandling, Rule, RuleInputSet};

/// Anchors worth testing for `rule` inside `where_`, in scan order.
///
/// An anchor qualifies when the rule's input footprint placed on it overlaps
/// `where_`, fits the map under the active border policy, and lies on the
/// rule's modulo grid. Disabled rules have no anchors.
pub(crate) fn candidate_anchors(
    rule: &Rule,
    where_: &Region,
    map_rect: Rect,
    options: &AutoMapperOptions,
) -> Vec<(i32, i32)> {
    if rule.options.disabled {
        return Vec::new();
    }
    let bounds = rule.input_bounds();
    if bounds.is_empty() {
        return Vec::new();
    }
    let (grow_x, grow_y) = (bounds.width - 1, bounds.height - 1);

    let mut anchors = Region::new();
    for rect in where_.rects() {
        anchors.add_rect(Rect::new(
            rect.x - grow_x,
            rect.y - grow_y,
            rect.width + grow_x,
            rect.height + grow_y,
        ));
    }

    let allowed = if options.match_outside_map {
        Rect::new(
            map_rect.x - grow_x,
            map_rect.y - grow_y,
            map_rect.width + grow_x,
            map_rect.height + grow_y,
        )
    } else {
        Rect::new(
            map_rect.x,
            map_rect.y,
            map_rect.width - grow_x,
            map_rect.height - grow_y,
        )
    };

    anchors
        .intersected_rect(allowed)
        .cells()
        .filter(|&(x, y)| rule.options.accepts_anchor(x, y))
        .collect()
}

/// Read one target cell under the border policy.
///
/// The outer `None` means the read falls outside the map and must fail.
pub(crate) fn read_cell(
    layer: Option<&TileLayer>,
    x: i32,
    y: i32,
    map_rect: Rect,
    edge: EdgeHandling,
) -> Option<Option<Cell>> {
    let (x, y) = if map_rect.contains(x, y) {
        (x, y)
    } else {
        match edge {
            EdgeHandling::Skip => return None,
            _ if map_rect.is_empty() => return Some(None),
            EdgeHandling::TreatAsEmpty => return Some(None),
            EdgeHandling::Clamp => (
                x.clamp(map_rect.left(), map_rect.right() - 1),
                y.clamp(map_rect.top(), map_rect.bottom() - 1),
            ),
            EdgeHandling::Wrap => wrap_into(map_rect, x, y),
        }
    };
    Some(layer.and_then(|tiles| tiles.cell_at(x, y)))
}

/// Wrap a position into a non-empty rect
pub(crate) fn wrap_into(rect: Rect, x: i32, y: i32) -> (i32, i32) {
    (
        rect.x + (x - rect.x).rem_euclid(rect.width),
        rect.y + (y - rect.y).rem_euclid(rect.height),
    )
}

/// Whether any of the compiled input sets matches at `anchor`.
///
/// With `staged` the target is read through the context's clones, so
/// output staged earlier in the scan is visible.
pub(crate) fn matches_at(
    input_sets: &[RuleInputSet],
    anchor: (i32, i32),
    context: &AutoMappingContext<'_>,
    edge: EdgeHandling,
    staged: bool,
) -> bool {
    let map_rect = context.target().rect();
    input_sets
        .iter()
        .any(|set| set_matches(set, anchor, context, map_rect, edge, staged))
}

fn set_matches(
    set: &RuleInputSet,
    (anchor_x, anchor_y): (i32, i32),
    context: &AutoMappingContext<'_>,
    map_rect: Rect,
    edge: EdgeHandling,
    staged: bool,
) -> bool {
    let mut positions = set.positions.as_slice();
    let mut cells = set.cells.as_slice();

    for layer in &set.layers {
        let tiles = if staged {
            context.tile_layer(layer.target)
        } else {
            context.original_tile_layer(layer.target)
        };
        let (layer_positions, rest) = positions.split_at(layer.pos_count);
        positions = rest;

        for pos in layer_positions {
            let (any, rest) = cells.split_at(pos.any_count);
            let (none, rest) = rest.split_at(pos.none_count);
            cells = rest;

            let Some(cell) = read_cell(tiles, anchor_x + pos.x, anchor_y + pos.y, map_rect, edge)
            else {
                return false;
            };
            if !any.is_empty() && !any.contains(&cell) {
                return false;
            }
            if none.contains(&cell) {
                return false;
            }
        }
    }
    true
}
