//! Reads a rules map: options, layer roles and the rule list.
//!
//! Layer roles are resolved once here, by name (case-insensitive prefixes):
//!
//! - `regions`, `regions_input`, `regions_output`: rule markers
//! - `input[<set>]_<target>`, `inputnot[<set>]_<target>`: input patterns
//! - `output[<set>]_<target>`: output patches, tiles or objects
//! - `rule_options`: objects whose properties override rule options in their area

use std::collections::BTreeSet;

use tilemap_core::{Layer, LayerData, Map, Region, TileLayer, Value};

use crate::compile::compile_rule;
use crate::options::PropertyOutcome;
use crate::{
    AutoMapperOptions, Diagnostics, InputLayer, InputSet, LayerRef, OutputLayer, OutputSet, Rule,
    RuleOptions, RuleOptionsArea, ScopedRuleOptions, SuggestedFix,
};

/// Everything read from a rules map
#[derive(Debug, Clone, Default)]
pub(crate) struct RuleMapSetup {
    pub input_sets: Vec<InputSet>,
    pub output_sets: Vec<OutputSet>,
    pub rules: Vec<Rule>,
    pub map_options: ScopedRuleOptions,
    pub option_areas: Vec<RuleOptionsArea>,
    /// Target layer names read by input layers.
    pub input_layer_names: BTreeSet<String>,
}

#[derive(Default)]
struct MarkerLayers<'a> {
    regions: Option<&'a TileLayer>,
    regions_input: Option<&'a TileLayer>,
    regions_output: Option<&'a TileLayer>,
}

/// Read `rules_map`. Map properties override `options`. Problems are
/// recorded in `diagnostics`; the result is only usable without errors.
pub(crate) fn read_rules_map(
    rules_map: &Map,
    options: &mut AutoMapperOptions,
    diagnostics: &mut Diagnostics,
) -> RuleMapSetup {
    let mut setup = RuleMapSetup::default();

    read_map_properties(rules_map, options, &mut setup.map_options, diagnostics);

    let mut markers = MarkerLayers::default();
    for (index, layer) in rules_map.layers.iter().enumerate() {
        classify_layer(rules_map, index, layer, &mut markers, &mut setup, diagnostics);
    }

    if setup.input_sets.is_empty() {
        diagnostics.error("No input_<name> layer found!");
    }
    if setup.output_sets.is_empty() {
        diagnostics.error("No output_<name> layer found!");
    }
    let has_regions = markers.regions.is_some()
        || (markers.regions_input.is_some() && markers.regions_output.is_some());
    if !has_regions {
        diagnostics.error(
            "No 'regions' layer found, nor both 'regions_input' and 'regions_output' layers",
        );
    }
    if diagnostics.has_errors() {
        return setup;
    }

    setup.rules = build_rules(rules_map, &markers, &setup, diagnostics);
    warn_unused_layers(rules_map, &setup, diagnostics);

    setup.input_layer_names = setup
        .input_sets
        .iter()
        .flat_map(|s| &s.layers)
        .map(|c| c.layer_name.clone())
        .collect();

    tracing::debug!(
        target: "automap",
        "read rules map '{}': {} rules, {} input sets, {} output sets",
        rules_map.name,
        setup.rules.len(),
        setup.input_sets.len(),
        setup.output_sets.len()
    );
    setup
}

/// Properties sorted by name, for stable warning order
fn sorted_properties(properties: &tilemap_core::Properties) -> Vec<(&String, &Value)> {
    let mut sorted: Vec<_> = properties.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
}

fn read_map_properties(
    rules_map: &Map,
    options: &mut AutoMapperOptions,
    map_options: &mut ScopedRuleOptions,
    diagnostics: &mut Diagnostics,
) {
    for (name, value) in sorted_properties(&rules_map.properties) {
        let outcome = match options.apply_property(name, value) {
            PropertyOutcome::Unknown => map_options.apply_property(name, value),
            outcome => outcome,
        };
        let fix = Some(SuggestedFix::RemoveMapProperty { name: name.clone() });
        match outcome {
            PropertyOutcome::Applied => {}
            PropertyOutcome::Invalid(message) => diagnostics.warn(message, fix),
            PropertyOutcome::Unknown => {
                diagnostics.warn(format!("Ignoring unknown property '{name}' on rules map"), fix)
            }
        }
    }

    if options.overflow_border && options.wrap_border {
        let fix = rules_map
            .properties
            .keys()
            .find(|k| k.eq_ignore_ascii_case("OverflowBorder"))
            .map(|name| SuggestedFix::RemoveMapProperty { name: name.clone() });
        diagnostics.warn(
            "Both OverflowBorder and WrapBorder are set, using WrapBorder",
            fix,
        );
        options.overflow_border = false;
    }
    if options.overflow_border || options.wrap_border {
        options.match_outside_map = true;
    }
}

fn classify_layer<'a>(
    rules_map: &Map,
    index: usize,
    layer: &'a Layer,
    markers: &mut MarkerLayers<'a>,
    setup: &mut RuleMapSetup,
    diagnostics: &mut Diagnostics,
) {
    let lower = layer.name.to_ascii_lowercase();
    let remove_layer = Some(SuggestedFix::RemoveLayer { layer_id: layer.id });

    if lower == "rule_options" {
        match layer.as_object_group() {
            Some(_) => read_option_areas(rules_map, layer, setup, diagnostics),
            None => diagnostics.warn(
                format!("Layer '{}' must be an object layer", layer.name),
                remove_layer,
            ),
        }
        return;
    }

    if lower.starts_with("regions") {
        let Some(tiles) = layer.as_tile_layer() else {
            diagnostics.error(format!("'{}' layer must be a tile layer", layer.name));
            return;
        };
        let slot = match lower.as_str() {
            "regions" => &mut markers.regions,
            "regions_input" => &mut markers.regions_input,
            "regions_output" => &mut markers.regions_output,
            _ => {
                diagnostics.warn(
                    format!("Layer '{}' is not a recognized regions layer", layer.name),
                    remove_layer,
                );
                return;
            }
        };
        if slot.is_some() {
            diagnostics.error(format!("Multiple '{lower}' layers found"));
            return;
        }
        *slot = Some(tiles);
        return;
    }

    for (prefix, inverted) in [("inputnot", true), ("input", false)] {
        if !lower.starts_with(prefix) {
            continue;
        }
        let Some((set_name, target)) = split_set_and_target(&layer.name, prefix.len()) else {
            diagnostics.error(format!(
                "Did you forget an underscore in layer '{}'?",
                layer.name
            ));
            return;
        };
        if layer.as_tile_layer().is_none() {
            diagnostics.error(format!("'{}' layer must be a tile layer", layer.name));
            return;
        }

        let input = InputLayer {
            layer_index: index,
            strict_empty: read_input_layer_properties(layer, diagnostics),
        };
        let conditions = input_set(&mut setup.input_sets, set_name).conditions_mut(target);
        if inverted {
            conditions.list_no.push(input);
        } else {
            conditions.list_yes.push(input);
        }
        return;
    }

    if lower.starts_with("output") {
        let Some((set_name, target)) = split_set_and_target(&layer.name, "output".len()) else {
            diagnostics.error(format!(
                "Did you forget an underscore in layer '{}'?",
                layer.name
            ));
            return;
        };
        let set = match setup.output_sets.iter().position(|s| s.name == set_name) {
            Some(i) => &mut setup.output_sets[i],
            None => {
                setup.output_sets.push(OutputSet {
                    name: set_name.to_string(),
                    layers: Vec::new(),
                });
                let last = setup.output_sets.len() - 1;
                &mut setup.output_sets[last]
            }
        };
        set.layers.push(OutputLayer {
            layer_index: index,
            target_name: target.to_string(),
        });
        return;
    }

    diagnostics.warn(
        format!(
            "Layer '{}' is not recognized as a valid layer for automapping",
            layer.name
        ),
        remove_layer,
    );
}

/// Split `<prefix><set>_<target>` into set and target names
fn split_set_and_target(name: &str, prefix_len: usize) -> Option<(&str, &str)> {
    let rest = name.get(prefix_len..)?;
    let underscore = rest.find('_')?;
    Some((&rest[..underscore], &rest[underscore + 1..]))
}

fn input_set<'s>(sets: &'s mut Vec<InputSet>, name: &str) -> &'s mut InputSet {
    let index = match sets.iter().position(|s| s.name == name) {
        Some(index) => index,
        None => {
            sets.push(InputSet {
                name: name.to_string(),
                layers: Vec::new(),
            });
            sets.len() - 1
        }
    };
    &mut sets[index]
}

/// Read the properties of an input layer, returning its strict-empty flag
fn read_input_layer_properties(layer: &Layer, diagnostics: &mut Diagnostics) -> bool {
    let mut strict_empty = false;
    for (name, value) in sorted_properties(&layer.properties) {
        let fix = Some(SuggestedFix::RemoveLayerProperty {
            layer_id: layer.id,
            name: name.clone(),
        });
        let lower = name.to_ascii_lowercase();
        if lower == "strictempty" || lower == "autoempty" {
            match value.as_bool() {
                Some(b) => strict_empty = b,
                None => diagnostics.warn(format!("Property '{name}' must be a boolean"), fix),
            }
        } else {
            diagnostics.warn(
                format!("Ignoring unknown property '{name}' on layer '{}'", layer.name),
                fix,
            );
        }
    }
    strict_empty
}

fn read_option_areas(
    rules_map: &Map,
    layer: &Layer,
    setup: &mut RuleMapSetup,
    diagnostics: &mut Diagnostics,
) {
    let Some(group) = layer.as_object_group() else {
        return;
    };
    for object in &group.objects {
        let mut options = ScopedRuleOptions::default();
        for (name, value) in sorted_properties(&object.properties) {
            let fix = Some(SuggestedFix::RemoveObjectProperty {
                layer_id: layer.id,
                object_id: object.id,
                name: name.clone(),
            });
            match options.apply_property(name, value) {
                PropertyOutcome::Applied => {}
                PropertyOutcome::Invalid(message) => diagnostics.warn(message, fix),
                PropertyOutcome::Unknown => diagnostics.warn(
                    format!("Ignoring unknown property '{name}' on rule options object"),
                    fix,
                ),
            }
        }
        setup.option_areas.push(RuleOptionsArea {
            area: object.tile_rect(rules_map.tile_width, rules_map.tile_height),
            options,
        });
    }
}

fn marker_region(layers: &[Option<&TileLayer>]) -> Region {
    let mut region = Region::new();
    for tiles in layers.iter().flatten() {
        region.unite(&tiles.region());
    }
    region
}

fn build_rules(
    rules_map: &Map,
    markers: &MarkerLayers<'_>,
    setup: &RuleMapSetup,
    diagnostics: &mut Diagnostics,
) -> Vec<Rule> {
    let input_marks = marker_region(&[markers.regions, markers.regions_input]);
    let output_marks = marker_region(&[markers.regions, markers.regions_output]);

    // Widest first, so narrower areas override; the sort is stable.
    let mut areas: Vec<&RuleOptionsArea> = setup.option_areas.iter().collect();
    areas.sort_by_key(|a| std::cmp::Reverse(a.area.area()));

    let mut rules = Vec::new();
    for component in input_marks.united(&output_marks).connected_components() {
        let at = component.bounding_rect();
        let input_region = component.intersected(&input_marks);
        let output_region = component.intersected(&output_marks);

        if input_region.is_empty() {
            diagnostics.error(format!(
                "Rule at ({}, {}) has an output region but no input region",
                at.x, at.y
            ));
            continue;
        }
        if output_region.is_empty() {
            diagnostics.warn(
                format!("Rule at ({}, {}) has no output region", at.x, at.y),
                None,
            );
            continue;
        }

        let mut options = RuleOptions::default();
        setup.map_options.merge_into(&mut options);
        for area in areas.iter().filter(|a| component.intersects_rect(a.area)) {
            area.options.merge_into(&mut options);
        }

        let output_sets: Vec<usize> = setup
            .output_sets
            .iter()
            .enumerate()
            .filter(|(_, set)| has_output(rules_map, set, &output_region))
            .map(|(i, _)| i)
            .collect();
        if output_sets.is_empty() {
            diagnostics.warn(
                format!("Rule at ({}, {}) has no output", at.x, at.y),
                None,
            );
            continue;
        }

        let rule = Rule {
            index: rules.len(),
            input_region,
            output_region,
            options,
            output_sets,
        };
        if compile_rule(rules_map, &setup.input_sets, &rule, |_| LayerRef::Missing).is_empty() {
            diagnostics.error(format!(
                "Rule at ({}, {}) has an empty input pattern",
                at.x, at.y
            ));
            continue;
        }
        rules.push(rule);
    }
    rules
}

/// Whether any layer of `set` has tiles or objects inside `region`
fn has_output(rules_map: &Map, set: &OutputSet, region: &Region) -> bool {
    set.layers.iter().any(|output| {
        match rules_map.get_layer(output.layer_index).map(|l| &l.data) {
            Some(LayerData::Tiles(tiles)) => tiles.has_cells_in(region),
            Some(LayerData::Objects(group)) => group
                .objects_in(region, rules_map.tile_width, rules_map.tile_height)
                .next()
                .is_some(),
            None => false,
        }
    })
}

fn warn_unused_layers(rules_map: &Map, setup: &RuleMapSetup, diagnostics: &mut Diagnostics) {
    let mut input_area = Region::new();
    let mut output_area = Region::new();
    for rule in &setup.rules {
        input_area.unite(&rule.input_region);
        output_area.unite(&rule.output_region);
    }

    let inputs = setup
        .input_sets
        .iter()
        .flat_map(|s| &s.layers)
        .flat_map(|c| c.list_yes.iter().chain(&c.list_no));
    for input in inputs {
        let Some(layer) = rules_map.get_layer(input.layer_index) else {
            continue;
        };
        let used = input.strict_empty
            || layer
                .as_tile_layer()
                .is_some_and(|t| t.has_cells_in(&input_area));
        if !used {
            diagnostics.warn(
                format!("Input layer '{}' is not used by any rule", layer.name),
                Some(SuggestedFix::RemoveLayer { layer_id: layer.id }),
            );
        }
    }

    for output in setup.output_sets.iter().flat_map(|s| &s.layers) {
        let Some(layer) = rules_map.get_layer(output.layer_index) else {
            continue;
        };
        let used = match &layer.data {
            LayerData::Tiles(tiles) => tiles.has_cells_in(&output_area),
            LayerData::Objects(group) => group
                .objects_in(&output_area, rules_map.tile_width, rules_map.tile_height)
                .next()
                .is_some(),
        };
        if !used {
            diagnostics.warn(
                format!("Output layer '{}' has no content in any rule", layer.name),
                Some(SuggestedFix::RemoveLayer { layer_id: layer.id }),
            );
        }
    }
}
