//! The automapper: one rules map, prepared against and applied to target maps.

use rand::Rng;
use regex::Regex;
use tilemap_core::{LayerData, Map, Region};
use uuid::Uuid;

use crate::apply::{ApplyContext, Applier, AutoMapReport};
use crate::compile::{compile_rule, CompiledRule};
use crate::matcher::{candidate_anchors, matches_at};
use crate::setup::{read_rules_map, RuleMapSetup};
use crate::{AutoMapError, AutoMapperOptions, AutoMappingContext, Diagnostics, Rule, Warning};

/// Rules compiled against the layers of one context
#[derive(Debug, Clone)]
struct Preparation {
    context_id: Uuid,
    compiled: Vec<CompiledRule>,
}

/// Applies the rules of one rules map to target maps.
///
/// Usage, per session:
///
/// 1. create an [`AutoMappingContext`] for the target map
/// 2. [`prepare_auto_map`](Self::prepare_auto_map) with that context
/// 3. [`auto_map`](Self::auto_map) one or more regions
/// 4. commit the context's changes to the target map
///
/// Construction never fails. Check [`is_valid`](Self::is_valid) or
/// [`error_string`](Self::error_string) before preparing.
#[derive(Debug)]
pub struct AutoMapper {
    rules_map: Map,
    setup: RuleMapSetup,
    options: AutoMapperOptions,
    diagnostics: Diagnostics,
    map_name_filter: Option<Regex>,
    prepared: Option<Preparation>,
}

impl AutoMapper {
    pub fn new(rules_map: Map) -> Self {
        Self::with_options(rules_map, AutoMapperOptions::default())
    }

    /// Read `rules_map` on top of host options. Rules-map properties win.
    pub fn with_options(rules_map: Map, mut options: AutoMapperOptions) -> Self {
        let mut diagnostics = Diagnostics::default();
        let setup = read_rules_map(&rules_map, &mut options, &mut diagnostics);
        Self {
            rules_map,
            setup,
            options,
            diagnostics,
            map_name_filter: None,
            prepared: None,
        }
    }

    pub fn rules_map(&self) -> &Map {
        &self.rules_map
    }

    pub fn rules(&self) -> &[Rule] {
        &self.setup.rules
    }

    /// Effective options, after rules-map properties were applied
    pub fn options(&self) -> &AutoMapperOptions {
        &self.options
    }

    /// Restrict the target maps this rules map is meant for
    pub fn set_map_name_filter(&mut self, filter: Option<Regex>) {
        self.map_name_filter = filter;
    }

    /// Whether this rules map should run on a map called `map_name`
    pub fn applies_to(&self, map_name: &str) -> bool {
        self.map_name_filter
            .as_ref()
            .map_or(true, |filter| filter.is_match(map_name))
    }

    /// Whether a target layer called `name` is read by any input layer
    pub fn rule_layer_name_used(&self, name: &str) -> bool {
        self.setup.input_layer_names.contains(name)
    }

    pub fn is_valid(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    pub fn error_string(&self) -> String {
        self.diagnostics.error_string()
    }

    pub fn warnings(&self) -> &[Warning] {
        self.diagnostics.warnings()
    }

    pub fn warning_string(&self) -> String {
        self.diagnostics.warning_string()
    }

    /// The compiled form of the rule at `rule_index`, once prepared
    pub fn compiled_rule(&self, rule_index: usize) -> Option<&CompiledRule> {
        self.prepared
            .as_ref()?
            .compiled
            .iter()
            .find(|c| c.rule_index == rule_index)
    }

    /// Bind the rules to the layers of `context`'s target map and compile them.
    ///
    /// Output layers missing from the target are created in the context.
    /// Must be repeated for every new context.
    pub fn prepare_auto_map(&mut self, context: &mut AutoMappingContext<'_>) -> Result<(), AutoMapError> {
        if !self.is_valid() {
            return Err(AutoMapError::InvalidRulesMap(self.error_string()));
        }

        for output in self.setup.output_sets.iter().flat_map(|s| &s.layers) {
            match self.rules_map.get_layer(output.layer_index).map(|l| &l.data) {
                Some(LayerData::Tiles(_)) => {
                    context.bind_output_tile_layer(&output.target_name);
                }
                Some(LayerData::Objects(_)) => {
                    context.bind_output_object_group(&output.target_name);
                }
                None => {}
            }
        }
        for name in &self.setup.input_layer_names {
            context.bind_input_layer(name);
        }

        let compiled: Vec<CompiledRule> = self
            .setup
            .rules
            .iter()
            .map(|rule| CompiledRule {
                rule_index: rule.index,
                input_sets: compile_rule(&self.rules_map, &self.setup.input_sets, rule, |name| {
                    context.input_binding(name)
                }),
            })
            .collect();

        tracing::debug!(
            target: "automap",
            "prepared {} rules of '{}' for '{}'",
            compiled.len(),
            self.rules_map.name,
            context.target().name
        );
        self.prepared = Some(Preparation {
            context_id: context.id,
            compiled,
        });
        Ok(())
    }

    fn preparation(&self, context: &AutoMappingContext<'_>) -> Result<&Preparation, AutoMapError> {
        if !self.is_valid() {
            return Err(AutoMapError::InvalidRulesMap(self.error_string()));
        }
        self.prepared
            .as_ref()
            .filter(|p| p.context_id == context.id)
            .ok_or(AutoMapError::NotPrepared)
    }

    /// Anchors inside `where_` at which a rule currently matches
    pub fn match_rule(
        &self,
        rule_index: usize,
        where_: &Region,
        context: &AutoMappingContext<'_>,
    ) -> Result<Vec<(i32, i32)>, AutoMapError> {
        let prepared = self.preparation(context)?;
        let (Some(rule), Some(compiled)) = (
            self.setup.rules.iter().find(|r| r.index == rule_index),
            prepared.compiled.iter().find(|c| c.rule_index == rule_index),
        ) else {
            return Ok(Vec::new());
        };

        let edge = self.options.edge_handling();
        let staged = self.options.match_in_order();
        Ok(candidate_anchors(rule, where_, context.target().rect(), &self.options)
            .into_iter()
            .filter(|&anchor| matches_at(&compiled.input_sets, anchor, context, edge, staged))
            .collect())
    }

    /// Apply every rule to `where_`, staging the edits in `context`.
    pub fn auto_map(
        &self,
        where_: &Region,
        context: &mut AutoMappingContext<'_>,
        rng: &mut impl Rng,
    ) -> Result<AutoMapReport, AutoMapError> {
        self.auto_map_cancellable(where_, context, rng, || false)
    }

    /// Like [`auto_map`](Self::auto_map), but polls `should_cancel` before
    /// every anchor. A cancelled scan stops where it is; in the default
    /// (unordered) mode nothing is staged at all.
    pub fn auto_map_cancellable(
        &self,
        where_: &Region,
        context: &mut AutoMappingContext<'_>,
        rng: &mut impl Rng,
        mut should_cancel: impl FnMut() -> bool,
    ) -> Result<AutoMapReport, AutoMapError> {
        let prepared = self.preparation(context)?;
        let where_ = where_.expanded(self.options.effective_radius());
        let map_rect = context.target().rect();
        let edge = self.options.edge_handling();

        let applier = Applier {
            rules_map: &self.rules_map,
            output_sets: &self.setup.output_sets,
            options: &self.options,
        };
        let mut apply_context = ApplyContext::default();
        let mut report = AutoMapReport::default();

        if self.options.delete_tiles {
            self.delete_tiles(&where_, context);
        }

        let rules = prepared
            .compiled
            .iter()
            .filter_map(|c| Some((self.setup.rules.get(c.rule_index)?, c)));

        if self.options.match_in_order() {
            'rules: for (rule, compiled) in rules {
                for anchor in candidate_anchors(rule, &where_, map_rect, &self.options) {
                    if should_cancel() {
                        report.cancelled = true;
                        break 'rules;
                    }
                    report.anchors_tested += 1;
                    if matches_at(&compiled.input_sets, anchor, context, edge, true) {
                        report.matched += 1;
                        let outcome =
                            applier.apply_rule(rule, anchor, &mut apply_context, context, rng);
                        report.record(outcome);
                    }
                }
            }
        } else {
            let mut matches = Vec::new();
            for (rule, compiled) in rules {
                let mut anchors = Vec::new();
                for anchor in candidate_anchors(rule, &where_, map_rect, &self.options) {
                    if should_cancel() {
                        report.cancelled = true;
                        return Ok(report);
                    }
                    report.anchors_tested += 1;
                    if matches_at(&compiled.input_sets, anchor, context, edge, false) {
                        anchors.push(anchor);
                    }
                }
                report.matched += anchors.len();
                matches.push((rule, anchors));
            }

            for (rule, anchors) in matches {
                for anchor in anchors {
                    let outcome =
                        applier.apply_rule(rule, anchor, &mut apply_context, context, rng);
                    report.record(outcome);
                }
            }
        }

        report.applied_region = apply_context.applied_region;
        tracing::debug!(
            target: "automap",
            "'{}': tested {} anchors, {} matched, {} applied",
            self.rules_map.name,
            report.anchors_tested,
            report.matched,
            report.applied
        );
        Ok(report)
    }

    /// Clear `where_` on every output layer of this rules map
    fn delete_tiles(&self, where_: &Region, context: &mut AutoMappingContext<'_>) {
        let target = context.target();
        for output in self.setup.output_sets.iter().flat_map(|s| &s.layers) {
            match self.rules_map.get_layer(output.layer_index).map(|l| &l.data) {
                Some(LayerData::Tiles(_)) => {
                    let Some(bound) = context.output_tile_binding(&output.target_name) else {
                        continue;
                    };
                    let has_cells = context
                        .tile_layer(bound)
                        .is_some_and(|tiles| tiles.has_cells_in(where_));
                    if has_cells {
                        if let Some(tiles) = context.tile_layer_mut(bound) {
                            tiles.erase(where_);
                        }
                    }
                }
                Some(LayerData::Objects(_)) => {
                    let Some(bound) = context.output_object_binding(&output.target_name) else {
                        continue;
                    };
                    let removed: Vec<Uuid> = context
                        .original_objects(bound)
                        .iter()
                        .filter(|o| {
                            where_.intersects_rect(o.tile_rect(target.tile_width, target.tile_height))
                        })
                        .map(|o| o.id)
                        .collect();
                    context.objects_to_remove.extend(removed);
                }
                None => {}
            }
        }
    }
}
