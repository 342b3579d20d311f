//! Data types produced by reading a rules map.
//!
//! Layer indices in this module refer to layers of the rules map, never the
//! target map. Binding to target layers happens in
//! [`AutoMapper::prepare_auto_map`](crate::AutoMapper::prepare_auto_map).

use tilemap_core::{Rect, Region};

use crate::{RuleOptions, ScopedRuleOptions};

// ─── Input ───────────────────────────────────────────────────────────────────

/// One `input*` or `inputnot*` layer of the rules map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayer {
    pub layer_index: usize,
    /// When `true`, empty cells in the pattern only match empty target cells.
    pub strict_empty: bool,
}

/// The input layers of one input set that read the same target layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConditions {
    /// Name of the target layer these conditions read.
    pub layer_name: String,
    /// `input` layers: one of their cells must match.
    pub list_yes: Vec<InputLayer>,
    /// `inputnot` layers: none of their cells may match.
    pub list_no: Vec<InputLayer>,
}

/// A named alternative of input layers. A rule matches when any of its sets matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet {
    pub name: String,
    pub layers: Vec<InputConditions>,
}

impl InputSet {
    pub(crate) fn conditions_mut(&mut self, layer_name: &str) -> &mut InputConditions {
        let index = match self.layers.iter().position(|c| c.layer_name == layer_name) {
            Some(index) => index,
            None => {
                self.layers.push(InputConditions {
                    layer_name: layer_name.to_string(),
                    list_yes: Vec::new(),
                    list_no: Vec::new(),
                });
                self.layers.len() - 1
            }
        };
        &mut self.layers[index]
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// One `output*` layer of the rules map, tiles or objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayer {
    pub layer_index: usize,
    /// Name of the target layer the output is written to.
    pub target_name: String,
}

/// A named alternative of output layers. One eligible set is chosen per match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSet {
    pub name: String,
    pub layers: Vec<OutputLayer>,
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// Rule options read from one object on the `rule_options` layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOptionsArea {
    /// Covered cells of the rules map.
    pub area: Rect,
    pub options: ScopedRuleOptions,
}

/// One rule: an input region, an output region and its resolved options.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Position of the rule in scan order of the marker layers.
    pub index: usize,
    pub input_region: Region,
    pub output_region: Region,
    pub options: RuleOptions,
    /// Indices into the mapper's output sets that have content in `output_region`.
    pub output_sets: Vec<usize>,
}

impl Rule {
    /// Bounding rectangle of the input pattern. Its top-left is placed on the anchor.
    pub fn input_bounds(&self) -> Rect {
        self.input_region.bounding_rect()
    }
}

/// How a rules-map tile constrains the target cell it lies over.
///
/// Read from the `MatchType` custom property of the tile in its tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchType {
    /// The target cell must hold this exact tile.
    #[default]
    Tile,
    /// The target cell must be empty.
    Empty,
    /// The target cell must hold any tile.
    NonEmpty,
    /// The target cell must hold a tile not used elsewhere in the rule's input.
    Other,
    /// Invert every other constraint at this position.
    Negate,
    /// No constraint.
    Ignore,
}

impl MatchType {
    /// Parse a `MatchType` property value, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "tile" => MatchType::Tile,
            "empty" => MatchType::Empty,
            "nonempty" => MatchType::NonEmpty,
            "other" => MatchType::Other,
            "negate" => MatchType::Negate,
            "ignore" => MatchType::Ignore,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_are_grouped_by_target_layer() {
        let mut set = InputSet {
            name: String::new(),
            layers: Vec::new(),
        };
        set.conditions_mut("Ground").list_yes.push(InputLayer {
            layer_index: 1,
            strict_empty: false,
        });
        set.conditions_mut("Walls").list_yes.push(InputLayer {
            layer_index: 2,
            strict_empty: false,
        });
        set.conditions_mut("Ground").list_no.push(InputLayer {
            layer_index: 3,
            strict_empty: true,
        });

        assert_eq!(set.layers.len(), 2);
        assert_eq!(set.layers[0].list_yes.len(), 1);
        assert_eq!(set.layers[0].list_no.len(), 1);
    }

    #[test]
    fn match_type_parses_case_insensitively() {
        assert_eq!(MatchType::parse("NonEmpty"), Some(MatchType::NonEmpty));
        assert_eq!(MatchType::parse(" empty "), Some(MatchType::Empty));
        assert_eq!(MatchType::parse("sometimes"), None);
    }
}
