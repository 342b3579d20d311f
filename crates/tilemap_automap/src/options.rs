//! Engine options and per-rule options.
//!
//! [`AutoMapperOptions`] is the host-facing configuration. It can be loaded
//! from TOML and is then overridden by properties found on the rules map.
//! [`RuleOptions`] control individual rules and resolve through scopes: hard
//! default, then map properties, then `rule_options` areas.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tilemap_core::Value;

use crate::AutoMapError;

// ─── Engine options ──────────────────────────────────────────────────────────

/// How out-of-bounds cell reads are handled when a pattern extends past the map edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EdgeHandling {
    /// Anchors are restricted so patterns never leave the map; an
    /// out-of-bounds read fails the input set.
    #[default]
    Skip,
    /// Out-of-bounds cells read as empty.
    TreatAsEmpty,
    /// Out-of-bounds reads use the nearest cell inside the map.
    Clamp,
    /// Out-of-bounds reads wrap around the map dimensions.
    Wrap,
}

/// Options for one [`AutoMapper`](crate::AutoMapper).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMapperOptions {
    /// Clear the scanned region of every output layer before applying any rule.
    pub delete_tiles: bool,
    /// Allow matches whose input footprint crosses the map boundary.
    pub match_outside_map: bool,
    /// With `match_outside_map`, read out-of-bounds cells from the nearest edge cell.
    pub overflow_border: bool,
    /// With `match_outside_map`, wrap out-of-bounds reads (and writes) around the map.
    pub wrap_border: bool,
    /// Match and apply rules strictly one after another. Unset means `false`.
    pub match_in_order: Option<bool>,
    /// Extra margin added around the scanned region, for interactive use.
    /// Capped at [`MAX_AUTO_MAPPING_RADIUS`] when scanning.
    pub auto_mapping_radius: u32,
}

/// Largest margin a scan grows its region by
pub const MAX_AUTO_MAPPING_RADIUS: u32 = 1 << 20;

/// Largest skip chance; a rule always keeps some chance to apply
const MAX_SKIP_CHANCE: f64 = 1.0 - f64::EPSILON / 2.0;

impl AutoMapperOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self, AutoMapError> {
        Ok(toml::from_str(toml)?)
    }

    pub fn match_in_order(&self) -> bool {
        self.match_in_order.unwrap_or(false)
    }

    /// The scan margin in cells
    pub fn effective_radius(&self) -> i32 {
        self.auto_mapping_radius.min(MAX_AUTO_MAPPING_RADIUS) as i32
    }

    /// The border policy in effect. Wrapping wins over overflow.
    pub fn edge_handling(&self) -> EdgeHandling {
        if !self.match_outside_map {
            EdgeHandling::Skip
        } else if self.wrap_border {
            EdgeHandling::Wrap
        } else if self.overflow_border {
            EdgeHandling::Clamp
        } else {
            EdgeHandling::TreatAsEmpty
        }
    }

    /// Offer a rules-map property to the engine options
    pub(crate) fn apply_property(&mut self, name: &str, value: &Value) -> PropertyOutcome {
        let slot = match name.to_ascii_lowercase().as_str() {
            "deletetiles" => &mut self.delete_tiles,
            "matchoutsidemap" => &mut self.match_outside_map,
            "overflowborder" => &mut self.overflow_border,
            "wrapborder" => &mut self.wrap_border,
            "matchinorder" => {
                return match value.as_bool() {
                    Some(b) => {
                        self.match_in_order = Some(b);
                        PropertyOutcome::Applied
                    }
                    None => PropertyOutcome::expected(name, "a boolean"),
                };
            }
            "automappingradius" => {
                return match value.as_int().and_then(|r| u32::try_from(r).ok()) {
                    Some(radius) => {
                        self.auto_mapping_radius = radius;
                        PropertyOutcome::Applied
                    }
                    None => PropertyOutcome::expected(name, "a non-negative integer"),
                };
            }
            _ => return PropertyOutcome::Unknown,
        };
        match value.as_bool() {
            Some(b) => {
                *slot = b;
                PropertyOutcome::Applied
            }
            None => PropertyOutcome::expected(name, "a boolean"),
        }
    }
}

/// Result of offering a property to an option parser
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropertyOutcome {
    Applied,
    Invalid(String),
    Unknown,
}

impl PropertyOutcome {
    fn expected(name: &str, what: &str) -> Self {
        PropertyOutcome::Invalid(format!("Property '{name}' must be {what}"))
    }
}

// ─── Rule options ────────────────────────────────────────────────────────────

bitflags! {
    /// Which rule options were explicitly set at a scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleOptionFlags: u8 {
        const SKIP_CHANCE           = 1 << 0;
        const MOD_X                 = 1 << 1;
        const MOD_Y                 = 1 << 2;
        const OFFSET_X              = 1 << 3;
        const OFFSET_Y              = 1 << 4;
        const NO_OVERLAPPING_OUTPUT = 1 << 5;
        const DISABLED              = 1 << 6;
    }
}

/// Resolved behaviour of a single rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleOptions {
    /// Probability in `[0, 1)` that a match is skipped.
    pub skip_chance: f64,
    /// Anchors are sampled every `mod_x` columns...
    pub mod_x: u32,
    /// ...and every `mod_y` rows.
    pub mod_y: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Two applications of this rule never write overlapping output footprints.
    pub no_overlapping_output: bool,
    pub disabled: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            skip_chance: 0.0,
            mod_x: 1,
            mod_y: 1,
            offset_x: 0,
            offset_y: 0,
            no_overlapping_output: false,
            disabled: false,
        }
    }
}

impl RuleOptions {
    /// Whether `(x, y)` lies on the sampling grid set by the modulo and offset options
    pub fn accepts_anchor(&self, x: i32, y: i32) -> bool {
        let mod_x = self.mod_x.max(1) as i32;
        let mod_y = self.mod_y.max(1) as i32;
        (x - self.offset_x).rem_euclid(mod_x) == 0 && (y - self.offset_y).rem_euclid(mod_y) == 0
    }
}

/// Rule options at one scope, with a record of which fields that scope set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScopedRuleOptions {
    pub options: RuleOptions,
    pub set: RuleOptionFlags,
}

impl ScopedRuleOptions {
    /// Overwrite the fields of `target` that this scope sets explicitly
    pub fn merge_into(&self, target: &mut RuleOptions) {
        let o = &self.options;
        if self.set.contains(RuleOptionFlags::SKIP_CHANCE) {
            target.skip_chance = o.skip_chance;
        }
        if self.set.contains(RuleOptionFlags::MOD_X) {
            target.mod_x = o.mod_x;
        }
        if self.set.contains(RuleOptionFlags::MOD_Y) {
            target.mod_y = o.mod_y;
        }
        if self.set.contains(RuleOptionFlags::OFFSET_X) {
            target.offset_x = o.offset_x;
        }
        if self.set.contains(RuleOptionFlags::OFFSET_Y) {
            target.offset_y = o.offset_y;
        }
        if self.set.contains(RuleOptionFlags::NO_OVERLAPPING_OUTPUT) {
            target.no_overlapping_output = o.no_overlapping_output;
        }
        if self.set.contains(RuleOptionFlags::DISABLED) {
            target.disabled = o.disabled;
        }
    }

    /// Offer a property to the rule options of this scope
    pub(crate) fn apply_property(&mut self, name: &str, value: &Value) -> PropertyOutcome {
        let o = &mut self.options;
        let flag = match name.to_ascii_lowercase().as_str() {
            "skipchance" => match value.as_float() {
                Some(chance) => {
                    o.skip_chance = chance.clamp(0.0, MAX_SKIP_CHANCE);
                    RuleOptionFlags::SKIP_CHANCE
                }
                None => return PropertyOutcome::expected(name, "a number"),
            },
            "probability" => match value.as_float() {
                Some(probability) => {
                    o.skip_chance = (1.0 - probability).clamp(0.0, MAX_SKIP_CHANCE);
                    RuleOptionFlags::SKIP_CHANCE
                }
                None => return PropertyOutcome::expected(name, "a number"),
            },
            "modx" => match positive(value) {
                Some(m) => {
                    o.mod_x = m;
                    RuleOptionFlags::MOD_X
                }
                None => return PropertyOutcome::expected(name, "a positive integer"),
            },
            "mody" => match positive(value) {
                Some(m) => {
                    o.mod_y = m;
                    RuleOptionFlags::MOD_Y
                }
                None => return PropertyOutcome::expected(name, "a positive integer"),
            },
            "offsetx" => match integer(value) {
                Some(offset) => {
                    o.offset_x = offset;
                    RuleOptionFlags::OFFSET_X
                }
                None => return PropertyOutcome::expected(name, "an integer"),
            },
            "offsety" => match integer(value) {
                Some(offset) => {
                    o.offset_y = offset;
                    RuleOptionFlags::OFFSET_Y
                }
                None => return PropertyOutcome::expected(name, "an integer"),
            },
            "nooverlappingoutput" | "nooverlappingrules" => match value.as_bool() {
                Some(b) => {
                    o.no_overlapping_output = b;
                    RuleOptionFlags::NO_OVERLAPPING_OUTPUT
                }
                None => return PropertyOutcome::expected(name, "a boolean"),
            },
            "disabled" => match value.as_bool() {
                Some(b) => {
                    o.disabled = b;
                    RuleOptionFlags::DISABLED
                }
                None => return PropertyOutcome::expected(name, "a boolean"),
            },
            _ => return PropertyOutcome::Unknown,
        };
        self.set |= flag;
        PropertyOutcome::Applied
    }
}

fn integer(value: &Value) -> Option<i32> {
    value.as_int().and_then(|i| i32::try_from(i).ok())
}

fn positive(value: &Value) -> Option<u32> {
    value
        .as_int()
        .and_then(|i| u32::try_from(i).ok())
        .filter(|&m| m > 0)
}
