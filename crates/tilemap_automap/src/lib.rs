//! Rule-based automapping for tile maps.
//!
//! Rules are drawn in an ordinary [`Map`](tilemap_core::Map), the rules map:
//! `regions` layers mark where rules are, `input_*` and `inputnot_*` layers
//! hold the patterns to look for and `output_*` layers hold what to write
//! where a pattern matches. [`AutoMapper`] reads a rules map once and then
//! applies it to any number of target maps.
//!
//! Edits are staged in an [`AutoMappingContext`], which borrows the target
//! read-only; commit them with [`AutoMapChanges::apply_to`].
//!
//! ```ignore
//! let mut mapper = AutoMapper::new(rules_map);
//! let mut context = AutoMappingContext::new(&target);
//! mapper.prepare_auto_map(&mut context)?;
//! mapper.auto_map(&Region::from_rect(target.rect()), &mut context, &mut rng)?;
//! let changes = context.into_changes();
//! changes.apply_to(&mut target);
//! ```
//!
//! This crate has no engine dependency. It operates on plain data from `tilemap_core`.

mod apply;
mod compile;
mod context;
mod diagnostics;
mod mapper;
mod matcher;
mod options;
mod setup;
mod types;

#[cfg(test)]
mod test_support;

pub use apply::AutoMapReport;
pub use compile::{compile_rule, CompiledRule, RuleInputLayer, RuleInputLayerPos, RuleInputSet};
pub use context::{AutoMapChanges, AutoMappingContext, CellWrite, LayerRef, NewObject};
pub use diagnostics::{AutoMapError, Diagnostics, SuggestedFix, Warning};
pub use mapper::AutoMapper;
pub use options::{
    AutoMapperOptions, EdgeHandling, RuleOptionFlags, RuleOptions, ScopedRuleOptions,
    MAX_AUTO_MAPPING_RADIUS,
};
pub use types::{
    InputConditions, InputLayer, InputSet, MatchType, OutputLayer, OutputSet, Rule,
    RuleOptionsArea,
};
