//! Errors and warnings reported while reading a rules map.

use thiserror::Error;
use tilemap_core::Map;
use uuid::Uuid;

/// Errors returned by engine calls.
///
/// Problems in the rules map itself are never returned from construction;
/// they are recorded and exposed through
/// [`AutoMapper::error_string`](crate::AutoMapper::error_string).
#[derive(Debug, Error)]
pub enum AutoMapError {
    #[error("rules map is not usable: {0}")]
    InvalidRulesMap(String),

    #[error("auto-mapping context was not prepared by this rules map")]
    NotPrepared,

    #[error("failed to parse automapper options: {0}")]
    Options(#[from] toml::de::Error),
}

/// A remediation the caller may apply to an editable copy of the rules map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestedFix {
    RemoveLayer {
        layer_id: Uuid,
    },
    RemoveMapProperty {
        name: String,
    },
    RemoveLayerProperty {
        layer_id: Uuid,
        name: String,
    },
    RemoveObjectProperty {
        layer_id: Uuid,
        object_id: Uuid,
        name: String,
    },
}

impl SuggestedFix {
    /// Apply the fix to `rules_map`. Returns `false` when there was nothing to change.
    pub fn apply(&self, rules_map: &mut Map) -> bool {
        match self {
            SuggestedFix::RemoveLayer { layer_id } => rules_map.remove_layer(*layer_id).is_some(),
            SuggestedFix::RemoveMapProperty { name } => rules_map.properties.remove(name).is_some(),
            SuggestedFix::RemoveLayerProperty { layer_id, name } => rules_map
                .layer_by_id_mut(*layer_id)
                .is_some_and(|layer| layer.properties.remove(name).is_some()),
            SuggestedFix::RemoveObjectProperty {
                layer_id,
                object_id,
                name,
            } => rules_map
                .layer_by_id_mut(*layer_id)
                .and_then(|layer| layer.as_object_group_mut())
                .and_then(|group| group.objects.iter_mut().find(|o| o.id == *object_id))
                .is_some_and(|object| object.properties.remove(name).is_some()),
        }
    }
}

/// A recoverable problem in the rules map
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub message: String,
    pub fix: Option<SuggestedFix>,
}

/// Errors and warnings accumulated for one rules map.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "automap", "rules map error: {message}");
        self.errors.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>, fix: Option<SuggestedFix>) {
        let message = message.into();
        tracing::warn!(target: "automap", "{message}");
        self.warnings.push(Warning { message, fix });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// All errors, one per line
    pub fn error_string(&self) -> String {
        self.errors.join("\n")
    }

    /// All warning messages, one per line
    pub fn warning_string(&self) -> String {
        self.warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
