//! Name → constructor registry.

use crate::builtin::{DataEnricher, FieldExtractor, Passthrough, ScoreFilter, TextLengthFilter};
use crate::config::TransformSpec;
use crate::script::{ScriptTransform, SCRIPT_TRANSFORM_NAME};
use bf_error::{Result, TransformError};
use bf_traits::RecordTransform;
use std::collections::BTreeMap;
use tracing::debug;

/// Constructs a fresh transform instance.
pub type TransformFactory = fn(&TransformSpec) -> Result<Box<dyn RecordTransform>>;

/// Closed mapping from transform name to constructor.
///
/// Every worker context calls [`TransformRegistry::create`] once, so each
/// gets its own instance with private state.
#[derive(Clone)]
pub struct TransformRegistry {
    factories: BTreeMap<String, TransformFactory>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TransformRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Creates a registry holding every built-in transform.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("passthrough", |_| Ok(Box::new(Passthrough::new())));
        registry.register("score_filter", |_| Ok(Box::new(ScoreFilter::new())));
        registry.register("text_length_filter", |_| {
            Ok(Box::new(TextLengthFilter::new()))
        });
        registry.register("field_extractor", |_| Ok(Box::new(FieldExtractor::new())));
        registry.register("data_enricher", |_| Ok(Box::new(DataEnricher::new())));
        registry.register(SCRIPT_TRANSFORM_NAME, |spec| {
            let source = spec.script.as_deref().ok_or_else(|| {
                TransformError::Load("the rhai transform requires a script".to_string())
            })?;
            Ok(Box::new(ScriptTransform::new(source)?))
        });
        registry
    }

    /// Registers (or replaces) a transform constructor.
    pub fn register(&mut self, name: impl Into<String>, factory: TransformFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Whether a transform is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Constructs a new instance of the transform named by `spec`.
    pub fn create(&self, spec: &TransformSpec) -> Result<Box<dyn RecordTransform>> {
        let factory = self.factories.get(&spec.name).ok_or_else(|| {
            TransformError::Unknown(format!(
                "'{}' (available: {})",
                spec.name,
                self.names().join(", ")
            ))
        })?;

        let transform = factory(spec)?;
        debug!(transform = %spec.name, "Created transform instance");
        Ok(transform)
    }
}
