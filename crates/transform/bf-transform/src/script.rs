//! Rhai script transform.

use crate::functions::register_functions;
use bf_error::{Result, TransformError};
use bf_traits::RecordTransform;
use bf_types::{Decision, Record, StatsMap};
use rhai::{Array, Dynamic, Engine, Map, Scope, AST, INT};
use tracing::{debug, warn};

/// Registry name of the script transform.
pub const SCRIPT_TRANSFORM_NAME: &str = "rhai";

/// Runs a user script once per record.
///
/// The script sees three variables:
///
/// * `record` - the input record as a map
/// * `destinations` - number of configured outputs
/// * `stats` - a map that persists across records and is reported as the
///   transform's statistics
///
/// Its value decides the record's fate: `()` drops it, a map is emitted to
/// output 0, and `[map, n]` is emitted to output `n`.
pub struct ScriptTransform {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    stats: Map,
}

impl std::fmt::Debug for ScriptTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptTransform")
            .field("stats_keys", &self.stats.len())
            .finish_non_exhaustive()
    }
}

impl ScriptTransform {
    /// Compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Compilation`] if the script does not parse.
    pub fn new(source: &str) -> Result<Self> {
        let mut engine = create_engine();
        register_functions(&mut engine);

        let ast = engine
            .compile(source)
            .map_err(|e| TransformError::Compilation(e.to_string()))?;

        debug!(bytes = source.len(), "Compiled transform script");

        Ok(Self {
            engine,
            ast,
            scope: Scope::new(),
            stats: Map::new(),
        })
    }

    fn decide(&self, result: Dynamic, destination_count: usize) -> Result<Decision> {
        if result.is_unit() {
            return Ok(Decision::Drop);
        }
        if result.is_map() {
            return Ok(Decision::emit(map_to_record(result)?, 0));
        }
        if result.is_array() {
            let mut pair = result.cast::<Array>();
            if pair.len() == 2 && pair[0].is_map() && pair[1].is_int() {
                let destination = pair[1].as_int().unwrap_or(-1);
                let record = map_to_record(pair.swap_remove(0))?;
                return Ok(Decision::emit(
                    record,
                    checked_destination(destination, destination_count)?,
                ));
            }
            return Err(TransformError::InvalidOutput(
                "array result must be [record, destination]".to_string(),
            )
            .into());
        }
        Err(TransformError::InvalidOutput(format!(
            "script returned {}, expected a map, [map, int] or ()",
            result.type_name()
        ))
        .into())
    }
}

/// Creates a Rhai engine with sandbox limits.
fn create_engine() -> Engine {
    let mut engine = Engine::new();

    engine.set_max_expr_depths(64, 64);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(1_000_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(10_000);
    engine.set_max_call_levels(16);
    engine.set_optimization_level(rhai::OptimizationLevel::Full);

    engine
}

fn checked_destination(destination: INT, count: usize) -> Result<usize> {
    match usize::try_from(destination) {
        Ok(d) if d < count => Ok(d),
        _ => Err(TransformError::InvalidDestination { destination, count }.into()),
    }
}

fn map_to_record(value: Dynamic) -> Result<Record> {
    rhai::serde::from_dynamic::<Record>(&value)
        .map_err(|e| TransformError::InvalidOutput(format!("record is not JSON-compatible: {e}")).into())
}

impl RecordTransform for ScriptTransform {
    fn process(&mut self, record: Record, destination_count: usize) -> Result<Decision> {
        let record = rhai::serde::to_dynamic(&record)
            .map_err(|e| TransformError::Execution(format!("failed to convert record: {e}")))?;

        self.scope.clear();
        self.scope.push("record", record);
        self.scope.push("destinations", destination_count as INT);
        self.scope.push("stats", std::mem::take(&mut self.stats));

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &self.ast);

        // Keep stats updates even when the script failed part way
        match self.scope.get_value::<Map>("stats") {
            Some(stats) => self.stats = stats,
            None => warn!("Script replaced `stats` with a non-map value, resetting"),
        }

        let result = result.map_err(|e| TransformError::Execution(e.to_string()))?;
        self.decide(result, destination_count)
    }

    fn current_stats(&self) -> StatsMap {
        match rhai::serde::from_dynamic::<serde_json::Map<String, serde_json::Value>>(
            &Dynamic::from_map(self.stats.clone()),
        ) {
            Ok(map) => StatsMap::from(map),
            Err(e) => {
                warn!(error = %e, "Script stats are not JSON-compatible");
                StatsMap::new()
            }
        }
    }

    fn name(&self) -> &str {
        SCRIPT_TRANSFORM_NAME
    }
}
