mod change;
mod clean;
mod defer;

use std::collections::BTreeMap;

use crate::config::{AggConfig, Aggregate, Consistency};
use crate::error::Result;
use crate::names::AggStructure;
use crate::statement::Statement;

/// Generate the statement stream for one aggregate configuration:
/// deferred machinery first when enabled, then the change functions and
/// their triggers, then the cleanup trigger or the shard compressor.
pub fn agg_statements(config: &AggConfig) -> Result<Vec<Statement>> {
    let structure = AggStructure::new(config.schema.as_deref(), &config.id);
    let aggregates = effective_aggregates(config);
    let mut statements = Vec::new();

    if config.consistency == Consistency::Deferred {
        statements.extend(defer::create_refresh_function(
            config, &structure, &aggregates,
        ));
        statements.extend(defer::create_setup_function(
            config, &structure, &aggregates,
        ));
    }

    statements.extend(change::create_change(config, &structure, &aggregates));

    if let Some(shard) = &config.shard {
        statements.extend(clean::create_compress(config, &structure, &aggregates, shard));
    } else {
        statements.extend(clean::create_cleanup(config, &structure));
    }

    Ok(statements)
}

/// The user's aggregates plus the implicit `_count` signed row count that
/// drives emptiness cleanup.
fn effective_aggregates(config: &AggConfig) -> BTreeMap<String, Aggregate> {
    let mut aggregates = config.aggregates.clone();
    aggregates.entry("_count".to_string()).or_insert(Aggregate {
        value: "sum(sign)".to_string(),
        combine: None,
        identity: None,
    });
    aggregates
}
