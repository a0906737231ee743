use std::collections::BTreeMap;

use serde::Deserialize;

use super::join::Consistency;
use crate::error::{ConfigError, Result};
use crate::sql::{SqlId, SqlObject};

/// One output aggregate: a per-batch signed-delta expression, an optional
/// conflict combine expression, and the value a no-op delta takes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub value: String,
    #[serde(default)]
    pub combine: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
}

impl Aggregate {
    /// Accumulate deltas by default: `existing.col + excluded.col`.
    pub fn combine_expression(&self, name: &str) -> String {
        match &self.combine {
            Some(combine) => combine.clone(),
            None => {
                let column = SqlId::new(name);
                format!("existing.{column} + excluded.{column}")
            }
        }
    }

    pub fn identity_value(&self) -> &str {
        self.identity.as_deref().unwrap_or("0")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggTable {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
}

impl AggTable {
    pub fn sql(&self) -> SqlObject {
        SqlObject::new(self.schema.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggConfig {
    pub id: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub consistency: Consistency,
    pub source: AggTable,
    pub target: AggTable,
    #[serde(default)]
    pub filter: Option<String>,
    /// Output column name -> grouping expression over the change rows.
    pub groups: BTreeMap<String, String>,
    /// Output column name -> aggregate.
    pub aggregates: BTreeMap<String, Aggregate>,
    /// Output column name -> re-aggregation expression used when
    /// compressing shards. Presence enables the sharded change path.
    #[serde(default)]
    pub shard: Option<BTreeMap<String, String>>,
}

pub(super) fn validate(config: &AggConfig) -> Result<()> {
    let Some(shard) = &config.shard else {
        return Ok(());
    };

    if config.consistency == Consistency::Deferred {
        return Err(ConfigError::ShardWithDeferred.into());
    }

    for column in config.aggregates.keys() {
        if !shard.contains_key(column) {
            return Err(ConfigError::ShardMissingAggregate {
                column: column.clone(),
            }
            .into());
        }
    }

    Ok(())
}
