use std::collections::BTreeMap;

use serde::Deserialize;

use super::Hooks;
use crate::error::{ConfigError, GenerateError, Result};
use crate::graph;
use crate::sql::SqlObject;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTable {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Key columns propagated into the target; marks the chain frontier.
    #[serde(default)]
    pub key: Option<Vec<String>>,
    #[serde(default)]
    pub dep: Option<String>,
    /// SQL join predicate tying this table to its dependency.
    #[serde(default)]
    pub join: Option<String>,
}

impl KeyTable {
    pub fn sql(&self) -> SqlObject {
        SqlObject::new(self.schema.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTarget {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub key: Vec<String>,
}

impl KeyTarget {
    pub fn sql(&self) -> SqlObject {
        SqlObject::new(self.schema.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConfig {
    pub id: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub hooks: Hooks,
    pub tables: Vec<KeyTable>,
    pub target: KeyTarget,
}

impl KeyConfig {
    pub fn table_by_id(&self) -> BTreeMap<&str, &KeyTable> {
        self.tables
            .iter()
            .map(|table| (table.id.as_str(), table))
            .collect()
    }
}

pub(super) fn validate(config: &KeyConfig) -> Result<()> {
    let by_id = config.table_by_id();
    let starts = config
        .tables
        .iter()
        .map(|table| table.id.clone())
        .collect::<Vec<_>>();

    graph::closure(&starts, |table_id| {
        let table = by_id[table_id];
        match &table.dep {
            Some(dep) if !by_id.contains_key(dep.as_str()) => {
                Err(GenerateError::UnresolvedReference {
                    table: table_id.to_string(),
                    dep: dep.clone(),
                })
            }
            Some(dep) => Ok(vec![dep.clone()]),
            None => Ok(Vec::new()),
        }
    })?;

    for table in &config.tables {
        let chain = chain_from(config, &table.id)?;
        let terminal_id = chain.last().expect("a chain contains its start");
        let terminal = by_id[terminal_id.as_str()];
        if terminal.key.is_none() {
            return Err(ConfigError::NoChainFrontier {
                table: table.id.clone(),
                terminal: terminal_id.clone(),
            }
            .into());
        }
        if table.key.is_none() && table.join.is_none() {
            return Err(ConfigError::MissingDepJoin {
                table: table.id.clone(),
            }
            .into());
        }
    }

    Ok(())
}

/// The dependency chain starting at `table_id`, stopping at the first table
/// that carries propagated key columns.
pub(crate) fn chain_from(config: &KeyConfig, table_id: &str) -> Result<Vec<String>> {
    let by_id = config.table_by_id();
    let chain = graph::resolve(table_id, |current| {
        let table = by_id
            .get(current)
            .ok_or_else(|| GenerateError::UnresolvedReference {
                table: table_id.to_string(),
                dep: current.to_string(),
            })?;
        if table.key.is_some() {
            return Ok(None);
        }
        Ok(table.dep.clone())
    })?;
    Ok(chain)
}
