use std::collections::BTreeMap;

use serde::Deserialize;

use super::Hooks;
use crate::error::{ConfigError, GenerateError, Result};
use crate::graph;
use crate::sql::SqlObject;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    #[default]
    Immediate,
    Deferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepMode {
    #[default]
    Sync,
    Async,
}

/// How the target is reconciled: `Full` upserts and deletes orphans,
/// `Upsert` never deletes (append-friendly denormalization), `Insert`
/// appends without conflict handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Full,
    Upsert,
    Insert,
}

/// A watched column: either a plain name or a name with a value expression
/// projected out of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Name(String),
    Valued {
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Valued { name, .. } => name,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Name(_) => None,
            Self::Valued { value, .. } => value.as_deref(),
        }
    }
}

/// A key column, optionally carrying its SQL type (required for per-key
/// refresh functions, whose parameters need declared types).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeyColumn {
    Name(String),
    Typed {
        name: String,
        #[serde(default, rename = "type")]
        sql_type: Option<String>,
    },
}

impl KeyColumn {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Typed { name, .. } => name,
        }
    }

    pub fn sql_type(&self) -> Option<&str> {
        match self {
            Self::Name(_) => None,
            Self::Typed { sql_type, .. } => sql_type.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTable {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<ColumnSpec>>,
    #[serde(default)]
    pub key: Option<Vec<KeyColumn>>,
    /// Expressions projecting a change row to target key values; marks the
    /// chain frontier.
    #[serde(default)]
    pub target_key: Option<Vec<String>>,
    #[serde(default)]
    pub dep: Option<String>,
    #[serde(default)]
    pub dep_join: Option<String>,
    #[serde(default)]
    pub dep_mode: DepMode,
    #[serde(default)]
    pub lock_id: Option<i16>,
    #[serde(default)]
    pub refresh_function: bool,
}

impl JoinTable {
    pub fn sql(&self) -> SqlObject {
        SqlObject::new(self.schema.as_deref(), &self.name)
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.key
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(KeyColumn::name)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTarget {
    /// Absent for a plain-query target: the formatted query is the whole
    /// refresh.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub key: Option<Vec<String>>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl JoinTarget {
    pub fn sql(&self) -> Option<SqlObject> {
        self.name
            .as_deref()
            .map(|name| SqlObject::new(self.schema.as_deref(), name))
    }

    pub fn kind(&self) -> TargetKind {
        match (&self.name, &self.key) {
            (None, _) => TargetKind::PlainQuery,
            (Some(_), Some(key)) if !key.is_empty() => TargetKind::TableWithKey,
            (Some(_), _) => TargetKind::TableKeyless,
        }
    }
}

/// The closed set of target shapes; rendering differs only at the
/// join-resolution step, which matches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    PlainQuery,
    TableWithKey,
    TableKeyless,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    pub id: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub consistency: Consistency,
    #[serde(default)]
    pub sync: SyncMode,
    /// User join query. `${key}` (or `$1`) names the key-source relation,
    /// `${table}` (or `$2`) the changed table's id.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub hooks: Hooks,
    pub tables: BTreeMap<String, JoinTable>,
    pub target: JoinTarget,
}

impl JoinConfig {
    pub fn table(&self, table_id: &str, referenced_by: &str) -> Result<&JoinTable> {
        self.tables.get(table_id).ok_or_else(|| {
            GenerateError::UnresolvedReference {
                table: referenced_by.to_string(),
                dep: table_id.to_string(),
            }
            .into()
        })
    }
}

pub(super) fn validate(config: &JoinConfig) -> Result<()> {
    validate_target(config)?;

    // One closure pass over the whole map surfaces unresolved references
    // and cycles before any per-table generation starts.
    let starts = config.tables.keys().cloned().collect::<Vec<_>>();
    graph::closure(&starts, |table_id| {
        let table = &config.tables[table_id];
        match &table.dep {
            Some(dep) if !config.tables.contains_key(dep) => {
                Err(GenerateError::UnresolvedReference {
                    table: table_id.to_string(),
                    dep: dep.clone(),
                })
            }
            Some(dep) => Ok(vec![dep.clone()]),
            None => Ok(Vec::new()),
        }
    })?;

    for (table_id, table) in &config.tables {
        validate_table(config, table_id, table)?;
    }

    Ok(())
}

fn validate_target(config: &JoinConfig) -> Result<()> {
    let kind = config.target.kind();

    match kind {
        TargetKind::PlainQuery => {
            if config.query.is_none() {
                return Err(ConfigError::PlainTargetWithoutQuery.into());
            }
        }
        TargetKind::TableKeyless => {
            if config.sync != SyncMode::Insert {
                return Err(ConfigError::KeylessTargetRequiresInsert {
                    target: config.target.name.clone().unwrap_or_default(),
                }
                .into());
            }
            if config.target.columns.is_none() {
                return Err(ConfigError::KeylessTargetWithoutColumns.into());
            }
        }
        TargetKind::TableWithKey => {
            if config.query.is_some() {
                let columns = config
                    .target
                    .columns
                    .as_ref()
                    .ok_or(ConfigError::QueryWithoutColumns)?;
                let key = config.target.key.as_deref().unwrap_or_default();
                for column in key {
                    if !columns.contains(column) {
                        return Err(ConfigError::ColumnsMissingKey {
                            column: column.clone(),
                        }
                        .into());
                    }
                }
            }
        }
    }

    if config.consistency == Consistency::Deferred {
        if config.query.is_none() {
            return Err(ConfigError::DeferredWithoutQuery.into());
        }
        if kind != TargetKind::TableWithKey {
            return Err(ConfigError::DeferredWithoutKeyedTarget.into());
        }
    }

    Ok(())
}

fn validate_table(config: &JoinConfig, table_id: &str, table: &JoinTable) -> Result<()> {
    if table.dep.is_some() && table.dep_join.is_none() && table.target_key.is_none() {
        return Err(ConfigError::MissingDepJoin {
            table: table_id.to_string(),
        }
        .into());
    }

    if table.dep_mode == DepMode::Async {
        if table.key.as_ref().is_none_or(Vec::is_empty) {
            return Err(ConfigError::AsyncWithoutKey {
                table: table_id.to_string(),
            }
            .into());
        }
        let Some(dep) = &table.dep else {
            return Err(ConfigError::AsyncWithoutDep {
                table: table_id.to_string(),
            }
            .into());
        };
        let foreign = config.table(dep, table_id)?;
        if foreign.key.as_ref().is_none_or(Vec::is_empty) {
            return Err(ConfigError::AsyncForeignWithoutKey {
                table: table_id.to_string(),
                foreign: dep.clone(),
            }
            .into());
        }

        // The remainder of the chain must be synchronous: one queue hop.
        let continuation = chain_from(config, dep)?;
        for continued_id in &continuation {
            let continued = &config.tables[continued_id];
            if continued.dep_mode == DepMode::Async {
                return Err(ConfigError::NestedAsync {
                    table: continued_id.clone(),
                    via: table_id.to_string(),
                }
                .into());
            }
        }
        ensure_frontier(config, table_id, &continuation)?;
    } else {
        let chain = chain_from(config, table_id)?;
        ensure_frontier(config, table_id, &chain)?;
    }

    if table.refresh_function {
        let key = table.key.as_deref().unwrap_or_default();
        if key.is_empty() {
            return Err(ConfigError::RefreshFunctionWithoutKey {
                table: table_id.to_string(),
            }
            .into());
        }
        for column in key {
            if column.sql_type().is_none() {
                return Err(ConfigError::UntypedRefreshKey {
                    table: table_id.to_string(),
                    column: column.name().to_string(),
                }
                .into());
            }
        }
    }

    Ok(())
}

/// The dependency chain starting at `table_id`, stopping at a target-key
/// frontier or an asynchronous boundary.
pub(crate) fn chain_from(config: &JoinConfig, table_id: &str) -> Result<Vec<String>> {
    let chain = graph::resolve(table_id, |current| {
        let table = config
            .tables
            .get(current)
            .ok_or_else(|| GenerateError::UnresolvedReference {
                table: table_id.to_string(),
                dep: current.to_string(),
            })?;
        if table.target_key.is_some() || table.dep_mode == DepMode::Async {
            return Ok(None);
        }
        Ok(table.dep.clone())
    })?;
    Ok(chain)
}

fn ensure_frontier(config: &JoinConfig, table_id: &str, chain: &[String]) -> Result<()> {
    let terminal_id = chain.last().expect("a chain contains its start");
    let terminal = &config.tables[terminal_id];
    if terminal.target_key.is_none() && terminal.dep_mode != DepMode::Async {
        return Err(ConfigError::NoChainFrontier {
            table: table_id.to_string(),
            terminal: terminal_id.clone(),
        }
        .into());
    }
    Ok(())
}
