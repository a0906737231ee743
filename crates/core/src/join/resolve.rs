use crate::config::{DepMode, JoinConfig, JoinTable};
use crate::config::join_chain_from;
use crate::error::Result;
use crate::sql::{SqlId, sql_list, table_fields};

/// Where a dependency chain ends: at a synchronous target-key frontier, or
/// at an asynchronous boundary whose keys are queued instead of joined.
pub(crate) enum Terminal<'r, 'a> {
    Sync,
    Async {
        table_id: &'r str,
        table: &'a JoinTable,
    },
}

/// A resolved dependency chain for one watched table, able to render the
/// key-propagation query for any change-set root relation.
pub(crate) struct KeyResolver<'a> {
    target_key: Option<Vec<SqlId>>,
    chain: Vec<(String, &'a JoinTable)>,
}

impl<'a> KeyResolver<'a> {
    pub(crate) fn new(config: &'a JoinConfig, table_id: &str) -> Result<Self> {
        let chain = join_chain_from(config, table_id)?
            .into_iter()
            .map(|id| {
                let table = &config.tables[id.as_str()];
                (id, table)
            })
            .collect();

        Ok(Self {
            target_key: config
                .target
                .key
                .as_ref()
                .map(|key| key.iter().map(SqlId::new).collect()),
            chain,
        })
    }

    pub(crate) fn terminal(&self) -> Terminal<'_, 'a> {
        let (table_id, table) = self.chain.last().expect("a chain contains its start");
        if table.dep_mode == DepMode::Async {
            Terminal::Async {
                table_id: table_id.as_str(),
                table: *table,
            }
        } else {
            Terminal::Sync
        }
    }

    /// Render the key query: the frontier's projection first, then one join
    /// hop per intermediate table, with `root` standing in for the changed
    /// table's relation.
    pub(crate) fn key_query(&self, root: &str) -> String {
        let mut query = String::new();
        let last = self.chain.len() - 1;

        for (position, (table_id, table)) in self.chain.iter().rev().enumerate() {
            let relation = if position == last {
                root.to_string()
            } else {
                table.sql().to_string()
            };
            let alias = SqlId::new(table_id.as_str());

            if let Some(target_key) = &table.target_key {
                let projection = match &self.target_key {
                    Some(names) => sql_list(
                        target_key
                            .iter()
                            .zip(names)
                            .map(|(expr, name)| format!("{expr} AS {name}")),
                    ),
                    None => sql_list(target_key),
                };
                query.push_str(&format!(
                    "SELECT DISTINCT {projection}\nFROM\n  {relation} AS {alias}",
                ));
            } else if table.dep_mode == DepMode::Async {
                let key = table
                    .key_names()
                    .into_iter()
                    .map(SqlId::new)
                    .collect::<Vec<_>>();
                query.push_str(&format!(
                    "SELECT DISTINCT {}\nFROM\n  {relation} AS {alias}",
                    table_fields(&alias, &key),
                ));
            } else {
                query.push_str(&format!(
                    "\n  JOIN {relation} AS {alias} ON {}",
                    table.dep_join.as_deref().unwrap_or_default(),
                ));
            }
        }

        query
    }
}
