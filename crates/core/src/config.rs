mod agg;
mod join;
mod key;

use serde::Deserialize;
use serde::de::DeserializeOwned;

pub use agg::{AggConfig, AggTable, Aggregate};
pub use join::{
    ColumnSpec, Consistency, DepMode, JoinConfig, JoinTable, JoinTarget, KeyColumn, SyncMode,
    TargetKind,
};
pub use key::{KeyConfig, KeyTable, KeyTarget};

pub(crate) use join::chain_from as join_chain_from;
pub(crate) use key::chain_from as key_chain_from;

use crate::error::{ParseError, Result};
use crate::sql::SqlObject;

/// A schema-qualified procedure reference used by hooks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
}

impl Hook {
    pub fn sql(&self) -> SqlObject {
        SqlObject::new(self.schema.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hooks {
    #[serde(default)]
    pub before: Option<Hook>,
}

/// Deserialize one configuration document. YAML is a superset of JSON, so a
/// single deserializer accepts both; unknown fields are ignored.
fn parse<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_yaml::from_str(input).map_err(|source| ParseError::from(source).into())
}

/// Parse and validate a join/denormalization configuration.
pub fn load_join(input: &str) -> Result<JoinConfig> {
    let config: JoinConfig = parse(input)?;
    join::validate(&config)?;
    Ok(config)
}

/// Parse and validate an aggregate configuration.
pub fn load_agg(input: &str) -> Result<AggConfig> {
    let config: AggConfig = parse(input)?;
    agg::validate(&config)?;
    Ok(config)
}

/// Parse and validate a key-propagation configuration.
pub fn load_key(input: &str) -> Result<KeyConfig> {
    let config: KeyConfig = parse(input)?;
    key::validate(&config)?;
    Ok(config)
}
