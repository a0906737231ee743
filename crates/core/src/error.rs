use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for one generation pass. The CLI maps each variant to an
/// error category; nothing is written to the output sink once any of these
/// has been raised.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl From<TemplateError> for Error {
    fn from(value: TemplateError) -> Self {
        Self::Generate(GenerateError::Template(value))
    }
}

/// The configuration document could not be deserialized at all.
#[derive(Debug, Error)]
#[error("invalid configuration document: {source}")]
pub struct ParseError {
    #[from]
    source: serde_yaml::Error,
}

/// The document deserialized but violates a cross-field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("deferred consistency requires a query")]
    DeferredWithoutQuery,
    #[error("deferred consistency requires a table target with a key")]
    DeferredWithoutKeyedTarget,
    #[error("a query against a table target requires an explicit target column list")]
    QueryWithoutColumns,
    #[error("a plain target requires a query")]
    PlainTargetWithoutQuery,
    #[error("target `{target}` has no key; only `sync: insert` can populate it")]
    KeylessTargetRequiresInsert { target: String },
    #[error("a keyless target requires an explicit column list")]
    KeylessTargetWithoutColumns,
    #[error("target column list does not include key column `{column}`")]
    ColumnsMissingKey { column: String },
    #[error("table `{table}` has a dependency but no `depJoin` predicate")]
    MissingDepJoin { table: String },
    #[error("the dependency chain of `{table}` ends at `{terminal}`, which has no target key projection")]
    NoChainFrontier { table: String, terminal: String },
    #[error("asynchronous table `{table}` declares no key columns")]
    AsyncWithoutKey { table: String },
    #[error("asynchronous table `{table}` has no dependency to iterate over")]
    AsyncWithoutDep { table: String },
    #[error("foreign table `{foreign}` of asynchronous table `{table}` declares no key columns")]
    AsyncForeignWithoutKey { table: String, foreign: String },
    #[error("table `{table}` resolves through asynchronous table `{via}`; a chain supports a single queue hop")]
    NestedAsync { table: String, via: String },
    #[error("table `{table}` enables a refresh function but declares no key columns")]
    RefreshFunctionWithoutKey { table: String },
    #[error("table `{table}` enables a refresh function but key column `{column}` has no declared type")]
    UntypedRefreshKey { table: String, column: String },
    #[error("sharding cannot be combined with deferred consistency")]
    ShardWithDeferred,
    #[error("sharding is enabled but aggregate `{column}` has no shard combine expression")]
    ShardMissingAggregate { column: String },
}

/// Generation-time failures: dependency-graph defects and bad user SQL
/// fragments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("dependency cycle: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
    #[error("table `{table}` references unknown dependency `{dep}`")]
    UnresolvedReference { table: String, dep: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// A user-supplied SQL fragment failed substitution. Undefined placeholders
/// are a hard error, never an empty expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("undefined placeholder `{0}`")]
    UndefinedPlaceholder(String),
    #[error("malformed placeholder at byte {position}")]
    MalformedTemplate { position: usize },
}
