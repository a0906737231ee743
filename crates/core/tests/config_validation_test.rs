use pgripple_core::{ConfigError, Error, GenerateError, load_agg, load_join, load_key};

fn join_error(input: &str) -> Error {
    load_join(input).expect_err("configuration should be rejected")
}

#[test]
fn valid_join_config_parses_from_yaml_and_json() {
    let yaml = r#"
id: app
tables:
  child:
    name: child
    targetKey: [child.id]
  parent:
    name: parent
    dep: child
    depJoin: parent.id = child.parent_id
target:
  name: child_full
  key: [id]
  columns: [id, parent_name]
query: SELECT d.id, p.name FROM ${key} AS d JOIN parent AS p ON true
"#;
    let json = r#"{
  "id": "app",
  "tables": {
    "child": {"name": "child", "targetKey": ["child.id"]},
    "parent": {"name": "parent", "dep": "child", "depJoin": "parent.id = child.parent_id"}
  },
  "target": {"name": "child_full", "key": ["id"], "columns": ["id", "parent_name"]},
  "query": "SELECT d.id, p.name FROM ${key} AS d JOIN parent AS p ON true"
}"#;

    let from_yaml = load_join(yaml).expect("yaml should parse");
    let from_json = load_join(json).expect("json should parse");
    assert_eq!(from_yaml, from_json);
}

#[test]
fn unparseable_documents_fail_with_parse_error() {
    assert!(matches!(join_error("{{{"), Error::Parse(_)));
}

#[test]
fn deferred_requires_a_query() {
    let error = join_error(
        r#"
id: app
consistency: deferred
tables:
  child: {name: child, targetKey: [child.id]}
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::DeferredWithoutQuery),
    ));
}

#[test]
fn deferred_requires_a_keyed_table_target() {
    let error = join_error(
        r#"
id: app
consistency: deferred
query: SELECT * FROM ${key}
tables:
  child: {name: child, targetKey: [child.id]}
target: {}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::DeferredWithoutKeyedTarget),
    ));
}

#[test]
fn query_against_table_target_requires_columns() {
    let error = join_error(
        r#"
id: app
query: SELECT * FROM ${key}
tables:
  child: {name: child, targetKey: [child.id]}
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::QueryWithoutColumns),
    ));
}

#[test]
fn target_columns_must_cover_the_key() {
    let error = join_error(
        r#"
id: app
query: SELECT * FROM ${key}
tables:
  child: {name: child, targetKey: [child.id]}
target: {name: t, key: [id], columns: [parent_name]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::ColumnsMissingKey { column }) if column == "id",
    ));
}

#[test]
fn plain_target_requires_a_query() {
    let error = join_error(
        r#"
id: app
tables:
  child: {name: child, targetKey: [child.id]}
target: {}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::PlainTargetWithoutQuery),
    ));
}

#[test]
fn keyless_target_requires_insert_mode_and_columns() {
    let error = join_error(
        r#"
id: app
query: SELECT * FROM ${key}
tables:
  child: {name: child, targetKey: [child.id]}
target: {name: t, columns: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::KeylessTargetRequiresInsert { target }) if target == "t",
    ));

    let error = join_error(
        r#"
id: app
sync: insert
query: SELECT * FROM ${key}
tables:
  child: {name: child, targetKey: [child.id]}
target: {name: t}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::KeylessTargetWithoutColumns),
    ));
}

#[test]
fn unknown_dependency_is_an_unresolved_reference() {
    let error = join_error(
        r#"
id: app
tables:
  parent:
    name: parent
    dep: missing
    depJoin: parent.id = missing.id
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Generate(GenerateError::UnresolvedReference { table, dep })
            if table == "parent" && dep == "missing",
    ));
}

#[test]
fn dependency_cycles_are_fatal() {
    let error = join_error(
        r#"
id: app
tables:
  a:
    name: a
    dep: b
    depJoin: a.id = b.id
  b:
    name: b
    dep: a
    depJoin: b.id = a.id
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Generate(GenerateError::CycleDetected { path }) if path.len() == 2,
    ));
}

#[test]
fn intermediate_tables_need_a_join_predicate() {
    let error = join_error(
        r#"
id: app
tables:
  child: {name: child, targetKey: [child.id]}
  parent:
    name: parent
    dep: child
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::MissingDepJoin { table }) if table == "parent",
    ));
}

#[test]
fn chains_must_end_at_a_frontier() {
    let error = join_error(
        r#"
id: app
tables:
  child: {name: child}
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::NoChainFrontier { table, terminal })
            if table == "child" && terminal == "child",
    ));
}

#[test]
fn async_tables_declare_key_dep_and_foreign_key() {
    let error = join_error(
        r#"
id: app
tables:
  child: {name: child, key: [id], targetKey: [child.id]}
  parent:
    name: parent
    dep: child
    depJoin: parent.id = child.parent_id
    depMode: async
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::AsyncWithoutKey { table }) if table == "parent",
    ));

    let error = join_error(
        r#"
id: app
tables:
  parent:
    name: parent
    key: [id]
    depMode: async
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::AsyncWithoutDep { table }) if table == "parent",
    ));

    let error = join_error(
        r#"
id: app
tables:
  child: {name: child, targetKey: [child.id]}
  parent:
    name: parent
    key: [id]
    dep: child
    depJoin: parent.id = child.parent_id
    depMode: async
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::AsyncForeignWithoutKey { table, foreign })
            if table == "parent" && foreign == "child",
    ));
}

#[test]
fn a_chain_supports_one_queue_hop() {
    let error = join_error(
        r#"
id: app
tables:
  child: {name: child, key: [id], targetKey: [child.id]}
  parent:
    name: parent
    key: [id]
    dep: child
    depJoin: parent.id = child.parent_id
    depMode: async
  grandparent:
    name: grandparent
    key: [id]
    dep: parent
    depJoin: grandparent.id = parent.grandparent_id
    depMode: async
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::NestedAsync { table, via })
            if table == "parent" && via == "grandparent",
    ));
}

#[test]
fn refresh_functions_need_typed_keys() {
    let error = join_error(
        r#"
id: app
tables:
  child:
    name: child
    targetKey: [child.id]
    refreshFunction: true
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::RefreshFunctionWithoutKey { table }) if table == "child",
    ));

    let error = join_error(
        r#"
id: app
tables:
  child:
    name: child
    key: [id]
    targetKey: [child.id]
    refreshFunction: true
target: {name: t, key: [id]}
"#,
    );
    assert!(matches!(
        error,
        Error::Config(ConfigError::UntypedRefreshKey { table, column })
            if table == "child" && column == "id",
    ));
}

#[test]
fn sharding_excludes_deferred_and_requires_combine_expressions() {
    let error = load_agg(
        r#"
id: stat
consistency: deferred
source: {name: child}
target: {name: stat}
groups: {parent_id: parent_id}
aggregates:
  child_count: {value: sum(sign)}
shard: {child_count: sum(child_count)}
"#,
    )
    .expect_err("configuration should be rejected");
    assert!(matches!(error, Error::Config(ConfigError::ShardWithDeferred)));

    let error = load_agg(
        r#"
id: stat
source: {name: child}
target: {name: stat}
groups: {parent_id: parent_id}
aggregates:
  child_count: {value: sum(sign)}
shard: {}
"#,
    )
    .expect_err("configuration should be rejected");
    assert!(matches!(
        error,
        Error::Config(ConfigError::ShardMissingAggregate { column }) if column == "child_count",
    ));
}

#[test]
fn key_chains_validate_references_and_frontiers() {
    let error = load_key(
        r#"
id: app
tables:
  - id: parent
    name: parent
    dep: missing
    join: parent.id = missing.id
target: {name: t, key: [id]}
"#,
    )
    .expect_err("configuration should be rejected");
    assert!(matches!(
        error,
        Error::Generate(GenerateError::UnresolvedReference { .. }),
    ));

    let error = load_key(
        r#"
id: app
tables:
  - id: child
    name: child
    join: child.id = child.id
target: {name: t, key: [id]}
"#,
    )
    .expect_err("configuration should be rejected");
    assert!(matches!(
        error,
        Error::Config(ConfigError::NoChainFrontier { .. }),
    ));
}
