use crate::sql::{SqlId, SqlObject};

/// Deterministic names for every object generated by the join and key
/// modes. Each name is a pure function of `(schema, id, role, table_id)`,
/// so regenerating from the same configuration yields the same objects.
#[derive(Debug, Clone)]
pub struct Structure {
    schema: Option<String>,
    id: String,
}

impl Structure {
    pub fn new(schema: Option<&str>, id: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            id: id.to_string(),
        }
    }

    fn name(&self, role: &str) -> SqlId {
        SqlId::new(format!("{}__{role}", self.id))
    }

    fn object(&self, name: SqlId) -> SqlObject {
        SqlObject {
            schema: self.schema.as_deref().map(SqlId::new),
            name,
        }
    }

    pub fn change_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("chg__{table_id}")))
    }

    pub fn change_1_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("chg1__{table_id}")))
    }

    pub fn change_2_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("chg2__{table_id}")))
    }

    pub fn delete_trigger(&self, table_id: &str) -> SqlId {
        self.name(&format!("del__{table_id}"))
    }

    pub fn insert_trigger(&self, table_id: &str) -> SqlId {
        self.name(&format!("ins__{table_id}"))
    }

    pub fn update_trigger(&self, table_id: &str) -> SqlId {
        self.name(&format!("upd__{table_id}"))
    }

    pub fn update_old_trigger(&self, table_id: &str) -> SqlId {
        self.name(&format!("upd1__{table_id}"))
    }

    pub fn update_new_trigger(&self, table_id: &str) -> SqlId {
        self.name(&format!("upd2__{table_id}"))
    }

    pub fn lock_table(&self) -> SqlObject {
        self.object(self.name("lock"))
    }

    /// Per-transaction key staging table, session-temporary.
    pub fn key_table(&self) -> SqlObject {
        SqlObject {
            schema: Some(SqlId::new("pg_temp")),
            name: self.name("key"),
        }
    }

    /// Sentinel table whose insert fires the deferred constraint trigger.
    pub fn refresh_table(&self) -> SqlObject {
        SqlObject {
            schema: Some(SqlId::new("pg_temp")),
            name: self.name("refresh"),
        }
    }

    pub fn refresh_constraint(&self) -> SqlId {
        SqlId::new(self.id.clone())
    }

    pub fn refresh_function(&self) -> SqlObject {
        self.object(self.name("refresh"))
    }

    pub fn setup_function(&self) -> SqlObject {
        self.object(self.name("setup"))
    }

    pub fn refresh_table_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("rfs__{table_id}")))
    }

    pub fn queue_table(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("que__{table_id}")))
    }

    pub fn queue_begin_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("pcs1__{table_id}")))
    }

    pub fn queue_refresh_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("pcs2__{table_id}")))
    }

    pub fn queue_end_function(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("pcs3__{table_id}")))
    }

    pub fn queue_process_procedure(&self, table_id: &str) -> SqlObject {
        self.object(self.name(&format!("pcs__{table_id}")))
    }
}

/// Naming for the aggregate mode. One watched source per configuration, so
/// most roles carry no table id.
#[derive(Debug, Clone)]
pub struct AggStructure {
    schema: Option<String>,
    id: String,
}

impl AggStructure {
    pub fn new(schema: Option<&str>, id: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            id: id.to_string(),
        }
    }

    fn name(&self, role: &str) -> SqlId {
        SqlId::new(format!("{}__{role}", self.id))
    }

    fn object(&self, name: SqlId) -> SqlObject {
        SqlObject {
            schema: self.schema.as_deref().map(SqlId::new),
            name,
        }
    }

    pub fn change_1_function(&self) -> SqlObject {
        self.object(self.name("chg1"))
    }

    pub fn change_2_function(&self) -> SqlObject {
        self.object(self.name("chg2"))
    }

    pub fn insert_trigger(&self) -> SqlId {
        self.name("ins")
    }

    pub fn update_trigger(&self) -> SqlId {
        self.name("upd")
    }

    pub fn delete_trigger(&self) -> SqlId {
        self.name("del")
    }

    pub fn cleanup_function(&self) -> SqlObject {
        self.object(self.name("cleanup"))
    }

    pub fn cleanup_trigger(&self) -> SqlId {
        self.name("cleanup")
    }

    pub fn compress_function(&self) -> SqlObject {
        self.object(self.name("compress"))
    }

    pub fn refresh_constraint(&self) -> SqlId {
        SqlId::new(self.id.clone())
    }

    pub fn refresh_function(&self) -> SqlObject {
        self.object(self.name("refresh"))
    }

    pub fn refresh_table(&self) -> SqlObject {
        SqlObject {
            schema: Some(SqlId::new("pg_temp")),
            name: self.name("refresh"),
        }
    }

    pub fn setup_function(&self) -> SqlObject {
        self.object(self.name("setup"))
    }

    /// Per-transaction delta staging table, session-temporary.
    pub fn staging_table(&self) -> SqlObject {
        SqlObject {
            schema: Some(SqlId::new("pg_temp")),
            name: self.name("tmp"),
        }
    }
}
