//! Catalog introspection SQL.
//!
//! The introspection tools do not get a side door: their SQL is built here
//! and then submitted through the gateway facade like any user query, so
//! the schema allow-list and audit trail apply to them as well. Every
//! statement built here is a plain SELECT, including the SQLite variants
//! (`pragma_table_info` is used as a table-valued function because a bare
//! PRAGMA would not classify as a read).

use crate::config::DriverKind;

/// Escape a value for inclusion as a single-quoted SQL literal.
fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// SQL listing the available schemas.
pub fn list_schemas_sql(driver: DriverKind) -> String {
    match driver {
        DriverKind::Postgres | DriverKind::Mysql => {
            "SELECT schema_name FROM information_schema.schemata ORDER BY schema_name".to_string()
        }
        DriverKind::Sqlite => {
            "SELECT name AS schema_name FROM pragma_database_list() ORDER BY name".to_string()
        }
    }
}

/// SQL listing tables and views of a schema.
///
/// With no schema, PostgreSQL falls back to `public` and MySQL to the
/// connected database. SQLite has a single namespace and ignores the schema.
pub fn list_tables_sql(driver: DriverKind, schema: Option<&str>) -> String {
    match driver {
        DriverKind::Postgres => {
            let schema = quote_literal(schema.unwrap_or("public"));
            format!(
                "SELECT table_name, table_type FROM information_schema.tables \
                 WHERE table_schema = '{}' ORDER BY table_name",
                schema
            )
        }
        DriverKind::Mysql => match schema {
            Some(s) => format!(
                "SELECT table_name, table_type FROM information_schema.tables \
                 WHERE table_schema = '{}' ORDER BY table_name",
                quote_literal(s)
            ),
            None => "SELECT table_name, table_type FROM information_schema.tables \
                     WHERE table_schema = DATABASE() ORDER BY table_name"
                .to_string(),
        },
        DriverKind::Sqlite => {
            "SELECT name AS table_name, type AS table_type FROM sqlite_master \
             WHERE type IN ('table', 'view') ORDER BY name"
                .to_string()
        }
    }
}

/// SQL describing the columns of a table.
pub fn describe_table_sql(driver: DriverKind, table: &str, schema: Option<&str>) -> String {
    match driver {
        DriverKind::Postgres => {
            let schema = quote_literal(schema.unwrap_or("public"));
            format!(
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = '{}' AND table_name = '{}' \
                 ORDER BY ordinal_position",
                schema,
                quote_literal(table)
            )
        }
        DriverKind::Mysql => {
            let schema_filter = match schema {
                Some(s) => format!("table_schema = '{}'", quote_literal(s)),
                None => "table_schema = DATABASE()".to_string(),
            };
            format!(
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE {} AND table_name = '{}' \
                 ORDER BY ordinal_position",
                schema_filter,
                quote_literal(table)
            )
        }
        DriverKind::Sqlite => format!(
            "SELECT name AS column_name, type AS data_type, \
             CASE WHEN \"notnull\" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable, \
             dflt_value AS column_default \
             FROM pragma_table_info('{}') ORDER BY cid",
            quote_literal(table)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::classifier::{StatementClass, classify};

    #[test]
    fn test_all_catalog_sql_classifies_as_read() {
        for driver in [DriverKind::Postgres, DriverKind::Mysql, DriverKind::Sqlite] {
            assert_eq!(classify(&list_schemas_sql(driver)), StatementClass::Read);
            assert_eq!(
                classify(&list_tables_sql(driver, Some("SALES"))),
                StatementClass::Read
            );
            assert_eq!(
                classify(&describe_table_sql(driver, "orders", None)),
                StatementClass::Read
            );
        }
    }

    #[test]
    fn test_list_tables_postgres_defaults_to_public() {
        let sql = list_tables_sql(DriverKind::Postgres, None);
        assert!(sql.contains("table_schema = 'public'"));
    }

    #[test]
    fn test_list_tables_mysql_defaults_to_current_database() {
        let sql = list_tables_sql(DriverKind::Mysql, None);
        assert!(sql.contains("DATABASE()"));
    }

    #[test]
    fn test_quoting_blocks_literal_escape() {
        let sql = describe_table_sql(DriverKind::Postgres, "t'; DROP TABLE x; --", None);
        // The single quote is doubled, so the injection stays inside the literal
        assert!(sql.contains("t''; DROP TABLE x; --"));
        assert_eq!(classify(&sql), StatementClass::Read);
    }

    #[test]
    fn test_sqlite_describe_uses_table_valued_pragma() {
        let sql = describe_table_sql(DriverKind::Sqlite, "users", None);
        assert!(sql.contains("pragma_table_info('users')"));
        assert!(sql.starts_with("SELECT"));
    }
}
