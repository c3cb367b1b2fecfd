//! `CREATE TABLE` statement builders.
//!
//! Every vertex and edge table shares the same system columns around the
//! user-defined ones: a storage-local serial key, the graph-wide `uuid`, the
//! two adjacency documents, `version` and the millisecond timestamps.

/// Build a create-table-if-absent statement for `table` with the given
/// ordered `"columnName TYPE"` declarations between the system columns.
///
/// Declarations are trusted DDL input; only the leading column name is
/// validated by the caller.
pub fn create_table_statement(table: &str, columns: &[&str]) -> String {
    let mut user_columns = String::new();
    for declaration in columns {
        user_columns.push_str("    ");
        user_columns.push_str(declaration);
        user_columns.push_str(",\n");
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n\
         \x20   id BIGSERIAL PRIMARY KEY,\n\
         \x20   uuid TEXT NOT NULL,\n\
         {user_columns}\
         \x20   in_e JSONB NOT NULL DEFAULT '{{}}'::jsonb,\n\
         \x20   out_e JSONB NOT NULL DEFAULT '{{}}'::jsonb,\n\
         \x20   version BIGINT NOT NULL,\n\
         \x20   created_at BIGINT NOT NULL,\n\
         \x20   updated_at BIGINT NOT NULL\n\
         )"
    )
}

/// The composite table name for an edge between two vertex labels.
pub fn edge_table_name(from_label: &str, edge_name: &str, to_label: &str) -> String {
    format!("{from_label}__{edge_name}__{to_label}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_columns_present() {
        let sql = create_table_statement("god", &["name TEXT", "age BIGINT"]);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS god ("));
        for column in [
            "id BIGSERIAL PRIMARY KEY",
            "uuid TEXT NOT NULL",
            "name TEXT",
            "age BIGINT",
            "in_e JSONB NOT NULL DEFAULT '{}'::jsonb",
            "out_e JSONB NOT NULL DEFAULT '{}'::jsonb",
            "version BIGINT NOT NULL",
            "created_at BIGINT NOT NULL",
            "updated_at BIGINT NOT NULL",
        ] {
            assert!(sql.contains(column), "missing column: {column}");
        }
    }

    #[test]
    fn test_no_user_columns() {
        let sql = create_table_statement("location", &[]);
        assert!(sql.contains("uuid TEXT NOT NULL,\n    in_e JSONB"));
    }

    #[test]
    fn test_edge_table_name() {
        assert_eq!(
            edge_table_name("god", "lives", "location"),
            "god__lives__location"
        );
    }
}
