//! Column type normalization.
//!
//! Schema definitions may carry raw SQL type names (`VARCHAR(255)`,
//! `timestamptz`, `int4[]`) or already-semantic names (`uuid`, `text`).
//! The diagram only shows the semantic family.

/// Map a declared column type to its semantic type name.
pub fn semantic_type(declared: &str) -> String {
    let lower = declared.trim().to_lowercase();
    if lower.is_empty() {
        return "unknown".to_string();
    }

    if let Some(inner) = lower.strip_suffix("[]") {
        return format!("{}[]", semantic_type(inner));
    }

    let base = lower.split('(').next().unwrap_or(&lower).trim();

    match base {
        // Integer types
        "int" | "int4" | "integer" | "serial" | "serial4" | "mediumint" => "int".to_string(),
        "bigint" | "int8" | "bigserial" | "serial8" => "bigint".to_string(),
        "smallint" | "int2" | "smallserial" | "serial2" => "smallint".to_string(),
        "tinyint" => {
            // TINYINT(1) is the usual boolean spelling
            if lower.starts_with("tinyint(1)") {
                "boolean".to_string()
            } else {
                "tinyint".to_string()
            }
        }

        // Floating point
        "real" | "float" | "float4" => "float".to_string(),
        "double" | "double precision" | "float8" => "double".to_string(),
        "decimal" | "numeric" | "money" => "decimal".to_string(),

        // String types
        "varchar" | "character varying" | "nvarchar" => "varchar".to_string(),
        "char" | "character" | "bpchar" | "nchar" => "char".to_string(),
        "text" | "longtext" | "mediumtext" | "tinytext" | "citext" => "text".to_string(),

        // Date/time
        "timestamp" | "timestamptz" | "timestamp with time zone"
        | "timestamp without time zone" | "datetime" => "timestamp".to_string(),
        "date" => "date".to_string(),
        "time" | "timetz" => "time".to_string(),
        "interval" => "interval".to_string(),

        "boolean" | "bool" => "boolean".to_string(),

        // Binary
        "bytea" | "blob" | "longblob" | "mediumblob" | "tinyblob" => "blob".to_string(),
        "binary" | "varbinary" => "binary".to_string(),

        "uuid" => "uuid".to_string(),
        "json" | "jsonb" => "json".to_string(),
        "enum" | "set" => "enum".to_string(),

        _ => base.to_string(),
    }
}
