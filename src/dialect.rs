use phf::phf_set;

use crate::error::SqlembedError;

/// BigQuery reserved keywords, plus the DML words the baseline formatter
/// lays out as clauses.
static BIGQUERY_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "ALL", "AND", "ANY", "ARRAY", "AS", "ASC", "ASSERT_ROWS_MODIFIED", "AT",
    "BETWEEN", "BY", "CASE", "CAST", "COLLATE", "CONTAINS", "CREATE", "CROSS",
    "CUBE", "CURRENT", "DEFAULT", "DEFINE", "DELETE", "DESC", "DISTINCT", "ELSE",
    "END", "ENUM", "ESCAPE", "EXCEPT", "EXCLUDE", "EXISTS", "EXTRACT", "FALSE",
    "FETCH", "FOLLOWING", "FOR", "FROM", "FULL", "GROUP", "GROUPING", "GROUPS",
    "HASH", "HAVING", "IF", "IGNORE", "IN", "INNER", "INSERT", "INTERSECT",
    "INTERVAL", "INTO", "IS", "JOIN", "LATERAL", "LEFT", "LIKE", "LIMIT",
    "LOOKUP", "MERGE", "NATURAL", "NEW", "NO", "NOT", "NULL", "NULLS", "OF",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "PRECEDING",
    "PROTO", "QUALIFY", "RANGE", "RECURSIVE", "RESPECT", "RIGHT", "ROLLUP",
    "ROWS", "SELECT", "SET", "SOME", "STRUCT", "TABLE", "TABLESAMPLE", "THEN",
    "TO", "TREAT", "TRUE", "UNBOUNDED", "UNION", "UNNEST", "UPDATE", "USING",
    "VALUES", "WHEN", "WHERE", "WINDOW", "WITH", "WITHIN",
};

static BIGQUERY_DATA_TYPES: phf::Set<&'static str> = phf_set! {
    "BIGNUMERIC", "BOOL", "BOOLEAN", "BYTES", "DATE", "DATETIME", "DECIMAL",
    "FLOAT64", "GEOGRAPHY", "INT64", "INTEGER", "INT", "JSON", "NUMERIC",
    "RANGE", "STRING", "TIME", "TIMESTAMP", "BIGDECIMAL", "SMALLINT", "BIGINT",
    "TINYINT", "BYTEINT",
};

static BIGQUERY_FUNCTIONS: phf::Set<&'static str> = phf_set! {
    "ABS", "ANY_VALUE", "APPROX_COUNT_DISTINCT", "ARRAY_AGG",
    "ARRAY_LENGTH", "ARRAY_TO_STRING", "AVG", "CEIL", "COALESCE", "CONCAT",
    "COUNT", "COUNTIF", "CURRENT_DATE", "CURRENT_DATETIME",
    "CURRENT_TIMESTAMP", "DATETIME_TRUNC", "DATE_ADD", "DATE_DIFF",
    "DATE_SUB", "DATE_TRUNC", "DENSE_RANK", "FARM_FINGERPRINT",
    "FIRST_VALUE", "FLOOR", "FORMAT", "FORMAT_DATE", "FORMAT_TIMESTAMP",
    "GENERATE_ARRAY", "GENERATE_DATE_ARRAY", "GREATEST", "IFNULL",
    "JSON_EXTRACT", "JSON_EXTRACT_SCALAR", "JSON_VALUE", "LAG",
    "LAST_VALUE", "LEAD", "LEAST", "LEFT", "LENGTH", "LOGICAL_AND",
    "LOGICAL_OR", "LOWER", "LPAD", "LTRIM", "MAX", "MIN", "MOD", "NTILE",
    "NULLIF", "OFFSET", "ORDINAL", "PARSE_DATE", "PARSE_TIMESTAMP",
    "PERCENTILE_CONT", "RANK", "REGEXP_CONTAINS", "REGEXP_EXTRACT",
    "REGEXP_REPLACE", "REPLACE", "RIGHT", "ROUND", "ROW_NUMBER", "RPAD",
    "RTRIM", "SAFE_CAST", "SAFE_DIVIDE", "SAFE_OFFSET", "SAFE_ORDINAL",
    "SPLIT", "STARTS_WITH", "STDDEV", "STRING_AGG", "SUBSTR", "SUM",
    "TIMESTAMP_ADD", "TIMESTAMP_DIFF", "TIMESTAMP_SUB", "TIMESTAMP_TRUNC",
    "TO_JSON_STRING", "TRIM", "TRUNC", "UPPER",
};

/// A SQL dialect defines the lexical rules of one SQL variant.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Delimiter of quoted identifiers.
    fn identifier_quote(&self) -> u8;

    /// Whether `#` starts a line comment.
    fn hash_comments(&self) -> bool {
        false
    }

    /// Reserved words. `upper` must already be uppercased.
    fn is_keyword(&self, upper: &str) -> bool;

    fn is_data_type(&self, upper: &str) -> bool;

    fn is_function(&self, upper: &str) -> bool;
}

/// GoogleSQL as spoken by BigQuery: backtick identifiers, `#` comments,
/// raw/bytes/triple-quoted strings.
pub struct BigQuery;

impl Dialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn identifier_quote(&self) -> u8 {
        b'`'
    }

    fn hash_comments(&self) -> bool {
        true
    }

    fn is_keyword(&self, upper: &str) -> bool {
        BIGQUERY_KEYWORDS.contains(upper)
    }

    fn is_data_type(&self, upper: &str) -> bool {
        BIGQUERY_DATA_TYPES.contains(upper)
    }

    fn is_function(&self, upper: &str) -> bool {
        BIGQUERY_FUNCTIONS.contains(upper)
    }
}

/// Create a dialect from a string name. Only the BigQuery family is supported.
pub fn dialect_from_name(name: &str) -> Result<Box<dyn Dialect>, SqlembedError> {
    match name.to_ascii_lowercase().as_str() {
        "bigquery" | "googlesql" => Ok(Box::new(BigQuery)),
        _ => Err(SqlembedError::Config(format!("Unknown dialect: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigquery_word_classes() {
        let dialect = BigQuery;
        assert!(dialect.is_keyword("SELECT"));
        assert!(!dialect.is_keyword("STATUS"));
        assert!(dialect.is_data_type("INT64"));
        assert!(dialect.is_function("COUNT"));
        assert_eq!(dialect.identifier_quote(), b'`');
        assert!(dialect.hash_comments());
    }

    #[test]
    fn test_dialect_from_name() {
        assert!(dialect_from_name("bigquery").is_ok());
        assert!(dialect_from_name("GoogleSQL").is_ok());
        assert!(dialect_from_name("duckdb").is_err());
    }
}
