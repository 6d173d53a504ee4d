//! SQL text helpers
//!
//! Every statement the pipeline sends to the engine is composed from these
//! pieces, so quoting rules live in exactly one place.

/// Quote a string as a SQL literal, doubling embedded single quotes
pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote an identifier, doubling embedded double quotes
pub fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Join a base location and a relative glob pattern with exactly one `/`
///
/// Examples:
/// - `s3://bucket/song-data/` + `*/*/*/*.json` → `s3://bucket/song-data/*/*/*/*.json`
/// - `/data/logs` + `*/*/*events.json` → `/data/logs/*/*/*events.json`
pub fn join_path(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Comma-separated list of quoted identifiers
pub fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Table function reading every JSON file matched by a glob
///
/// Files may be single JSON documents or newline-delimited; columns are
/// unified by name across files so sparse fields do not shift positions.
pub fn read_json(glob: &str) -> String {
    format!(
        "read_json_auto({}, union_by_name = true)",
        literal(glob)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_literal_escapes_quotes() {
        assert_eq!(literal("plain"), "'plain'");
        assert_eq!(literal("it's"), "'it''s'");
    }

    #[test]
    fn test_ident_escapes_quotes() {
        assert_eq!(ident("userId"), "\"userId\"");
        assert_eq!(ident("a\"b"), "\"a\"\"b\"");
    }

    #[test_case("s3://bucket/song-data/", "*/*/*/*.json", "s3://bucket/song-data/*/*/*/*.json" ; "trailing slash")]
    #[test_case("s3://bucket/song-data", "*/*/*/*.json", "s3://bucket/song-data/*/*/*/*.json" ; "no trailing slash")]
    #[test_case("/data/logs//", "/*/*/*events.json", "/data/logs/*/*/*events.json" ; "extra slashes")]
    #[test_case("", "*.json", "*.json" ; "empty base")]
    fn test_join_path(base: &str, relative: &str, expected: &str) {
        assert_eq!(join_path(base, relative), expected);
    }

    #[test]
    fn test_column_list() {
        assert_eq!(
            column_list(&["song_id", "title"]),
            "\"song_id\", \"title\""
        );
    }

    #[test]
    fn test_read_json() {
        assert_eq!(
            read_json("/in/*.json"),
            "read_json_auto('/in/*.json', union_by_name = true)"
        );
    }
}
