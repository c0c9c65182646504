use pretty_assertions::assert_eq;
use sqlembed::passes::{Pass, WherePass};
use sqlembed::{
    format_document, format_selection, format_string, normalize, DocumentKind, FormatConfig,
    KeywordCase, Mode, StructuralNormalizer,
};

fn default_mode() -> Mode {
    Mode::default()
}

fn lowercase_mode() -> Mode {
    let mut mode = Mode::default();
    mode.format.keyword_case = KeywordCase::Lower;
    mode
}

#[test]
fn test_format_select_one() {
    let result = format_string("SELECT 1\n", &default_mode()).unwrap();
    assert_eq!(result, "SELECT\n    1");
}

#[test]
fn test_format_uppercases_keywords() {
    let result = format_string("select a from t where x = 1\n", &default_mode()).unwrap();
    assert!(result.contains("SELECT"));
    assert!(result.contains("FROM"));
    assert!(result.contains("WHERE 1 = 1"));
}

#[test]
fn test_lowercase_keywords_inject_lowercase_and() {
    let result = format_string("SELECT a FROM t WHERE x = 1\n", &lowercase_mode()).unwrap();
    assert_eq!(result, "select\n    a\nfrom\n    t\nwhere 1 = 1\n    and x = 1");
}

#[test]
fn test_string_literals_untouched() {
    let result = format_string(
        "select 'a, b where c' as s, \"x -- y\" as t from u\n",
        &default_mode(),
    )
    .unwrap();
    assert!(result.contains("'a, b where c' AS s"));
    assert!(result.contains("\"x -- y\" AS t"));
}

#[test]
fn test_backtick_paths_collapsed() {
    let result = format_string("select * from `my-project . ds . t`", &default_mode()).unwrap();
    assert_eq!(result, "SELECT\n    *\nFROM\n    `my-project.ds.t`");
}

#[test]
fn test_subtraction_not_joined() {
    let result = format_string("select t.a - s.b from t", &default_mode()).unwrap();
    assert!(result.contains("t.a - s.b"));
}

#[test]
fn test_nested_cte_list() {
    let sql = "with a as (with b as (select 1 as x) select x from b) select x from a";
    let result = format_string(sql, &default_mode()).unwrap();
    assert!(result.starts_with("WITH a AS (\n    WITH b AS (\n"));
    assert!(result.ends_with(")\nSELECT\n    x\nFROM\n    a"));
}

#[test]
fn test_sibling_cte_after_nested_with_is_separated() {
    let sql = "with a as (with b as (select 1 as x) select x from b), c as (select 2) select x from a";
    let once = format_string(sql, &default_mode()).unwrap();
    assert!(once.contains("),\n\nc AS (\n"), "got:\n{}", once);
    assert_eq!(format_string(&once, &default_mode()).unwrap(), once);
}

#[test]
fn test_cte_closer_with_comment_is_separated() {
    let sql = "with a as (select 1), -- note\n b as (select 2) select * from b";
    let once = format_string(sql, &default_mode()).unwrap();
    assert!(once.contains("), -- note\n\nb AS (\n"), "got:\n{}", once);
    assert_eq!(format_string(&once, &default_mode()).unwrap(), once);
}

#[test]
fn test_case_as_first_where_condition_is_stable() {
    let sql = "select a from t where case when x then 1 else 0 end = 1 and b = 2";
    let once = format_string(sql, &default_mode()).unwrap();
    let lines: Vec<&str> = once.lines().collect();
    let opener = lines.iter().find(|l| l.trim_start().starts_with("AND CASE")).unwrap();
    let end = lines.iter().find(|l| l.trim_start().starts_with("END")).unwrap();
    let case_col = opener.find("CASE").unwrap();
    assert_eq!(end.len() - end.trim_start().len(), case_col);
    assert_eq!(format_string(&once, &default_mode()).unwrap(), once);
}

#[test]
fn test_where_comment_stays_on_header() {
    let sql = "select a from t where -- keep\n x = 1 and y = 2";
    let once = format_string(sql, &default_mode()).unwrap();
    assert!(
        once.ends_with("WHERE 1 = 1 -- keep\n    AND x = 1\n    AND y = 2"),
        "got:\n{}",
        once
    );
    assert_eq!(format_string(&once, &default_mode()).unwrap(), once);
}

#[test]
fn test_hyphenated_dataset_rejoined() {
    let result = format_string("select * from proj.my-ds.tbl", &default_mode()).unwrap();
    assert_eq!(result, "SELECT\n    *\nFROM\n    proj.my-ds.tbl");
}

#[test]
fn test_pipeline_is_idempotent() {
    let sql = "select a, case when b = 1 and c = 2 then 'x' when d then 'y' end as e \
               from p-q.r.s t left join u on t.id = u.id where f > 1 or g < 2";
    let once = format_string(sql, &default_mode()).unwrap();
    let twice = format_string(&once, &default_mode()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_tab_width_is_the_indent_unit() {
    let mut config = FormatConfig::default();
    config.tab_width = 2;
    let result = normalize("select a, b from t join u on t.x = u.x", &config).unwrap();
    assert_eq!(result, "SELECT\n  a\n  ,b\nFROM\n  t\nJOIN u ON t.x = u.x");
}

#[test]
fn test_normalizer_with_custom_passes() {
    let config = FormatConfig::default();
    let passes: Vec<Box<dyn Pass>> = vec![Box::new(WherePass)];
    let normalizer = StructuralNormalizer::with_passes(&config, passes);
    assert_eq!(
        normalizer.run("SELECT\n    a,\n    b\nWHERE\n    x = 1"),
        "SELECT\n    a,\n    b\nWHERE 1 = 1\n    AND x = 1"
    );
}

#[test]
fn test_dialect_error_surfaces() {
    let err = format_string("select `unterminated", &default_mode()).unwrap_err();
    assert!(err.is_dialect_error());
}

#[test]
fn test_python_document_with_several_spans() {
    let source = "A = \"\"\"--sql select 1\"\"\"\n# B = \"\"\"--sql select 2\"\"\"\nC = '''\n  --sql\n  select 3\n'''\n";
    let outcome = format_document(source, DocumentKind::Host, &default_mode()).unwrap();
    assert_eq!(outcome.spans, 2);
    assert_eq!(
        outcome.text,
        "A = \"\"\"--sql\nSELECT\n    1\"\"\"\n# B = \"\"\"--sql select 2\"\"\"\nC = '''--sql\nSELECT\n    3\n'''\n"
    );
}

#[test]
fn test_python_document_without_spans_unchanged() {
    let source = "print('select * from t')\n";
    let outcome = format_document(source, DocumentKind::Host, &default_mode()).unwrap();
    assert_eq!(outcome.spans, 0);
    assert_eq!(outcome.text, source);
}

const NOTEBOOK: &str = r#"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": [
    "q = \"\"\"--sql select 1\"\"\""
   ]
  },
  {
   "cell_type": "code",
   "execution_count": null,
   "metadata": {},
   "outputs": [],
   "source": [
    "q = \"\"\"--sql\n",
    "select a from t\n",
    "\"\"\""
   ]
  },
  {
   "cell_type": "code",
   "execution_count": null,
   "metadata": {},
   "outputs": [],
   "source": [
    "%%bigquery df\n",
    "select b from u"
   ]
  }
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}
"#;

#[test]
fn test_notebook_code_cells_formatted() {
    let outcome = format_document(NOTEBOOK, DocumentKind::Notebook, &default_mode()).unwrap();
    assert_eq!(outcome.spans, 2);
    assert!(outcome.failures.is_empty());

    let json: serde_json::Value = serde_json::from_str(&outcome.text).unwrap();
    let cells = json["cells"].as_array().unwrap();
    assert_eq!(cells[0]["source"][0], "q = \"\"\"--sql select 1\"\"\"");
    assert_eq!(
        cells[1]["source"],
        serde_json::json!([
            "q = \"\"\"--sql\n",
            "SELECT\n",
            "    a\n",
            "FROM\n",
            "    t\n",
            "\"\"\""
        ])
    );
    assert_eq!(
        cells[2]["source"],
        serde_json::json!(["%%bigquery df\n", "SELECT\n", "    b\n", "FROM\n", "    u"])
    );
    assert!(outcome.text.ends_with("}\n"));
}

#[test]
fn test_notebook_unchanged_is_byte_identical() {
    let formatted = format_document(NOTEBOOK, DocumentKind::Notebook, &default_mode())
        .unwrap()
        .text;
    let again = format_document(&formatted, DocumentKind::Notebook, &default_mode()).unwrap();
    assert_eq!(again.text, formatted);
}

#[test]
fn test_notebook_span_failure_reports_cell() {
    let nb = r#"{"cells": [{"cell_type": "code", "source": "q = \"\"\"--sql select (1\"\"\""}]}"#;
    let outcome = format_document(nb, DocumentKind::Notebook, &default_mode()).unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].to_string().starts_with("cell 0, line 1:"));
    assert_eq!(outcome.text, nb);
}

#[test]
fn test_invalid_notebook_is_an_error() {
    assert!(format_document("not json", DocumentKind::Notebook, &default_mode()).is_err());
}

#[test]
fn test_selection_round_trip() {
    let mode = default_mode();
    assert_eq!(
        format_selection("select a from t", &mode).unwrap().as_deref(),
        Some("SELECT\n    a\nFROM\n    t")
    );
    assert_eq!(format_selection("x = compute(1)", &mode).unwrap(), None);
}
