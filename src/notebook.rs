use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, SqlembedError};

/// A notebook document held as loosely-typed JSON so that every field we do
/// not touch round-trips unchanged, in its original key order.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    root: Value,
    trailing_newline: bool,
}

/// Shape of a cell's `source` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceShape {
    Text,
    Lines,
}

impl Notebook {
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        if !root.get("cells").is_some_and(Value::is_array) {
            return Err(SqlembedError::Notebook(
                "document has no \"cells\" array".to_string(),
            ));
        }
        Ok(Self {
            root,
            trailing_newline: text.ends_with('\n'),
        })
    }

    fn cells_mut(&mut self) -> impl Iterator<Item = &mut Map<String, Value>> {
        self.root
            .get_mut("cells")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object_mut)
    }

    /// Number of code cells.
    pub fn code_cell_count(&self) -> usize {
        self.root
            .get("cells")
            .and_then(Value::as_array)
            .map_or(0, |cells| cells.iter().filter(|c| is_code_cell(c)).count())
    }

    /// Offer the joined source of every code cell to `rewrite`; a returned
    /// string replaces the cell source, keeping its string/array shape.
    /// Returns how many cells changed.
    pub fn rewrite_code_cells<F>(&mut self, mut rewrite: F) -> usize
    where
        F: FnMut(usize, &str) -> Option<String>,
    {
        let mut changed = 0;
        for (index, cell) in self.cells_mut().enumerate() {
            if cell.get("cell_type").and_then(Value::as_str) != Some("code") {
                continue;
            }
            let Some((shape, source)) = cell.get("source").and_then(read_source) else {
                continue;
            };
            let Some(updated) = rewrite(index, &source) else {
                continue;
            };
            if updated != source {
                cell.insert("source".to_string(), write_source(shape, &updated));
                changed += 1;
            }
        }
        changed
    }

    /// Serialize with one-space indentation, as notebook tools write it.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.root.serialize(&mut ser)?;
        let mut text =
            String::from_utf8(buf).map_err(|e| SqlembedError::Notebook(e.to_string()))?;
        if self.trailing_newline {
            text.push('\n');
        }
        Ok(text)
    }
}

fn is_code_cell(cell: &Value) -> bool {
    cell.get("cell_type").and_then(Value::as_str) == Some("code")
}

fn read_source(value: &Value) -> Option<(SourceShape, String)> {
    match value {
        Value::String(s) => Some((SourceShape::Text, s.clone())),
        Value::Array(lines) => {
            let mut joined = String::new();
            for line in lines {
                joined.push_str(line.as_str()?);
            }
            Some((SourceShape::Lines, joined))
        }
        _ => None,
    }
}

fn write_source(shape: SourceShape, source: &str) -> Value {
    match shape {
        SourceShape::Text => Value::String(source.to_string()),
        SourceShape::Lines => Value::Array(
            source
                .split_inclusive('\n')
                .map(|line| Value::String(line.to_string()))
                .collect(),
        ),
    }
}
