//! Declaration file parsing and rendering.
//!
//! JSON is rendered with a 4-space indent and carries the schema URL as a
//! `$schema` key. YAML is rendered with a 3-space indent and carries the schema
//! reference as a leading `yaml-language-server` comment. `serde_yaml` emits
//! with a fixed 2-space indent, so block structure is written here and only
//! scalars go through `serde_yaml`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::declaration::FileFormat;
use crate::schema::ORGFILE_SCHEMA_URL;

const JSON_INDENT: &[u8] = b"    ";
const YAML_INDENT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("file extension of {path} is not yml or json")]
    UnsupportedExtension { path: String },

    #[error("{path}: {reason}")]
    Shape { path: String, reason: String },

    #[error("rendered output is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Parse raw file contents into an order-preserving document.
pub fn parse(format: FileFormat, contents: &str) -> Result<Value, CodecError> {
    match format {
        FileFormat::Json => Ok(serde_json::from_str(contents)?),
        FileFormat::Yml => Ok(serde_yaml::from_str(contents)?),
    }
}

/// Comment line marking the schema of a YAML declaration.
pub fn yaml_schema_comment() -> String {
    format!("# yaml-language-server: $schema={}", ORGFILE_SCHEMA_URL)
}

/// Render a document for writing back to the repository, injecting the
/// schema reference when the document lacks one.
pub fn render(format: FileFormat, document: &Value) -> Result<String, CodecError> {
    match format {
        FileFormat::Json => render_json(document),
        FileFormat::Yml => {
            let body = render_yaml(document)?;
            let comment = yaml_schema_comment();
            if body.starts_with(&comment) {
                Ok(body)
            } else {
                Ok(format!("{}\n{}", comment, body))
            }
        }
    }
}

fn render_json(document: &Value) -> Result<String, CodecError> {
    let mut document = document.clone();
    if let Value::Object(map) = &mut document {
        if !map.contains_key("$schema") {
            map.insert(
                "$schema".to_string(),
                Value::String(ORGFILE_SCHEMA_URL.to_string()),
            );
        }
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(String::from_utf8(buf)?)
}

/// Block-style YAML with a 3-space indent.
pub fn render_yaml(document: &Value) -> Result<String, CodecError> {
    let mut out = String::new();
    match document {
        Value::Object(map) if !map.is_empty() => write_mapping(&mut out, map, 0)?,
        Value::Array(items) if !items.is_empty() => write_sequence(&mut out, items, 0)?,
        other => {
            out.push_str(&inline(other)?);
            out.push('\n');
        }
    }
    Ok(out)
}

fn write_mapping(out: &mut String, map: &Map<String, Value>, column: usize) -> Result<(), CodecError> {
    for (key, value) in map {
        pad(out, column);
        write_entry(out, key, value, column)?;
    }
    Ok(())
}

/// `key: value` starting at the current position; nested blocks go to
/// `column + YAML_INDENT`.
fn write_entry(out: &mut String, key: &str, value: &Value, column: usize) -> Result<(), CodecError> {
    out.push_str(&scalar_string(key)?);
    out.push(':');
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push('\n');
            write_mapping(out, map, column + YAML_INDENT)
        }
        Value::Array(items) if !items.is_empty() => {
            out.push('\n');
            write_sequence(out, items, column + YAML_INDENT)
        }
        other => {
            out.push(' ');
            out.push_str(&inline(other)?);
            out.push('\n');
            Ok(())
        }
    }
}

fn write_sequence(out: &mut String, items: &[Value], column: usize) -> Result<(), CodecError> {
    for item in items {
        pad(out, column);
        out.push('-');
        match item {
            Value::Object(map) if !map.is_empty() => {
                // Keys of a mapping item align after the "- " marker.
                let item_column = column + 2;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i == 0 {
                        out.push(' ');
                    } else {
                        pad(out, item_column);
                    }
                    write_entry(out, key, value, item_column)?;
                }
            }
            Value::Array(nested) if !nested.is_empty() => {
                out.push('\n');
                write_sequence(out, nested, column + YAML_INDENT)?;
            }
            other => {
                out.push(' ');
                out.push_str(&inline(other)?);
                out.push('\n');
            }
        }
    }
    Ok(())
}

fn inline(value: &Value) -> Result<String, CodecError> {
    Ok(match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => scalar_string(s)?,
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
    })
}

/// Characters YAML treats as line breaks.
const LINE_BREAKS: [char; 5] = ['\n', '\r', '\u{85}', '\u{2028}', '\u{2029}'];

/// Single-line YAML scalar for a string, quoted when YAML would otherwise
/// read it as something else.
fn scalar_string(s: &str) -> Result<String, CodecError> {
    // Block scalars cannot sit inline.
    if s.contains(&LINE_BREAKS[..]) {
        return Ok(double_quoted(s));
    }
    let rendered = serde_yaml::to_string(s)?;
    Ok(rendered.trim_end_matches('\n').to_string())
}

/// YAML double-quoted scalar with every break and control character escaped.
fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{85}' => out.push_str("\\N"),
            '\u{a0}' => out.push_str("\\_"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            '\u{feff}' => out.push_str("\\uFEFF"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn pad(out: &mut String, column: usize) {
    out.extend(std::iter::repeat(' ').take(column));
}
