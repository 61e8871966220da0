//! JSON schema builders for MCP tools.

use serde_json::{Map, Value};

/// Build the schema describing the `upload` tool input.
pub(crate) fn upload_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "filename".into(),
        string_schema("Name the chunks are attributed to in answers (e.g. notes.md)"),
    );
    properties.insert(
        "text".into(),
        string_schema("Document contents to index; base64 file bytes when encoding is base64"),
    );

    let mut encoding_schema = Map::new();
    encoding_schema.insert("type".into(), Value::String("string".into()));
    encoding_schema.insert(
        "enum".into(),
        Value::Array(vec![
            Value::String("text".into()),
            Value::String("base64".into()),
        ]),
    );
    encoding_schema.insert(
        "description".into(),
        Value::String("Use base64 for PDF and DOCX files (defaults to text)".into()),
    );
    properties.insert("encoding".into(), Value::Object(encoding_schema));

    finalize_object_schema(properties, &["filename", "text"])
}

/// Build the schema shared by the `search` and `ask` tools.
pub(crate) fn query_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("query".into(), string_schema("Natural language question"));

    let mut top_k_schema = Map::new();
    top_k_schema.insert("type".into(), Value::String("integer".into()));
    top_k_schema.insert(
        "description".into(),
        Value::String("Maximum number of chunks to retrieve (defaults to TOP_K_RESULTS)".into()),
    );
    top_k_schema.insert("minimum".into(), Value::Number(1.into()));
    properties.insert("top_k".into(), Value::Object(top_k_schema));

    finalize_object_schema(properties, &["query"])
}

/// Schema for tools that take no arguments.
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
