//! Structured projection of the model.
//!
//! The document is JSON with fields in struct declaration order, so two
//! runs over unchanged input produce byte-identical output:
//!
//! ```json
//! { "version": "1", "units": [ { "path": "...", "declarations": [...] } ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::AnalysisModel;
use crate::error::ReportError;
use crate::model::SourceUnit;

/// Version written into every document.
pub const FORMAT_VERSION: &str = "1";

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: &'static str,
    units: &'a [SourceUnit],
}

#[derive(Deserialize)]
struct Document {
    version: String,
    #[serde(default)]
    units: Vec<SourceUnit>,
}

/// Project the model into a JSON document.
pub fn serialize(model: &AnalysisModel) -> Result<Value, ReportError> {
    let document = DocumentRef {
        version: FORMAT_VERSION,
        units: &model.units,
    };
    Ok(serde_json::to_value(document)?)
}

/// Pretty-printed JSON text of the model.
pub fn to_json_string(model: &AnalysisModel) -> Result<String, ReportError> {
    let document = DocumentRef {
        version: FORMAT_VERSION,
        units: &model.units,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Read a document produced by `serialize`.
pub fn deserialize(value: Value) -> Result<AnalysisModel, ReportError> {
    let document: Document = serde_json::from_value(value)?;
    into_model(document)
}

/// Read JSON text produced by `to_json_string`.
pub fn from_json_str(text: &str) -> Result<AnalysisModel, ReportError> {
    let document: Document = serde_json::from_str(text)?;
    into_model(document)
}

fn into_model(document: Document) -> Result<AnalysisModel, ReportError> {
    if document.version != FORMAT_VERSION {
        return Err(ReportError::UnsupportedVersion(document.version));
    }
    Ok(AnalysisModel {
        units: document.units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Diagnostic;

    fn model() -> AnalysisModel {
        AnalysisModel {
            units: vec![SourceUnit {
                path: "a.go".to_string(),
                language: "go".to_string(),
                package: Some("a".to_string()),
                declarations: Vec::new(),
                imports: Vec::new(),
                re_exports: Vec::new(),
                state_machines: Vec::new(),
                diagnostics: vec![Diagnostic::malformed("a.go", 3, "skipped")],
            }],
        }
    }

    #[test]
    fn test_document_shape() {
        let value = serialize(&model()).unwrap();
        assert_eq!(value["version"], "1");
        assert_eq!(value["units"][0]["path"], "a.go");
        assert_eq!(
            value["units"][0]["diagnostics"][0]["kind"],
            "malformed_but_recoverable"
        );
    }

    #[test]
    fn test_field_order_is_stable() {
        let text = to_json_string(&model()).unwrap();
        let path = text.find("\"path\"").unwrap();
        let language = text.find("\"language\"").unwrap();
        let declarations = text.find("\"declarations\"").unwrap();
        assert!(path < language && language < declarations);
        assert_eq!(text, to_json_string(&model()).unwrap());
    }

    #[test]
    fn test_round_trip() {
        let original = model();
        let restored = deserialize(serialize(&original).unwrap()).unwrap();
        assert_eq!(restored, original);

        let restored = from_json_str(&to_json_string(&original).unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = from_json_str(r#"{"version": "9", "units": []}"#).unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedVersion(ref v) if v == "9"));
    }
}
