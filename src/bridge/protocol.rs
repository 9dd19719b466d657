//! Messages crossing the worker boundary.
//!
//! ```text
//! interactive ──{kind:"compile", correlationId, primarySource, auxiliaryAssets}──► worker
//! interactive ◄─{kind:"compile-result", correlationId, ok, artifact?, message?, diagnostics}── worker
//! ```
//!
//! Payloads are moved through the channels, never shared. The artifact
//! `Vec<u8>` allocated by the renderer is the same allocation the
//! coordinator finally wraps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique per bridge instance.
pub type CorrelationId = u64;

/// Auxiliary assets, name → bytes.
pub type Assets = BTreeMap<String, Vec<u8>>;

/// Messages to the render worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkerRequest {
    /// Render a document
    Compile(CompileRequest),
    /// Construct the renderer ahead of the first compile (no reply)
    Warmup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub correlation_id: CorrelationId,
    pub primary_source: String,
    #[serde(default)]
    pub auxiliary_assets: Assets,
}

/// Reply to a `compile` request, tagged with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename = "compile-result", rename_all = "camelCase")]
pub struct WorkerReply {
    pub correlation_id: CorrelationId,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub diagnostics: Vec<String>,
    /// Renderer construction failed; the worker is unusable.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fatal: bool,
}

impl WorkerReply {
    pub fn success(id: CorrelationId, artifact: Vec<u8>, diagnostics: Vec<String>) -> Self {
        Self {
            correlation_id: id,
            ok: true,
            artifact: Some(artifact),
            message: None,
            diagnostics,
            fatal: false,
        }
    }

    pub fn failure(id: CorrelationId, message: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self {
            correlation_id: id,
            ok: false,
            artifact: None,
            message: Some(message.into()),
            diagnostics,
            fatal: false,
        }
    }

    pub fn init_failed(id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::failure(id, message, Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let mut assets = Assets::new();
        assets.insert("logo.svg".into(), vec![60, 47, 62]);
        let request = WorkerRequest::Compile(CompileRequest {
            correlation_id: 7,
            primary_source: "= Hello".into(),
            auxiliary_assets: assets,
        });

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "compile",
                "correlationId": 7,
                "primarySource": "= Hello",
                "auxiliaryAssets": { "logo.svg": [60, 47, 62] }
            })
        );

        let back: WorkerRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_warmup_wire_shape() {
        let value = serde_json::to_value(WorkerRequest::Warmup).unwrap();
        assert_eq!(value, json!({ "kind": "warmup" }));
    }

    #[test]
    fn test_reply_wire_shape() {
        let ok = serde_json::to_value(WorkerReply::success(3, vec![1, 2], vec![])).unwrap();
        assert_eq!(
            ok,
            json!({
                "kind": "compile-result",
                "correlationId": 3,
                "ok": true,
                "artifact": [1, 2],
                "diagnostics": []
            })
        );

        let failed = serde_json::to_value(WorkerReply::failure(
            4,
            "unclosed delimiter",
            vec!["main.typ:1:1: error: unclosed delimiter".into()],
        ))
        .unwrap();
        assert_eq!(failed["ok"], json!(false));
        assert_eq!(failed["message"], json!("unclosed delimiter"));
        assert!(failed.get("artifact").is_none());
        assert!(failed.get("fatal").is_none());

        let fatal = serde_json::to_value(WorkerReply::init_failed(5, "no fonts")).unwrap();
        assert_eq!(fatal["fatal"], json!(true));
    }
}
