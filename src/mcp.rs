use crate::error::GatewayError;
use serde_json::Value;

// Slack always sends response_metadata on paged methods, with an empty next_cursor
// on the last page. Drop it in that case so clients only see it when there is more.
fn prune_response_metadata(structured: &mut Value) {
    let Some(obj) = structured.as_object_mut() else {
        return;
    };
    let Some(meta_obj) = obj
        .get_mut("response_metadata")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let has_more = meta_obj
        .get("next_cursor")
        .and_then(Value::as_str)
        .is_some_and(|c| !c.is_empty());
    if !has_more {
        meta_obj.remove("next_cursor");
    }
    let empty_warnings = meta_obj
        .get("warnings")
        .and_then(Value::as_array)
        .is_some_and(Vec::is_empty);
    if empty_warnings {
        meta_obj.remove("warnings");
    }
    if meta_obj.is_empty() {
        obj.remove("response_metadata");
    }
}

// Build an MCP-compliant result envelope for tools/call outputs.
// - content: always a single text block so clients can render something.
// - structuredContent: the Slack payload (or error object) as JSON.
// - isError: included only when true to keep payloads small.
pub fn mcp_wrap(mut structured: Value, text_opt: Option<String>, is_error: bool) -> Value {
    prune_response_metadata(&mut structured);
    let text = match text_opt {
        Some(s) => s,
        None => serde_json::to_string(&structured).unwrap_or_else(|_| "{}".to_string()),
    };
    let mut obj = serde_json::json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured,
    });
    if is_error {
        if let Some(map) = obj.as_object_mut() {
            map.insert("isError".to_string(), Value::Bool(true));
        }
    }
    obj
}

/// Envelope for a failed gateway call.
pub fn mcp_error(err: &GatewayError) -> Value {
    let structured = serde_json::json!({
        "error": { "kind": err.kind(), "detail": err.detail() }
    });
    mcp_wrap(structured, Some(err.to_string()), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_page_cursor_is_dropped() {
        let out = mcp_wrap(
            json!({"ok": true, "channels": [], "response_metadata": {"next_cursor": ""}}),
            Some("0 conversation(s)".into()),
            false,
        );
        assert!(out["structuredContent"].get("response_metadata").is_none());
        assert_eq!(out["content"][0]["text"], "0 conversation(s)");
        assert!(out.get("isError").is_none());
    }

    #[test]
    fn next_cursor_kept_when_more() {
        let out = mcp_wrap(
            json!({"ok": true, "response_metadata": {"next_cursor": "dGVhbTpD", "warnings": []}}),
            None,
            false,
        );
        assert_eq!(
            out["structuredContent"]["response_metadata"],
            json!({"next_cursor": "dGVhbTpD"})
        );
        let text = out["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("dGVhbTpD"));
    }

    #[test]
    fn error_envelope() {
        let out = mcp_error(&GatewayError::RemoteApi {
            code: "channel_not_found".into(),
        });
        assert_eq!(out["isError"], true);
        assert_eq!(out["structuredContent"]["error"]["kind"], "remote_api_error");
        assert_eq!(out["structuredContent"]["error"]["detail"], "channel_not_found");
        assert_eq!(out["content"][0]["text"], "Slack API error: channel_not_found");
    }
}
