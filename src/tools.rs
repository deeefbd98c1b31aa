use crate::error::{GatewayError, RequestOutcome};
use crate::gateway::RequestGateway;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// What a tool does once its arguments are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// One Slack method; argument keys are renamed per the pairs given.
    Slack {
        method: &'static str,
        rename: &'static [(&'static str, &'static str)],
    },
    SetToken,
    TestConnection,
    UserInfo,
    UserTimezone,
    SearchUsers,
    DirectMessage,
    ShareFile,
    Ping,
}

#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub action: Action,
    pub input_schema: Value,
}

impl ToolDef {
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.into(),
            description: self.description.into(),
            input_schema: self.input_schema.clone(),
        }
    }
}

fn slack(method: &'static str) -> Action {
    Action::Slack { method, rename: &[] }
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": properties,
        "required": required,
    })
}

fn def(name: &'static str, description: &'static str, action: Action, input_schema: Value) -> ToolDef {
    ToolDef {
        name,
        description,
        action,
        input_schema,
    }
}

fn channel_only() -> Value {
    schema(json!({"channel": {"type": "string"}}), &["channel"])
}

fn message_ref(ts_key: &str) -> Value {
    let mut props = Map::new();
    props.insert("channel".into(), json!({"type": "string"}));
    props.insert(ts_key.into(), json!({"type": "string"}));
    schema(Value::Object(props), &["channel", ts_key])
}

fn limit(default: u32, max: u32) -> Value {
    json!({"type": "integer", "minimum": 1, "maximum": max, "default": default})
}

/// Every tool the server exposes. `ping` is only listed when enabled.
pub fn catalog() -> Vec<ToolDef> {
    let rich = json!({"type": "array", "items": {"type": "object"}});
    vec![
        // core
        def(
            "set_slack_token",
            "Set or replace the Slack token (xoxb-, xoxp-, xoxo- or xapp-); verified with auth.test",
            Action::SetToken,
            schema(json!({"token": {"type": "string"}}), &["token"]),
        ),
        def(
            "test_slack_connection",
            "Check the active token and report workspace details",
            Action::TestConnection,
            schema(json!({}), &[]),
        ),
        def(
            "ping",
            "Health check; echoes a message.",
            Action::Ping,
            schema(json!({"message": {"type": "string"}}), &[]),
        ),
        // messages
        def(
            "send_message",
            "Send a message to a channel, optionally as a thread reply",
            slack("chat.postMessage"),
            schema(
                json!({
                    "channel": {"type": "string"},
                    "text": {"type": "string"},
                    "thread_ts": {"type": "string"},
                    "blocks": rich,
                    "attachments": rich,
                }),
                &["channel", "text"],
            ),
        ),
        def(
            "update_message",
            "Edit an existing message",
            slack("chat.update"),
            schema(
                json!({
                    "channel": {"type": "string"},
                    "ts": {"type": "string"},
                    "text": {"type": "string"},
                    "blocks": rich,
                    "attachments": rich,
                }),
                &["channel", "ts", "text"],
            ),
        ),
        def(
            "delete_message",
            "Delete a message",
            slack("chat.delete"),
            message_ref("ts"),
        ),
        def(
            "schedule_message",
            "Schedule a message for a future Unix time",
            slack("chat.scheduleMessage"),
            schema(
                json!({
                    "channel": {"type": "string"},
                    "text": {"type": "string"},
                    "post_at": {"type": "integer", "minimum": 1},
                    "blocks": rich,
                    "attachments": rich,
                }),
                &["channel", "text", "post_at"],
            ),
        ),
        def(
            "get_message_permalink",
            "Get a permanent link to a message",
            slack("chat.getPermalink"),
            message_ref("message_ts"),
        ),
        def("pin_message", "Pin a message to its channel", slack("pins.add"), message_ref("timestamp")),
        def("unpin_message", "Unpin a message", slack("pins.remove"), message_ref("timestamp")),
        def(
            "get_thread_replies",
            "List replies in a thread",
            Action::Slack {
                method: "conversations.replies",
                rename: &[("thread_ts", "ts")],
            },
            schema(
                json!({
                    "channel": {"type": "string"},
                    "thread_ts": {"type": "string"},
                    "limit": limit(10, 1000),
                    "cursor": {"type": "string"},
                }),
                &["channel", "thread_ts"],
            ),
        ),
        def(
            "send_direct_message",
            "Open a DM with a user and send a message",
            Action::DirectMessage,
            schema(
                json!({
                    "user": {"type": "string"},
                    "text": {"type": "string"},
                    "blocks": rich,
                    "attachments": rich,
                }),
                &["user", "text"],
            ),
        ),
        // channels
        def(
            "list_channels",
            "List conversations the token can see",
            slack("conversations.list"),
            schema(
                json!({
                    "types": {"type": "string", "default": "public_channel,private_channel"},
                    "exclude_archived": {"type": "boolean", "default": true},
                    "limit": limit(100, 1000),
                    "cursor": {"type": "string"},
                }),
                &[],
            ),
        ),
        def("get_channel_info", "Get details about a channel", slack("conversations.info"), channel_only()),
        def(
            "create_channel",
            "Create a public or private channel",
            slack("conversations.create"),
            schema(
                json!({
                    "name": {"type": "string"},
                    "is_private": {"type": "boolean", "default": false},
                    "team_id": {"type": "string"},
                }),
                &["name"],
            ),
        ),
        def("archive_channel", "Archive a channel", slack("conversations.archive"), channel_only()),
        def(
            "set_channel_topic",
            "Set a channel topic",
            slack("conversations.setTopic"),
            schema(
                json!({"channel": {"type": "string"}, "topic": {"type": "string"}}),
                &["channel", "topic"],
            ),
        ),
        def(
            "set_channel_purpose",
            "Set a channel purpose",
            slack("conversations.setPurpose"),
            schema(
                json!({"channel": {"type": "string"}, "purpose": {"type": "string"}}),
                &["channel", "purpose"],
            ),
        ),
        def("join_channel", "Join a public channel", slack("conversations.join"), channel_only()),
        def("leave_channel", "Leave a channel", slack("conversations.leave"), channel_only()),
        def(
            "invite_to_channel",
            "Invite users (IDs, comma-separated or as a list) to a channel",
            slack("conversations.invite"),
            schema(
                json!({
                    "channel": {"type": "string"},
                    "users": {"type": ["string", "array"], "items": {"type": "string"}},
                }),
                &["channel", "users"],
            ),
        ),
        def(
            "remove_from_channel",
            "Remove a user from a channel",
            slack("conversations.kick"),
            schema(
                json!({"channel": {"type": "string"}, "user": {"type": "string"}}),
                &["channel", "user"],
            ),
        ),
        def(
            "list_channel_members",
            "List member IDs of a channel",
            slack("conversations.members"),
            schema(
                json!({
                    "channel": {"type": "string"},
                    "limit": limit(100, 1000),
                    "cursor": {"type": "string"},
                }),
                &["channel"],
            ),
        ),
        // users
        def(
            "get_user_info",
            "Look up a user by ID or email address",
            Action::UserInfo,
            schema(json!({"user": {"type": "string"}}), &["user"]),
        ),
        def(
            "get_user_timezone",
            "Get a user's timezone",
            Action::UserTimezone,
            schema(json!({"user": {"type": "string"}}), &["user"]),
        ),
        def(
            "get_user_presence",
            "Get a user's presence",
            slack("users.getPresence"),
            schema(json!({"user": {"type": "string"}}), &["user"]),
        ),
        def(
            "list_workspace_members",
            "List workspace members",
            slack("users.list"),
            schema(
                json!({"limit": limit(100, 1000), "cursor": {"type": "string"}}),
                &[],
            ),
        ),
        def(
            "search_slack_users",
            "Find users whose name, display name or email contains the query",
            Action::SearchUsers,
            schema(
                json!({"query": {"type": "string"}, "limit": limit(1000, 1000)}),
                &["query"],
            ),
        ),
        def(
            "get_user_conversations",
            "List conversations a user belongs to",
            slack("users.conversations"),
            schema(
                json!({
                    "user": {"type": "string"},
                    "types": {"type": "string", "default": "public_channel,private_channel,mpim,im"},
                    "limit": limit(100, 1000),
                    "cursor": {"type": "string"},
                }),
                &[],
            ),
        ),
        // files
        def(
            "list_files",
            "List files, optionally filtered by channel, user or type",
            slack("files.list"),
            schema(
                json!({
                    "channel": {"type": "string"},
                    "user": {"type": "string"},
                    "types": {"type": "string"},
                    "count": limit(20, 1000),
                    "page": {"type": "integer", "minimum": 1},
                }),
                &[],
            ),
        ),
        def(
            "get_file_info",
            "Get metadata for a file",
            slack("files.info"),
            schema(json!({"file": {"type": "string"}}), &["file"]),
        ),
        def(
            "delete_file",
            "Delete a file",
            slack("files.delete"),
            schema(json!({"file": {"type": "string"}}), &["file"]),
        ),
        def(
            "share_file",
            "Post a link to an existing file in one or more channels",
            Action::ShareFile,
            schema(
                json!({
                    "file": {"type": "string"},
                    "channels": {"type": ["string", "array"], "items": {"type": "string"}},
                    "comment": {"type": "string"},
                }),
                &["file", "channels"],
            ),
        ),
    ]
}

pub fn tool_descriptors(enable_ping: bool) -> Vec<ToolDescriptor> {
    catalog()
        .iter()
        .filter(|d| enable_ping || d.action != Action::Ping)
        .map(ToolDef::descriptor)
        .collect()
}

pub fn find_tool(name: &str, enable_ping: bool) -> Option<ToolDef> {
    catalog()
        .into_iter()
        .find(|d| d.name == name && (enable_ping || d.action != Action::Ping))
}

/// Check `arguments` against the tool's schema and fill in defaults.
pub fn prepare_arguments(tool: &ToolDef, arguments: Value) -> Result<Map<String, Value>, String> {
    let mut args = match arguments {
        Value::Null => Map::new(),
        Value::Object(m) => m,
        _ => return Err("arguments must be an object".into()),
    };
    let props = tool
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(unknown) = args.keys().find(|k| !props.contains_key(k.as_str())) {
        return Err(format!("unknown argument: {}", unknown));
    }
    // Explicit nulls behave like omitted arguments.
    args.retain(|_, v| !v.is_null());

    for (key, prop) in &props {
        match args.get_mut(key) {
            Some(value) => check_value(key, prop, value)?,
            None => {
                if let Some(default) = prop.get("default") {
                    args.insert(key.clone(), default.clone());
                }
            }
        }
    }

    let required = tool
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for key in required.iter().filter_map(Value::as_str) {
        match args.get(key) {
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(format!("argument must not be empty: {}", key))
            }
            Some(_) => {}
            None => return Err(format!("missing required argument: {}", key)),
        }
    }
    Ok(args)
}

fn type_names(prop: &Value) -> Vec<&str> {
    match prop.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn check_value(key: &str, prop: &Value, value: &mut Value) -> Result<(), String> {
    let types = type_names(prop);
    let matches = types.iter().any(|t| match *t {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    });
    if !types.is_empty() && !matches {
        return Err(format!("argument {} must be of type {}", key, types.join(" or ")));
    }

    // Widen so values past i64::MAX are still range-checked.
    let number = value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from));
    if let Some(n) = number {
        let min = prop.get("minimum").and_then(Value::as_i64).map(i128::from);
        let max = prop.get("maximum").and_then(Value::as_i64).map(i128::from);
        if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
            return Err(format!(
                "argument {} out of range ({}..={})",
                key,
                min.map(|m| m.to_string()).unwrap_or_default(),
                max.map(|m| m.to_string()).unwrap_or_default()
            ));
        }
    }

    // A list of IDs where Slack wants a comma-separated string.
    if types.contains(&"string") && types.contains(&"array") {
        if let Value::Array(items) = value {
            let mut ids = Vec::with_capacity(items.len());
            for item in items.iter() {
                match item.as_str() {
                    Some(s) => ids.push(s.to_string()),
                    None => return Err(format!("argument {} must contain only strings", key)),
                }
            }
            *value = Value::String(ids.join(","));
        }
    }
    Ok(())
}

fn rename_keys(mut args: Map<String, Value>, rename: &[(&str, &str)]) -> Map<String, Value> {
    for (from, to) in rename {
        if let Some(v) = args.remove(*from) {
            args.insert((*to).to_string(), v);
        }
    }
    args
}

fn string_arg(args: &Map<String, Value>, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Run a validated tool. Every Slack request goes through the gateway.
pub async fn run_tool(gateway: &RequestGateway, tool: &ToolDef, args: Map<String, Value>) -> RequestOutcome {
    match tool.action {
        Action::Slack { method, rename } => gateway.execute(method, rename_keys(args, rename)).await,
        Action::Ping => {
            let message = args
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("pong");
            Ok(json!({ "message": message }))
        }
        Action::SetToken => {
            let identity = gateway.set_credential(&string_arg(&args, "token")).await?;
            Ok(json!({ "success": true, "identity": identity }))
        }
        Action::TestConnection => {
            let auth = gateway.execute("auth.test", Map::new()).await?;
            // Team details are best effort; a token without team:read still connects.
            let team = gateway
                .execute("team.info", Map::new())
                .await
                .ok()
                .and_then(|t| t.get("team").cloned());
            Ok(json!({
                "auth": auth,
                "team": team,
                "min_api_interval_ms": gateway.limiter().min_interval().as_millis() as u64,
            }))
        }
        Action::UserInfo => lookup_user(gateway, &string_arg(&args, "user")).await,
        Action::UserTimezone => {
            let user = lookup_user(gateway, &string_arg(&args, "user")).await?;
            let user = user.get("user").cloned().unwrap_or(Value::Null);
            Ok(json!({
                "user": user.get("id"),
                "tz": user.get("tz"),
                "tz_label": user.get("tz_label"),
                "tz_offset": user.get("tz_offset"),
            }))
        }
        Action::SearchUsers => {
            let query = string_arg(&args, "query").to_lowercase();
            let mut list_args = Map::new();
            list_args.insert("limit".into(), args.get("limit").cloned().unwrap_or(json!(1000)));
            let listing = gateway.execute("users.list", list_args).await?;
            let members: Vec<Value> = listing
                .get("members")
                .and_then(Value::as_array)
                .map(|ms| ms.iter().filter(|m| user_matches(m, &query)).cloned().collect())
                .unwrap_or_default();
            Ok(json!({ "query": query, "count": members.len(), "members": members }))
        }
        Action::DirectMessage => {
            let mut open = Map::new();
            open.insert("users".into(), Value::String(string_arg(&args, "user")));
            let opened = gateway.execute("conversations.open", open).await?;
            let channel = opened
                .pointer("/channel/id")
                .and_then(Value::as_str)
                .ok_or_else(|| GatewayError::Unexpected {
                    message: "conversations.open returned no channel id".into(),
                })?
                .to_string();

            let mut post = args;
            post.remove("user");
            post.insert("channel".into(), Value::String(channel));
            gateway.execute("chat.postMessage", post).await
        }
        Action::ShareFile => share_file(gateway, &args).await,
    }
}

/// Post the file's permalink to each channel it is not already in.
/// One channel failing does not stop the rest.
async fn share_file(gateway: &RequestGateway, args: &Map<String, Value>) -> RequestOutcome {
    let file = string_arg(args, "file");
    let mut info_args = Map::new();
    info_args.insert("file".into(), Value::String(file.clone()));
    let info = gateway.execute("files.info", info_args).await?;
    let meta = info.get("file").cloned().unwrap_or(Value::Null);
    let name = meta.get("name").and_then(Value::as_str).unwrap_or(file.as_str()).to_string();
    let permalink = meta
        .get("permalink")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let present: Vec<&str> = ["channels", "groups"]
        .iter()
        .filter_map(|k| meta.get(*k).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    let comment = args
        .get("comment")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let mut shared = Vec::new();
    let mut already_shared = Vec::new();
    let mut failed = Vec::new();
    let channels = string_arg(args, "channels");
    for channel in channels.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if present.contains(&channel) {
            already_shared.push(channel.to_string());
            continue;
        }
        let post = file_share_post(channel, &name, &permalink, comment);
        match gateway.execute("chat.postMessage", post).await {
            Ok(_) => shared.push(channel.to_string()),
            Err(e) => failed.push(json!({ "channel": channel, "error": e.detail() })),
        }
    }
    Ok(json!({
        "file": file,
        "name": name,
        "permalink": permalink,
        "shared": shared,
        "already_shared": already_shared,
        "failed": failed,
    }))
}

fn file_share_post(channel: &str, name: &str, permalink: &str, comment: Option<&str>) -> Map<String, Value> {
    let mut post = Map::new();
    post.insert("channel".into(), json!(channel));
    post.insert("unfurl_links".into(), json!(true));
    post.insert("unfurl_media".into(), json!(true));
    match comment {
        Some(comment) => {
            post.insert("text".into(), json!(comment));
            post.insert(
                "blocks".into(),
                json!([
                    {"type": "section", "text": {"type": "mrkdwn", "text": comment}},
                    {"type": "section", "text": {"type": "mrkdwn", "text": format!("📎 *File:* <{}|{}>", permalink, name)}},
                ]),
            );
        }
        None => {
            post.insert("text".into(), json!(format!("Shared file: {}\n{}", name, permalink)));
        }
    }
    post
}

async fn lookup_user(gateway: &RequestGateway, user: &str) -> RequestOutcome {
    let mut args = Map::new();
    if user.contains('@') {
        args.insert("email".into(), Value::String(user.to_string()));
        gateway.execute("users.lookupByEmail", args).await
    } else {
        args.insert("user".into(), Value::String(user.to_string()));
        gateway.execute("users.info", args).await
    }
}

fn user_matches(member: &Value, query: &str) -> bool {
    let fields = [
        member.get("name"),
        member.get("real_name"),
        member.pointer("/profile/display_name"),
        member.pointer("/profile/real_name"),
        member.pointer("/profile/email"),
    ];
    fields
        .iter()
        .filter_map(|f| f.and_then(Value::as_str))
        .any(|s| s.to_lowercase().contains(query))
}

/// Render a Slack `ts` ("1712345678.000200") as RFC 3339.
pub fn slack_ts_to_rfc3339(ts: &str) -> Option<String> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs = secs.parse::<i64>().ok()?;
    let micros = format!("{:0<6}", frac).get(..6)?.parse::<u32>().ok()?;
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs, micros * 1_000).map(|d| d.to_rfc3339())
}

/// One-line human summary for the text block of a tool result.
pub fn summarize(tool: &str, payload: &Value) -> Option<String> {
    let count = |key: &str| payload.get(key).and_then(Value::as_array).map(Vec::len);
    match tool {
        "send_message" | "send_direct_message" => {
            let channel = payload.get("channel").and_then(Value::as_str)?;
            let ts = payload.get("ts").and_then(Value::as_str)?;
            let when = slack_ts_to_rfc3339(ts).unwrap_or_else(|| ts.to_string());
            Some(format!("Message sent to {} (ts {}, {})", channel, ts, when))
        }
        "set_slack_token" => {
            let team = payload.pointer("/identity/team").and_then(Value::as_str).unwrap_or("unknown team");
            Some(format!("Slack token set for {}", team))
        }
        "list_channels" | "get_user_conversations" => {
            count("channels").map(|n| format!("{} conversation(s)", n))
        }
        "list_workspace_members" | "search_slack_users" => {
            count("members").map(|n| format!("{} member(s)", n))
        }
        "list_channel_members" => count("members").map(|n| format!("{} member ID(s)", n)),
        "get_thread_replies" => count("messages").map(|n| format!("{} message(s) in thread", n)),
        "list_files" => count("files").map(|n| format!("{} file(s)", n)),
        "share_file" => {
            let name = payload.get("name").and_then(Value::as_str).unwrap_or("file");
            Some(format!(
                "{} shared to {} channel(s), {} already present, {} failed",
                name,
                count("shared").unwrap_or(0),
                count("already_shared").unwrap_or(0),
                count("failed").unwrap_or(0)
            ))
        }
        "get_message_permalink" => payload.get("permalink").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolDef {
        find_tool(name, true).unwrap()
    }

    #[test]
    fn tool_names_are_unique() {
        let all = catalog();
        let mut names: Vec<_> = all.iter().map(|d| d.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn ping_is_gated() {
        assert!(find_tool("ping", false).is_none());
        assert!(!tool_descriptors(false).iter().any(|d| d.name == "ping"));
        assert!(tool_descriptors(true).iter().any(|d| d.name == "ping"));
    }

    #[test]
    fn defaults_and_required() {
        let args = prepare_arguments(&tool("list_channels"), Value::Null).unwrap();
        assert_eq!(args["limit"], 100);
        assert_eq!(args["exclude_archived"], true);

        let err = prepare_arguments(&tool("send_message"), json!({"channel": "C1"})).unwrap_err();
        assert_eq!(err, "missing required argument: text");

        let err = prepare_arguments(&tool("send_message"), json!({"channel": " ", "text": "hi"}))
            .unwrap_err();
        assert_eq!(err, "argument must not be empty: channel");
    }

    #[test]
    fn rejects_bad_types_ranges_and_unknown_keys() {
        let t = tool("list_channel_members");
        assert!(prepare_arguments(&t, json!({"channel": "C1", "limit": 0})).is_err());
        assert!(prepare_arguments(&t, json!({"channel": "C1", "limit": "ten"})).is_err());
        assert!(prepare_arguments(&t, json!({"channel": "C1", "colour": "red"})).is_err());
        assert!(prepare_arguments(&t, json!(["C1"])).is_err());
        assert!(prepare_arguments(&t, json!({"channel": "C1", "cursor": null})).is_ok());
    }

    #[test]
    fn integers_beyond_i64_are_range_checked() {
        let t = tool("list_channel_members");
        let err = prepare_arguments(&t, json!({"channel": "C1", "limit": u64::MAX})).unwrap_err();
        assert!(err.contains("out of range"), "{}", err);
        let err = prepare_arguments(&t, json!({"channel": "C1", "limit": -1})).unwrap_err();
        assert!(err.contains("out of range"), "{}", err);
        let args = prepare_arguments(&t, json!({"channel": "C1", "limit": 1000})).unwrap();
        assert_eq!(args["limit"], 1000);
    }

    #[test]
    fn share_post_carries_comment_and_link() {
        let post = file_share_post("C1", "report.pdf", "https://x/f", Some("see this"));
        assert_eq!(post["text"], "see this");
        assert_eq!(post["unfurl_links"], true);
        assert!(post["blocks"][1]["text"]["text"]
            .as_str()
            .unwrap()
            .contains("<https://x/f|report.pdf>"));

        let plain = file_share_post("C1", "report.pdf", "https://x/f", None);
        assert_eq!(plain["text"], "Shared file: report.pdf\nhttps://x/f");
        assert!(!plain.contains_key("blocks"));
    }

    #[test]
    fn user_lists_become_comma_separated() {
        let args = prepare_arguments(
            &tool("invite_to_channel"),
            json!({"channel": "C1", "users": ["U1", "U2"]}),
        )
        .unwrap();
        assert_eq!(args["users"], "U1,U2");
    }

    #[test]
    fn thread_ts_is_renamed() {
        let t = tool("get_thread_replies");
        let args = prepare_arguments(&t, json!({"channel": "C1", "thread_ts": "1.2"})).unwrap();
        let Action::Slack { rename, .. } = t.action else {
            panic!("expected a Slack action");
        };
        let renamed = rename_keys(args, rename);
        assert_eq!(renamed["ts"], "1.2");
        assert!(!renamed.contains_key("thread_ts"));
    }

    #[test]
    fn slack_timestamps() {
        assert_eq!(
            slack_ts_to_rfc3339("0.000200").as_deref(),
            Some("1970-01-01T00:00:00.000200+00:00")
        );
        assert_eq!(slack_ts_to_rfc3339("60").as_deref(), Some("1970-01-01T00:01:00+00:00"));
        assert!(slack_ts_to_rfc3339("abc").is_none());
    }

    #[test]
    fn user_search_matches_profile_fields() {
        let m = json!({"name": "jdoe", "profile": {"email": "Jane@Example.com"}});
        assert!(user_matches(&m, "example.com"));
        assert!(user_matches(&m, "jdo"));
        assert!(!user_matches(&m, "bob"));
    }
}
