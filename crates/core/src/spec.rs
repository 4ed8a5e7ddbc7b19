//! Engine-agnostic workflow specification.
//!
//! [`WorkflowSpec`] is the artifact produced by generation and consumed by
//! validation and deployment. It round-trips losslessly through the n8n
//! import JSON shape via [`WorkflowSpec::to_engine_json`] and
//! [`WorkflowSpec::from_engine_json`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of a workflow name.
pub const MAX_SPEC_NAME_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// Closed set of node kinds known to be deployable.
///
/// Each kind maps to exactly one n8n node type string. Kinds outside this
/// set are rejected at parse time; the generation allow-list (refreshed from
/// the engine's capability discovery) further narrows which of these a
/// builder may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    WebhookTrigger,
    ScheduleTrigger,
    ManualTrigger,
    HttpRequest,
    EmailSend,
    Slack,
    If,
    Set,
    Code,
}

impl NodeKind {
    /// The n8n node type string for this kind.
    pub fn engine_type(&self) -> &'static str {
        match self {
            NodeKind::WebhookTrigger => "n8n-nodes-base.webhook",
            NodeKind::ScheduleTrigger => "n8n-nodes-base.scheduleTrigger",
            NodeKind::ManualTrigger => "n8n-nodes-base.manualTrigger",
            NodeKind::HttpRequest => "n8n-nodes-base.httpRequest",
            NodeKind::EmailSend => "n8n-nodes-base.emailSend",
            NodeKind::Slack => "n8n-nodes-base.slack",
            NodeKind::If => "n8n-nodes-base.if",
            NodeKind::Set => "n8n-nodes-base.set",
            NodeKind::Code => "n8n-nodes-base.code",
        }
    }

    /// Resolve an n8n node type string back to a kind.
    pub fn from_engine_type(engine_type: &str) -> Option<Self> {
        match engine_type {
            "n8n-nodes-base.webhook" => Some(NodeKind::WebhookTrigger),
            "n8n-nodes-base.scheduleTrigger" => Some(NodeKind::ScheduleTrigger),
            "n8n-nodes-base.manualTrigger" => Some(NodeKind::ManualTrigger),
            "n8n-nodes-base.httpRequest" => Some(NodeKind::HttpRequest),
            "n8n-nodes-base.emailSend" => Some(NodeKind::EmailSend),
            "n8n-nodes-base.slack" => Some(NodeKind::Slack),
            "n8n-nodes-base.if" => Some(NodeKind::If),
            "n8n-nodes-base.set" => Some(NodeKind::Set),
            "n8n-nodes-base.code" => Some(NodeKind::Code),
            _ => None,
        }
    }

    /// Whether this kind initiates workflow execution.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeKind::WebhookTrigger | NodeKind::ScheduleTrigger | NodeKind::ManualTrigger
        )
    }

    /// The credential type this kind requires, if any.
    pub fn required_credential(&self) -> Option<&'static str> {
        match self {
            NodeKind::EmailSend => Some("smtp"),
            NodeKind::Slack => Some("slackApi"),
            _ => None,
        }
    }

    /// All kinds in declaration order.
    pub fn all() -> &'static [NodeKind] {
        &[
            NodeKind::WebhookTrigger,
            NodeKind::ScheduleTrigger,
            NodeKind::ManualTrigger,
            NodeKind::HttpRequest,
            NodeKind::EmailSend,
            NodeKind::Slack,
            NodeKind::If,
            NodeKind::Set,
            NodeKind::Code,
        ]
    }
}

// ---------------------------------------------------------------------------
// Node parameters (tagged by kind)
// ---------------------------------------------------------------------------

/// Per-kind node configuration.
///
/// One closed shape per [`NodeKind`], validated at construction via
/// [`NodeParameters::from_value`]. The `Set`/`Code`/`If` shapes carry an
/// opaque payload because the engine itself is schemaless there; everything
/// else names its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeParameters {
    Webhook {
        path: String,
        http_method: String,
    },
    Schedule {
        cron: String,
    },
    Manual,
    HttpRequest {
        url: String,
        method: String,
    },
    Email {
        to: String,
        subject: String,
        text: String,
    },
    Slack {
        channel: String,
        text: String,
    },
    If {
        conditions: serde_json::Value,
    },
    Set {
        values: serde_json::Value,
    },
    Code {
        js_code: String,
    },
}

impl NodeParameters {
    /// Build parameters for `kind` from a raw engine JSON `parameters` map.
    ///
    /// Missing required fields fail with [`CoreError::Malformed`]; optional
    /// fields fall back to engine defaults (`POST` for webhooks, `GET` for
    /// HTTP requests).
    pub fn from_value(kind: NodeKind, value: &serde_json::Value) -> Result<Self, CoreError> {
        let get_str = |field: &str| -> Option<String> {
            value.get(field).and_then(|v| v.as_str()).map(String::from)
        };
        let require_str = |field: &str| -> Result<String, CoreError> {
            get_str(field).ok_or_else(|| {
                CoreError::Malformed(format!(
                    "{} node is missing required parameter '{field}'",
                    kind.engine_type()
                ))
            })
        };

        match kind {
            NodeKind::WebhookTrigger => Ok(NodeParameters::Webhook {
                path: require_str("path")?,
                http_method: get_str("httpMethod").unwrap_or_else(|| "POST".into()),
            }),
            NodeKind::ScheduleTrigger => Ok(NodeParameters::Schedule {
                cron: require_str("cronExpression")?,
            }),
            NodeKind::ManualTrigger => Ok(NodeParameters::Manual),
            NodeKind::HttpRequest => Ok(NodeParameters::HttpRequest {
                url: require_str("url")?,
                method: get_str("method").unwrap_or_else(|| "GET".into()),
            }),
            NodeKind::EmailSend => Ok(NodeParameters::Email {
                to: require_str("toEmail")?,
                subject: get_str("subject").unwrap_or_default(),
                text: get_str("text").unwrap_or_default(),
            }),
            NodeKind::Slack => Ok(NodeParameters::Slack {
                channel: require_str("channel")?,
                text: get_str("text").unwrap_or_default(),
            }),
            NodeKind::If => Ok(NodeParameters::If {
                conditions: value.get("conditions").cloned().unwrap_or_default(),
            }),
            NodeKind::Set => Ok(NodeParameters::Set {
                values: value.get("values").cloned().unwrap_or_default(),
            }),
            NodeKind::Code => Ok(NodeParameters::Code {
                js_code: get_str("jsCode").unwrap_or_default(),
            }),
        }
    }

    /// Serialize back into the engine `parameters` map.
    pub fn to_engine_value(&self) -> serde_json::Value {
        match self {
            NodeParameters::Webhook { path, http_method } => serde_json::json!({
                "path": path,
                "httpMethod": http_method,
            }),
            NodeParameters::Schedule { cron } => serde_json::json!({
                "cronExpression": cron,
            }),
            NodeParameters::Manual => serde_json::json!({}),
            NodeParameters::HttpRequest { url, method } => serde_json::json!({
                "url": url,
                "method": method,
            }),
            NodeParameters::Email { to, subject, text } => serde_json::json!({
                "toEmail": to,
                "subject": subject,
                "text": text,
            }),
            NodeParameters::Slack { channel, text } => serde_json::json!({
                "channel": channel,
                "text": text,
            }),
            NodeParameters::If { conditions } => serde_json::json!({
                "conditions": conditions,
            }),
            NodeParameters::Set { values } => serde_json::json!({
                "values": values,
            }),
            NodeParameters::Code { js_code } => serde_json::json!({
                "jsCode": js_code,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and connections
// ---------------------------------------------------------------------------

/// Reference to an engine-side credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRef {
    /// Credential type identifier (e.g. `smtp`, `slackApi`).
    pub cred_type: String,
    /// Credential display name on the engine.
    pub name: String,
}

/// A single node in a workflow specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Stable node identifier, unique within the spec.
    pub id: String,
    /// Display name, unique within the spec (connections key on it in the
    /// engine JSON shape).
    pub display_name: String,
    pub kind: NodeKind,
    /// Canvas position hint `(x, y)`.
    pub position: (i64, i64),
    pub parameters: NodeParameters,
    pub credential: Option<CredentialRef>,
}

/// One directed connection endpoint: target node id plus input slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Target node id (must exist in `nodes`).
    pub node: String,
    /// Input slot index on the target node.
    pub input_index: u32,
}

// ---------------------------------------------------------------------------
// Workflow specification
// ---------------------------------------------------------------------------

/// Engine-agnostic description of one workflow.
///
/// `connections` maps source node id to ordered targets. A `BTreeMap` keeps
/// iteration and serialization deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    pub connections: BTreeMap<String, Vec<ConnectionTarget>>,
    /// False until deployment succeeds and the engine confirms activation.
    pub active: bool,
}

impl WorkflowSpec {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All trigger-kind nodes, in node order.
    pub fn trigger_nodes(&self) -> Vec<&WorkflowNode> {
        self.nodes.iter().filter(|n| n.kind.is_trigger()).collect()
    }

    /// The first webhook trigger, if the spec has one.
    pub fn webhook_trigger(&self) -> Option<&WorkflowNode> {
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::WebhookTrigger)
    }

    /// Serialize into the n8n workflow import shape.
    ///
    /// Connections are keyed by source display name with a single `main`
    /// output slot, matching what the engine's import endpoint accepts.
    pub fn to_engine_json(&self) -> serde_json::Value {
        let nodes: Vec<serde_json::Value> = self
            .nodes
            .iter()
            .map(|n| {
                let mut node = serde_json::json!({
                    "id": n.id,
                    "name": n.display_name,
                    "type": n.kind.engine_type(),
                    "typeVersion": 1,
                    "position": [n.position.0, n.position.1],
                    "parameters": n.parameters.to_engine_value(),
                });
                if let Some(cred) = &n.credential {
                    node["credentials"] = serde_json::json!({
                        cred.cred_type.clone(): { "name": cred.name },
                    });
                }
                node
            })
            .collect();

        let mut connections = serde_json::Map::new();
        for (source_id, targets) in &self.connections {
            // Skip sources that no longer resolve; validation reports them.
            let Some(source) = self.node(source_id) else {
                continue;
            };
            let slot: Vec<serde_json::Value> = targets
                .iter()
                .filter_map(|t| {
                    self.node(&t.node).map(|target| {
                        serde_json::json!({
                            "node": target.display_name,
                            "type": "main",
                            "index": t.input_index,
                        })
                    })
                })
                .collect();
            connections.insert(
                source.display_name.clone(),
                serde_json::json!({ "main": [slot] }),
            );
        }

        serde_json::json!({
            "name": self.name,
            "nodes": nodes,
            "connections": connections,
            "active": self.active,
            "settings": { "executionOrder": "v1" },
        })
    }

    /// Parse a workflow from the n8n import JSON shape.
    ///
    /// Node ids are preserved when present and generated otherwise.
    /// Connection references by display name are resolved back to node ids;
    /// a name that resolves to no node is a parse error (a *dangling id*,
    /// by contrast, is left for validation to report).
    pub fn from_engine_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = json
            .as_object()
            .ok_or_else(|| CoreError::Malformed("workflow JSON must be an object".into()))?;

        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled workflow")
            .to_string();

        let raw_nodes = obj
            .get("nodes")
            .and_then(|v| v.as_array())
            .ok_or_else(|| CoreError::Malformed("workflow JSON must have a 'nodes' array".into()))?;

        let mut nodes = Vec::with_capacity(raw_nodes.len());
        for raw in raw_nodes {
            nodes.push(parse_node(raw)?);
        }

        let mut name_to_id: BTreeMap<&str, &str> = BTreeMap::new();
        for node in &nodes {
            name_to_id.insert(node.display_name.as_str(), node.id.as_str());
        }

        let mut connections: BTreeMap<String, Vec<ConnectionTarget>> = BTreeMap::new();
        if let Some(raw_conns) = obj.get("connections").and_then(|v| v.as_object()) {
            for (source_name, outputs) in raw_conns {
                let source_id = name_to_id.get(source_name.as_str()).ok_or_else(|| {
                    CoreError::Malformed(format!(
                        "connection source '{source_name}' does not match any node"
                    ))
                })?;

                let mut targets = Vec::new();
                let slots = outputs
                    .get("main")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                for slot in &slots {
                    for entry in slot.as_array().into_iter().flatten() {
                        let target_name =
                            entry.get("node").and_then(|v| v.as_str()).ok_or_else(|| {
                                CoreError::Malformed(format!(
                                    "connection from '{source_name}' is missing a target node"
                                ))
                            })?;
                        let target_id = name_to_id.get(target_name).ok_or_else(|| {
                            CoreError::Malformed(format!(
                                "connection target '{target_name}' does not match any node"
                            ))
                        })?;
                        let input_index = entry
                            .get("index")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0) as u32;
                        targets.push(ConnectionTarget {
                            node: (*target_id).to_string(),
                            input_index,
                        });
                    }
                }
                connections.insert((*source_id).to_string(), targets);
            }
        }

        let active = obj.get("active").and_then(|v| v.as_bool()).unwrap_or(false);

        Ok(WorkflowSpec {
            name,
            nodes,
            connections,
            active,
        })
    }
}

/// Parse one entry of the engine `nodes` array.
fn parse_node(raw: &serde_json::Value) -> Result<WorkflowNode, CoreError> {
    let engine_type = raw
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::Malformed("node is missing required 'type' field".into()))?;

    let kind = NodeKind::from_engine_type(engine_type)
        .ok_or_else(|| CoreError::Malformed(format!("unknown node type '{engine_type}'")))?;

    let display_name = raw
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::Malformed("node is missing required 'name' field".into()))?
        .to_string();

    let id = raw
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let position = raw
        .get("position")
        .and_then(|v| v.as_array())
        .and_then(|arr| {
            let x = arr.first()?.as_i64()?;
            let y = arr.get(1)?.as_i64()?;
            Some((x, y))
        })
        .unwrap_or((0, 0));

    let empty = serde_json::json!({});
    let raw_params = raw.get("parameters").unwrap_or(&empty);
    let parameters = NodeParameters::from_value(kind, raw_params)?;

    let credential = raw
        .get("credentials")
        .and_then(|v| v.as_object())
        .and_then(|creds| creds.iter().next())
        .map(|(cred_type, value)| CredentialRef {
            cred_type: cred_type.clone(),
            name: value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        });

    Ok(WorkflowNode {
        id,
        display_name,
        kind,
        position,
        parameters,
        credential,
    })
}

/// Validate a workflow name (non-empty after trim, within length limits).
pub fn validate_spec_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Workflow name must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_SPEC_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Workflow name must be at most {MAX_SPEC_NAME_LENGTH} characters, got {}",
            trimmed.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
