//! linkup-cli - command-line client for the Linkup HTTP API
//!
//! # Subcommands
//! - `request <requester> <target>`               - ask to connect
//! - `respond <edge-id> --actor <m> accept|reject` - answer a pending request
//! - `get <edge-id>`                              - inspect an edge
//! - `friends <member>`                           - accepted connections
//! - `pending <member>`                           - pending incoming requests
//! - `eligible <requester> <target>`              - dry-run reachability check
//! - `send <sender> <receiver> <body>`            - send a message
//! - `inbox <member> [--all]`                     - list received messages
//! - `delete <message-id> --actor <m>`            - soft-delete a message
//! - `status`                                     - show server health
//!
//! Every subcommand accepts `--json` to print the raw response body.

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Url;
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const PREVIEW_CHARS: usize = 72;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "linkup-cli",
    version,
    about = "Linkup connection graph and mailbox CLI"
)]
struct Cli {
    /// Linkup HTTP server URL (overrides LINKUP_HTTP_URL env var)
    #[arg(long, env = "LINKUP_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DecisionArg {
    Accept,
    Reject,
}

impl DecisionArg {
    fn as_str(self) -> &'static str {
        match self {
            DecisionArg::Accept => "accept",
            DecisionArg::Reject => "reject",
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Request a connection from one member to another
    Request { requester: String, target: String },

    /// Accept or reject a pending request (actor must be the target)
    Respond {
        edge_id: String,
        #[arg(long)]
        actor: String,
        #[arg(value_enum)]
        decision: DecisionArg,
    },

    /// Show a single connection edge
    Get { edge_id: String },

    /// List a member's accepted connections
    Friends { member: String },

    /// List pending requests addressed to a member
    Pending { member: String },

    /// Check whether a request would pass the reachability gate
    Eligible { requester: String, target: String },

    /// Send a message
    Send {
        sender: String,
        receiver: String,
        body: String,
    },

    /// List a member's inbox
    Inbox {
        member: String,
        /// Include soft-deleted messages
        #[arg(long)]
        all: bool,
    },

    /// Soft-delete a message (actor must be the receiver)
    Delete {
        message_id: String,
        #[arg(long)]
        actor: String,
    },

    /// Show Linkup server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PendingItem {
    pub edge_id: String,
    pub requester: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PendingResponse {
    pub count: usize,
    pub pending: Vec<PendingItem>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionsResponse {
    pub count: usize,
    pub connections: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    pub sender: String,
    pub body: String,
    pub sent_at: String,
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct InboxResponse {
    pub count: usize,
    pub messages: Vec<InboxMessage>,
}

#[derive(Debug, Deserialize)]
pub struct EdgeView {
    pub id: String,
    pub requester: String,
    pub target: String,
    pub status: String,
    pub created_at: String,
    pub responded_at: Option<String>,
}

// ============================================================================
// Output Formatting (pure)
// ============================================================================

/// One-line preview of a message body: first line, capped at `PREVIEW_CHARS`.
pub fn preview(body: &str) -> String {
    let first = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
    if first.chars().count() > PREVIEW_CHARS || body.lines().filter(|l| !l.trim().is_empty()).count() > 1 {
        out.push('…');
    }
    out
}

pub fn format_connections(member: &str, resp: &ConnectionsResponse) -> Vec<String> {
    if resp.count == 0 {
        return vec![format!("{} has no connections", member)];
    }
    let mut lines = vec![format!("{} connections for {}:", resp.count, member)];
    lines.extend(resp.connections.iter().map(|c| format!("  {}", c)));
    lines
}

pub fn format_pending(member: &str, resp: &PendingResponse) -> Vec<String> {
    if resp.count == 0 {
        return vec![format!("No pending requests for {}", member)];
    }
    let mut lines = vec![format!("{} pending for {}:", resp.count, member)];
    lines.extend(
        resp.pending
            .iter()
            .map(|p| format!("  {}  from {}  ({})", p.edge_id, p.requester, p.created_at)),
    );
    lines
}

pub fn format_inbox(member: &str, resp: &InboxResponse) -> Vec<String> {
    if resp.count == 0 {
        return vec![format!("Inbox for {} is empty", member)];
    }
    let mut lines = vec![format!("{} messages for {}:", resp.count, member)];
    for m in &resp.messages {
        let marker = if m.deleted { " [deleted]" } else { "" };
        lines.push(format!("  {}  {}  from {}{}", m.id, m.sent_at, m.sender, marker));
        lines.push(format!("    {}", preview(&m.body)));
    }
    lines
}

pub fn format_edge(edge: &EdgeView) -> Vec<String> {
    vec![
        format!("Edge:      {}", edge.id),
        format!("Requester: {}", edge.requester),
        format!("Target:    {}", edge.target),
        format!("Status:    {}", edge.status),
        format!("Created:   {}", edge.created_at),
        format!(
            "Responded: {}",
            edge.responded_at.as_deref().unwrap_or("-")
        ),
    ]
}

/// Describe an error body returned by the server.
pub fn describe_error(status: u16, body: &serde_json::Value) -> String {
    let message = body["error"].as_str().unwrap_or("unknown error");
    match body["code"].as_str() {
        Some(code) => format!("server returned {} ({}): {}", status, code, message),
        None => format!("server returned {}: {}", status, message),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

/// Build an API URL under `server`, one path segment per element.
///
/// Segments and query values are percent-encoded, so member ids containing
/// `/`, `?`, `&`, `#` or `%` address the intended resource.
pub fn endpoint(server: &str, segments: &[&str], query: &[(&str, &str)]) -> anyhow::Result<Url> {
    let mut url = Url::parse(server)
        .map_err(|e| anyhow::anyhow!("invalid server URL {}: {}", server, e))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server URL {} cannot take a path", server))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            server: server.to_string(),
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> anyhow::Result<Url> {
        endpoint(&self.server, segments, query)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> anyhow::Result<serde_json::Value> {
        let resp = req
            .send()
            .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", self.server, e))?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!(describe_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.get(self.url(segments, query)?))
    }

    fn post(&self, segments: &[&str], body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.post(self.url(segments, &[])?).json(&body))
    }

    fn delete(&self, segments: &[&str], query: &[(&str, &str)]) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.delete(self.url(segments, query)?))
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let api = Api::new(&cli.server)?;

    let body = match &cli.command {
        Commands::Request { requester, target } => api.post(
            &["connections"],
            serde_json::json!({ "requester": requester, "target": target }),
        )?,
        Commands::Respond {
            edge_id,
            actor,
            decision,
        } => api.post(
            &["connections", edge_id.as_str(), "respond"],
            serde_json::json!({ "actor": actor, "decision": decision.as_str() }),
        )?,
        Commands::Get { edge_id } => api.get(&["connections", edge_id.as_str()], &[])?,
        Commands::Friends { member } => api.get(&["members", member.as_str(), "connections"], &[])?,
        Commands::Pending { member } => api.get(&["members", member.as_str(), "pending"], &[])?,
        Commands::Eligible { requester, target } => {
            api.get(&["members", requester.as_str(), "eligibility", target.as_str()], &[])?
        }
        Commands::Send {
            sender,
            receiver,
            body,
        } => api.post(
            &["messages"],
            serde_json::json!({ "sender": sender, "receiver": receiver, "body": body }),
        )?,
        Commands::Inbox { member, all } => {
            let include_deleted = if *all { "true" } else { "false" };
            api.get(
                &["members", member.as_str(), "inbox"],
                &[("include_deleted", include_deleted)],
            )?
        }
        Commands::Delete { message_id, actor } => {
            api.delete(&["messages", message_id.as_str()], &[("actor", actor.as_str())])?
        }
        Commands::Status => api.get(&["health"], &[])?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match &cli.command {
        Commands::Request { .. } => {
            println!("Requested: {}", body["edge_id"].as_str().unwrap_or("?"));
        }
        Commands::Respond { .. } | Commands::Get { .. } => {
            let edge: EdgeView = serde_json::from_value(body)?;
            print_lines(format_edge(&edge));
        }
        Commands::Friends { member } => {
            let resp: ConnectionsResponse = serde_json::from_value(body)?;
            print_lines(format_connections(member, &resp));
        }
        Commands::Pending { member } => {
            let resp: PendingResponse = serde_json::from_value(body)?;
            print_lines(format_pending(member, &resp));
        }
        Commands::Eligible { requester, target } => {
            let verdict = if body["eligible"].as_bool().unwrap_or(false) {
                "eligible"
            } else {
                "not eligible"
            };
            println!("{} -> {}: {}", requester, target, verdict);
        }
        Commands::Send { .. } => {
            println!("Sent: {}", body["message_id"].as_str().unwrap_or("?"));
        }
        Commands::Inbox { member, .. } => {
            let resp: InboxResponse = serde_json::from_value(body)?;
            print_lines(format_inbox(member, &resp));
        }
        Commands::Delete { message_id, .. } => println!("Deleted: {}", message_id),
        Commands::Status => {
            println!("Linkup server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:       {}", body["backend"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:    {}", pg);
            }
            println!("Socket:        {}", body["socket"].as_str().unwrap_or("?"));
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("linkup-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
