use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field names shared by every tool
pub const FIELD_PROMPT: &str = "prompt";
pub const FIELD_CUSTOM_MODEL: &str = "custom_model";
pub const FIELD_CONTEXT_WINDOW: &str = "context_window";

const DEFAULT_CONTEXT_WINDOW: &str = "65536";

/// OAuth provider backing a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Slack,
}

impl Provider {
    pub fn prefix(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Slack => "slack",
        }
    }

    /// Cookie and payload key carrying the access token
    pub fn access_token_key(&self) -> String {
        format!("{}_access_token", self.prefix())
    }

    /// Cookie key carrying the token expiry (epoch seconds)
    pub fn expires_key(&self) -> String {
        format!("{}_access_token_expires", self.prefix())
    }

    /// Payload key carrying an uploaded credential file
    pub fn service_account_key(&self) -> String {
        format!("{}_service_account_json", self.prefix())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// What a tool expects when the user bypasses the OAuth session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualKind {
    Token,
    File,
}

/// Tool-specific form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolField {
    /// Name used for persistence and on the command line
    pub name: &'static str,
    /// Key in the job request body
    pub payload_key: &'static str,
    pub default: &'static str,
}

const GOOGLE_DOCS_FIELDS: &[ToolField] = &[ToolField {
    name: "document_id",
    payload_key: "google_document_id",
    default: "195j9eDD3ccgjQRttHhJPymLJUCOUjs-jmwTrekvdjFE",
}];

const SLACK_CHANNEL_FIELDS: &[ToolField] = &[
    ToolField {
        name: "channel",
        payload_key: "slack_channel",
        default: "announcements",
    },
    ToolField {
        name: "days",
        payload_key: "slack_days",
        default: "7",
    },
];

/// Summarizer variant. The identifier doubles as the persistence namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    GoogleDocs,
    SlackChannel,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::GoogleDocs, Tool::SlackChannel];

    pub fn id(&self) -> &'static str {
        match self {
            Tool::GoogleDocs => "GoogleDocs",
            Tool::SlackChannel => "SlackChannel",
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.id()
    }

    pub fn provider(&self) -> Provider {
        match self {
            Tool::GoogleDocs => Provider::Google,
            Tool::SlackChannel => Provider::Slack,
        }
    }

    /// Page the OAuth callback should return to
    pub fn return_page(&self) -> &'static str {
        match self {
            Tool::GoogleDocs => "/google.xhtml",
            Tool::SlackChannel => "/slack.xhtml",
        }
    }

    pub fn manual_kind(&self) -> ManualKind {
        match self {
            Tool::GoogleDocs => ManualKind::File,
            Tool::SlackChannel => ManualKind::Token,
        }
    }

    pub fn default_prompt(&self) -> &'static str {
        match self {
            Tool::GoogleDocs => "Summarize the Google document",
            Tool::SlackChannel => {
                "Summarize 7 days worth of messages from the #announcements channel"
            }
        }
    }

    pub fn fields(&self) -> &'static [ToolField] {
        match self {
            Tool::GoogleDocs => GOOGLE_DOCS_FIELDS,
            Tool::SlackChannel => SLACK_CHANNEL_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static ToolField> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Every persisted field name, shared ones first
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = vec![FIELD_PROMPT, FIELD_CUSTOM_MODEL, FIELD_CONTEXT_WINDOW];
        names.extend(self.fields().iter().map(|f| f.name));
        names
    }

    /// Value restored when nothing has been persisted yet
    pub fn default_value(&self, field: &str) -> Option<&'static str> {
        match field {
            FIELD_PROMPT => Some(self.default_prompt()),
            FIELD_CUSTOM_MODEL => Some(""),
            FIELD_CONTEXT_WINDOW => Some(DEFAULT_CONTEXT_WINDOW),
            other => self.field(other).map(|f| f.default),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "googledocs" | "google" => Ok(Tool::GoogleDocs),
            "slackchannel" | "slack" => Ok(Tool::SlackChannel),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}
