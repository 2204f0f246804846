use serde::Serialize;
use std::collections::BTreeMap;

use super::tool::{Tool, FIELD_CONTEXT_WINDOW, FIELD_CUSTOM_MODEL, FIELD_PROMPT};

/// JSON body sent with a job submission. Built fresh per submission.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestContext {
    pub tool: String,
    pub custom_model: String,
    pub context_window: String,
    pub argument_debugging: bool,
    /// Credential and tool-specific fields
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(tool: Tool, values: &FormValues) -> Self {
        let mut context = Self {
            tool: tool.id().to_string(),
            custom_model: values.custom_model.clone(),
            context_window: values.context_window.clone(),
            argument_debugging: values.argument_debugging,
            fields: BTreeMap::new(),
        };

        for field in tool.fields() {
            if let Some(value) = values.tool_fields.get(field.name) {
                context = context.with_field(field.payload_key, value.clone());
            }
        }

        context
    }

    /// Add an optional field; blank values are omitted
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.insert(key.into(), value);
        }
        self
    }
}

/// Everything needed to create one job
#[derive(Debug, Clone)]
pub struct Submission {
    /// Local correlation id for logs
    pub request_id: String,
    pub prompt: String,
    pub context: RequestContext,
    /// Raw `session` cookie forwarded with the request
    pub session_cookie: Option<String>,
    pub created_at: i64,
}

impl Submission {
    pub fn new(prompt: String, context: RequestContext, session_cookie: Option<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            prompt,
            context,
            session_cookie,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Seconds since the submission was built
    pub fn elapsed_secs(&self) -> i64 {
        (chrono::Utc::now().timestamp() - self.created_at).max(0)
    }
}

/// Current form state for one tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pub prompt: String,
    pub custom_model: String,
    pub context_window: String,
    pub argument_debugging: bool,
    pub tool_fields: BTreeMap<String, String>,
}

impl FormValues {
    /// Value of a persisted field by name
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            FIELD_PROMPT => Some(&self.prompt),
            FIELD_CUSTOM_MODEL => Some(&self.custom_model),
            FIELD_CONTEXT_WINDOW => Some(&self.context_window),
            other => self.tool_fields.get(other).map(String::as_str),
        }
    }
}
