use serde::{Deserialize, Serialize};

use crate::models::Provider;

/// Per-provider settings as they appear in the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Overrides the provider's authorize endpoint
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Everything needed to build the provider's authorize redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub authorize_url: String,
    /// Query parameter carrying the scope (Slack user tokens use `user_scope`)
    pub scope_param: &'static str,
    pub scope: String,
    pub client_id: String,
    pub redirect_uri: Option<String>,
}

impl OAuthConfig {
    pub fn for_provider(provider: Provider, settings: &ProviderSettings) -> Self {
        let (authorize_url, scope_param, scope) = match provider {
            Provider::Google => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "scope",
                "https://www.googleapis.com/auth/documents.readonly",
            ),
            Provider::Slack => (
                "https://slack.com/oauth/v2/authorize",
                "user_scope",
                "channels:history,channels:read,search:read",
            ),
        };

        Self {
            authorize_url: settings
                .authorize_url
                .clone()
                .unwrap_or_else(|| authorize_url.to_string()),
            scope_param,
            scope: settings.scope.clone().unwrap_or_else(|| scope.to_string()),
            client_id: settings.client_id.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        }
    }

    /// Authorize URL whose `state` brings the callback back to `return_page`
    pub fn authorize_request(&self, return_page: &str) -> String {
        let mut params = vec![
            (self.scope_param, self.scope.as_str()),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(redirect_uri) = self.redirect_uri.as_deref() {
            params.push(("redirect_uri", redirect_uri));
        }
        params.push(("response_type", "code"));
        params.push(("state", return_page));

        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.authorize_url, query)
    }
}

/// Sends the user somewhere else (a browser tab, a webview)
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> std::io::Result<()>;
}

/// Opens URLs in the system browser
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> std::io::Result<()> {
        tracing::info!("Opening browser for login");
        open::that(url)
    }
}
