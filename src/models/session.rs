use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::tool::Provider;
use crate::error::DecodeError;

/// Decoded provider credential carried by the `session` cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    /// Unix epoch seconds
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Non-empty token that has not reached its expiry
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.access_token.is_empty() && self.expires_at.map_or(true, |exp| exp > now)
    }

    /// Decode a cookie value: base64 of a JSON object keyed by provider.
    ///
    /// Returns `Ok(None)` when the object carries no token for `provider`.
    /// The expiry may arrive as a number or as a numeric string; any other
    /// expiry value is an error, never a session without expiry.
    pub fn decode(provider: Provider, raw: &str) -> Result<Option<Self>, DecodeError> {
        let raw = raw.trim().trim_matches('"');
        let bytes = STANDARD.decode(raw)?;
        let object: Map<String, Value> = serde_json::from_slice(&bytes)?;

        let access_token = match object.get(&provider.access_token_key()) {
            Some(Value::String(token)) => token.clone(),
            _ => return Ok(None),
        };

        let expires_at = match object.get(&provider.expires_key()) {
            None => None,
            Some(value) => Some(parse_expiry(value)?),
        };

        Ok(Some(Self {
            access_token,
            expires_at,
        }))
    }

    /// Encode in the same shape the backend's OAuth callback produces
    pub fn encode(&self, provider: Provider) -> String {
        let mut object = Map::new();
        object.insert(
            provider.access_token_key(),
            Value::String(self.access_token.clone()),
        );
        if let Some(expires_at) = self.expires_at {
            object.insert(provider.expires_key(), Value::String(expires_at.to_string()));
        }
        STANDARD.encode(Value::Object(object).to_string())
    }
}

/// Whole epoch seconds; fractional values round down
fn parse_expiry(value: &Value) -> Result<i64, DecodeError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.floor() as i64)
            })
        }
        _ => None,
    };
    parsed.ok_or_else(|| DecodeError::Expiry(value.to_string()))
}

/// How the job request is authenticated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialMode {
    #[default]
    SessionBased,
    ManualToken,
}

/// Secret supplied directly instead of through the OAuth session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ManualCredential {
    #[default]
    None,
    Token(String),
    File(PathBuf),
}

impl ManualCredential {
    pub fn is_present(&self) -> bool {
        match self {
            ManualCredential::None => false,
            ManualCredential::Token(token) => !token.trim().is_empty(),
            ManualCredential::File(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn test_decode_numeric_string_expiry() {
        let raw = cookie(r#"{"google_access_token":"abc","google_access_token_expires":"1700000000"}"#);
        let session = Session::decode(Provider::Google, &raw).unwrap().unwrap();
        assert_eq!(session.access_token, "abc");
        assert_eq!(session.expires_at, Some(1_700_000_000));
    }

    #[test]
    fn test_decode_integer_expiry() {
        let raw = cookie(r#"{"slack_access_token":"xoxp","slack_access_token_expires":42}"#);
        let session = Session::decode(Provider::Slack, &raw).unwrap().unwrap();
        assert_eq!(session.expires_at, Some(42));
    }

    #[test]
    fn test_unreadable_expiry_is_rejected() {
        for expires in [r#""garbage""#, "null", "true", r#"{"at":1}"#] {
            let raw = cookie(&format!(
                r#"{{"google_access_token":"t","google_access_token_expires":{}}}"#,
                expires
            ));
            assert!(
                matches!(Session::decode(Provider::Google, &raw), Err(DecodeError::Expiry(_))),
                "expiry {} should not decode",
                expires
            );
        }
    }

    #[test]
    fn test_fractional_expiry_rounds_down() {
        let raw = cookie(r#"{"google_access_token":"t","google_access_token_expires":1600000000.9}"#);
        let session = Session::decode(Provider::Google, &raw).unwrap().unwrap();
        assert_eq!(session.expires_at, Some(1_600_000_000));
        assert!(!session.is_valid_at(1_700_000_000));

        let raw = cookie(r#"{"google_access_token":"t","google_access_token_expires":"1600000000.0"}"#);
        let session = Session::decode(Provider::Google, &raw).unwrap().unwrap();
        assert!(!session.is_valid_at(1_700_000_000));
    }

    #[test]
    fn test_missing_expiry_never_expires() {
        let raw = cookie(r#"{"google_access_token":"t"}"#);
        let session = Session::decode(Provider::Google, &raw).unwrap().unwrap();
        assert_eq!(session.expires_at, None);
    }

    #[test]
    fn test_decode_other_provider_is_absent() {
        let raw = cookie(r#"{"slack_access_token":"xoxp"}"#);
        assert!(Session::decode(Provider::Google, &raw).unwrap().is_none());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            Session::decode(Provider::Google, "%%%not-base64"),
            Err(DecodeError::Base64(_))
        ));
        assert!(matches!(
            Session::decode(Provider::Google, &cookie("not json")),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_encode_decode() {
        let session = Session::new("token", Some(100));
        let decoded = Session::decode(Provider::Google, &session.encode(Provider::Google))
            .unwrap()
            .unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_validity() {
        assert!(Session::new("t", None).is_valid_at(1_000));
        assert!(Session::new("t", Some(1_001)).is_valid_at(1_000));
        assert!(!Session::new("t", Some(1_000)).is_valid_at(1_000));
        assert!(!Session::new("t", Some(999)).is_valid_at(1_000));
        assert!(!Session::new("", Some(5_000)).is_valid_at(1_000));
    }

    #[test]
    fn test_manual_credential_presence() {
        assert!(!ManualCredential::None.is_present());
        assert!(!ManualCredential::Token("   ".to_string()).is_present());
        assert!(ManualCredential::Token("xoxb".to_string()).is_present());
        assert!(ManualCredential::File(PathBuf::from("sa.json")).is_present());
    }
}
