use serde::Deserialize;

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl PostgrestError {
    pub fn describe(&self) -> String {
        let mut out = self.message.clone().unwrap_or_else(|| "unknown error".to_string());
        if let Some(code) = &self.code {
            out = format!("{} ({})", out, code);
        }
        if let Some(details) = &self.details {
            out = format!("{}: {}", out, details);
        }
        if let Some(hint) = &self.hint {
            out = format!("{} [hint: {}]", out, hint);
        }
        out
    }

    /// Unique and foreign-key violations.
    pub fn is_conflict(&self) -> bool {
        matches!(self.code.as_deref(), Some("23505") | Some("23503"))
    }
}

/// The subset of `GET /auth/v1/user` we rely on.
#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: String,
}
