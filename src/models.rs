use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Snippet
///
/// A stored text snippet from the `snippets` table. Also the payload shape
/// handed to the templates, hence the Serialize derive.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

// Lifetimes offered by the creation form, in days.
const EXPIRY_CHOICES: [&str; 3] = ["1", "7", "365"];
const MAX_TITLE_CHARS: usize = 100;

fn default_expires() -> String {
    "365".to_string()
}

/// SnippetForm
///
/// Input payload for the creation form (POST /snippet/create). Deserialized
/// from the urlencoded body and serialized back into the template when the
/// form is re-rendered with validation errors, so submitted values survive a
/// failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_expires")]
    pub expires: String,
}

impl Default for SnippetForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: default_expires(),
        }
    }
}

impl SnippetForm {
    /// validate
    ///
    /// Checks the field rules and returns a field -> message map. An empty map
    /// means the form is acceptable.
    pub fn validate(&self) -> BTreeMap<&'static str, &'static str> {
        let mut errors = BTreeMap::new();

        if self.title.trim().is_empty() {
            errors.insert("title", "This field cannot be blank");
        } else if self.title.chars().count() > MAX_TITLE_CHARS {
            errors.insert("title", "This field is too long (maximum is 100 characters)");
        }

        if self.content.trim().is_empty() {
            errors.insert("content", "This field cannot be blank");
        }

        if !EXPIRY_CHOICES.contains(&self.expires.as_str()) {
            errors.insert("expires", "This field is invalid");
        }

        errors
    }

    /// The validated expiry choice as a day count. Only meaningful after
    /// `validate` returned no errors.
    pub fn expires_days(&self) -> i64 {
        self.expires.parse().unwrap_or(365)
    }
}
