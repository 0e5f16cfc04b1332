//! Draft generation: prompt in, `{subject, body}` out.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DraftError;
use crate::llm::{ChatClient, ChatMessage};

/// Subject used when the model reply carries no `Subject:` line.
pub const DEFAULT_SUBJECT: &str = "Your AI-generated email";

/// Fixed system instruction sent ahead of every prompt.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that writes clear, professional emails. \
Always begin your reply with a line of the form 'Subject: <subject line>', \
followed by a blank line and then the full email body. \
Do not add any commentary before or after the email.";

static SUBJECT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^subject:[ \t]*(.+)$").expect("subject pattern is valid")
});

/// A generated email draft. Transient; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

/// Generates drafts by asking the language model.
#[derive(Debug, Clone)]
pub struct DraftGenerator {
    client: ChatClient,
}

impl DraftGenerator {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Generate a draft for `prompt`.
    ///
    /// Rejects blank prompts without touching the network. Neither the
    /// prompt nor the reply is logged.
    pub async fn generate(&self, prompt: &str) -> Result<Draft, DraftError> {
        if prompt.trim().is_empty() {
            return Err(DraftError::InvalidInput(
                "Prompt is required and must be a non-empty string".into(),
            ));
        }

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let content = self.client.complete(&messages).await?;
        let draft = split_draft(&content);

        tracing::debug!(
            model = self.client.model_name(),
            subject_chars = draft.subject.chars().count(),
            body_chars = draft.body.chars().count(),
            "Draft generated"
        );
        Ok(draft)
    }
}

/// Split model output into subject and body.
///
/// The first line starting with `Subject:` (any case) that carries a
/// non-blank value supplies the subject and is removed from the body.
/// Without one, the whole content is the body.
pub fn split_draft(content: &str) -> Draft {
    let content = content.trim();

    let found = SUBJECT_LINE.captures_iter(content).find_map(|caps| {
        let line = caps.get(0)?;
        let subject = caps.get(1)?.as_str().trim();
        (!subject.is_empty()).then(|| (line.range(), subject.to_string()))
    });

    match found {
        Some((line, subject)) => {
            let mut body = String::with_capacity(content.len());
            body.push_str(&content[..line.start]);
            body.push_str(&content[line.end..]);
            Draft {
                subject,
                body: body.trim().to_string(),
            }
        }
        None => Draft {
            subject: DEFAULT_SUBJECT.to_string(),
            body: content.to_string(),
        },
    }
}
