//! Resource backed by a plain-text document, answered through an LM.

use std::path::Path;
use std::sync::Arc;

use crate::lm::{ChatMessage, LanguageModel};
use crate::template::fill;

use super::{Resource, ResourceError, ResourceResult, words};

const RESOURCE_QA_PROMPT: &str = "\
Within {n_words} words, please answer the following question:

```
{question}
```

DO NOT include in your answer any examples/facts/numbers not concretely mentioned in your informational resource.
";

/// A document held in memory. Questions are answered by an LM that is
/// shown the whole document as system context.
pub struct TextResource {
    unique_name: String,
    name: String,
    text: String,
    lm: Arc<dyn LanguageModel>,
}

impl TextResource {
    pub fn new(
        unique_name: impl Into<String>,
        name: impl Into<String>,
        text: impl Into<String>,
        lm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            unique_name: unique_name.into(),
            name: name.into(),
            text: text.into(),
            lm,
        }
    }

    /// Load a document from disk. The file stem becomes the display name.
    pub fn from_file(
        unique_name: impl Into<String>,
        path: &Path,
        lm: Arc<dyn LanguageModel>,
    ) -> ResourceResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ResourceError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(unique_name, name, text, lm))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn context_message(&self) -> ChatMessage {
        ChatMessage::system(format!(
            "You are an informational resource named \"{}\". \
             Your entire content is the following document:\n\n```\n{}\n```",
            self.name, self.text
        ))
    }
}

impl Resource for TextResource {
    fn unique_name(&self) -> &str {
        &self.unique_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn answer(&self, question: &str, n_words: usize) -> ResourceResult<String> {
        let prompt = fill(
            RESOURCE_QA_PROMPT,
            &[("n_words", &words(n_words)), ("question", question)],
        );
        Ok(self.lm.get_response(&prompt, &[self.context_message()])?)
    }
}

impl std::fmt::Debug for TextResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextResource")
            .field("unique_name", &self.unique_name)
            .field("name", &self.name)
            .field("text_len", &self.text.len())
            .finish()
    }
}
