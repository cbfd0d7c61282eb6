//! Prompt templates for Tyrewise.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for answering questions over the manuals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// Assistant instructions.
    pub system: String,
    /// Per-turn message carrying history, retrieved context and the question.
    pub user: String,
    /// Rewrites a follow-up into a standalone question.
    pub condense: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert assistant for mining tire maintenance safety.

- Always answer in the same language as the question.
- If the question is about PPE or EPP, treat it as 'Personal Protective Equipment'.
- If the question is about the manual, link, or URL for an equipment, return the corresponding Manual URL section.
- If the user asks for a chart or graph, generate Python matplotlib graph.
- Use appropriate figure sizes when generating charts (example: figsize=(8, 6)).
- Do not call plt.show() or plt.savefig(), the system will handle saving the figure.
- If the data is not available or in the context, you can say: "I'm sorry, there is not enough data to generate this chart."
- If you generate Python code, include it in a proper markdown ```python ``` block.
- Format the answer using Markdown if appropriate.
- Use numbered lists, bullet points, and bold text where useful.
- Do not use markdown tables.
- If the user says "stop", "exit", "bye", "goodbye", "don't say anything", or similar, respond with: "Goodbye!" and do not provide additional information."#
                .to_string(),

            user: r#"Chat History:
{{chat_history}}

Context:
{{context}}

Question: {{question}}
Answer:"#
                .to_string(),

            condense: r#"Given the following conversation and a follow-up question, rephrase the follow-up question to be a standalone question.

Chat History:
{{chat_history}}

Follow Up Question: {{question}}

Standalone question:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.rag.system.contains("```python"));
        assert!(prompts.rag.user.contains("{{context}}"));
        assert!(prompts.rag.condense.contains("{{chat_history}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut custom = HashMap::new();
        custom.insert("site".to_string(), "North pit".to_string());
        custom.insert("question".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Torque spec?".to_string());

        let rendered = prompts.render_with_custom("{{site}}: {{question}}", &vars);
        assert_eq!(rendered, "North pit: Torque spec?");
    }

    #[test]
    fn test_custom_rag_prompts_loaded_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "system = \"Be brief.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rag.system, "Be brief.");
        assert!(prompts.rag.user.contains("{{question}}"));
    }
}
