use crate::error::{RagError, Result};
use std::collections::HashMap;
use std::fmt;

/// A text template with `{{name}}` placeholders.
///
/// Placeholders may carry surrounding spaces and a leading dot, so
/// `{{ .query }}` and `{{query}}` name the same input. Values come from, in
/// order of precedence: the inputs passed to [`format`](Self::format), the
/// inputs set with [`with_inputs`](Self::with_inputs), then the defaults.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplate {
    template: String,
    inputs: HashMap<String, String>,
    defaults: HashMap<String, String>,
    rendered: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        PromptTemplate {
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn with_inputs(mut self, inputs: HashMap<String, String>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_defaults(mut self, defaults: HashMap<String, String>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Render the template and keep the result for [`as_str`](Self::as_str)
    pub fn format(&mut self, inputs: &HashMap<String, String>) -> Result<()> {
        self.rendered = self.render(inputs)?;
        Ok(())
    }

    /// Render without storing the result
    pub fn render(&self, inputs: &HashMap<String, String>) -> Result<String> {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find("{{") {
            let Some(close) = rest[open + 2..].find("}}") else {
                break;
            };

            output.push_str(&rest[..open]);
            let name = placeholder_name(&rest[open + 2..open + 2 + close]);
            output.push_str(self.lookup(name, inputs)?);
            rest = &rest[open + 2 + close + 2..];
        }

        // Whatever is left has no complete placeholder
        output.push_str(rest);
        Ok(output)
    }

    /// The last rendered prompt; empty before [`format`](Self::format) succeeds
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    fn lookup<'a>(&'a self, name: &str, inputs: &'a HashMap<String, String>) -> Result<&'a str> {
        inputs
            .get(name)
            .or_else(|| self.inputs.get(name))
            .or_else(|| self.defaults.get(name))
            .map(String::as_str)
            .ok_or_else(|| RagError::MissingInput(name.to_string()))
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

fn placeholder_name(raw: &str) -> &str {
    let name = raw.trim();
    name.strip_prefix('.').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_context_and_query() {
        let mut prompt = PromptTemplate::new("Context:\n{{context}}\n\nQuestion: {{query}}")
            .with_inputs(inputs(&[("query", "Q"), ("context", "C")]));

        prompt.format(&HashMap::new()).unwrap();
        assert_eq!(prompt.as_str(), "Context:\nC\n\nQuestion: Q");
        assert_eq!(prompt.to_string(), "Context:\nC\n\nQuestion: Q");
    }

    #[test]
    fn missing_input_is_reported_by_name() {
        let mut prompt = PromptTemplate::new("Context:\n{{context}}\n\nQuestion: {{query}}")
            .with_inputs(inputs(&[("query", "Q")]));

        let err = prompt.format(&HashMap::new()).unwrap_err();
        assert!(matches!(err, RagError::MissingInput(ref name) if name == "context"));
        assert_eq!(prompt.as_str(), "");
    }

    #[test]
    fn defaults_fill_gaps_and_inputs_take_precedence() {
        let prompt = PromptTemplate::new("{{greeting}}, {{ .name }}!")
            .with_inputs(inputs(&[("name", "preset")]))
            .with_defaults(inputs(&[("greeting", "Hello"), ("name", "default")]));

        assert_eq!(prompt.render(&HashMap::new()).unwrap(), "Hello, preset!");
        assert_eq!(
            prompt.render(&inputs(&[("name", "override")])).unwrap(),
            "Hello, override!"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let prompt = PromptTemplate::new("{{a}} and {{b");
        assert_eq!(
            prompt.render(&inputs(&[("a", "x")])).unwrap(),
            "x and {{b"
        );
    }

    #[test]
    fn values_are_not_rescanned() {
        let prompt = PromptTemplate::new("{{a}}");
        assert_eq!(
            prompt.render(&inputs(&[("a", "{{b}}")])).unwrap(),
            "{{b}}"
        );
    }
}
