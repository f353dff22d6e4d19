//! Known embedded-text layouts.

use regex::Regex;
use tracing::debug;

use crate::error::{DocsortError, Result};
use crate::models::TemplateConfig;

use super::text::normalize_number;

/// Fields captured by a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    pub template: String,
    pub issuer: String,
    pub number: Option<String>,
}

#[derive(Debug, Clone)]
struct CompiledTemplate {
    name: String,
    issuer: Regex,
    number: Regex,
    issuer_name: Option<String>,
}

/// Compiled set of templates, tried in configuration order.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<CompiledTemplate>,
}

impl TemplateSet {
    pub fn compile(configs: &[TemplateConfig]) -> Result<Self> {
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                DocsortError::Config(format!("template {}: invalid pattern: {}", name, e))
            })
        };

        let templates = configs
            .iter()
            .map(|c| {
                Ok(CompiledTemplate {
                    name: c.name.clone(),
                    issuer: compile(&c.name, &c.issuer_pattern)?,
                    number: compile(&c.name, &c.number_pattern)?,
                    issuer_name: c.issuer_name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { templates })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// First template whose issuer pattern matches the text.
    pub fn match_text(&self, text: &str) -> Option<TemplateMatch> {
        for template in &self.templates {
            let Some(caps) = template.issuer.captures(text) else {
                continue;
            };

            let issuer = match &template.issuer_name {
                Some(name) => name.clone(),
                None => caps
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            };

            let number = template
                .number
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| normalize_number(m.as_str()));

            debug!("Template {} matched (number: {:?})", template.name, number);

            return Some(TemplateMatch {
                template: template.name.clone(),
                issuer,
                number,
            });
        }
        None
    }
}
