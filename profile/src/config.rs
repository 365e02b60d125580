use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::synthesizer::DIRECT_TAG;

#[derive(Error, Debug, PartialEq)]
pub enum SelectorError {
    #[error("Empty selector name")]
    EmptyName,

    #[error("Duplicate selector name: {0}")]
    DuplicateName(String),

    #[error("Selector name is reserved: {0}")]
    ReservedName(String),

    #[error("Selector {0} is an auto group and cannot carry services")]
    ServicesOnAuto(String),
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorKind {
    /// Latency tested group (`urltest`).
    Auto,
    /// Manually switched group (`selector`) of keyword matched outbounds.
    KeywordGroup,
}

/// Service route tables that can be pinned to a keyword group.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// OpenAI and Gemini domains, rule sets and Android apps.
    Ai,
}

/// A selector group to synthesize.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SelectorSpec {
    /// Tag of the emitted group outbound.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    /// Restricts membership to outbounds from these upstream URLs. Only
    /// honoured when synthesizing from a snapshot.
    #[serde(default)]
    pub upstreams: Vec<String>,
    /// Case-insensitive substrings matched against outbound tags. An auto
    /// group with no keywords takes every outbound.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl SelectorSpec {
    pub fn auto(name: impl Into<String>) -> Self {
        SelectorSpec {
            name: name.into(),
            kind: SelectorKind::Auto,
            upstreams: Vec::new(),
            keywords: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn keyword_group(name: impl Into<String>, keywords: &[&str]) -> Self {
        SelectorSpec {
            name: name.into(),
            kind: SelectorKind::KeywordGroup,
            upstreams: Vec::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            services: Vec::new(),
        }
    }

    pub fn with_services(mut self, services: &[Service]) -> Self {
        self.services = services.to_vec();
        self
    }

    pub fn with_upstreams(mut self, upstreams: &[&str]) -> Self {
        self.upstreams = upstreams.iter().map(|u| u.to_string()).collect();
        self
    }
}

/// Validates a selector list as a whole.
pub fn validate_selectors(selectors: &[SelectorSpec]) -> Result<(), SelectorError> {
    let mut names = HashSet::new();
    for spec in selectors {
        if spec.name.trim().is_empty() {
            return Err(SelectorError::EmptyName);
        }
        if spec.name == DIRECT_TAG {
            return Err(SelectorError::ReservedName(spec.name.clone()));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(SelectorError::DuplicateName(spec.name.clone()));
        }
        if spec.kind == SelectorKind::Auto && !spec.services.is_empty() {
            return Err(SelectorError::ServicesOnAuto(spec.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        let yaml = r#"
- name: auto-out
  type: auto
- name: ai-proxy
  type: keyword-group
  upstreams:
    - https://sub.example.com/a
  keywords: [jp, us, sg]
  services: [ai]
"#;
        let selectors: Vec<SelectorSpec> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(selectors[0], SelectorSpec::auto("auto-out"));
        assert_eq!(
            selectors[1],
            SelectorSpec::keyword_group("ai-proxy", &["jp", "us", "sg"])
                .with_upstreams(&["https://sub.example.com/a"])
                .with_services(&[Service::Ai])
        );
        assert!(validate_selectors(&selectors).is_ok());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let yaml = "[{name: x, type: fallback}]";
        assert!(serde_yaml::from_str::<Vec<SelectorSpec>>(yaml).is_err());
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            validate_selectors(&[SelectorSpec::auto(" ")]),
            Err(SelectorError::EmptyName)
        );
        assert_eq!(
            validate_selectors(&[SelectorSpec::auto("direct-out")]),
            Err(SelectorError::ReservedName("direct-out".into()))
        );
        assert_eq!(
            validate_selectors(&[
                SelectorSpec::auto("auto"),
                SelectorSpec::keyword_group("auto", &["us"]),
            ]),
            Err(SelectorError::DuplicateName("auto".into()))
        );
        assert_eq!(
            validate_selectors(&[SelectorSpec::auto("auto").with_services(&[Service::Ai])]),
            Err(SelectorError::ServicesOnAuto("auto".into()))
        );
    }
}
