use crate::config::FilterConfig;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter configuration: {0}")]
    InvalidConfiguration(String),
}

/// Stateless title/flair predicate.
///
/// A post passes when its flair clears the allow-list (if one is set) and its
/// lower-cased title either matches the regex or contains one of the terms.
#[derive(Debug, Clone)]
pub struct PostFilter {
    required_terms: Vec<String>,
    pattern: Option<Regex>,
    allowed_flairs: Option<HashSet<String>>,
}

impl PostFilter {
    pub fn new(config: &FilterConfig) -> Result<Self, FilterError> {
        let required_terms: Vec<String> = config
            .terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        if required_terms.is_empty() {
            return Err(FilterError::InvalidConfiguration(
                "at least one non-blank search term is required".to_string(),
            ));
        }

        // Blank pattern would match every title; treat it as absent.
        let pattern = match config.regex.as_deref() {
            Some(p) if !p.trim().is_empty() => Some(Regex::new(p).map_err(|e| {
                FilterError::InvalidConfiguration(format!("bad regex {:?}: {}", p, e))
            })?),
            _ => None,
        };

        let allowed_flairs = config
            .flairs
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| f.iter().cloned().collect::<HashSet<_>>());

        Ok(Self {
            required_terms,
            pattern,
            allowed_flairs,
        })
    }

    pub fn matches(&self, title: &str, flair: Option<&str>) -> bool {
        if let Some(ref allowed) = self.allowed_flairs {
            match flair {
                Some(f) if allowed.contains(f) => {}
                _ => return false,
            }
        }

        let title = title.to_lowercase();
        if let Some(ref re) = self.pattern {
            if re.is_match(&title) {
                return true;
            }
        }

        self.required_terms.iter().any(|term| title.contains(term.as_str()))
    }

    pub fn terms(&self) -> &[String] {
        &self.required_terms
    }
}
