//! Metadata submission
//!
//! `version` values are split into their parts; any other metadata name is
//! forwarded verbatim.

use crate::error::{TransformError, TransformerError};
use crate::params::Params;
use once_cell::sync::Lazy;
use querymeter_core::MetricSink;
use regex::Regex;

static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v?(?P<major>0|[1-9]\d*)\.(?P<minor>0|[1-9]\d*)\.(?P<patch>0|[1-9]\d*)(?:-(?P<release>(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+(?P<build>[0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("Invalid semver regex")
});

const SEMVER_PARTS: [&str; 5] = ["major", "minor", "patch", "release", "build"];

/// How a `version` value is split.
#[derive(Debug, Clone)]
pub enum VersionScheme {
    Semver,
    /// Named capture groups become `version.<group>`.
    Regex(Regex),
}

impl PartialEq for VersionScheme {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VersionScheme::Semver, VersionScheme::Semver) => true,
            (VersionScheme::Regex(a), VersionScheme::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl VersionScheme {
    pub fn compile(params: Params<'_>) -> Result<Self, TransformerError> {
        match params.optional_str("scheme")?.unwrap_or("semver") {
            "semver" => Ok(VersionScheme::Semver),
            "regex" => {
                let pattern = params.non_empty_str("pattern")?;
                Regex::new(pattern)
                    .map(VersionScheme::Regex)
                    .map_err(|e| TransformerError::InvalidPattern(e.to_string()))
            }
            other => Err(TransformerError::UnknownScheme(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VersionScheme::Semver => "semver",
            VersionScheme::Regex(_) => "regex",
        }
    }

    /// `(part, value)` pairs including `raw` and `scheme`.
    pub fn parse(&self, raw: &str) -> Result<Vec<(String, String)>, TransformError> {
        let mismatch = || TransformError::Version {
            raw: raw.to_string(),
            scheme: self.name(),
        };
        let mut parts = Vec::new();
        match self {
            VersionScheme::Semver => {
                let captures = SEMVER.captures(raw.trim()).ok_or_else(mismatch)?;
                for part in SEMVER_PARTS {
                    if let Some(m) = captures.name(part) {
                        parts.push((part.to_string(), m.as_str().to_string()));
                    }
                }
            }
            VersionScheme::Regex(pattern) => {
                let captures = pattern.captures(raw).ok_or_else(mismatch)?;
                for group in pattern.capture_names().flatten() {
                    if let Some(m) = captures.name(group) {
                        parts.push((group.to_string(), m.as_str().to_string()));
                    }
                }
            }
        }
        parts.push(("raw".to_string(), raw.to_string()));
        parts.push(("scheme".to_string(), self.name().to_string()));
        Ok(parts)
    }
}

/// Submit `version.*` entries for `raw`.
pub fn submit_version(
    sink: &dyn MetricSink,
    entity: &str,
    scheme: &VersionScheme,
    raw: &str,
) -> Result<(), TransformError> {
    for (part, value) in scheme.parse(raw)? {
        sink.submit_metadata(entity, &format!("version.{}", part), &value);
    }
    Ok(())
}
