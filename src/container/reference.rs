//! Image reference parsing.
//!
//! Splits `repository[:tag]` into its parts and checks them against the
//! naming rules the daemon enforces, so bad names are rejected before a
//! commit is attempted.

use crate::container::{ContainerError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Tag applied when a reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

const MAX_REPOSITORY_LEN: usize = 255;

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?$",
    )
    .expect("static domain pattern")
});

static PATH_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("static path pattern")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("static tag pattern")
});

/// A validated `repository:tag` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Parse and validate an image name such as `my-env`, `my-env:v1` or
    /// `registry.local:5000/team/env:v2`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidReference`] describing the first rule
    /// the name breaks.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: &str| ContainerError::InvalidReference(format!("{name}: {reason}"));

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.contains('@') {
            return Err(invalid("digests cannot be used as commit targets"));
        }

        let last_slash = name.rfind('/');
        let (repository, tag) = match name.rfind(':') {
            Some(colon) if last_slash.is_none_or(|slash| colon > slash) => {
                (&name[..colon], &name[colon + 1..])
            }
            _ => (name, DEFAULT_TAG),
        };

        if !TAG.is_match(tag) {
            return Err(invalid(
                "tag must be 1-128 characters of letters, digits, '_', '.' or '-' and not start with '.' or '-'",
            ));
        }
        if repository.is_empty() {
            return Err(invalid("repository is empty"));
        }
        if repository.len() > MAX_REPOSITORY_LEN {
            return Err(invalid("repository is longer than 255 characters"));
        }

        let mut components: Vec<&str> = repository.split('/').collect();
        if components.len() > 1 && looks_like_domain(components[0]) {
            let domain = components.remove(0);
            if !DOMAIN.is_match(domain) {
                return Err(invalid("registry host is malformed"));
            }
        }
        for component in components {
            if !PATH_COMPONENT.is_match(component) {
                return Err(invalid(
                    "repository must be lowercase letters and digits separated by '.', '_', '__' or '-'",
                ));
            }
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Repository part, including any registry host.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Tag part.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Split an image name into the `(image, tag)` pair the pull API expects.
///
/// Digest references are passed through whole with an empty tag; names
/// without a tag get [`DEFAULT_TAG`] so a pull never fetches every tag.
pub fn pull_target(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    let last_slash = image.rfind('/');
    match image.rfind(':') {
        Some(colon) if last_slash.is_none_or(|slash| colon > slash) => {
            (&image[..colon], &image[colon + 1..])
        }
        _ => (image, DEFAULT_TAG),
    }
}

fn looks_like_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tag() {
        let reference = ImageReference::parse("my-python-env").unwrap();
        assert_eq!(reference.repository(), "my-python-env");
        assert_eq!(reference.tag(), "latest");
        assert_eq!(reference.to_string(), "my-python-env:latest");
    }

    #[test]
    fn test_explicit_tag() {
        let reference = ImageReference::parse("my-python-env:v1").unwrap();
        assert_eq!(reference.repository(), "my-python-env");
        assert_eq!(reference.tag(), "v1");
    }

    #[test]
    fn test_registry_port_is_not_a_tag() {
        let reference = ImageReference::parse("localhost:5000/team/env").unwrap();
        assert_eq!(reference.repository(), "localhost:5000/team/env");
        assert_eq!(reference.tag(), "latest");

        let reference = ImageReference::parse("registry.example.com:5000/env:2024.1").unwrap();
        assert_eq!(reference.repository(), "registry.example.com:5000/env");
        assert_eq!(reference.tag(), "2024.1");
    }

    #[test]
    fn test_pull_target() {
        assert_eq!(pull_target("alpine"), ("alpine", "latest"));
        assert_eq!(pull_target("python:3.12-slim"), ("python", "3.12-slim"));
        assert_eq!(
            pull_target("localhost:5000/env"),
            ("localhost:5000/env", "latest")
        );
        assert_eq!(
            pull_target("alpine@sha256:0123abcd"),
            ("alpine@sha256:0123abcd", "")
        );
    }

    #[test]
    fn test_rejects_uppercase_repository() {
        let err = ImageReference::parse("MyEnv:v1").unwrap_err();
        assert!(matches!(err, ContainerError::InvalidReference(_)));
    }

    #[test]
    fn test_rejects_bad_tags_and_shapes() {
        for name in [
            "",
            "env:",
            "env:-bad",
            "env:has space",
            ":v1",
            "env//double",
            "env@sha256:abcdef",
            "team/-leading",
        ] {
            assert!(
                ImageReference::parse(name).is_err(),
                "expected {name:?} to be rejected"
            );
        }
    }
}
