//! Template version parsing and comparison

use std::cmp::Ordering;

use crate::template::Template;
use crate::validation::TemplateValidationError;

/// A parsed `MAJOR[.MINOR[.PATCH]][-PRE][+BUILD]` version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

/// Strictly parse a semantic version string.
///
/// Between one and three numeric components are accepted; missing ones are
/// zero. Build metadata is discarded.
pub fn parse_version(input: &str) -> Result<Version, TemplateValidationError> {
    let invalid = || TemplateValidationError::InvalidVersion(input.to_string());

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core = trimmed.split('+').next().unwrap_or_default();
    let (numbers, pre) = match core.split_once('-') {
        Some((numbers, pre)) if !pre.is_empty() => (numbers, Some(pre.to_string())),
        Some(_) => return Err(invalid()),
        None => (core, None),
    };

    let parts = numbers
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<_>, _>>()?;

    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }

    Ok(Version {
        major: parts[0],
        minor: parts.get(1).copied().unwrap_or(0),
        patch: parts.get(2).copied().unwrap_or(0),
        pre,
    })
}

/// Compare two dotted version strings component by component.
///
/// Missing trailing components count as zero, pre-release and build
/// suffixes are ignored, and a component that is not a number contributes
/// its leading digits (or zero).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = components(a);
    let right = components(b);
    let len = left.len().max(right.len());

    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// A template is compatible with a builder version when it was authored for
/// the same major version and is not newer than the target
pub fn is_compatible(template: &Template, target_version: &str) -> bool {
    let template_major = components(&template.version).first().copied().unwrap_or(0);
    let target_major = components(target_version).first().copied().unwrap_or(0);

    template_major == target_major
        && compare_versions(&template.version, target_version) != Ordering::Greater
}

fn components(version: &str) -> Vec<u64> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let core = version
        .split(['-', '+'])
        .next()
        .unwrap_or_default();

    core.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{TemplateDraft, TemplateId};

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0-beta", "2.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.x", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("1.2.3").unwrap(),
            Version { major: 1, minor: 2, patch: 3, pre: None }
        );
        assert_eq!(parse_version("2").unwrap().minor, 0);
        assert_eq!(parse_version("1.0.0-rc.1+build.5").unwrap().pre.as_deref(), Some("rc.1"));
        assert_eq!(parse_version("v3.1").unwrap().major, 3);

        assert!(parse_version("").is_err());
        assert!(parse_version("1.2.3.4").is_err());
        assert!(parse_version("1.x").is_err());
        assert!(parse_version("1.0-").is_err());
        assert!(parse_version("latest").is_err());
    }

    #[test]
    fn test_is_compatible() {
        let template = Template::from_draft(
            TemplateId::from("t"),
            TemplateDraft::new("T", "basic").version("1.2.0"),
            time::OffsetDateTime::UNIX_EPOCH,
            false,
        );

        assert!(is_compatible(&template, "1.2.0"));
        assert!(is_compatible(&template, "1.5"));
        assert!(!is_compatible(&template, "1.1.9"));
        assert!(!is_compatible(&template, "2.0.0"));
    }
}
