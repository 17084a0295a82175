//! Marketplace manifest parsing.
//!
//! The manifest lives at `.claude-plugin/marketplace.json`:
//!
//! ```json
//! {
//!   "name": "anthropic-agent-skills",
//!   "owner": { "name": "Anthropic" },
//!   "plugins": [
//!     { "name": "pdf", "source": "./skills/pdf", "description": "...", "version": "1.0.0" }
//!   ]
//! }
//! ```
//!
//! Entries missing a required string field are dropped and counted rather
//! than failing the whole manifest.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::types::SkillInfo;

/// Fields every plugin entry must carry as strings.
pub const REQUIRED_FIELDS: [&str; 3] = ["name", "description", "version"];

/// Manifest-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The document is not a JSON object.
    #[error("manifest is not a JSON object")]
    NotAnObject,
    /// `plugins` is missing or not an array.
    #[error("manifest has no 'plugins' array")]
    MissingPlugins,
}

/// Marketplace owner block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ManifestOwner {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Manifest header fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestHeader {
    /// Marketplace name.
    pub name: Option<String>,
    /// Owner block, if well-formed.
    pub owner: Option<ManifestOwner>,
    /// Free-form metadata, kept as JSON.
    pub metadata: Option<Value>,
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedManifest {
    /// Header fields.
    pub header: ManifestHeader,
    /// Valid entries, in manifest order.
    pub skills: Vec<SkillInfo>,
    /// Number of entries dropped.
    pub skipped: usize,
}

/// Parses a manifest document.
///
/// `source` becomes [`SkillInfo::source`] and `repo` [`SkillInfo::repo`] on
/// every entry.
pub fn parse(
    document: &Value,
    source: &str,
    repo: Option<&str>,
) -> Result<ParsedManifest, ManifestError> {
    let object = document.as_object().ok_or(ManifestError::NotAnObject)?;
    let plugins = object
        .get("plugins")
        .and_then(Value::as_array)
        .ok_or(ManifestError::MissingPlugins)?;

    let header = ManifestHeader {
        name: object.get("name").and_then(Value::as_str).map(String::from),
        owner: object
            .get("owner")
            .and_then(|o| serde_json::from_value(o.clone()).ok()),
        metadata: object.get("metadata").cloned(),
    };

    let skills: Vec<SkillInfo> = plugins
        .iter()
        .filter_map(|entry| skill_from_entry(entry, source, repo))
        .collect();
    let skipped = plugins.len() - skills.len();

    Ok(ParsedManifest {
        header,
        skills,
        skipped,
    })
}

fn skill_from_entry(entry: &Value, source: &str, repo: Option<&str>) -> Option<SkillInfo> {
    let field = |key: &str| entry.get(key).and_then(Value::as_str).map(String::from);

    Some(SkillInfo {
        name: field(REQUIRED_FIELDS[0]).filter(|n| !n.is_empty())?,
        description: field(REQUIRED_FIELDS[1])?,
        version: field(REQUIRED_FIELDS[2])?,
        source: source.to_string(),
        repo: repo.map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plugin(name: &str) -> Value {
        json!({
            "name": name,
            "source": format!("./skills/{name}"),
            "description": format!("{name} skill"),
            "version": "1.0.0"
        })
    }

    #[test]
    fn test_parses_header_and_entries() {
        let doc = json!({
            "name": "anthropic-agent-skills",
            "owner": { "name": "Anthropic", "email": "skills@example.com" },
            "metadata": { "description": "Example skills" },
            "plugins": [plugin("pdf"), plugin("docx")]
        });

        let parsed = parse(&doc, "anthropic", Some("https://github.com/anthropics/skills")).unwrap();
        assert_eq!(parsed.header.name.as_deref(), Some("anthropic-agent-skills"));
        assert_eq!(
            parsed.header.owner.unwrap().name.as_deref(),
            Some("Anthropic")
        );
        assert_eq!(parsed.skills.len(), 2);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.skills[0].name, "pdf");
        assert_eq!(parsed.skills[0].source, "anthropic");
        assert_eq!(
            parsed.skills[1].repo.as_deref(),
            Some("https://github.com/anthropics/skills")
        );
    }

    #[test]
    fn test_skips_entries_missing_fields() {
        let mut broken = plugin("broken");
        broken.as_object_mut().unwrap().remove("description");
        let doc = json!({
            "plugins": [plugin("a"), plugin("b"), broken, plugin("c"), plugin("d")]
        });

        let parsed = parse(&doc, "p", None).unwrap();
        assert_eq!(parsed.skills.len(), 4);
        assert_eq!(parsed.skipped, 1);
        assert!(parsed.skills.iter().all(|s| s.name != "broken"));
    }

    #[test]
    fn test_non_string_fields_are_skipped() {
        let doc = json!({
            "plugins": [
                { "name": "n", "description": "d", "version": 2 },
                { "name": "", "description": "d", "version": "1" },
                "not an object"
            ]
        });
        let parsed = parse(&doc, "p", None).unwrap();
        assert!(parsed.skills.is_empty());
        assert_eq!(parsed.skipped, 3);
    }

    #[test]
    fn test_missing_plugins_is_error() {
        assert_eq!(
            parse(&json!({ "name": "x" }), "p", None),
            Err(ManifestError::MissingPlugins)
        );
        assert_eq!(
            parse(&json!({ "plugins": {} }), "p", None),
            Err(ManifestError::MissingPlugins)
        );
        assert_eq!(parse(&json!([1, 2]), "p", None), Err(ManifestError::NotAnObject));
    }

    #[test]
    fn test_malformed_owner_is_ignored() {
        let doc = json!({ "owner": "just a string", "plugins": [] });
        let parsed = parse(&doc, "p", None).unwrap();
        assert!(parsed.header.owner.is_none());
    }
}
