use crate::config;
use serde::{Deserialize, Serialize};

/// How a line is cut into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// `<s> <p> <o> .`
    ///
    /// Three angle-bracketed URIs separated by whitespace, optionally followed by
    /// a period. A URI may not contain whitespace or angle brackets. Fragments are
    /// subject, predicate and object with the brackets stripped.
    UriTriple,
    /// `<s> <p> "lexical"@lang .` or `<s> <p> "lexical"^^<datatype> .`
    ///
    /// Subject and predicate as in [`SplitRule::UriTriple`]; the object is a
    /// double-quoted literal that may contain backslash escapes, followed by an
    /// optional language tag or datatype URI, then an optional period. Fragments
    /// are subject, predicate, the unescaped lexical form and the language tag.
    LiteralTriple,
}

/// Which fragment becomes the join key and which the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrder {
    /// Emit (subject, object). Used for label files.
    SubjectObject,
    /// Emit (object, subject). Used for forward link files, keyed on the target.
    ObjectSubject,
}

/// Declarative parsing rules for one family of source files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Substring of the predicate URI that marks relevant lines.
    pub predicate: String,
    /// Lines containing this substring are skipped (redirect/disambiguation markers).
    #[serde(default)]
    pub exclude: Option<String>,
    pub split: SplitRule,
    pub order: KeyOrder,
    /// Accepted language tag for literal objects. Untagged literals always pass.
    #[serde(default)]
    pub locale: Option<String>,
}

impl SourceProfile {
    /// `<wiki page> foaf:primaryTopic <resource>`, keyed on the resource.
    pub fn link_targets() -> Self {
        Self {
            predicate: config::PRIMARY_TOPIC_PREDICATE.to_string(),
            exclude: Some(config::DISAMBIGUATION_MARKER.to_string()),
            split: SplitRule::UriTriple,
            order: KeyOrder::ObjectSubject,
            locale: None,
        }
    }

    /// `<resource> rdfs:label "Label"@en`, keyed on the resource.
    pub fn labels() -> Self {
        Self {
            predicate: config::LABEL_PREDICATE.to_string(),
            exclude: Some(config::DISAMBIGUATION_MARKER.to_string()),
            split: SplitRule::LiteralTriple,
            order: KeyOrder::SubjectObject,
            locale: Some(config::DEFAULT_LOCALE.to_string()),
        }
    }

    /// `<resource> dbo:wikiPageWikiLink <resource>`, as (source, target).
    pub fn page_links() -> Self {
        Self {
            predicate: config::WIKI_LINK_PREDICATE.to_string(),
            exclude: Some(config::DISAMBIGUATION_MARKER.to_string()),
            split: SplitRule::UriTriple,
            order: KeyOrder::SubjectObject,
            locale: None,
        }
    }

    /// `<resource> dct:subject <Category:X>`, keyed on the category.
    pub fn categories() -> Self {
        Self {
            predicate: config::CATEGORY_PREDICATE.to_string(),
            exclude: Some(config::DISAMBIGUATION_MARKER.to_string()),
            split: SplitRule::UriTriple,
            order: KeyOrder::ObjectSubject,
            locale: None,
        }
    }

    /// Stable textual form, used to invalidate checkpoints when rules change.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{:?}|{:?}|{}",
            self.predicate,
            self.exclude.as_deref().unwrap_or(""),
            self.split,
            self.order,
            self.locale.as_deref().unwrap_or("")
        )
    }
}

/// The full table of profiles, one per source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(default = "SourceProfile::link_targets")]
    pub link_targets: SourceProfile,
    #[serde(default = "SourceProfile::labels")]
    pub labels: SourceProfile,
    #[serde(default = "SourceProfile::page_links")]
    pub page_links: SourceProfile,
    #[serde(default = "SourceProfile::categories")]
    pub categories: SourceProfile,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            link_targets: SourceProfile::link_targets(),
            labels: SourceProfile::labels(),
            page_links: SourceProfile::page_links(),
            categories: SourceProfile::categories(),
        }
    }
}
