//! Text auto-formatting
//!
//! Turns author prose into markup. Without rules the text is only escaped.
//! With rules, configured tokens are located in the *unescaped* text and
//! replaced by opaque placeholders carrying their finished wrapper markup;
//! only afterwards is the remaining plain text escaped and the placeholders
//! substituted back. Rule markup is therefore never escaped, and escaping never
//! disturbs token boundaries.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Default word-character class; a match may not touch these on either side
pub const DEFAULT_BOUNDARY: &str = "A-Za-z0-9";

static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("valid tag name pattern"));
static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("valid markup pattern"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);")
        .expect("valid entity pattern")
});

/// Errors raised while loading formatting rules
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("formatting rules are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule {index} is malformed: {message}")]
    MalformedRule { index: usize, message: String },

    #[error("rule {index} has no tokens")]
    NoTokens { index: usize },

    #[error("rule {index} has an invalid boundary class: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: regex::Error,
    },
}

/// Escape HTML special characters
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Extract the visible text of a markup fragment
///
/// Tags and comments are dropped and character references decoded. This is a
/// text extractor for sort values, not a validating parser.
pub fn strip_markup(markup: &str) -> String {
    let without_tags = MARKUP_TAG.replace_all(markup, "");
    ENTITY
        .replace_all(&without_tags, |caps: &regex::Captures| {
            let name = &caps[1];
            match name {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => "\u{a0}".to_string(),
                _ => decode_numeric_reference(name).unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

fn decode_numeric_reference(reference: &str) -> Option<String> {
    let digits = reference.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(String::from)
}

/// The formatting rules document: `{ "rules": [...] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormattingDocument {
    #[serde(default)]
    pub rules: Vec<serde_json::Value>,
}

/// A single token rule as written by the document author
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingRule {
    /// Literal words to wrap
    #[serde(alias = "words")]
    pub tokens: Vec<String>,

    /// Wrapper element name
    #[serde(default, alias = "tagName")]
    pub tag: Option<String>,

    /// Replacement markup with a `{text}` slot; takes precedence over `tag`
    #[serde(default, alias = "replacement", alias = "replacementTemplate")]
    pub template: Option<String>,

    /// Class applied to the wrapper element
    #[serde(default, alias = "class")]
    pub class_name: Option<String>,

    /// Extra attributes applied to the wrapper element
    #[serde(default, alias = "attrs")]
    pub attributes: BTreeMap<String, String>,

    /// Character class (regex class body) of characters that may not touch a match
    #[serde(default, alias = "boundaryCharacters")]
    pub boundary: Option<String>,

    /// Match tokens regardless of case
    #[serde(default, alias = "ignoreCase")]
    pub case_insensitive: bool,
}

/// How a matched token is turned into markup
#[derive(Debug, Clone)]
enum Wrapper {
    Template(String),
    Tag { open: String, close: String },
}

impl Wrapper {
    fn from_rule(rule: &FormattingRule) -> Self {
        if let Some(template) = &rule.template {
            return Wrapper::Template(template.clone());
        }

        let tag = match rule.tag.as_deref() {
            Some(tag) if TAG_NAME.is_match(tag) => tag.to_ascii_lowercase(),
            Some(tag) => {
                log::warn!("Formatting rule uses invalid tag name '{}', using span", tag);
                "span".to_string()
            }
            None => "span".to_string(),
        };

        let mut open = format!("<{}", tag);
        if let Some(class_name) = &rule.class_name {
            open.push_str(&format!(" class=\"{}\"", escape_html(class_name)));
        }
        for (name, value) in &rule.attributes {
            if !TAG_NAME.is_match(name) {
                log::warn!("Formatting rule skips invalid attribute name '{}'", name);
                continue;
            }
            open.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
        }
        open.push('>');

        Wrapper::Tag {
            open,
            close: format!("</{}>", tag),
        }
    }

    fn wrap(&self, matched: &str) -> String {
        let text = escape_html(matched);
        match self {
            Wrapper::Template(template) => template.replace("{text}", &text),
            Wrapper::Tag { open, close } => format!("{}{}{}", open, text, close),
        }
    }
}

/// A rule compiled into a matcher
#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: Regex,
    wrapper: Wrapper,
}

impl CompiledRule {
    fn compile(index: usize, rule: &FormattingRule) -> Result<Self, FormatError> {
        let mut tokens: Vec<&str> = rule
            .tokens
            .iter()
            .map(String::as_str)
            .filter(|token| !token.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(FormatError::NoTokens { index });
        }

        // Longest first so a token never loses to one of its own prefixes
        tokens.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        tokens.dedup();

        let boundary = rule.boundary.as_deref().unwrap_or(DEFAULT_BOUNDARY);
        let alternatives = tokens
            .iter()
            .map(|token| regex::escape(token))
            .collect::<Vec<_>>()
            .join("|");

        // The suffix is consumed rather than looked ahead at; matching resumes
        // at the end of the token so the suffix character stays available as
        // the next prefix.
        let source = format!(
            "(?:^|[^{b}])({alts})(?:[^{b}]|$)",
            b = boundary,
            alts = alternatives
        );
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(rule.case_insensitive)
            .build()
            .map_err(|source| FormatError::Pattern { index, source })?;

        Ok(Self {
            pattern,
            wrapper: Wrapper::from_rule(rule),
        })
    }

    /// Split every plain segment around this rule's matches
    fn apply(&self, segments: Vec<Segment>) -> Vec<Segment> {
        let mut out = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Plain(text) => self.split_plain(&text, &mut out),
                placeholder => out.push(placeholder),
            }
        }
        out
    }

    fn split_plain(&self, text: &str, out: &mut Vec<Segment>) {
        let mut position = 0;
        let mut emitted = 0;
        while position < text.len() {
            let Some(caps) = self.pattern.captures_at(text, position) else {
                break;
            };
            let Some(token) = caps.get(1) else {
                break;
            };
            if token.start() > emitted {
                out.push(Segment::Plain(text[emitted..token.start()].to_string()));
            }
            out.push(Segment::Placeholder(self.wrapper.wrap(token.as_str())));
            emitted = token.end();
            position = token.end();
        }
        if emitted < text.len() {
            out.push(Segment::Plain(text[emitted..].to_string()));
        }
    }
}

/// Intermediate text representation during formatting
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Unescaped author text still open to matching
    Plain(String),
    /// Finished markup; opaque to later rules and to escaping
    Placeholder(String),
}

/// Formatter built from an ordered rule list
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    rules: Vec<CompiledRule>,
}

impl TextFormatter {
    /// A formatter without rules; it only escapes
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile rules in order, skipping (and logging) any that cannot be used
    pub fn from_rules(rules: &[FormattingRule]) -> Self {
        let compiled = rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| match CompiledRule::compile(index, rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    log::warn!("Skipping formatting rule: {}", e);
                    None
                }
            })
            .collect();
        Self { rules: compiled }
    }

    /// Parse a formatting rules document
    ///
    /// A document that is not JSON is an error; individual malformed rules are
    /// skipped with a warning.
    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        let document: FormattingDocument = serde_json::from_str(json)?;
        let rules: Vec<FormattingRule> = document
            .rules
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    let error = FormatError::MalformedRule {
                        index,
                        message: e.to_string(),
                    };
                    log::warn!("Skipping formatting rule: {}", error);
                    None
                }
            })
            .collect();
        Ok(Self::from_rules(&rules))
    }

    /// Number of usable rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Render `text` as markup
    pub fn format(&self, text: &str, auto_format: bool) -> String {
        if !auto_format || self.rules.is_empty() {
            return escape_html(text);
        }

        let mut segments = vec![Segment::Plain(text.to_string())];
        for rule in &self.rules {
            segments = rule.apply(segments);
        }

        let mut out = String::with_capacity(text.len());
        for segment in segments {
            match segment {
                Segment::Plain(plain) => out.push_str(&escape_html(&plain)),
                Segment::Placeholder(markup) => out.push_str(&markup),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(tokens: &[&str]) -> FormattingRule {
        FormattingRule {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            tag: Some("strong".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<div>"), "&lt;div&gt;");
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("\"quoted\""), "&quot;quoted&quot;");
        assert_eq!(escape_html("it's"), "it&#39;s");
    }

    #[test]
    fn test_without_rules_only_escapes() {
        let formatter = TextFormatter::empty();
        assert_eq!(formatter.format("a < b & c", true), "a &lt; b &amp; c");
    }

    #[test]
    fn test_auto_format_disabled_only_escapes() {
        let formatter = TextFormatter::from_rules(&[rule(&["Heat"])]);
        assert_eq!(formatter.format("Heat & <x>", false), "Heat &amp; &lt;x&gt;");
    }

    #[test]
    fn test_longest_token_wins() {
        // Arrange: a token that is a prefix of another
        let formatter = TextFormatter::from_rules(&[rule(&["Heat", "Heat Gain"])]);

        // Act
        let html = formatter.format("Heat Gain rises", true);

        // Assert: the longer token is wrapped as one unit
        assert_eq!(html, "<strong>Heat Gain</strong> rises");
    }

    #[test]
    fn test_shorter_token_used_when_longer_fails_boundary() {
        let formatter = TextFormatter::from_rules(&[rule(&["Heat", "Heat Gain"])]);
        assert_eq!(
            formatter.format("Heat Gainer", true),
            "<strong>Heat</strong> Gainer"
        );
    }

    #[test]
    fn test_whole_word_matching() {
        let formatter = TextFormatter::from_rules(&[rule(&["Heat"])]);
        assert_eq!(formatter.format("Heated Heat2 Heat", true), "Heated Heat2 <strong>Heat</strong>");
    }

    #[test]
    fn test_adjacent_matches() {
        let formatter = TextFormatter::from_rules(&[rule(&["AB"])]);
        assert_eq!(
            formatter.format("AB AB,AB", true),
            "<strong>AB</strong> <strong>AB</strong>,<strong>AB</strong>"
        );
    }

    #[test]
    fn test_text_around_matches_is_escaped_but_markup_is_not() {
        let formatter = TextFormatter::from_rules(&[rule(&["R&D"])]);
        assert_eq!(
            formatter.format("<R&D> & more", true),
            "&lt;<strong>R&amp;D</strong>&gt; &amp; more"
        );
    }

    #[test]
    fn test_later_rules_do_not_match_inside_earlier_markup() {
        let first = FormattingRule {
            tokens: vec!["Super Jump".to_string()],
            class_name: Some("move".to_string()),
            ..Default::default()
        };
        let second = FormattingRule {
            tokens: vec!["Jump".to_string(), "span".to_string(), "move".to_string()],
            tag: Some("em".to_string()),
            ..Default::default()
        };
        let formatter = TextFormatter::from_rules(&[first, second]);
        assert_eq!(
            formatter.format("Super Jump then Jump", true),
            "<span class=\"move\">Super Jump</span> then <em>Jump</em>"
        );
    }

    #[test]
    fn test_case_insensitive_preserves_original_text() {
        let mut insensitive = rule(&["heat"]);
        insensitive.case_insensitive = true;
        let formatter = TextFormatter::from_rules(&[insensitive]);
        assert_eq!(formatter.format("HEAT", true), "<strong>HEAT</strong>");

        let sensitive = TextFormatter::from_rules(&[rule(&["heat"])]);
        assert_eq!(sensitive.format("HEAT", true), "HEAT");
    }

    #[test]
    fn test_template_wrapping() {
        let template = FormattingRule {
            tokens: vec!["KO".to_string()],
            template: Some("<abbr title=\"Knockout\">{text}</abbr>".to_string()),
            ..Default::default()
        };
        let formatter = TextFormatter::from_rules(&[template]);
        assert_eq!(
            formatter.format("KO!", true),
            "<abbr title=\"Knockout\">KO</abbr>!"
        );
    }

    #[test]
    fn test_custom_boundary() {
        // Digits are allowed to touch the token
        let mut custom = rule(&["x"]);
        custom.boundary = Some("A-Za-z".to_string());
        let formatter = TextFormatter::from_rules(&[custom]);
        assert_eq!(formatter.format("3x hits", true), "3<strong>x</strong> hits");
    }

    #[test]
    fn test_tag_with_class_and_attributes() {
        let mut attributed = rule(&["EX"]);
        attributed.class_name = Some("meter".to_string());
        attributed
            .attributes
            .insert("data-kind".to_string(), "super \"art\"".to_string());
        let formatter = TextFormatter::from_rules(&[attributed]);
        assert_eq!(
            formatter.format("EX", true),
            "<strong class=\"meter\" data-kind=\"super &quot;art&quot;\">EX</strong>"
        );
    }

    #[test]
    fn test_from_json_skips_malformed_rules() {
        let json = r#"{
            "rules": [
                { "tokens": ["Heat"], "tagName": "b" },
                { "tokens": "not-a-list" },
                { "words": [] },
                { "words": ["Gain"], "className": "g", "caseInsensitive": true }
            ]
        }"#;
        let formatter = TextFormatter::from_json(json).unwrap();
        assert_eq!(formatter.rule_count(), 2);
        assert_eq!(
            formatter.format("heat gain", true),
            "heat <span class=\"g\">gain</span>"
        );
    }

    #[test]
    fn test_from_json_rejects_invalid_document() {
        assert!(TextFormatter::from_json("not json").is_err());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<b>3</b> hits &amp; <!-- c --><i>120</i>&#33;&#x21;"),
            "3 hits & 120!!"
        );
        assert_eq!(strip_markup("&bogus; &lt;"), "&bogus; <");
    }
}
