//! Heredoc payload patterns
//!
//! A payload is written by the startup script with `cat <<MARKER > file`.
//! The marker may be single or double quoted. The body ends at the first
//! occurrence of any of the payload's markers, which need not be the one
//! that opened the heredoc and need not sit on a line of its own.

use std::borrow::Cow;
use std::fmt;

use itertools::Itertools;
use regex::{NoExpand, Regex};

use crate::domain::DomainError;

/// Payload embedded in a startup script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadKind {
    /// `package.json`, opened and closed with `EOF`
    PackageManifest,
    /// `app.js`, opened and closed with `APPJS` or `EOFAPP`
    AppScript,
}

impl PayloadKind {
    /// Processing order. The app script is matched against the text left
    /// behind by the manifest substitution.
    pub const ALL: [PayloadKind; 2] = [PayloadKind::PackageManifest, PayloadKind::AppScript];

    /// File the heredoc writes to, relative to the service directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            PayloadKind::PackageManifest => "package.json",
            PayloadKind::AppScript => "app.js",
        }
    }

    /// Accepted heredoc markers.
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            PayloadKind::PackageManifest => &["EOF"],
            PayloadKind::AppScript => &["APPJS", "EOFAPP"],
        }
    }

    /// Instance metadata attribute the payload is served from at boot.
    pub fn attribute(&self) -> &'static str {
        match self {
            PayloadKind::PackageManifest => "package_json",
            PayloadKind::AppScript => "app_js",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Fold `\r\n` and lone `\r` line endings into `\n`.
///
/// Startup scripts are matched and rewritten with LF line endings only.
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Result of a successful match: the extracted body and the rewritten text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub kind: PayloadKind,
    /// Heredoc body, verbatim, from after the opening line up to the closing marker
    pub body: String,
    /// Script text with every matching heredoc replaced
    pub text: String,
}

/// Compiled matcher for one payload kind.
#[derive(Debug, Clone)]
pub struct HeredocPattern {
    kind: PayloadKind,
    regex: Regex,
}

impl HeredocPattern {
    pub fn new(kind: PayloadKind) -> Result<Self, DomainError> {
        let markers = kind.markers().iter().map(|m| regex::escape(m)).join("|");
        let pattern = format!(
            r#"(?s)cat <<['"]?(?:{markers})['"]? > {file}\n(.*?)(?:{markers})"#,
            markers = markers,
            file = regex::escape(kind.file_name()),
        );
        let regex = Regex::new(&pattern).map_err(|e| DomainError::InvalidPattern {
            kind,
            message: e.to_string(),
        })?;
        Ok(Self { kind, regex })
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Body of the first heredoc in `text`, if any.
    pub fn find_body<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Replace every heredoc of this kind with `replacement`, inserted literally.
    pub fn replace<'t>(&self, text: &'t str, replacement: &str) -> Cow<'t, str> {
        self.regex.replace_all(text, NoExpand(replacement))
    }

    /// Extract the first body and replace all occurrences.
    ///
    /// Returns `None` when the text holds no heredoc of this kind.
    pub fn substitute(&self, text: &str, replacement: &str) -> Option<Substitution> {
        let body = self.find_body(text)?.to_string();
        let text = self.replace(text, replacement).into_owned();
        Some(Substitution {
            kind: self.kind,
            body,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> HeredocPattern {
        HeredocPattern::new(PayloadKind::PackageManifest).unwrap()
    }

    fn app() -> HeredocPattern {
        HeredocPattern::new(PayloadKind::AppScript).unwrap()
    }

    #[test]
    fn given_unquoted_marker_when_finding_body_then_returns_body() {
        let text = "cat <<EOF > package.json\n{\"name\":\"x\"}\nEOF\n";
        assert_eq!(manifest().find_body(text), Some("{\"name\":\"x\"}\n"));
    }

    #[test]
    fn given_quoted_markers_when_finding_body_then_matches() {
        let single = "cat <<'EOF' > package.json\n{}\nEOF\n";
        let double = "cat <<\"EOF\" > package.json\n{}\nEOF\n";
        assert_eq!(manifest().find_body(single), Some("{}\n"));
        assert_eq!(manifest().find_body(double), Some("{}\n"));
    }

    #[test]
    fn given_other_target_file_when_finding_body_then_no_match() {
        let text = "cat <<EOF > config.json\n{}\nEOF\n";
        assert_eq!(manifest().find_body(text), None);
    }

    #[test]
    fn given_body_without_closing_marker_when_finding_body_then_no_match() {
        let text = "cat <<EOF > package.json\n{}\n";
        assert_eq!(manifest().find_body(text), None);
    }

    #[test]
    fn given_two_manifests_when_finding_body_then_returns_first() {
        let text = "cat <<EOF > package.json\nfirst\nEOF\ncat <<EOF > package.json\nsecond\nEOF\n";
        assert_eq!(manifest().find_body(text), Some("first\n"));
    }

    #[test]
    fn given_two_manifests_when_substituting_then_replaces_both() {
        let text = "cat <<EOF > package.json\nfirst\nEOF\ncat <<EOF > package.json\nsecond\nEOF\n";
        let sub = manifest().substitute(text, "FETCH").unwrap();
        assert_eq!(sub.body, "first\n");
        assert_eq!(sub.text, "FETCH\nFETCH\n");
    }

    #[test]
    fn given_each_app_marker_when_finding_body_then_matches() {
        let appjs = "cat <<APPJS > app.js\nconsole.log(1);\nAPPJS\n";
        let eofapp = "cat <<'EOFAPP' > app.js\nconsole.log(2);\nEOFAPP\n";
        assert_eq!(app().find_body(appjs), Some("console.log(1);\n"));
        assert_eq!(app().find_body(eofapp), Some("console.log(2);\n"));
    }

    #[test]
    fn given_mismatched_app_markers_when_finding_body_then_first_marker_ends_body() {
        let text = "cat <<APPJS > app.js\nconst a = 1;\nEOFAPP\nconst b = 2;\nAPPJS\n";
        assert_eq!(app().find_body(text), Some("const a = 1;\n"));
    }

    #[test]
    fn given_marker_inside_line_when_finding_body_then_body_stops_there() {
        let text = "cat <<EOF > package.json\n{\"desc\":\"no EOF here\"}\nEOF\n";
        assert_eq!(manifest().find_body(text), Some("{\"desc\":\"no "));
    }

    #[test]
    fn given_replacement_with_dollar_when_substituting_then_inserted_literally() {
        let text = "cat <<EOF > package.json\n{}\nEOF\n";
        let sub = manifest().substitute(text, "echo $1 ${HOME}").unwrap();
        assert_eq!(sub.text, "echo $1 ${HOME}\n");
    }

    #[test]
    fn given_no_heredoc_when_substituting_then_none() {
        assert!(manifest().substitute("#!/bin/bash\necho hi\n", "FETCH").is_none());
    }

    #[test]
    fn given_crlf_and_cr_line_endings_when_normalizing_then_lf_only() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
        assert!(matches!(normalize_newlines("a\nb\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn given_payload_kinds_then_names_are_fixed() {
        assert_eq!(PayloadKind::PackageManifest.to_string(), "package.json");
        assert_eq!(PayloadKind::AppScript.attribute(), "app_js");
        assert_eq!(PayloadKind::PackageManifest.attribute(), "package_json");
    }
}
