//! Turns raw README text into the document written to the docs tree.
//!
//! Every synced page carries a provenance banner so a reader can trace it
//! back to its source of truth. The banner (and the thin-content note) are
//! delimited by HTML comment markers, which makes re-synchronisation exact:
//! any previously generated block is stripped before a fresh one is added,
//! so running the tool twice over unchanged sources is byte-identical.

use std::path::Path;

use crate::load_config::ContentThresholds;

const MARKER_BEGIN_PREFIX: &str = "<!-- readme-sync:begin";
const MARKER_END: &str = "<!-- readme-sync:end -->";

/// Attribution metadata for the document being transformed.
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub repo_name: &'a str,
    pub repo_url: &'a str,
    /// Path of the source file relative to its repository clone.
    pub source_path: &'a Path,
}

/// How much content the source actually carries, measured against the
/// configured thresholds. Classification only; nothing blocks the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thinness {
    Adequate,
    NeedsExpansion,
    Critical,
}

#[derive(Debug)]
pub struct TransformOutcome {
    pub text: String,
    /// Trimmed byte length of the source body, banner blocks excluded.
    pub content_length: usize,
    pub thinness: Thinness,
}

/// Produces the target document: provenance banner, optional thin-content
/// warning, the source body, and for thin pages a trailing note.
pub fn transform(
    source_text: &str,
    prov: &Provenance<'_>,
    thresholds: ContentThresholds,
) -> TransformOutcome {
    let body = strip_generated_blocks(source_text);
    let content_length = body.trim().len();

    let thinness = if content_length < thresholds.critical_content_length {
        Thinness::Critical
    } else if content_length < thresholds.min_content_length {
        Thinness::NeedsExpansion
    } else {
        Thinness::Adequate
    };

    let source_slash = slash_path(prov.source_path);
    let mut out = String::new();

    out.push_str(&format!(
        "<!-- readme-sync:begin repo=\"{}\" -->\n",
        prov.repo_name
    ));
    out.push_str("!!! info \"Source\"\n");
    out.push_str(&format!(
        "    This content is synchronised from [`{}/{}`]({}/blob/main/{}).\n",
        prov.repo_name, source_slash, prov.repo_url, source_slash
    ));
    out.push('\n');
    out.push_str(
        "    To make changes, edit the source file and re-run the synchronisation tool.\n",
    );
    if thinness != Thinness::Adequate {
        out.push('\n');
        out.push_str("!!! warning \"TODO: Documentation Needed\"\n");
        out.push_str(&format!(
            "    This page needs significant content. The source README currently contains only {content_length} characters.\n",
        ));
    }
    out.push_str(MARKER_END);
    out.push_str("\n\n");

    out.push_str(&body);
    out.push('\n');

    if thinness != Thinness::Adequate {
        out.push('\n');
        out.push_str(&format!(
            "<!-- readme-sync:begin repo=\"{}\" -->\n",
            prov.repo_name
        ));
        out.push_str("---\n\n");
        out.push_str(&format!(
            "*Note: this documentation page requires additional content from the engineering team. The source README contains only {content_length} characters.*\n",
        ));
        out.push_str(MARKER_END);
        out.push('\n');
    }

    TransformOutcome {
        text: out,
        content_length,
        thinness,
    }
}

/// Removes every marker-delimited block the tool has previously generated,
/// returning the bare body with leading/trailing blank lines trimmed.
pub fn strip_generated_blocks(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_block = false;
    for line in text.lines() {
        if !in_block && line.trim_start().starts_with(MARKER_BEGIN_PREFIX) {
            in_block = true;
            continue;
        }
        if in_block {
            if line.trim() == MARKER_END {
                in_block = false;
            }
            continue;
        }
        kept.push(line);
    }
    kept.join("\n").trim_matches('\n').to_string()
}

/// Reads the repository name back out of the first banner marker, if any.
/// Used by the image resolver to prioritise the origin repository when
/// scanning files it did not just write.
pub fn banner_repo(text: &str) -> Option<&str> {
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(MARKER_BEGIN_PREFIX) {
            let rest = rest.trim_start();
            if let Some(quoted) = rest.strip_prefix("repo=\"") {
                if let Some(end) = quoted.find('"') {
                    return Some(&quoted[..end]);
                }
            }
        }
    }
    None
}

/// Renders a path with forward slashes regardless of platform, for use in
/// Markdown links and URLs.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
