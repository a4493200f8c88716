//! Repairs image references in Markdown that no longer resolve from the
//! document's location in the docs tree.
//!
//! References are extracted with the same patterns the docs have always used
//! (Markdown `![alt](path)` plus HTML `<img src>` in either quote style).
//! An operand that already resolves, or that is remote/absolute/an anchor,
//! is left untouched. Anything else is matched by bare filename against the
//! configured repository clones; the first hit is copied into the central
//! assets directory and the reference rewritten relative to the document.
//! A reference with no match anywhere is reported, never guessed at.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

/// A repository clone the resolver may search, in priority order.
#[derive(Debug, Clone)]
pub struct SourceRoot {
    pub name: String,
    pub path: PathBuf,
}

/// Result of fixing one document.
#[derive(Debug, Default)]
pub struct FixOutcome {
    /// Original operands that were rewritten.
    pub fixed: Vec<String>,
    /// Operands that could not be matched in any source root.
    pub unresolved: Vec<String>,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        !self.fixed.is_empty()
    }
}

/// Resolves and copies images for one run. Holds the set of copies already
/// performed so the same asset is not copied twice per run.
pub struct ImageResolver {
    assets_dir: PathBuf,
    roots: Vec<SourceRoot>,
    dry_run: bool,
    copied: BTreeSet<PathBuf>,
}

fn md_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").expect("valid pattern"))
}

fn html_image_dq_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("valid pattern"))
}

fn html_image_sq_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<img[^>]+src='([^']+)'").expect("valid pattern"))
}

impl ImageResolver {
    /// `docs_dir` is the documentation tree root; assets land under
    /// `<docs_dir>/assets/images`. `roots` are searched in the given order
    /// unless a preferred repository is named per document.
    pub fn new(docs_dir: &Path, roots: Vec<SourceRoot>, dry_run: bool) -> Self {
        Self {
            assets_dir: docs_dir.join("assets").join("images"),
            roots,
            dry_run,
            copied: BTreeSet::new(),
        }
    }

    /// Extracts every distinct image-path operand from the document, in
    /// order of first appearance.
    pub fn extract_references(text: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for re in [md_image_re(), html_image_dq_re(), html_image_sq_re()] {
            for cap in re.captures_iter(text) {
                let operand = cap[1].trim().to_string();
                if seen.insert(operand.clone()) {
                    out.push(operand);
                }
            }
        }
        out
    }

    /// Repairs the references of one document held in memory. `doc_path` is
    /// where the document lives (or will live); rewritten paths are relative
    /// to its parent directory. `preferred_repo` is searched first when set,
    /// so a document synced from repository A picks A's copy of an image that
    /// exists in several clones.
    ///
    /// Returns the possibly rewritten text; filesystem copies are skipped in
    /// dry-run mode but counted identically.
    pub fn fix_references(
        &mut self,
        doc_path: &Path,
        text: &str,
        preferred_repo: Option<&str>,
    ) -> (String, FixOutcome) {
        let doc_dir = doc_path.parent().unwrap_or(Path::new("."));
        let mut outcome = FixOutcome::default();
        let mut updates: Vec<(String, String)> = Vec::new();

        for operand in Self::extract_references(text) {
            if operand.starts_with("http://")
                || operand.starts_with("https://")
                || operand.starts_with('/')
                || operand.starts_with('#')
            {
                continue;
            }
            if doc_dir.join(&operand).exists() {
                debug!(reference = %operand, "image already resolves; leaving untouched");
                continue;
            }
            let Some(filename) = Path::new(&operand).file_name().map(OsStr::to_owned) else {
                continue;
            };

            match self.find_source_image(&filename, preferred_repo) {
                Some((root_name, root_path, source_image)) => {
                    let rel_in_repo = source_image
                        .strip_prefix(&root_path)
                        .unwrap_or(Path::new(&filename));
                    let dest = self.assets_dir.join(&root_name).join(rel_in_repo);
                    if let Err(e) = self.copy_image(&source_image, &dest) {
                        warn!(
                            source = %source_image.display(),
                            dest = %dest.display(),
                            error = %e,
                            "failed to copy image; reference left unchanged"
                        );
                        outcome.unresolved.push(operand);
                        continue;
                    }
                    let new_ref = crate::transform::slash_path(&relative_to(&dest, doc_dir));
                    info!(
                        doc = %doc_path.display(),
                        old = %operand,
                        new = %new_ref,
                        "rewriting image reference"
                    );
                    updates.push((operand.clone(), new_ref));
                    outcome.fixed.push(operand);
                }
                None => {
                    warn!(
                        doc = %doc_path.display(),
                        reference = %operand,
                        "no matching image in any source repository"
                    );
                    outcome.unresolved.push(operand);
                }
            }
        }

        // Longest operand first, so one path is never rewritten inside a
        // longer one that contains it.
        updates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let mut new_text = text.to_string();
        for (old, new) in &updates {
            new_text = new_text.replace(old, new);
        }

        (new_text, outcome)
    }

    /// Searches the source roots for a file with the exact filename, the
    /// preferred repository first, then configured order. First match wins.
    fn find_source_image(
        &self,
        filename: &OsStr,
        preferred_repo: Option<&str>,
    ) -> Option<(String, PathBuf, PathBuf)> {
        let preferred = preferred_repo
            .and_then(|name| self.roots.iter().find(|r| r.name == name));
        let ordered = preferred
            .into_iter()
            .chain(self.roots.iter().filter(|r| {
                preferred_repo.map(|name| r.name != name).unwrap_or(true)
            }));
        for root in ordered {
            if let Some(found) = find_file_named(&root.path, filename) {
                return Some((root.name.clone(), root.path.clone(), found));
            }
        }
        None
    }

    fn copy_image(&mut self, source: &Path, dest: &Path) -> std::io::Result<()> {
        if !self.copied.insert(dest.to_path_buf()) {
            return Ok(());
        }
        if self.dry_run {
            info!(
                source = %source.display(),
                dest = %dest.display(),
                "[dry-run] would copy image"
            );
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, dest)?;
        debug!(source = %source.display(), dest = %dest.display(), "copied image");
        Ok(())
    }
}

/// Recursive filename search. Entries are visited in name order so matches
/// are deterministic; hidden directories and build/vendor trees are skipped.
fn find_file_named(dir: &Path, filename: &OsStr) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let mut subdirs = Vec::new();
    for path in entries {
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "node_modules" || name == "target" {
                continue;
            }
            subdirs.push(path);
        } else if path.file_name() == Some(filename) {
            return Some(path);
        }
    }
    for sub in subdirs {
        if let Some(found) = find_file_named(&sub, filename) {
            return Some(found);
        }
    }
    None
}

/// All Markdown files under the docs tree, sorted, excluding the docs repo's
/// own README files and hidden directories.
pub fn markdown_files(docs_dir: &Path) -> Vec<PathBuf> {
    fn visit(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if name.starts_with('.') {
                    continue;
                }
                visit(&path, out);
            } else if path.extension() == Some(OsStr::new("md"))
                && path.file_name() != Some(OsStr::new("README.md"))
            {
                out.push(path);
            }
        }
    }
    let mut files = Vec::new();
    visit(docs_dir, &mut files);
    files.sort();
    files
}

/// Relative path from `base` to `target`, component-wise.
fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target_comps: Vec<_> = target.components().collect();
    let base_comps: Vec<_> = base.components().collect();
    let mut common = 0;
    while common < target_comps.len()
        && common < base_comps.len()
        && target_comps[common] == base_comps[common]
    {
        common += 1;
    }
    let mut out = PathBuf::new();
    for _ in common..base_comps.len() {
        out.push("..");
    }
    for comp in &target_comps[common..] {
        out.push(comp.as_os_str());
    }
    out
}
