//! Coordinating module for the load-transform-write pipeline.
//!
//! Drives every configured mapping in order, folds recoverable failures into
//! the [`SyncReport`] and runs the image pass in the caller-selected scope.
//! Stateless across runs: the report is built fresh per invocation and the
//! only side effects are the files it writes (none in dry-run mode).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::images::{markdown_files, ImageResolver, SourceRoot};
use crate::load_config::{ReadmeMapping, RepositoryMapping, SyncConfig};
use crate::transform::{banner_repo, transform, Provenance, Thinness};

/// Caller-selected run modes. The two flags are independent and composable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Report every would-be write and copy without touching the filesystem.
    pub dry_run: bool,
    /// Repair images across the whole docs tree instead of only the files
    /// this run produced.
    pub fix_all_images: bool,
}

/// A mapping that could not be processed, with the reason it was skipped.
#[derive(Debug)]
pub struct SkippedMapping {
    pub repo: String,
    pub source: PathBuf,
    pub target: PathBuf,
    pub reason: String,
}

/// A synced page whose source carried less content than the thresholds ask.
#[derive(Debug)]
pub struct ThinPage {
    pub target: PathBuf,
    pub length: usize,
    pub severity: Thinness,
}

/// An image reference that matched nothing in any source repository.
#[derive(Debug)]
pub struct UnresolvedImage {
    pub file: PathBuf,
    pub reference: String,
}

/// Accumulated outcome of one run. Printed and discarded, never persisted.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub dry_run: bool,
    pub files_synced: Vec<PathBuf>,
    pub skipped: Vec<SkippedMapping>,
    pub thin_pages: Vec<ThinPage>,
    pub images_fixed: usize,
    pub unresolved_images: Vec<UnresolvedImage>,
}

impl SyncReport {
    /// Human-readable summary: totals first, then one line per item a
    /// maintainer may need to act on.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.dry_run {
            out.push_str("Dry run complete. No files were modified.\n");
        } else {
            out.push_str("Synchronisation complete.\n");
        }
        out.push_str(&format!("  files synced:      {}\n", self.files_synced.len()));
        out.push_str(&format!("  mappings skipped:  {}\n", self.skipped.len()));
        out.push_str(&format!("  images fixed:      {}\n", self.images_fixed));
        out.push_str(&format!(
            "  images unresolved: {}\n",
            self.unresolved_images.len()
        ));
        out.push_str(&format!("  thin pages:        {}\n", self.thin_pages.len()));

        for skip in &self.skipped {
            out.push_str(&format!(
                "  skipped [{}] {} -> {}: {}\n",
                skip.repo,
                skip.source.display(),
                skip.target.display(),
                skip.reason
            ));
        }
        for unresolved in &self.unresolved_images {
            out.push_str(&format!(
                "  unresolved image in {}: {}\n",
                unresolved.file.display(),
                unresolved.reference
            ));
        }
        for thin in &self.thin_pages {
            let label = match thin.severity {
                Thinness::Critical => "critical",
                Thinness::NeedsExpansion => "needs expansion",
                Thinness::Adequate => "adequate",
            };
            out.push_str(&format!(
                "  thin page {} ({} chars, {})\n",
                thin.target.display(),
                thin.length,
                label
            ));
        }
        out
    }
}

fn read_source(repo: &str, path: &Path) -> Result<String, SyncError> {
    if !path.exists() {
        return Err(SyncError::MissingSource {
            repo: repo.to_string(),
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|e| SyncError::SourceUnreadable {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_target(path: &Path, text: &str) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, text).map_err(|e| SyncError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Entrypoint: run the whole synchronisation according to config.
///
/// `base_dir` contains the repository clones (one directory per configured
/// repository name) and the `docs/` tree the tool writes into. Recoverable
/// failures never escape; they are folded into the returned report.
pub fn synchronise(config: &SyncConfig, base_dir: &Path, opts: &SyncOptions) -> SyncReport {
    let docs_dir = base_dir.join("docs");
    let roots: Vec<SourceRoot> = config
        .repositories
        .iter()
        .filter_map(|repo| {
            let path = base_dir.join(&repo.name);
            path.is_dir().then(|| SourceRoot {
                name: repo.name.clone(),
                path,
            })
        })
        .collect();
    let mut resolver = ImageResolver::new(&docs_dir, roots, opts.dry_run);

    let mut report = SyncReport {
        dry_run: opts.dry_run,
        ..SyncReport::default()
    };

    // Text of every document produced this run, keyed by absolute target
    // path. The all-markdown image pass reads from here instead of disk so
    // dry-run sees the same content a real run would.
    let mut produced: BTreeMap<PathBuf, (String, String)> = BTreeMap::new();

    info!("Starting README synchronisation");

    for repo in &config.repositories {
        let clone_dir = base_dir.join(&repo.name);
        if !clone_dir.is_dir() {
            warn!(
                repo = %repo.name,
                expected = %clone_dir.display(),
                "repository clone not found on disk; skipping its mappings"
            );
            for mapping in repo.mappings() {
                report.skipped.push(SkippedMapping {
                    repo: repo.name.clone(),
                    source: mapping.source.clone(),
                    target: mapping.target.clone(),
                    reason: format!("repository not cloned at {}", clone_dir.display()),
                });
            }
            continue;
        }

        info!(repo = %repo.name, "Processing repository");
        for mapping in repo.mappings() {
            sync_mapping(
                config, repo, mapping, base_dir, opts, &mut resolver, &mut report,
                &mut produced,
            );
        }
    }

    if opts.fix_all_images {
        fix_all_markdown(&docs_dir, base_dir, opts, &mut resolver, &mut report, &produced);
    }

    info!(
        files_synced = report.files_synced.len(),
        skipped = report.skipped.len(),
        images_fixed = report.images_fixed,
        unresolved = report.unresolved_images.len(),
        "Synchronisation finished"
    );
    report
}

#[allow(clippy::too_many_arguments)]
fn sync_mapping(
    config: &SyncConfig,
    repo: &RepositoryMapping,
    mapping: &ReadmeMapping,
    base_dir: &Path,
    opts: &SyncOptions,
    resolver: &mut ImageResolver,
    report: &mut SyncReport,
    produced: &mut BTreeMap<PathBuf, (String, String)>,
) {
    let source_path = base_dir.join(&repo.name).join(&mapping.source);
    let target_path = base_dir.join(&mapping.target);
    info!(
        source = %source_path.display(),
        target = %target_path.display(),
        "Processing mapping"
    );

    let source_text = match read_source(&repo.name, &source_path) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "skipping mapping");
            report.skipped.push(SkippedMapping {
                repo: repo.name.clone(),
                source: mapping.source.clone(),
                target: mapping.target.clone(),
                reason: e.to_string(),
            });
            return;
        }
    };

    let prov = Provenance {
        repo_name: &repo.name,
        repo_url: config.repo_url(&repo.name),
        source_path: &mapping.source,
    };
    let outcome = transform(&source_text, &prov, config.thresholds);
    if outcome.thinness != Thinness::Adequate {
        warn!(
            target = %mapping.target.display(),
            length = outcome.content_length,
            "source content below threshold"
        );
        report.thin_pages.push(ThinPage {
            target: mapping.target.clone(),
            length: outcome.content_length,
            severity: outcome.thinness,
        });
    }

    let mut final_text = outcome.text;
    if !opts.fix_all_images {
        // Synced-only image scope: repair inline, against the in-memory text.
        let (new_text, fix) =
            resolver.fix_references(&target_path, &final_text, Some(repo.name.as_str()));
        final_text = new_text;
        report.images_fixed += fix.fixed.len();
        for reference in fix.unresolved {
            report.unresolved_images.push(UnresolvedImage {
                file: mapping.target.clone(),
                reference,
            });
        }
    }

    if opts.dry_run {
        info!(
            target = %target_path.display(),
            bytes = final_text.len(),
            "[dry-run] would write target"
        );
    } else if let Err(e) = write_target(&target_path, &final_text) {
        error!(error = %e, "failed to write target");
        report.skipped.push(SkippedMapping {
            repo: repo.name.clone(),
            source: mapping.source.clone(),
            target: mapping.target.clone(),
            reason: e.to_string(),
        });
        return;
    }

    report.files_synced.push(mapping.target.clone());
    produced.insert(target_path, (final_text, repo.name.clone()));
}

/// All-markdown image scope: every `.md` under the docs tree, including the
/// files this run just produced (read from the in-run cache so dry-run and
/// real runs see identical content).
fn fix_all_markdown(
    docs_dir: &Path,
    base_dir: &Path,
    opts: &SyncOptions,
    resolver: &mut ImageResolver,
    report: &mut SyncReport,
    produced: &BTreeMap<PathBuf, (String, String)>,
) {
    let mut files = markdown_files(docs_dir);
    for path in produced.keys() {
        if !files.contains(path) {
            files.push(path.clone());
        }
    }
    files.sort();

    info!(files = files.len(), "Repairing images across the docs tree");
    for file in files {
        let (text, origin) = match produced.get(&file) {
            Some((text, repo)) => (text.clone(), Some(repo.clone())),
            None => match fs::read_to_string(&file) {
                Ok(text) => {
                    let origin = banner_repo(&text).map(str::to_string);
                    (text, origin)
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "cannot read markdown file; skipping");
                    continue;
                }
            },
        };

        let (new_text, fix) = resolver.fix_references(&file, &text, origin.as_deref());
        report.images_fixed += fix.fixed.len();
        let display_path = file
            .strip_prefix(base_dir)
            .unwrap_or(file.as_path())
            .to_path_buf();
        for reference in &fix.unresolved {
            report.unresolved_images.push(UnresolvedImage {
                file: display_path.clone(),
                reference: reference.clone(),
            });
        }

        if fix.changed() && !opts.dry_run {
            if let Err(e) = write_target(&file, &new_text) {
                error!(file = %file.display(), error = %e, "failed to rewrite markdown file");
            }
        }
    }
}
