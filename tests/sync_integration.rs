use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use readme_sync::load_config::load_config;
use readme_sync::synchronise::{synchronise, SyncOptions};
use readme_sync::transform::{banner_repo, Thinness};

const CONFIG_YAML: &str = r#"
content_thresholds:
  min_content_length: 10
  critical_content_length: 3
repository_urls:
  repo-a: "https://github.com/example/repo-a"
  repo-b: "https://github.com/example/repo-b"
repositories:
  - name: repo-a
    main_readme:
      source: README.md
      target: docs/a/index.md
  - name: repo-b
    main_readme:
      source: README.md
      target: docs/b/index.md
"#;

const README_A: &str = "# Repo A\n\nThe workflows repository, with enough body text to stay above thresholds.\n\n![diagram](../img/diagram.png)\n";
const README_B: &str = "# Repo B\n\nSensor simulation documentation, also adequately sized content.\n";

fn write_file(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Two cloned repositories, one broken image reference, and the mapping file.
fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    write_file(&base.join("repo-a/README.md"), README_A.as_bytes());
    write_file(&base.join("repo-a/assets/diagram.png"), b"PNG-A-DIAGRAM");
    write_file(&base.join("repo-b/README.md"), README_B.as_bytes());
    let config_path = base.join("scripts/readme-sync.yml");
    write_file(&config_path, CONFIG_YAML.as_bytes());
    (dir, config_path)
}

/// Byte snapshot of a directory tree, for before/after comparisons.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn visit(dir: &Path, root: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        if !dir.exists() {
            return;
        }
        for entry in fs::read_dir(dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                visit(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    visit(dir, dir, &mut out);
    out
}

#[test]
fn end_to_end_sync_writes_banner_and_fixes_image() {
    let (dir, config_path) = setup();
    let base = dir.path();
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());

    assert_eq!(report.files_synced.len(), 2);
    assert_eq!(report.skipped.len(), 0);
    assert_eq!(report.images_fixed, 1);
    assert!(report.unresolved_images.is_empty());

    let page = fs::read_to_string(base.join("docs/a/index.md")).unwrap();
    assert!(page.contains("!!! info \"Source\""));
    assert!(page.contains("repo-a/README.md"));
    assert!(page.contains("https://github.com/example/repo-a/blob/main/README.md"));
    assert!(page.contains("![diagram](../assets/images/repo-a/assets/diagram.png)"));
    assert!(!page.contains("../img/diagram.png"));

    // Copied asset is byte-identical to the source image.
    let copied = fs::read(base.join("docs/assets/images/repo-a/assets/diagram.png")).unwrap();
    assert_eq!(copied, b"PNG-A-DIAGRAM");
}

#[test]
fn rerunning_produces_identical_bytes() {
    let (dir, config_path) = setup();
    let base = dir.path();
    let config = load_config(&config_path).unwrap();

    synchronise(&config, base, &SyncOptions::default());
    let first = snapshot(&base.join("docs"));

    synchronise(&config, base, &SyncOptions::default());
    let second = snapshot(&base.join("docs"));

    assert_eq!(first, second, "second run must not change any target byte");
}

#[test]
fn dry_run_is_pure_and_reports_real_counts() {
    let (dir, config_path) = setup();
    let base = dir.path();
    let config = load_config(&config_path).unwrap();

    let before = snapshot(base);
    let dry = synchronise(
        &config,
        base,
        &SyncOptions {
            dry_run: true,
            fix_all_images: false,
        },
    );
    let after = snapshot(base);
    assert_eq!(before, after, "dry run must not touch the filesystem");
    assert!(dry.dry_run);

    let real = synchronise(&config, base, &SyncOptions::default());
    assert_eq!(dry.files_synced, real.files_synced);
    assert_eq!(dry.skipped.len(), real.skipped.len());
    assert_eq!(dry.images_fixed, real.images_fixed);
    assert_eq!(dry.unresolved_images.len(), real.unresolved_images.len());
    assert_eq!(dry.thin_pages.len(), real.thin_pages.len());
}

#[test]
fn missing_repository_is_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    write_file(&base.join("repo-a/README.md"), README_A.as_bytes());
    write_file(&base.join("repo-a/assets/diagram.png"), b"PNG-A-DIAGRAM");
    let config_yaml = r#"
content_thresholds:
  min_content_length: 10
  critical_content_length: 3
repositories:
  - name: repo-a
    main_readme:
      source: README.md
      target: docs/a/index.md
  - name: repo-absent
    main_readme:
      source: README.md
      target: docs/absent/index.md
    sub_readmes:
      - source: sub/README.md
        target: docs/absent/sub.md
"#;
    let config_path = base.join("readme-sync.yml");
    write_file(&config_path, config_yaml.as_bytes());
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());

    assert_eq!(report.files_synced, vec![PathBuf::from("docs/a/index.md")]);
    // Every mapping of the absent repository is listed individually.
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().all(|s| s.repo == "repo-absent"));
    assert!(!base.join("docs/absent").exists());
}

#[test]
fn missing_source_file_is_skipped_not_fatal() {
    let (dir, config_path) = setup();
    let base = dir.path();
    fs::remove_file(base.join("repo-b/README.md")).unwrap();
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());

    assert_eq!(report.files_synced, vec![PathBuf::from("docs/a/index.md")]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].repo, "repo-b");
    assert!(report.skipped[0].reason.contains("missing"));
}

#[test]
fn duplicate_filename_prefers_owning_repository() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    write_file(
        &base.join("repo-a/README.md"),
        b"# Repo A\n\nEnough adequate body text here.\n\n![logo](img/logo.png)\n",
    );
    write_file(&base.join("repo-a/img/logo.png"), b"LOGO-FROM-A");
    write_file(
        &base.join("repo-b/README.md"),
        b"# Repo B\n\nEnough adequate body text here.\n\n![logo](img/logo.png)\n",
    );
    write_file(&base.join("repo-b/img/logo.png"), b"LOGO-FROM-B");
    let config_path = base.join("readme-sync.yml");
    write_file(&config_path, CONFIG_YAML.as_bytes());
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());
    assert_eq!(report.images_fixed, 2);

    let page_a = fs::read_to_string(base.join("docs/a/index.md")).unwrap();
    assert!(page_a.contains("![logo](../assets/images/repo-a/img/logo.png)"));
    let page_b = fs::read_to_string(base.join("docs/b/index.md")).unwrap();
    assert!(page_b.contains("![logo](../assets/images/repo-b/img/logo.png)"));

    let copied_a = fs::read(base.join("docs/assets/images/repo-a/img/logo.png")).unwrap();
    assert_eq!(copied_a, b"LOGO-FROM-A");
    let copied_b = fs::read(base.join("docs/assets/images/repo-b/img/logo.png")).unwrap();
    assert_eq!(copied_b, b"LOGO-FROM-B");
}

#[test]
fn unresolved_reference_is_reported_and_left_unchanged() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    write_file(
        &base.join("repo-a/README.md"),
        b"# Repo A\n\nEnough adequate body text here.\n\n![gone](missing.png)\n",
    );
    let config_yaml = r#"
content_thresholds:
  min_content_length: 10
  critical_content_length: 3
repositories:
  - name: repo-a
    main_readme:
      source: README.md
      target: docs/a/index.md
"#;
    let config_path = base.join("readme-sync.yml");
    write_file(&config_path, config_yaml.as_bytes());
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());

    assert_eq!(report.images_fixed, 0);
    assert_eq!(report.unresolved_images.len(), 1);
    assert_eq!(report.unresolved_images[0].file, PathBuf::from("docs/a/index.md"));
    assert_eq!(report.unresolved_images[0].reference, "missing.png");

    let page = fs::read_to_string(base.join("docs/a/index.md")).unwrap();
    assert!(page.contains("![gone](missing.png)"), "reference must stay untouched");
    assert!(!base.join("docs/assets").exists(), "no file may be fabricated");

    // The summary names the file and the literal reference.
    let rendered = report.render();
    assert!(rendered.contains("missing.png"));
}

#[test]
fn thin_content_is_classified_and_annotated() {
    let (dir, config_path) = setup();
    let base = dir.path();
    write_file(&base.join("repo-b/README.md"), b"x\n");
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());

    assert_eq!(report.thin_pages.len(), 1);
    assert_eq!(report.thin_pages[0].target, PathBuf::from("docs/b/index.md"));
    assert_eq!(report.thin_pages[0].length, 1);
    assert_eq!(report.thin_pages[0].severity, Thinness::Critical);

    let page = fs::read_to_string(base.join("docs/b/index.md")).unwrap();
    assert!(page.contains("TODO: Documentation Needed"));
    assert!(page.contains("only 1 characters"));

    // Annotations must not accumulate across runs.
    synchronise(&config, base, &SyncOptions::default());
    let again = fs::read_to_string(base.join("docs/b/index.md")).unwrap();
    assert_eq!(page, again);
}

#[test]
fn fix_all_images_repairs_unsynced_files_and_honours_banner_origin() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    write_file(
        &base.join("repo-a/README.md"),
        b"# Repo A\n\nEnough adequate body text here.\n",
    );
    write_file(&base.join("repo-a/img/logo.png"), b"LOGO-FROM-A");
    write_file(
        &base.join("repo-b/README.md"),
        b"# Repo B\n\nEnough adequate body text here.\n",
    );
    write_file(&base.join("repo-b/img/logo.png"), b"LOGO-FROM-B");

    // A hand-maintained page, never part of any mapping, with a stale
    // reference and a banner naming its origin repository.
    let page = concat!(
        "<!-- readme-sync:begin repo=\"repo-b\" -->\n",
        "!!! info \"Source\"\n",
        "    This content is synchronised from [`repo-b/README.md`](#).\n",
        "<!-- readme-sync:end -->\n",
        "\n",
        "![logo](img/logo.png)\n",
    );
    write_file(&base.join("docs/guide/page.md"), page.as_bytes());

    let config_path = base.join("readme-sync.yml");
    write_file(&config_path, CONFIG_YAML.as_bytes());
    let config = load_config(&config_path).unwrap();

    let report = synchronise(
        &config,
        base,
        &SyncOptions {
            dry_run: false,
            fix_all_images: true,
        },
    );

    assert_eq!(report.files_synced.len(), 2);
    assert_eq!(report.images_fixed, 1);

    let fixed = fs::read_to_string(base.join("docs/guide/page.md")).unwrap();
    assert!(
        fixed.contains("![logo](../assets/images/repo-b/img/logo.png)"),
        "banner origin must win the duplicate-filename tie-break"
    );
    let copied = fs::read(base.join("docs/assets/images/repo-b/img/logo.png")).unwrap();
    assert_eq!(copied, b"LOGO-FROM-B");
    assert!(!base.join("docs/assets/images/repo-a").exists());
}

#[test]
fn duplicate_targets_last_write_wins() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    write_file(
        &base.join("repo-a/README.md"),
        b"# Repo A\n\nEnough adequate body text here.\n",
    );
    write_file(
        &base.join("repo-b/README.md"),
        b"# Repo B\n\nEnough adequate body text here.\n",
    );
    let config_yaml = r#"
content_thresholds:
  min_content_length: 10
  critical_content_length: 3
repositories:
  - name: repo-a
    main_readme:
      source: README.md
      target: docs/shared/index.md
  - name: repo-b
    main_readme:
      source: README.md
      target: docs/shared/index.md
"#;
    let config_path = base.join("readme-sync.yml");
    write_file(&config_path, config_yaml.as_bytes());
    let config = load_config(&config_path).unwrap();

    let report = synchronise(&config, base, &SyncOptions::default());
    assert_eq!(report.files_synced.len(), 2);

    let page = fs::read_to_string(base.join("docs/shared/index.md")).unwrap();
    assert_eq!(banner_repo(&page), Some("repo-b"));
    assert!(page.contains("# Repo B"));
}
