//! Markdown discovery and parsing.
//!
//! Walks `docs.root`, keeps files matching the include globs (minus the
//! exclude globs and `.git`, `target`, `node_modules`), and turns each one
//! into a [`Document`]:
//!
//! - a leading `---` front matter block may set `title`, `category`, and
//!   `tags` (`[a, b]`, `a, b`, or `- a` list items);
//! - the title falls back to the first `# ` line, then to the file stem;
//! - the category falls back to keywords found in the relative path, then
//!   to `general`;
//! - the content hash covers the raw file, front matter included.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use doc_rag_core::models::Document;

use crate::config::DocsConfig;

pub const DEFAULT_CATEGORY: &str = "general";

/// Path keywords per category, checked in order; the first hit wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("runbook", &["runbook", "runbooks", "playbook", "playbooks"]),
    ("architecture", &["architecture", "design", "arch"]),
    ("troubleshooting", &["troubleshoot", "troubleshooting", "debug"]),
    ("howto", &["howto", "how-to", "guide", "guides", "tutorial"]),
    ("reference", &["reference", "ref", "api"]),
    ("onboarding", &["onboarding", "onboard", "getting-started"]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

fn unquote(value: &str) -> &str {
    let v = value.trim();
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

fn split_tag_list(value: &str) -> Vec<String> {
    let v = value.trim();
    let inner = v
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(v);
    inner
        .split(',')
        .map(|t| unquote(t).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split a leading front matter block from the body.
///
/// Returns `(None, raw)` when the text does not open with a terminated
/// `---` block.
pub fn split_front_matter(raw: &str) -> (Option<FrontMatter>, &str) {
    let Some(rest) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return (None, raw);
    };

    let mut offset = 0;
    let mut block_end = None;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            block_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((block_len, body_start)) = block_end else {
        return (None, raw);
    };

    let mut fm = FrontMatter::default();
    let mut list_key: Option<String> = None;
    for line in rest[..block_len].lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(item) = trimmed.strip_prefix("- ") {
            if list_key.as_deref() == Some("tags") {
                let tag = unquote(item);
                if !tag.is_empty() {
                    fm.tags.push(tag.to_string());
                }
            }
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        list_key = value.is_empty().then(|| key.clone());
        match key.as_str() {
            "title" if !value.is_empty() => fm.title = Some(unquote(value).to_string()),
            "category" if !value.is_empty() => fm.category = Some(unquote(value).to_string()),
            "tags" if !value.is_empty() => fm.tags = split_tag_list(value),
            _ => {}
        }
    }

    (Some(fm), &rest[body_start..])
}

/// Python-style title casing: each run of letters starts upper-case.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// First `# ` heading in `body`, else the file stem humanized.
pub fn extract_title(body: &str, relative_path: &str) -> String {
    for line in body.lines() {
        if let Some(title) = line.trim().strip_prefix("# ") {
            return title.trim().to_string();
        }
    }
    let stem = Path::new(relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    title_case(&stem.replace(['-', '_'], " "))
}

/// Category from keywords in the lower-cased relative path.
pub fn infer_category(relative_path: &str) -> String {
    let lower = relative_path.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

/// Parse one file's raw text into a [`Document`].
pub fn parse_document(relative_path: &str, raw: &str) -> Document {
    let (front_matter, body) = split_front_matter(raw);
    let fm = front_matter.unwrap_or_default();

    let title = fm
        .title
        .unwrap_or_else(|| extract_title(body, relative_path));
    let category = fm
        .category
        .unwrap_or_else(|| infer_category(relative_path));

    Document::from_raw(relative_path, raw, body, title, category, fm.tags)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn relative_key(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Matching files under `docs.root` as `(absolute, relative)` pairs,
/// sorted by relative path.
pub fn discover(docs: &DocsConfig) -> Result<Vec<(PathBuf, String)>> {
    let root = &docs.root;
    if !root.is_dir() {
        bail!("Documentation root does not exist: {}", root.display());
    }

    let include_set = build_globset(&docs.include_globs)?;
    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(docs.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_key(entry.path(), root);
        if exclude_set.is_match(&rel) || !include_set.is_match(&rel) {
            continue;
        }
        files.push((entry.path().to_path_buf(), rel));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    info!(count = files.len(), root = %root.display(), "discovered documents");
    Ok(files)
}

/// Discover and parse every document. Unreadable files are skipped.
pub fn parse_all(docs: &DocsConfig) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (path, rel) in discover(docs)? {
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let doc = parse_document(&rel, &raw);
                debug!(path = %doc.path, title = %doc.title, category = %doc.category, "parsed document");
                documents.push(doc);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_front_matter_fields() {
        let raw = "---\ntitle: \"Pod Restarts\"\ncategory: runbook\ntags: [k8s, pods]\n---\n# Ignored\n\nBody.\n";
        let (fm, body) = split_front_matter(raw);
        let fm = fm.unwrap();
        assert_eq!(fm.title.as_deref(), Some("Pod Restarts"));
        assert_eq!(fm.category.as_deref(), Some("runbook"));
        assert_eq!(fm.tags, vec!["k8s", "pods"]);
        assert_eq!(body, "# Ignored\n\nBody.\n");
    }

    #[test]
    fn test_front_matter_tag_forms() {
        let (fm, _) = split_front_matter("---\ntags: a, b ,c\n---\nx");
        assert_eq!(fm.unwrap().tags, vec!["a", "b", "c"]);

        let (fm, _) = split_front_matter("---\ntags:\n  - alpha\n  - 'beta'\nowner: sre\n---\nx");
        assert_eq!(fm.unwrap().tags, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let raw = "---\ntitle: Nope\n\n# Real";
        let (fm, body) = split_front_matter(raw);
        assert!(fm.is_none());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_title_fallbacks() {
        assert_eq!(extract_title("intro\n# Hello World\n", "x.md"), "Hello World");
        assert_eq!(extract_title("no heading", "runbooks/node-drain_steps.md"), "Node Drain Steps");
        assert_eq!(extract_title("## Not h1", "2fa-setup.md"), "2Fa Setup");
    }

    #[test]
    fn test_category_inference_order() {
        assert_eq!(infer_category("runbooks/pods.md"), "runbook");
        assert_eq!(infer_category("Design/overview.md"), "architecture");
        assert_eq!(infer_category("guides/install.md"), "howto");
        assert_eq!(infer_category("api/endpoints.md"), "reference");
        assert_eq!(infer_category("getting-started.md"), "onboarding");
        assert_eq!(infer_category("notes/misc.md"), "general");
    }

    #[test]
    fn test_parse_document_hashes_raw_and_strips_front_matter() {
        let raw = "---\ntitle: T\n---\n# H\n\nbody";
        let doc = parse_document("notes/a.md", raw);
        assert_eq!(doc.title, "T");
        assert_eq!(doc.content, "# H\n\nbody");
        assert_eq!(doc.category, "general");
        assert_eq!(doc.content_hash, doc_rag_core::models::content_hash(raw));
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("runbooks")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("runbooks/b.md"), "# B").unwrap();
        fs::write(root.join("a.markdown"), "# A").unwrap();
        fs::write(root.join("notes.txt"), "text").unwrap();
        fs::write(root.join("node_modules/pkg/readme.md"), "# dep").unwrap();
        fs::write(root.join("drafts/wip.md"), "# wip").unwrap();

        let docs = DocsConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".into(), "**/*.markdown".into()],
            exclude_globs: vec!["drafts/**".into()],
        };
        let rels: Vec<String> = discover(&docs).unwrap().into_iter().map(|(_, r)| r).collect();
        assert_eq!(rels, vec!["a.markdown", "runbooks/b.md"]);

        let parsed = parse_all(&docs).unwrap();
        assert_eq!(parsed[1].category, "runbook");
    }

    #[test]
    fn test_missing_root_is_error() {
        let docs = DocsConfig {
            root: PathBuf::from("/definitely/not/here"),
            include_globs: vec!["**/*.md".into()],
            exclude_globs: vec![],
        };
        assert!(discover(&docs).is_err());
    }
}
