use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::Tera;
use thiserror::Error;

/// Suffix marking a file in the template root as a renderable page.
pub const PAGE_SUFFIX: &str = ".page.html";

// Subdirectories holding the shared fragments every page is composed with.
const LAYOUT_DIR: &str = "layout";
const PARTIALS_DIR: &str = "partials";

/// TemplateError
///
/// Startup-time template failures. Either kind aborts process start; nothing
/// is ever served from a partially built cache.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template directory {path}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse template set for page '{page}'")]
    Parse {
        page: String,
        #[source]
        source: tera::Error,
    },
}

/// One self-contained Tera instance per page, keyed by the page file's base
/// name (without the `.page.html` suffix). Built exactly once before the
/// server accepts requests and never mutated afterward, so concurrent reads
/// need no synchronization.
pub type TemplateCache = HashMap<String, Tera>;

/// new_template_cache
///
/// Scans `dir` for page files and produces a render-ready bundle for each.
/// Every bundle carries its own copy of all layout and partial fragments, so
/// a page renders without consulting any other bundle.
pub fn new_template_cache(dir: &Path) -> Result<TemplateCache, TemplateError> {
    let mut fragments = list_html_files(&dir.join(LAYOUT_DIR))?;
    fragments.extend(list_html_files(&dir.join(PARTIALS_DIR))?);

    let mut cache = TemplateCache::new();

    for page_path in list_pages(dir)? {
        let Some(name) = page_name(&page_path) else {
            continue;
        };

        // Fragments are registered under their bare file names, which is what
        // the pages reference in extends/include tags. The page itself is
        // registered under its logical name so lookup and render share a key.
        let mut files: Vec<(PathBuf, Option<String>)> = fragments
            .iter()
            .map(|path| (path.clone(), file_name(path)))
            .collect();
        files.push((page_path.clone(), Some(name.clone())));

        let mut bundle = Tera::default();
        bundle
            .add_template_files(files)
            .map_err(|source| TemplateError::Parse {
                page: name.clone(),
                source,
            })?;

        cache.insert(name, bundle);
    }

    Ok(cache)
}

fn page_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(PAGE_SUFFIX))
        .map(str::to_string)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

/// Page files sit directly in the template root.
fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    let files = read_sorted(dir)?;
    Ok(files
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(PAGE_SUFFIX))
        })
        .collect())
}

/// A fragment directory that does not exist contributes no files; only an
/// unreadable directory is a discovery failure.
fn list_html_files(dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let files = read_sorted(dir)?;
    Ok(files
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect())
}

fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    let mut files = Vec::new();
    let entries = fs::read_dir(dir).map_err(|source| TemplateError::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| TemplateError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    // Deterministic registration order keeps parse errors reproducible.
    files.sort();
    Ok(files)
}
