use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::{ContentLoadError, ContentRequest};

pub(crate) const BASE_MOD_ID: &str = "base";

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub source_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct XmlSource {
    /// Path relative to the mod directory, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// Base content first, then enabled mods in request order.
pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, ContentLoadError> {
    if !app_paths.base_content_dir.is_dir() {
        return Err(ContentLoadError::BaseContentMissing(
            app_paths.base_content_dir.clone(),
        ));
    }

    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: BASE_MOD_ID.to_string(),
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for mod_id in &request.enabled_mods {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentLoadError::EmptyEnabledMod);
        }
        if trimmed == BASE_MOD_ID || !seen.insert(trimmed.to_string()) {
            return Err(ContentLoadError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        if !mod_dir.is_dir() {
            return Err(ContentLoadError::EnabledModMissing {
                mod_id: trimmed.to_string(),
                expected_dir: mod_dir,
            });
        }
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

/// Every `.xml` file under `mod_dir`, ordered by normalized relative path.
pub(crate) fn collect_xml_files(mod_dir: &Path) -> Result<Vec<XmlSource>, ContentLoadError> {
    let mut files = Vec::<XmlSource>::new();
    collect_recursive(mod_dir, mod_dir, &mut files)?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<XmlSource>,
) -> Result<(), ContentLoadError> {
    let entries = fs::read_dir(current).map_err(|source| ContentLoadError::ReadDir {
        path: current.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ContentLoadError::ReadDirEntry {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
            continue;
        }
        if !is_xml_file(&path) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        files.push(XmlSource {
            rel_path: normalize_rel_path(rel),
            abs_path: path.clone(),
        });
    }
    Ok(())
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
