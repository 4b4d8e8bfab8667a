//! Script source and sink
//!
//! Enumerates and reads `*.sql` scripts for the apply direction and writes
//! generated scripts for the export direction. Enumeration is flat, sorted
//! case-insensitively by file name so the application order within a kind is
//! reproducible.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::schema::types::{ScriptKind, ScriptObject};

/// Load every `.sql` script of `kind` from `dir`.
///
/// A missing folder yields an empty list, not an error. Two files whose
/// stems differ only in case would name the same object; the later one is
/// skipped with a warning so no `(kind, name)` is ever applied twice.
pub fn load_scripts(dir: &Path, kind: ScriptKind) -> Result<Vec<ScriptObject>> {
    if !dir.is_dir() {
        debug!(kind = %kind, folder = %dir.display(), "script folder not found, skipping");
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("sql"))
        })
        .collect();

    files.sort_by_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });

    let mut seen = HashSet::new();
    let mut scripts = Vec::new();
    for path in files {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !seen.insert(name.to_lowercase()) {
            warn!(kind = %kind, file = %path.display(), "duplicate object name, skipping");
            continue;
        }

        let text = fs::read_to_string(&path)?;
        scripts.push(ScriptObject {
            kind,
            name,
            path,
            text,
        });
    }

    Ok(scripts)
}

/// Write `text` as `<name>.sql` under `dir`, creating the directory first.
pub fn write_script(dir: &Path, name: &str, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.sql"));
    fs::write(&path, text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_folder_is_an_empty_source() {
        let dir = tempdir().expect("tempdir");
        let scripts =
            load_scripts(&dir.path().join("nowhere"), ScriptKind::Domain).expect("load");
        assert!(scripts.is_empty());
    }

    #[test]
    fn scripts_come_back_in_case_insensitive_name_order() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b_second.sql"), "B").expect("write");
        std::fs::write(dir.path().join("A_FIRST.sql"), "A").expect("write");
        std::fs::write(dir.path().join("c_third.SQL"), "C").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let scripts = load_scripts(dir.path(), ScriptKind::Table).expect("load");
        let names: Vec<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A_FIRST", "b_second", "c_third"]);
        assert_eq!(scripts[0].text, "A");
    }

    #[test]
    fn write_script_creates_the_directory() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("out").join("domains");
        let path = write_script(&target, "DM_NAME", "CREATE DOMAIN DM_NAME AS INTEGER;\n")
            .expect("write");
        assert!(path.ends_with("DM_NAME.sql"));
        let text = std::fs::read_to_string(path).expect("read back");
        assert!(text.starts_with("CREATE DOMAIN"));
    }
}
