// src/core/persistence.rs

//! Reading and writing the `.mulle/{etc,share}/env` layout.
//!
//! Scope files are plain shell scripts (`export NAME="value"`), overlays are
//! `auxscope` files of `name;priority` lines. Only the etc layer is ever
//! written.

use crate::constants::{
    AUXSCOPE_FILENAME, DEFAULT_AUX_PRIORITY, ENV_DIR, ENVIRONMENT_FILE_PREFIX,
    ENVIRONMENT_FILE_SUFFIX, ETC_DIR, MULLE_DIR, SHARE_DIR,
};
use crate::core::applicability::is_applicable;
use crate::models::{
    AuxScopeEntry, EffectiveVariable, ParseWarning, RuntimeContext, ScopeKind, VariableRecord,
};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use walkdir::WalkDir;

lazy_static! {
    static ref EXPORT_RE: Regex =
        Regex::new(r"^export\s+([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("export pattern is valid");
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Project directory '{0}' does not exist.")]
    ProjectNotFound(PathBuf),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not scan '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Could not replace '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn env_dir(root: &Path, kind: ScopeKind) -> PathBuf {
    let layer = match kind {
        ScopeKind::Share => SHARE_DIR,
        _ => ETC_DIR,
    };
    root.join(MULLE_DIR).join(layer).join(ENV_DIR)
}

pub fn scope_file_name(scope: &str) -> String {
    format!("{}{}{}", ENVIRONMENT_FILE_PREFIX, scope, ENVIRONMENT_FILE_SUFFIX)
}

/// `environment-<scope>.sh` -> `<scope>`
pub fn scope_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(ENVIRONMENT_FILE_PREFIX)?
        .strip_suffix(ENVIRONMENT_FILE_SUFFIX)
        .filter(|name| !name.is_empty())
}

// --- Parsing ---

fn strip_matching_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Parses one scope file. Malformed lines are skipped with a warning.
pub fn parse_environment_file(content: &str, file: &Path) -> (Vec<VariableRecord>, Vec<ParseWarning>) {
    let mut records: Vec<VariableRecord> = Vec::new();
    let mut warnings = Vec::new();
    let mut pending_comment = String::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || (line_no == 1 && trimmed.starts_with("#!")) {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            pending_comment = comment.trim().to_string();
            continue;
        }

        let Some(caps) = EXPORT_RE.captures(trimmed) else {
            warnings.push(ParseWarning {
                file: file.to_path_buf(),
                line: line_no,
                message: format!("ignored line '{}'", trimmed),
            });
            continue;
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let value = strip_matching_quotes(caps.get(2).map_or("", |m| m.as_str()));
        let comment = std::mem::take(&mut pending_comment);

        // The first definition wins, as in unification.
        if records.iter().any(|r| r.name == name) {
            warnings.push(ParseWarning {
                file: file.to_path_buf(),
                line: line_no,
                message: format!("'{}' is exported more than once; the first value is kept", name),
            });
            continue;
        }
        records.push(VariableRecord::new(name, value).with_comment(comment));
    }
    (records, warnings)
}

/// Serializes enabled records; disabled ones are dropped from the file.
pub fn serialize_environment_file(records: &[VariableRecord]) -> String {
    let mut content = String::new();
    for record in records.iter().filter(|r| r.enabled) {
        if !record.comment.is_empty() {
            content.push_str(&format!("# {}\n", record.comment));
        }
        content.push_str(&format!("export {}=\"{}\"\n\n", record.name, record.raw_value));
    }
    content
}

pub fn parse_auxscope(content: &str, file: &Path) -> (Vec<AuxScopeEntry>, Vec<ParseWarning>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (name, priority_text) = match trimmed.split_once(';') {
            Some((name, priority)) => (name.trim(), Some(priority.trim())),
            None => (trimmed, None),
        };
        if name.is_empty() {
            continue;
        }

        let priority = match priority_text.filter(|p| !p.is_empty()) {
            None => DEFAULT_AUX_PRIORITY,
            Some(text) => match text.parse::<f64>() {
                Ok(p) if p.is_finite() => p,
                _ => {
                    warnings.push(ParseWarning {
                        file: file.to_path_buf(),
                        line: index + 1,
                        message: format!(
                            "invalid priority '{}' for scope '{}', using {}",
                            text, name, DEFAULT_AUX_PRIORITY
                        ),
                    });
                    DEFAULT_AUX_PRIORITY
                }
            },
        };
        entries.push(AuxScopeEntry {
            scope: name.to_string(),
            priority,
        });
    }
    (entries, warnings)
}

pub fn serialize_auxscope(entries: &[AuxScopeEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{};{}\n", e.scope, e.priority))
        .collect()
}

// --- Loading ---

/// One layer of a project as found on disk.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadedLayer {
    /// Scope name -> records, ordered by scope name.
    pub scopes: BTreeMap<String, Vec<VariableRecord>>,
    pub overlay: Vec<AuxScopeEntry>,
    pub overlay_present: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadedProject {
    pub etc: LoadedLayer,
    pub share: LoadedLayer,
    pub warnings: Vec<ParseWarning>,
}

fn read_to_string(path: &Path) -> PersistenceResult<String> {
    fs::read_to_string(path).map_err(io_error(path))
}

fn scope_files(dir: &Path) -> PersistenceResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| PersistenceError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(scope) = entry.file_name().to_str().and_then(scope_name_from_file) {
            files.push((scope.to_string(), entry.path().to_path_buf()));
        }
    }
    files.sort();
    Ok(files)
}

fn load_layer(dir: &Path, warnings: &mut Vec<ParseWarning>) -> PersistenceResult<LoadedLayer> {
    let mut layer = LoadedLayer::default();
    if !dir.is_dir() {
        return Ok(layer);
    }

    // 1. Parse every scope file in parallel.
    let files = scope_files(dir)?;
    let parsed: Vec<PersistenceResult<(String, Vec<VariableRecord>, Vec<ParseWarning>)>> = files
        .par_iter()
        .map(|(scope, path)| {
            let content = read_to_string(path)?;
            let (records, file_warnings) = parse_environment_file(&content, path);
            Ok((scope.clone(), records, file_warnings))
        })
        .collect();

    // 2. Merge in file-name order.
    for result in parsed {
        let (scope, records, file_warnings) = result?;
        log::debug!("Loaded {} variables for scope '{}'", records.len(), scope);
        warnings.extend(file_warnings);
        layer.scopes.insert(scope, records);
    }

    // 3. The overlay, if any.
    let aux_path = dir.join(AUXSCOPE_FILENAME);
    if aux_path.is_file() {
        let (overlay, aux_warnings) = parse_auxscope(&read_to_string(&aux_path)?, &aux_path);
        layer.overlay = overlay;
        layer.overlay_present = true;
        warnings.extend(aux_warnings);
    }
    Ok(layer)
}

pub fn load_project(root: &Path) -> PersistenceResult<LoadedProject> {
    if !root.is_dir() {
        return Err(PersistenceError::ProjectNotFound(root.to_path_buf()));
    }

    let mut warnings = Vec::new();
    let etc = load_layer(&env_dir(root, ScopeKind::Etc), &mut warnings)?;
    let share = load_layer(&env_dir(root, ScopeKind::Share), &mut warnings)?;
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    Ok(LoadedProject {
        etc,
        share,
        warnings,
    })
}

// --- Saving ---

/// What a save writes into the etc layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavePlan {
    pub scopes: Vec<(String, Vec<VariableRecord>)>,
    pub overlay: Vec<AuxScopeEntry>,
    /// Scopes deleted in the session; their files are removed.
    pub retired: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    pub files_written: usize,
    pub files_removed: usize,
}

/// Writes `content` next to `path` and renames it into place.
pub fn write_atomically(path: &Path, content: &str) -> PersistenceResult<()> {
    write_atomically_bytes(path, content.as_bytes())
}

pub fn write_atomically_bytes(path: &Path, content: &[u8]) -> PersistenceResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    temp.write_all(content).map_err(io_error(path))?;
    temp.flush().map_err(io_error(path))?;
    temp.persist(path).map_err(|source| PersistenceError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn save_project(root: &Path, plan: &SavePlan) -> PersistenceResult<SaveReport> {
    let dir = env_dir(root, ScopeKind::Etc);
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    let mut report = SaveReport::default();

    for (scope, records) in &plan.scopes {
        let path = dir.join(scope_file_name(scope));
        write_atomically(&path, &serialize_environment_file(records))?;
        report.files_written += 1;
    }

    let aux_path = dir.join(AUXSCOPE_FILENAME);
    if !plan.overlay.is_empty() || aux_path.exists() {
        write_atomically(&aux_path, &serialize_auxscope(&plan.overlay))?;
        report.files_written += 1;
    }

    for scope in &plan.retired {
        if plan.scopes.iter().any(|(name, _)| name == scope) {
            continue;
        }
        let path = dir.join(scope_file_name(scope));
        if path.is_file() {
            fs::remove_file(&path).map_err(io_error(&path))?;
            report.files_removed += 1;
        }
    }

    log::debug!(
        "Saved '{}': {} written, {} removed",
        root.display(),
        report.files_written,
        report.files_removed
    );
    Ok(report)
}

/// Renders the enabled, applicable effective variables in load order as one script.
/// The system scope is left out; those facts belong to the running machine.
pub fn render_export_script(effective: &[EffectiveVariable], ctx: &RuntimeContext) -> String {
    let mut script = format!("#!/bin/sh\n# Environment for {}\n\n", ctx);
    for var in effective {
        if !var.enabled || var.kind == ScopeKind::System || !is_applicable(&var.scope_id(), ctx) {
            continue;
        }
        script.push_str(&format!("# {}:{}\n", var.kind, var.scope));
        if !var.comment.is_empty() {
            script.push_str(&format!("# {}\n", var.comment));
        }
        script.push_str(&format!("export {}=\"{}\"\n\n", var.key, var.raw_value));
    }
    script
}

/// Writes a standalone, executable script that sets up the environment.
pub fn write_export_script(path: &Path, content: &str) -> PersistenceResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    write_atomically(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(io_error(path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_comments_quotes_and_junk() {
        // --- Setup ---
        let content = "#!/bin/sh\n\
                       # Compiler to use\n\
                       export CC=\"clang\"\n\
                       export FLAGS='-O2'\n\
                       \n\
                       echo hello\n\
                       export RAW=plain\n\
                       export HALF=\"open\n";

        // --- Execute ---
        let (records, warnings) = parse_environment_file(content, Path::new("env.sh"));

        // --- Assert ---
        let got: Vec<(&str, &str, &str)> = records
            .iter()
            .map(|r| (r.name.as_str(), r.raw_value.as_str(), r.comment.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("CC", "clang", "Compiler to use"),
                ("FLAGS", "-O2", ""),
                ("RAW", "plain", ""),
                ("HALF", "\"open", ""),
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.first().map(|w| w.line), Some(6));
    }

    #[test]
    fn test_duplicate_export_first_wins() {
        let content = "export A=\"first\"\nexport B=\"2\"\n# later\nexport A=\"second\"\n";
        let (records, warnings) = parse_environment_file(content, Path::new("x"));

        assert_eq!(records.len(), 2);
        let a = records.first().unwrap();
        assert_eq!((a.raw_value.as_str(), a.comment.as_str()), ("first", ""));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.first().map(|w| w.line), Some(4));

        // A load-and-save keeps the stored value.
        assert_eq!(
            serialize_environment_file(&records),
            "export A=\"first\"\n\nexport B=\"2\"\n\n"
        );
    }

    #[test]
    fn test_serialize_skips_disabled() {
        let mut off = VariableRecord::new("OFF", "x");
        off.enabled = false;
        let records = vec![VariableRecord::new("CC", "clang").with_comment("Compiler"), off, VariableRecord::new("N", "")];

        assert_eq!(
            serialize_environment_file(&records),
            "# Compiler\nexport CC=\"clang\"\n\nexport N=\"\"\n\n"
        );
    }

    #[test]
    fn test_auxscope_defaults_and_bad_priorities() {
        let content = "# comment\nlocal;30\nbare\nbroken;high\n\nfrac;25.5\n";
        let (entries, warnings) = parse_auxscope(content, Path::new("auxscope"));

        assert_eq!(
            entries,
            vec![
                AuxScopeEntry { scope: "local".to_string(), priority: 30.0 },
                AuxScopeEntry { scope: "bare".to_string(), priority: 20.0 },
                AuxScopeEntry { scope: "broken".to_string(), priority: 20.0 },
                AuxScopeEntry { scope: "frac".to_string(), priority: 25.5 },
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(serialize_auxscope(&entries), "local;30\nbare;20\nbroken;20\nfrac;25.5\n");
    }

    #[test]
    fn test_load_missing_project_fails() {
        let dir = tempdir().unwrap();
        let result = load_project(&dir.path().join("absent"));
        assert!(matches!(result, Err(PersistenceError::ProjectNotFound(_))));
    }

    #[test]
    fn test_load_and_save_roundtrip_on_disk() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let root = dir.path();
        let etc = env_dir(root, ScopeKind::Etc);
        let share = env_dir(root, ScopeKind::Share);
        fs::create_dir_all(&etc).unwrap();
        fs::create_dir_all(&share).unwrap();
        fs::write(etc.join("environment-global.sh"), "export FOO=\"bar\"\n").unwrap();
        fs::write(etc.join("environment-old.sh"), "export OLD=\"1\"\n").unwrap();
        fs::write(etc.join("notes.txt"), "not a scope").unwrap();
        fs::write(share.join("environment-plugin.sh"), "export SHARED=\"s\"\n").unwrap();
        fs::write(share.join(AUXSCOPE_FILENAME), "vendor;12\n").unwrap();

        // --- Execute ---
        let loaded = load_project(root).unwrap();

        // --- Assert ---
        assert_eq!(loaded.etc.scopes.keys().collect::<Vec<_>>(), vec!["global", "old"]);
        assert_eq!(loaded.share.scopes.keys().collect::<Vec<_>>(), vec!["plugin"]);
        assert!(!loaded.etc.overlay_present);
        assert!(loaded.share.overlay_present);

        // --- Execute: save ---
        let plan = SavePlan {
            scopes: vec![("global".to_string(), vec![VariableRecord::new("FOO", "baz")])],
            overlay: vec![AuxScopeEntry { scope: "local".to_string(), priority: 45.0 }],
            retired: vec!["old".to_string()],
        };
        let report = save_project(root, &plan).unwrap();

        // --- Assert: save ---
        assert_eq!(report, SaveReport { files_written: 2, files_removed: 1 });
        assert_eq!(
            fs::read_to_string(etc.join("environment-global.sh")).unwrap(),
            "export FOO=\"baz\"\n\n"
        );
        assert_eq!(fs::read_to_string(etc.join(AUXSCOPE_FILENAME)).unwrap(), "local;45\n");
        assert!(!etc.join("environment-old.sh").exists());
        assert!(etc.join("notes.txt").exists());
        assert_eq!(
            fs::read_to_string(share.join("environment-plugin.sh")).unwrap(),
            "export SHARED=\"s\"\n"
        );
    }

    #[test]
    fn test_empty_overlay_does_not_create_auxscope() {
        let dir = tempdir().unwrap();
        save_project(dir.path(), &SavePlan::default()).unwrap();
        assert!(!env_dir(dir.path(), ScopeKind::Etc).join(AUXSCOPE_FILENAME).exists());
    }

    #[test]
    fn test_export_script_keeps_applicable_enabled_variables() {
        let ctx = RuntimeContext::new("linux", "box", "alice");
        let var = |key: &str, scope: &str, kind: ScopeKind, enabled: bool| EffectiveVariable {
            key: key.to_string(),
            raw_value: "v".to_string(),
            scope: scope.to_string(),
            kind,
            priority: 1.0,
            editable: kind == ScopeKind::Etc,
            enabled,
            comment: String::new(),
        };
        let effective = vec![
            var("MULLE_UNAME", "system", ScopeKind::System, true),
            var("PLUG", "plugin", ScopeKind::Share, true),
            var("MAC", "os-darwin", ScopeKind::Etc, true),
            var("OFF", "global", ScopeKind::Etc, false),
            var("ON", "global", ScopeKind::Etc, true),
        ];

        let script = render_export_script(&effective, &ctx);

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("export PLUG=\"v\"\n"));
        assert!(script.contains("# etc:global\nexport ON=\"v\"\n"));
        for absent in ["MULLE_UNAME", "MAC", "OFF"] {
            assert!(!script.contains(absent), "{} should not be exported", absent);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_export_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("env.sh");
        write_export_script(&path, "#!/bin/sh\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
