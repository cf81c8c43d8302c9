//! Append-only, hash-chained audit trail of mutating invocations.
//!
//! Each line is one JSON entry. `entry_hash` is the SHA-256 of the entry's
//! canonical JSON (keys sorted, `entry_hash` removed) and `prev_hash` links to
//! the entry before it. Payloads never enter the log.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::core::intent::Intent;
use crate::core::paths::StatePaths;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub actions: Vec<String>,
    pub result: AuditResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

/// What an invocation attempted, independent of how it ended.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub intent: Intent,
    pub device: Option<String>,
    pub name: Option<String>,
    pub role: String,
}

fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

/// Append an entry for `ctx` with its actions and result. Returns the line written.
pub fn record(
    paths: &StatePaths,
    ctx: &AuditContext,
    actions: &[String],
    result: AuditResult,
) -> Result<String> {
    ensure_state_dir(&paths.root)?;
    let _lock = FileLock::exclusive(&paths.audit_lock)?;
    let prev_hash = last_entry_hash(&paths.audit_log)?;

    let mut entry = AuditEntry {
        timestamp: Utc::now(),
        actor: detect_actor(),
        intent: ctx.intent.to_string(),
        device: ctx.device.clone(),
        name: ctx.name.clone(),
        role: ctx.role.clone(),
        actions: actions.to_vec(),
        result,
        prev_hash,
        entry_hash: None,
    };
    entry.entry_hash = Some(compute_entry_hash(&entry)?);

    let line = serde_json::to_string(&entry).context("serialize audit entry")?;
    append_line(&paths.audit_log, &line)?;
    Ok(line)
}

fn compute_entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry).context("serialize for hash")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("entry_hash");
    }
    let canonical = serde_json::to_string(&canonicalize_value(&value))
        .context("serialize canonical json")?;
    Ok(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

/// Recursively sort object keys so hashing does not depend on field order.
fn canonicalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize_value(&map[k]));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize_value).collect())
        }
        other => other.clone(),
    }
}

fn ensure_state_dir(root: &Path) -> Result<()> {
    if root.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(root).with_context(|| format!("create state directory {}", root.display()))?;
    #[cfg(unix)]
    {
        fs::set_permissions(root, fs::Permissions::from_mode(constants::STATE_DIR_MODE))
            .with_context(|| format!("set permissions on {}", root.display()))?;
    }
    Ok(())
}

fn append_line(audit_path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_path)
        .with_context(|| format!("open audit log {}", audit_path.display()))?;
    writeln!(file, "{}", line).context("write audit entry")?;

    #[cfg(unix)]
    {
        fs::set_permissions(audit_path, fs::Permissions::from_mode(constants::AUDIT_LOG_MODE))
            .context("set audit log permissions")?;
    }

    Ok(())
}

/// Hash the next entry links to. A damaged tail is never linked over.
fn last_entry_hash(path: &Path) -> Result<Option<String>> {
    match read_lines(path)?.pop() {
        None => Ok(None),
        Some(LogLine::Entry(entry)) => Ok(entry.entry_hash),
        Some(LogLine::Malformed(n)) => bail!(
            "audit log {} ends with a malformed entry (line {}); refusing to extend the chain",
            path.display(),
            n
        ),
    }
}

/// A non-empty audit log line, parsed or not. Line numbers are 1-based.
enum LogLine {
    Entry(AuditEntry),
    Malformed(usize),
}

fn read_lines(path: &Path) -> Result<Vec<LogLine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path).with_context(|| format!("open audit log {}", path.display()))?;
    let mut lines = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("read audit log line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(trimmed) {
            Ok(entry) => lines.push(LogLine::Entry(entry)),
            Err(_) => lines.push(LogLine::Malformed(i + 1)),
        }
    }
    Ok(lines)
}

/// Read entries, keeping only the last `limit` if given. Malformed lines are skipped.
pub fn read_log(paths: &StatePaths, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
    if !paths.root.is_dir() {
        return Ok(Vec::new());
    }
    let _lock = FileLock::shared(&paths.audit_lock)?;
    let lines = read_lines(&paths.audit_log)?;
    let total = lines.len();
    let mut entries: Vec<AuditEntry> = lines
        .into_iter()
        .filter_map(|line| match line {
            LogLine::Entry(entry) => Some(entry),
            LogLine::Malformed(_) => None,
        })
        .collect();
    if entries.len() < total {
        tracing::warn!(malformed = total - entries.len(), "skipped malformed audit entries");
    }
    if let Some(limit) = limit {
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
    }
    Ok(entries)
}

/// Check every line, every link and every entry hash. Returns (total, errors).
///
/// `total` counts malformed lines too; each one is an error and breaks the link
/// to the entry after it.
pub fn verify_chain(paths: &StatePaths) -> Result<(usize, Vec<String>)> {
    if !paths.root.is_dir() {
        return Ok((0, Vec::new()));
    }
    let lines = {
        let _lock = FileLock::shared(&paths.audit_lock)?;
        read_lines(&paths.audit_log)?
    };
    let mut errors = Vec::new();
    let mut prev: Option<String> = None;

    for (i, line) in lines.iter().enumerate() {
        let entry = match line {
            LogLine::Entry(entry) => entry,
            LogLine::Malformed(n) => {
                errors.push(format!("entry {}: malformed (line {})", i + 1, n));
                prev = None;
                continue;
            }
        };
        if entry.prev_hash != prev {
            errors.push(format!(
                "entry {}: prev_hash mismatch (expected {:?}, got {:?})",
                i + 1,
                prev,
                entry.prev_hash
            ));
        }
        match (&entry.entry_hash, compute_entry_hash(entry)) {
            (Some(stored), Ok(computed)) if stored != &computed => {
                errors.push(format!("entry {}: entry_hash mismatch (tampered?)", i + 1));
            }
            (None, _) => errors.push(format!("entry {}: entry_hash missing", i + 1)),
            (_, Err(e)) => errors.push(format!("entry {}: cannot compute hash: {}", i + 1, e)),
            _ => {}
        }
        prev = entry.entry_hash.clone();
    }

    Ok((lines.len(), errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths() -> (TempDir, StatePaths) {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::from_root(dir.path().join("state"));
        (dir, paths)
    }

    fn ctx(intent: Intent) -> AuditContext {
        AuditContext {
            intent,
            device: Some("router1".into()),
            name: Some("admin-pw".into()),
            role: "ops".into(),
        }
    }

    fn ok() -> AuditResult {
        AuditResult {
            success: true,
            error: None,
        }
    }

    #[test]
    fn test_record_creates_state_dir_and_reads_back() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &["secret-created".into()], ok()).unwrap();
        let entries = read_log(&paths, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].intent, "present");
        assert_eq!(entries[0].actions, vec!["secret-created"]);
        assert!(entries[0].prev_hash.is_none());
        assert!(entries[0].entry_hash.is_some());
    }

    #[test]
    fn test_failure_is_recorded() {
        let (_dir, paths) = test_paths();
        let result = AuditResult {
            success: false,
            error: Some("secret not found".into()),
        };
        record(&paths, &ctx(Intent::Absent), &[], result.clone()).unwrap();
        let entries = read_log(&paths, None).unwrap();
        assert_eq!(entries[0].result, result);
    }

    #[test]
    fn test_read_log_limit_keeps_tail() {
        let (_dir, paths) = test_paths();
        for role in ["a", "b", "c"] {
            let mut c = ctx(Intent::Present);
            c.role = role.into();
            record(&paths, &c, &[], ok()).unwrap();
        }
        let entries = read_log(&paths, Some(2)).unwrap();
        let roles: Vec<&str> = entries.iter().map(|e| e.role.as_str()).collect();
        assert_eq!(roles, vec!["b", "c"]);
    }

    #[test]
    fn test_read_log_without_state_dir() {
        let (_dir, paths) = test_paths();
        assert!(read_log(&paths, None).unwrap().is_empty());
    }

    #[test]
    fn test_chain_links_entries() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &["role-created".into()], ok()).unwrap();
        record(&paths, &ctx(Intent::Absent), &["secret-deleted".into()], ok()).unwrap();
        let entries = read_log(&paths, None).unwrap();
        assert_eq!(entries[1].prev_hash, entries[0].entry_hash);
        let (total, errors) = verify_chain(&paths).unwrap();
        assert_eq!(total, 2);
        assert!(errors.is_empty(), "errors: {:?}", errors);
    }

    #[test]
    fn test_verify_detects_tamper() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &["secret-created".into()], ok()).unwrap();
        record(&paths, &ctx(Intent::Absent), &["secret-deleted".into()], ok()).unwrap();
        let content = fs::read_to_string(&paths.audit_log).unwrap();
        fs::write(&paths.audit_log, content.replace("router1", "router9")).unwrap();
        let (_, errors) = verify_chain(&paths).unwrap();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = canonicalize_value(&serde_json::json!({"b": 1, "a": {"d": 2, "c": 3}}));
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_audit_log_mode() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &[], ok()).unwrap();
        let mode = fs::metadata(&paths.audit_log).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, constants::AUDIT_LOG_MODE);
    }

    #[test]
    fn test_verify_reports_truncated_tail() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &["secret-created".into()], ok()).unwrap();
        record(&paths, &ctx(Intent::Absent), &["secret-deleted".into()], ok()).unwrap();
        let content = fs::read_to_string(&paths.audit_log).unwrap();
        let last_start = content.trim_end().rfind('\n').unwrap() + 1;
        let cut = last_start + (content.len() - last_start) / 2;
        fs::write(&paths.audit_log, &content[..cut]).unwrap();

        let (total, errors) = verify_chain(&paths).unwrap();
        assert_eq!(total, 2);
        assert_eq!(errors.len(), 1, "errors: {:?}", errors);
        assert!(errors[0].contains("entry 2: malformed"));
    }

    #[test]
    fn test_record_refuses_to_extend_damaged_tail() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &[], ok()).unwrap();
        let mut file = OpenOptions::new().append(true).open(&paths.audit_log).unwrap();
        writeln!(file, "{{\"timestamp\":").unwrap();
        drop(file);

        let err = record(&paths, &ctx(Intent::Absent), &[], ok()).unwrap_err();
        assert!(err.to_string().contains("malformed"));
        let (total, errors) = verify_chain(&paths).unwrap();
        assert_eq!(total, 2);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_malformed_middle_line_breaks_following_link() {
        let (_dir, paths) = test_paths();
        record(&paths, &ctx(Intent::Present), &[], ok()).unwrap();
        record(&paths, &ctx(Intent::Absent), &[], ok()).unwrap();
        let content = fs::read_to_string(&paths.audit_log).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines.insert(1, "not json");
        fs::write(&paths.audit_log, lines.join("\n") + "\n").unwrap();

        let (total, errors) = verify_chain(&paths).unwrap();
        assert_eq!(total, 3);
        assert!(errors.iter().any(|e| e.starts_with("entry 2: malformed")));
        assert!(errors.iter().any(|e| e.starts_with("entry 3: prev_hash mismatch")));
        assert_eq!(read_log(&paths, None).unwrap().len(), 2);
    }
}
