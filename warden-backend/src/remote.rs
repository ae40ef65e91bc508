//! SSH-remote backend.
//!
//! Every check or mutation is one `ssh <target> '<command>'` invocation with a
//! bounded timeout; there is no persistent connection. Files travel with
//! `rsync -az --checksum --protect-args` when rsync is installed locally, else
//! `scp -q -s`. The choice is made once, at construction. Both forms hand the
//! destination path over without a remote shell parsing it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{file_name_of, join_dest, parent_of, BatchOutcome, CopyPair, FilesystemBackend};
use crate::checksum::parse_digest_output;
use crate::error::{io_err, BackendError};
use crate::runner::{CommandOutput, CommandRunner, RunError, SystemRunner};

/// Timeout for a single remote shell command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for a single rsync/scp transfer.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

const SSH_OPTIONS: [&str; 4] = ["-o", "BatchMode=yes", "-o", "ConnectTimeout=10"];

/// ssh reserves exit status 255 for its own failures.
const SSH_FAILURE: i32 = 255;

/// Shell exit status for "command not found".
const NO_DIGEST_TOOL: i32 = 127;

/// File transfer program used for copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferTool {
    Rsync,
    Scp,
}

impl TransferTool {
    pub fn program(self) -> &'static str {
        match self {
            TransferTool::Rsync => "rsync",
            TransferTool::Scp => "scp",
        }
    }
}

impl fmt::Display for TransferTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Backend for `[user@]host:path` locations.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    host: String,
    user: Option<String>,
    base_path: Option<String>,
    ssh_target: String,
    tool: TransferTool,
    runner: Arc<dyn CommandRunner>,
    command_timeout: Duration,
    transfer_timeout: Duration,
}

impl RemoteBackend {
    /// Remote backend driven by real `ssh`/`rsync`/`scp` processes.
    pub fn new(host: impl Into<String>, user: Option<String>, base_path: Option<String>) -> Self {
        Self::with_runner(host, user, base_path, Arc::new(SystemRunner))
    }

    /// Remote backend driven by `runner`; the transfer tool is detected
    /// through the runner once, here.
    pub fn with_runner(
        host: impl Into<String>,
        user: Option<String>,
        base_path: Option<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let host = host.into();
        let ssh_target = match &user {
            Some(user) => format!("{user}@{host}"),
            None => host.clone(),
        };
        let tool = if runner.has_program("rsync") {
            TransferTool::Rsync
        } else {
            TransferTool::Scp
        };
        tracing::debug!(host = %ssh_target, tool = %tool, "remote backend ready");
        Self {
            host,
            user,
            base_path,
            ssh_target,
            tool,
            runner,
            command_timeout: COMMAND_TIMEOUT,
            transfer_timeout: TRANSFER_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, command: Duration, transfer: Duration) -> Self {
        self.command_timeout = command;
        self.transfer_timeout = transfer;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn ssh_target(&self) -> &str {
        &self.ssh_target
    }

    pub fn transfer_tool(&self) -> TransferTool {
        self.tool
    }

    /// Relative paths join the base path; `/...` and `~...` are used verbatim.
    pub fn resolve_remote_path(&self, path: &str) -> String {
        match &self.base_path {
            Some(base) if !(path.starts_with('/') || path.starts_with('~')) => {
                join_dest(base, path)
            }
            _ => path.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Process plumbing
    // -----------------------------------------------------------------------

    fn ssh(&self, command: &str) -> Result<CommandOutput, BackendError> {
        let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
        args.push(self.ssh_target.clone());
        args.push(command.to_string());
        tracing::debug!(host = %self.ssh_target, command, "ssh");
        self.runner
            .run("ssh", &args, self.command_timeout)
            .map_err(|e| self.run_error(e))
    }

    /// Run `command`, turning any non-zero exit into a classified error.
    fn ssh_checked(&self, command: &str) -> Result<CommandOutput, BackendError> {
        let output = self.ssh(command)?;
        if output.success() {
            return Ok(output);
        }
        Err(self.classify(&output, None))
    }

    /// `test`-style check: exit 0 is true, ssh's own failure is an error,
    /// anything else is false.
    fn test_path(&self, test_flag: &str, path: &str) -> Result<bool, BackendError> {
        let quoted = quote_remote_path(&self.resolve_remote_path(path));
        let output = self.ssh(&format!("test {test_flag} {quoted}"))?;
        match output.code {
            Some(0) => Ok(true),
            Some(SSH_FAILURE) => Err(self.classify(&output, None)),
            _ => Ok(false),
        }
    }

    fn transfer(&self, sources: &[PathBuf], remote_dest: &str) -> Result<(), BackendError> {
        let mut args: Vec<String> = match self.tool {
            TransferTool::Rsync => vec![
                "-az".to_string(),
                "--checksum".to_string(),
                "--protect-args".to_string(),
                "-e".to_string(),
                format!("ssh {}", SSH_OPTIONS.join(" ")),
            ],
            TransferTool::Scp => {
                let mut a = vec!["-q".to_string(), "-s".to_string()];
                a.extend(SSH_OPTIONS.iter().map(|s| s.to_string()));
                a
            }
        };
        args.extend(sources.iter().map(|s| s.display().to_string()));
        args.push(format!("{}:{}", self.ssh_target, transfer_path(remote_dest)));

        tracing::debug!(
            host = %self.ssh_target,
            tool = %self.tool,
            files = sources.len(),
            dest = remote_dest,
            "transfer"
        );
        let output = self
            .runner
            .run(self.tool.program(), &args, self.transfer_timeout)
            .map_err(|e| self.run_error(e))?;
        if output.success() {
            return Ok(());
        }
        Err(self.classify(&output, Some("file transfer failed")))
    }

    fn run_error(&self, err: RunError) -> BackendError {
        match err {
            RunError::NotFound { program } => BackendError::ToolMissing { tool: program },
            RunError::TimedOut { timeout, .. } => BackendError::Connection {
                target: self.ssh_target.clone(),
                detail: format!("operation timed out after {}s", timeout.as_secs()),
            },
            RunError::Io { program, source } => BackendError::Operation {
                detail: format!("{program}: {source}"),
            },
        }
    }

    fn classify(&self, output: &CommandOutput, context: Option<&str>) -> BackendError {
        let stderr = output.stderr.trim();
        let lower = stderr.to_lowercase();
        let detail = match context {
            Some(ctx) if stderr.is_empty() => ctx.to_string(),
            Some(ctx) => format!("{ctx}: {stderr}"),
            None if stderr.is_empty() => format!("exit status {:?}", output.code),
            None => stderr.to_string(),
        };

        let unreachable = [
            "connection refused",
            "connection timed out",
            "could not resolve hostname",
            "no route to host",
            "host key verification failed",
            "connection closed",
        ];
        if unreachable.iter().any(|needle| lower.contains(needle))
            || (lower.contains("permission denied (") && output.code == Some(SSH_FAILURE))
        {
            return BackendError::Connection {
                target: self.ssh_target.clone(),
                detail,
            };
        }
        if lower.contains("permission denied") {
            return BackendError::Permission {
                target: self.ssh_target.clone(),
                detail,
            };
        }
        BackendError::Operation { detail }
    }

    // -----------------------------------------------------------------------
    // Batch staging
    // -----------------------------------------------------------------------

    /// Group pairs by resolved destination directory, keeping each pair's
    /// input index.
    fn group_by_dir<'a>(
        &self,
        pairs: impl Iterator<Item = (usize, &'a CopyPair)>,
    ) -> BTreeMap<String, Vec<(usize, PathBuf, String)>> {
        let mut groups: BTreeMap<String, Vec<(usize, PathBuf, String)>> = BTreeMap::new();
        for (idx, (source, dest)) in pairs {
            let resolved = self.resolve_remote_path(dest);
            let dir = parent_of(&resolved).unwrap_or_else(|| ".".to_string());
            let name = file_name_of(&resolved).to_string();
            groups.entry(dir).or_default().push((idx, source.clone(), name));
        }
        groups
    }

    /// Transfer every file of one destination directory in a single
    /// invocation. Sources whose file name differs from the destination name
    /// are staged under the destination name first.
    fn transfer_group(&self, dir: &str, files: &[(PathBuf, String)]) -> Result<(), BackendError> {
        let needs_staging = files
            .iter()
            .any(|(source, name)| source.file_name().map(|f| f.to_string_lossy() != *name).unwrap_or(true));

        if !needs_staging {
            let sources: Vec<PathBuf> = files.iter().map(|(s, _)| s.clone()).collect();
            return self.transfer(&sources, &format!("{}/", dir.trim_end_matches('/')));
        }

        let staging = tempfile::Builder::new()
            .prefix("warden-stage-")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        let mut staged = Vec::with_capacity(files.len());
        for (source, name) in files {
            let target = staging.path().join(name);
            copy_into_stage(source, &target)?;
            staged.push(target);
        }
        self.transfer(&staged, &format!("{}/", dir.trim_end_matches('/')))
    }
}

/// Fail every pair of one destination-directory group with `err`.
fn fail_group(outcome: &mut BatchOutcome, files: &[(usize, PathBuf, String)], err: &BackendError) {
    for (idx, _, _) in files {
        outcome[*idx] = Err(err.clone());
    }
}

fn copy_into_stage(source: &Path, target: &Path) -> Result<(), BackendError> {
    std::fs::copy(source, target).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound if !source.exists() => BackendError::PathNotFound {
            path: source.display().to_string(),
        },
        _ => io_err(target, e),
    })?;
    Ok(())
}

/// Destination path as handed to rsync/scp. Neither runs it through a
/// remote shell, so `~` cannot expand there; home-relative paths are passed
/// relative instead, which both tools resolve against the login directory.
fn transfer_path(remote_dest: &str) -> &str {
    if remote_dest == "~" || remote_dest == "~/" {
        return ".";
    }
    match remote_dest.strip_prefix("~/") {
        Some(rest) => rest,
        None => remote_dest,
    }
}

/// Quote a path for the remote shell.
///
/// `~` and `~/rest` become `"$HOME"` / `"$HOME/rest"` so the remote shell
/// expands the home directory; everything else is single-quoted.
pub fn quote_remote_path(path: &str) -> String {
    if path == "~" {
        return "\"$HOME\"".to_string();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let mut escaped = String::with_capacity(rest.len());
        for c in rest.chars() {
            if matches!(c, '"' | '\\' | '$' | '`') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        return format!("\"$HOME/{escaped}\"");
    }
    format!("'{}'", path.replace('\'', r"'\''"))
}

impl FilesystemBackend for RemoteBackend {
    fn try_exists(&self, path: &str) -> Result<bool, BackendError> {
        self.test_path("-e", path)
    }

    fn try_is_dir(&self, path: &str) -> Result<bool, BackendError> {
        self.test_path("-d", path)
    }

    fn mkdir(&self, path: &str, parents: bool, exist_ok: bool) -> Result<(), BackendError> {
        let resolved = self.resolve_remote_path(path);
        let quoted = quote_remote_path(&resolved);
        let command = if parents && exist_ok {
            // `mkdir -p` is already a no-op for existing directories.
            format!("mkdir -p {quoted}")
        } else if exist_ok {
            format!("test -d {quoted} || mkdir {quoted}")
        } else if parents {
            format!("test ! -e {quoted} && mkdir -p {quoted}")
        } else {
            format!("mkdir {quoted}")
        };
        self.ssh_checked(&command)?;
        Ok(())
    }

    fn copy_file(&self, source: &Path, dest: &str) -> Result<(), BackendError> {
        if !source.exists() {
            return Err(BackendError::PathNotFound {
                path: source.display().to_string(),
            });
        }
        let resolved = self.resolve_remote_path(dest);
        if let Some(dir) = parent_of(&resolved) {
            self.mkdir(&dir, true, true)?;
        }
        self.transfer_group(
            &parent_of(&resolved).unwrap_or_else(|| ".".to_string()),
            &[(source.to_path_buf(), file_name_of(&resolved).to_string())],
        )
    }

    /// One `mkdir -p` for all destination directories, then one transfer per
    /// directory. A failed transfer fails only its own directory's pairs;
    /// once the host stops answering, the remaining directories are not
    /// attempted and inherit that connectivity error.
    fn copy_files_batch(&self, pairs: &[CopyPair], create_dirs: bool) -> BatchOutcome {
        let mut outcome: BatchOutcome = pairs
            .iter()
            .map(|(source, _)| {
                if source.exists() {
                    Ok(())
                } else {
                    Err(BackendError::PathNotFound {
                        path: source.display().to_string(),
                    })
                }
            })
            .collect();
        let groups = self.group_by_dir(
            pairs
                .iter()
                .enumerate()
                .filter(|(idx, _)| outcome[*idx].is_ok()),
        );
        if groups.is_empty() {
            return outcome;
        }

        if create_dirs {
            let dirs: Vec<String> = groups.keys().map(|d| quote_remote_path(d)).collect();
            if let Err(err) = self.ssh_checked(&format!("mkdir -p {}", dirs.join(" "))) {
                for files in groups.values() {
                    fail_group(&mut outcome, files, &err);
                }
                return outcome;
            }
        }

        let mut unreachable: Option<BackendError> = None;
        for (dir, files) in &groups {
            if let Some(err) = &unreachable {
                fail_group(&mut outcome, files, err);
                continue;
            }
            let named: Vec<(PathBuf, String)> =
                files.iter().map(|(_, source, name)| (source.clone(), name.clone())).collect();
            if let Err(err) = self.transfer_group(dir, &named) {
                tracing::warn!(host = %self.ssh_target, dir = %dir, error = %err, "batch transfer failed");
                fail_group(&mut outcome, files, &err);
                if err.is_connectivity() {
                    unreachable = Some(err);
                }
            }
        }
        outcome
    }

    fn remove_file(&self, path: &str) -> Result<(), BackendError> {
        let quoted = quote_remote_path(&self.resolve_remote_path(path));
        self.ssh_checked(&format!("rm -f {quoted}"))?;
        Ok(())
    }

    fn checksum(&self, path: &str) -> Result<String, BackendError> {
        let resolved = self.resolve_remote_path(path);
        let quoted = quote_remote_path(&resolved);
        let output = self.ssh(&format!(
            "if command -v sha256sum >/dev/null 2>&1; then sha256sum {quoted}; \
             elif command -v shasum >/dev/null 2>&1; then shasum -a 256 {quoted}; \
             else echo 'sha256sum: command not found' >&2; exit {NO_DIGEST_TOOL}; fi"
        ))?;
        let lower = output.stderr.to_lowercase();
        match output.code {
            Some(0) => parse_digest_output(&output.stdout).ok_or_else(|| BackendError::Operation {
                detail: format!("unexpected checksum output for {resolved}: {}", output.stdout.trim()),
            }),
            Some(SSH_FAILURE) => Err(self.classify(&output, None)),
            _ if lower.contains("no such file") => Err(BackendError::PathNotFound { path: resolved }),
            Some(NO_DIGEST_TOOL) => Err(BackendError::ToolMissing {
                tool: format!("sha256sum on {}", self.ssh_target),
            }),
            _ => Err(self.classify(&output, Some("checksum failed"))),
        }
    }

    fn read_to_string(&self, path: &str) -> Result<String, BackendError> {
        let resolved = self.resolve_remote_path(path);
        let output = self.ssh(&format!("cat {}", quote_remote_path(&resolved)))?;
        match output.code {
            Some(0) => Ok(output.stdout),
            Some(SSH_FAILURE) => Err(self.classify(&output, None)),
            _ if output.stderr.to_lowercase().contains("no such file") => {
                Err(BackendError::PathNotFound { path: resolved })
            }
            _ => Err(self.classify(&output, None)),
        }
    }

    fn supports_symlinks(&self) -> bool {
        false
    }

    fn location_string(&self) -> String {
        match &self.base_path {
            Some(base) => format!("{}:{}", self.ssh_target, base),
            None => self.ssh_target.clone(),
        }
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("~", "\"$HOME\"")]
    #[case("~/app/.claude", "\"$HOME/app/.claude\"")]
    #[case("~/we\"ird$dir", "\"$HOME/we\\\"ird\\$dir\"")]
    #[case("/srv/app", "'/srv/app'")]
    #[case("/srv/it's here", "'/srv/it'\\''s here'")]
    #[case("relative/dir", "'relative/dir'")]
    fn quoting(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(quote_remote_path(path), expected);
    }

    #[rstest]
    #[case("~", ".")]
    #[case("~/app/.claude/rules/", "app/.claude/rules/")]
    #[case("/srv/my app;touch x/", "/srv/my app;touch x/")]
    #[case("relative/dir/", "relative/dir/")]
    fn transfer_paths_are_literal(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(transfer_path(path), expected);
    }
}
