use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use warden_backend::{
    BackendError, CommandOutput, CommandRunner, FilesystemBackend, RemoteBackend, RunError,
    TransferTool,
};

type Reply = Box<dyn Fn(&str, &[String]) -> Result<CommandOutput, RunError> + Send + Sync>;

/// Records every invocation and answers from a script.
struct RecordingRunner {
    rsync: bool,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    reply: Reply,
}

impl fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRunner").field("rsync", &self.rsync).finish()
    }
}

impl RecordingRunner {
    fn new(rsync: bool, reply: impl Fn(&str, &[String]) -> Result<CommandOutput, RunError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            rsync,
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    fn ok(rsync: bool) -> Arc<Self> {
        Self::new(rsync, |_, _| Ok(exit(0, "", "")))
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Remote shell commands passed to ssh, in order.
    fn ssh_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(program, _)| program == "ssh")
            .filter_map(|(_, args)| args.last().cloned())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String], _timeout: Duration) -> Result<CommandOutput, RunError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((program.to_string(), args.to_vec()));
        (self.reply)(program, args)
    }

    fn has_program(&self, program: &str) -> bool {
        program == "rsync" && self.rsync
    }
}

fn exit(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn backend(runner: &Arc<RecordingRunner>) -> RemoteBackend {
    RemoteBackend::with_runner(
        "web1",
        Some("deploy".to_string()),
        Some("/srv/app".to_string()),
        runner.clone(),
    )
}

#[test]
fn ssh_invocation_is_non_interactive_and_bounded() {
    let runner = RecordingRunner::ok(true);
    assert!(backend(&runner).exists(".claude/rules/style.md"));

    let (program, args) = runner.calls().remove(0);
    assert_eq!(program, "ssh");
    assert_eq!(
        args,
        vec![
            "-o",
            "BatchMode=yes",
            "-o",
            "ConnectTimeout=10",
            "deploy@web1",
            "test -e '/srv/app/.claude/rules/style.md'",
        ]
    );
}

#[test]
fn existence_checks_distinguish_absent_from_unreachable() {
    let runner = RecordingRunner::new(true, |_, args| {
        let cmd = args.last().map(String::as_str).unwrap_or_default();
        if cmd.contains("present") {
            Ok(exit(0, "", ""))
        } else if cmd.contains("absent") {
            Ok(exit(1, "", ""))
        } else {
            Ok(exit(255, "", "ssh: connect to host web1 port 22: Connection refused"))
        }
    });
    let remote = backend(&runner);
    assert!(remote.try_exists("present").unwrap());
    assert!(!remote.try_exists("absent").unwrap());
    let err = remote.try_exists("other").unwrap_err();
    assert!(err.is_connectivity(), "{err:?}");
    assert!(!remote.exists("other"));
}

#[test]
fn home_relative_paths_expand_on_the_remote_side() {
    let runner = RecordingRunner::ok(true);
    let remote = RemoteBackend::with_runner("web1", None, Some("~/app".to_string()), runner.clone());
    remote.remove_file(".cursor/rules/it's.mdc").unwrap();
    remote.remove_file("/tmp/it's.mdc").unwrap();

    assert_eq!(
        runner.ssh_commands(),
        vec![
            "rm -f \"$HOME/app/.cursor/rules/it's.mdc\"".to_string(),
            "rm -f '/tmp/it'\\''s.mdc'".to_string(),
        ]
    );
}

#[test]
fn batch_copy_makes_directories_once_and_transfers_per_directory() {
    let src = TempDir::new().unwrap();
    src.child("style.md").write_str("style").unwrap();
    src.child("testing.md").write_str("testing").unwrap();
    src.child("review.md").write_str("review").unwrap();

    let runner = RecordingRunner::ok(true);
    let remote = backend(&runner);
    assert_eq!(remote.transfer_tool(), TransferTool::Rsync);
    let outcome = remote.copy_files_batch(
        &[
            (src.path().join("style.md"), ".claude/rules/style.md".to_string()),
            (src.path().join("review.md"), ".claude/commands/review.md".to_string()),
            (src.path().join("testing.md"), ".claude/rules/testing.md".to_string()),
        ],
        true,
    );
    assert_eq!(outcome.len(), 3);
    assert!(outcome.iter().all(Result::is_ok), "{outcome:?}");

    let calls = runner.calls();
    assert_eq!(calls.len(), 3, "{calls:#?}");
    assert_eq!(
        runner.ssh_commands(),
        vec!["mkdir -p '/srv/app/.claude/commands' '/srv/app/.claude/rules'".to_string()]
    );

    let rsyncs: Vec<&Vec<String>> = calls
        .iter()
        .filter(|(program, _)| program == "rsync")
        .map(|(_, args)| args)
        .collect();
    assert_eq!(rsyncs.len(), 2);
    assert_eq!(&rsyncs[0][..4], ["-az", "--checksum", "--protect-args", "-e"]);
    assert_eq!(rsyncs[0].last().unwrap(), "deploy@web1:/srv/app/.claude/commands/");
    assert_eq!(rsyncs[1].last().unwrap(), "deploy@web1:/srv/app/.claude/rules/");
    // source files of the rules group: style.md and testing.md
    assert_eq!(rsyncs[1].len(), 5 + 2 + 1);
}

#[test]
fn one_failed_directory_leaves_the_others_copied() {
    let src = TempDir::new().unwrap();
    src.child("style.md").write_str("style").unwrap();
    src.child("review.md").write_str("review").unwrap();
    src.child("testing.md").write_str("testing").unwrap();

    // commands/ sorts before rules/, so the first rsync lands and the second
    // times out.
    let rsyncs = Mutex::new(0);
    let runner = RecordingRunner::new(true, move |program, _| {
        if program != "rsync" {
            return Ok(exit(0, "", ""));
        }
        let mut n = rsyncs.lock().expect("counter");
        *n += 1;
        if *n == 1 {
            Ok(exit(0, "", ""))
        } else {
            Err(RunError::TimedOut {
                program: program.to_string(),
                timeout: Duration::from_secs(60),
            })
        }
    });
    let outcome = backend(&runner).copy_files_batch(
        &[
            (src.path().join("style.md"), ".claude/rules/style.md".to_string()),
            (src.path().join("review.md"), ".claude/commands/review.md".to_string()),
            (src.path().join("testing.md"), ".claude/rules/testing.md".to_string()),
        ],
        true,
    );

    assert!(outcome[0].as_ref().unwrap_err().is_connectivity());
    assert!(outcome[1].is_ok());
    assert!(outcome[2].as_ref().unwrap_err().is_connectivity());
}

#[test]
fn unreachable_host_stops_remaining_transfers() {
    let src = TempDir::new().unwrap();
    src.child("a.md").write_str("a").unwrap();
    src.child("b.md").write_str("b").unwrap();
    let runner = RecordingRunner::new(true, |program, _| {
        if program == "rsync" {
            Ok(exit(255, "", "ssh: connect to host web1 port 22: Connection refused"))
        } else {
            Ok(exit(0, "", ""))
        }
    });
    let outcome = backend(&runner).copy_files_batch(
        &[
            (src.path().join("a.md"), ".augment/rules/a.md".to_string()),
            (src.path().join("b.md"), ".augment/commands/b.md".to_string()),
        ],
        true,
    );

    assert!(outcome.iter().all(|r| matches!(r, Err(e) if e.is_connectivity())));
    let transfers = runner.calls().iter().filter(|(program, _)| program == "rsync").count();
    assert_eq!(transfers, 1);
}

#[test]
fn missing_source_fails_only_its_own_pair() {
    let src = TempDir::new().unwrap();
    src.child("a.md").write_str("a").unwrap();
    let runner = RecordingRunner::ok(true);
    let outcome = backend(&runner).copy_files_batch(
        &[
            (src.path().join("gone.md"), ".augment/rules/gone.md".to_string()),
            (src.path().join("a.md"), ".augment/rules/a.md".to_string()),
        ],
        true,
    );
    assert!(outcome[0].as_ref().unwrap_err().is_not_found());
    assert!(outcome[1].is_ok());
}

#[test]
fn transfer_destination_is_not_parsed_by_a_remote_shell() {
    let src = TempDir::new().unwrap();
    src.child("style.md").write_str("style").unwrap();
    let runner = RecordingRunner::ok(true);
    let remote = RemoteBackend::with_runner(
        "web1",
        Some("deploy".to_string()),
        Some("/srv/my app;touch pwned".to_string()),
        runner.clone(),
    );
    remote
        .copy_file(&src.path().join("style.md"), ".claude/rules/style.md")
        .unwrap();

    let (program, args) = runner.calls().remove(1);
    assert_eq!(program, "rsync");
    assert!(args.iter().any(|a| a == "--protect-args"), "{args:?}");
    assert_eq!(args.last().unwrap(), "deploy@web1:/srv/my app;touch pwned/.claude/rules/");
}

#[test]
fn home_relative_transfer_destination_is_relative_to_login_dir() {
    let src = TempDir::new().unwrap();
    src.child("style.md").write_str("style").unwrap();
    let runner = RecordingRunner::ok(false);
    let remote = RemoteBackend::with_runner(
        "web1",
        Some("deploy".to_string()),
        Some("~/app".to_string()),
        runner.clone(),
    );
    remote
        .copy_file(&src.path().join("style.md"), ".claude/rules/style.md")
        .unwrap();

    let (program, args) = runner.calls().remove(1);
    assert_eq!(program, "scp");
    assert_eq!(&args[..2], ["-q", "-s"]);
    assert_eq!(args.last().unwrap(), "deploy@web1:app/.claude/rules/");
}

#[test]
fn batch_copy_without_create_dirs_skips_mkdir() {
    let src = TempDir::new().unwrap();
    src.child("a.md").write_str("a").unwrap();
    let runner = RecordingRunner::ok(true);
    let outcome =
        backend(&runner).copy_files_batch(&[(src.path().join("a.md"), ".augment/rules/a.md".to_string())], false);
    assert!(outcome[0].is_ok());
    assert!(runner.ssh_commands().is_empty());
}

#[test]
fn renamed_sources_are_staged_under_destination_names() {
    let src = TempDir::new().unwrap();
    src.child("style.md").write_str("style").unwrap();
    let runner = RecordingRunner::ok(false);
    let remote = backend(&runner);
    assert_eq!(remote.transfer_tool(), TransferTool::Scp);
    remote
        .copy_file(&src.path().join("style.md"), ".cursor/rules/style.mdc")
        .unwrap();

    let calls = runner.calls();
    assert_eq!(calls[0].1.last().unwrap(), "mkdir -p '/srv/app/.cursor/rules'");
    let (program, args) = &calls[1];
    assert_eq!(program, "scp");
    assert_eq!(&args[..2], ["-q", "-s"]);
    let staged = &args[args.len() - 2];
    assert!(staged.ends_with("style.mdc"), "{staged}");
    assert_eq!(args.last().unwrap(), "deploy@web1:/srv/app/.cursor/rules/");
}

#[test]
fn missing_local_source_fails_before_any_remote_call() {
    let src = TempDir::new().unwrap();
    let runner = RecordingRunner::ok(true);
    let err = backend(&runner)
        .copy_file(&src.path().join("gone.md"), "x.md")
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(runner.calls().is_empty());
}

#[test]
fn checksum_uses_remote_digest_tool() {
    let hex = "2d711642b726b04401627ca9fbac32f5c8530fb1903cc4db02258717921a4881";
    let runner = RecordingRunner::new(true, move |_, args| {
        if args.last().map(|c| c.contains("missing")).unwrap_or(false) {
            Ok(exit(1, "", "shasum: missing: No such file or directory"))
        } else {
            Ok(exit(0, &format!("{hex}  /srv/app/x.md\n"), ""))
        }
    });
    let remote = backend(&runner);
    assert_eq!(remote.checksum("x.md").unwrap(), hex);
    let command = &runner.ssh_commands()[0];
    assert!(command.starts_with("if command -v sha256sum"), "{command}");
    assert!(command.contains("then sha256sum '/srv/app/x.md';"), "{command}");
    assert!(command.contains("shasum -a 256 '/srv/app/x.md'"), "{command}");
    assert!(remote.checksum("missing.md").unwrap_err().is_not_found());
}

#[test]
fn checksum_failures_are_not_all_missing_files() {
    fn checksum_err(code: i32, stderr: &'static str) -> BackendError {
        let runner = RecordingRunner::new(true, move |_, _| Ok(exit(code, "", stderr)));
        backend(&runner).checksum("x.md").unwrap_err()
    }

    assert!(matches!(
        checksum_err(127, "sha256sum: command not found"),
        BackendError::ToolMissing { .. }
    ));
    assert!(matches!(
        checksum_err(1, "sha256sum: /srv/app/x.md: Permission denied"),
        BackendError::Permission { .. }
    ));
    assert!(matches!(
        checksum_err(1, "sha256sum: /srv/app/x.md: Is a directory"),
        BackendError::Operation { .. }
    ));
    assert!(checksum_err(1, "sha256sum: /srv/app/x.md: No such file or directory").is_not_found());
}

#[test]
fn stderr_is_classified() {
    fn classify(code: i32, stderr: &'static str) -> BackendError {
        let runner = RecordingRunner::new(true, move |_, _| Ok(exit(code, "", stderr)));
        backend(&runner).mkdir("x", true, true).unwrap_err()
    }

    assert!(matches!(
        classify(255, "ssh: Could not resolve hostname web1: Name or service not known"),
        BackendError::Connection { .. }
    ));
    assert!(matches!(
        classify(255, "deploy@web1: Permission denied (publickey)."),
        BackendError::Connection { .. }
    ));
    assert!(matches!(
        classify(1, "mkdir: cannot create directory '/srv/app/x': Permission denied"),
        BackendError::Permission { .. }
    ));
    assert!(matches!(
        classify(1, "mkdir: cannot create directory: Read-only file system"),
        BackendError::Operation { .. }
    ));
}

#[test]
fn runner_failures_map_to_backend_errors() {
    let timed_out = RecordingRunner::new(true, |program, _| {
        Err(RunError::TimedOut {
            program: program.to_string(),
            timeout: Duration::from_secs(30),
        })
    });
    assert!(backend(&timed_out).try_exists("x").unwrap_err().is_connectivity());

    let no_ssh = RecordingRunner::new(true, |program, _| {
        Err(RunError::NotFound {
            program: program.to_string(),
        })
    });
    assert!(matches!(
        backend(&no_ssh).try_exists("x").unwrap_err(),
        BackendError::ToolMissing { tool } if tool == "ssh"
    ));
}

#[test]
fn remote_backend_refuses_symlinks() {
    let src = TempDir::new().unwrap();
    src.child("a.md").write_str("a").unwrap();
    let runner = RecordingRunner::ok(true);
    let remote = backend(&runner);
    assert!(!remote.supports_symlinks());
    assert!(matches!(
        remote.create_symlink(&src.path().join("a.md"), "a.md").unwrap_err(),
        BackendError::SymlinksUnsupported { .. }
    ));
    assert_eq!(remote.location_string(), "deploy@web1:/srv/app");
    assert!(remote.is_remote());
}
