// ── External commands ──
//
// Every collaborator (openssl, sign and rollover scripts, nsupdate) is
// started through `CommandRunner`, so the workflow can be driven by a
// recording fake in tests.

use std::io::{ErrorKind, Write as _};
use std::process::{Command, Stdio};

use tracing::{debug, error, info};

use crate::error::CoreError;

/// A fully specified process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Build an invocation from a shell-word command line such as
    /// `/usr/local/bin/sign --ca internal`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = shlex::split(line)?.into_iter();
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
            stdin: None,
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-quoted rendering for logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|word| {
                shlex::try_quote(word).map_or_else(|_| word.to_owned(), |q| q.into_owned())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs an [`Invocation`] to completion and returns its output.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, CoreError>;
}

/// Runs invocations as real child processes.
///
/// The returned text is stdout followed by stderr, minus one trailing newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, CoreError> {
        let command = invocation.command_line();
        info!(%command, "executing");
        if let Some(input) = &invocation.stdin {
            debug!(stdin = %input, "command input");
        }

        let spawn_err = |source| CoreError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // A child may exit without reading all of its input; its exit status decides.
        if let (Some(input), Some(mut pipe)) = (&invocation.stdin, child.stdin.take()) {
            match pipe.write_all(input.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(%command, "command closed its input early");
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(spawn_err(e));
                }
            }
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if text.ends_with('\n') {
            text.pop();
        }

        if !output.status.success() {
            error!(%command, output = %text, "command failed");
            return Err(CoreError::ExternalCommand {
                command,
                code: output.status.code(),
                output: text,
            });
        }

        debug!(output = %text, "command output");
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_awkward_words() {
        let inv = Invocation::new("nsupdate").args(["-k", "/etc/sir/my key.private"]);
        let line = inv.command_line();
        assert!(line.starts_with("nsupdate -k "));
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["nsupdate", "-k", "/etc/sir/my key.private"]
        );
    }

    #[test]
    fn from_command_line_splits_shell_words() {
        let inv = Invocation::from_command_line("/usr/bin/sign --profile 'web server'").unwrap();
        assert_eq!(inv.program, "/usr/bin/sign");
        assert_eq!(inv.args, vec!["--profile", "web server"]);
        assert!(Invocation::from_command_line("").is_none());
        assert!(Invocation::from_command_line("'unterminated").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_feeds_stdin_and_trims_newline() {
        let out = SystemRunner
            .run(&Invocation::new("cat").stdin("hello\n"))
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_status() {
        let err = SystemRunner
            .run(&Invocation::new("sh").args(["-c", "echo boom >&2; exit 3"]))
            .unwrap_err();
        match err {
            CoreError::ExternalCommand {
                command,
                code,
                output,
            } => {
                assert_eq!(
                    shlex::split(&command).unwrap(),
                    vec!["sh", "-c", "echo boom >&2; exit 3"]
                );
                assert_eq!(code, Some(3));
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_wins_over_unread_input() {
        let input = "x".repeat(256 * 1024);
        let err = SystemRunner
            .run(
                &Invocation::new("sh")
                    .args(["-c", "exec 0<&-; echo refused >&2; exit 3"])
                    .stdin(input),
            )
            .unwrap_err();
        match err {
            CoreError::ExternalCommand { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .run(&Invocation::new("/nonexistent/sir-test-binary"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Spawn { .. }));
    }
}
