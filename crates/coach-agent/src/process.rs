use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use coach_core::capability::Generate;
use coach_core::config::GenerationConfig;
use tracing::{debug, warn};

use crate::{AgentError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ─── CliGenerator ─────────────────────────────────────────────────────────

/// Generates text by running a local model CLI (`claude --print` by
/// default). The prompt goes in on stdin and the reply comes back on stdout.
#[derive(Debug, Clone)]
pub struct CliGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &GenerationConfig) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn complete(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            // A nested session refuses to start when this is set.
            .env_remove("CLAUDECODE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AgentError::Process(format!("failed to spawn {}: {e}", self.program)))?;

        // Drain both pipes in the background so a chatty child never blocks.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits without reading stdin is judged by its exit status.
            match stdin.write_all(prompt.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AgentError::Process(format!("failed to write stdin: {e}")));
                }
                _ => {}
            }
        }

        let status = match wait_with_deadline(&mut child, self.timeout)? {
            Some(status) => status,
            None => {
                warn!(program = %self.program, "generation timed out, killing child");
                let _ = child.kill();
                let _ = child.wait();
                return Err(AgentError::Timeout(self.timeout.as_secs()));
            }
        };

        let out = join(stdout);
        let err = join(stderr);
        debug!(program = %self.program, %status, bytes = out.len(), "child exited");

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("{} exited with code {code}", self.program),
                None => format!("{} terminated by signal", self.program),
            };
            let err = err.trim();
            return Err(AgentError::Process(if err.is_empty() {
                reason
            } else {
                format!("{reason}\nstderr: {err}")
            }));
        }
        Ok(out.trim().to_string())
    }
}

impl Generate for CliGenerator {
    fn generate(&self, prompt: &str) -> coach_core::Result<String> {
        Ok(self.complete(prompt)?)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// `Ok(None)` when the deadline passed first.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CliGenerator {
        CliGenerator::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    #[test]
    fn prompt_goes_in_on_stdin() {
        let gen = CliGenerator::new("cat", vec![], Duration::from_secs(5));
        assert_eq!(gen.complete("  hello coach \n").unwrap(), "hello coach");
    }

    #[test]
    fn nonzero_exit_carries_stderr() {
        let gen = sh("echo 'quota exceeded' >&2; exit 3", Duration::from_secs(5));
        match gen.complete("x") {
            Err(AgentError::Process(msg)) => {
                assert!(msg.contains("exited with code 3"), "{msg}");
                assert!(msg.contains("quota exceeded"), "{msg}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn slow_child_is_killed() {
        let gen = sh("sleep 10", Duration::from_millis(200));
        let started = Instant::now();
        assert!(matches!(gen.complete("x"), Err(AgentError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_is_process_error() {
        let gen = CliGenerator::new("definitely-not-a-real-binary", vec![], Duration::from_secs(1));
        assert!(matches!(gen.complete("x"), Err(AgentError::Process(_))));
    }

    #[test]
    fn generate_maps_to_generation_failed() {
        let gen = sh("exit 1", Duration::from_secs(5));
        assert!(matches!(
            gen.generate("x"),
            Err(coach_core::CoachError::GenerationFailed(_))
        ));
    }
}
