use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Outcome of one timeout-bounded external invocation.
#[derive(Debug)]
pub struct Invocation {
    /// Exit code, when the process exited by itself with one.
    pub exit: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration from spawn to exit (or kill).
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl Invocation {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit == Some(0)
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    pub fn describe_failure(&self) -> String {
        if self.timed_out {
            format!("timed out after {:.0}ms", self.elapsed_ms())
        } else {
            let stderr = self.stderr.trim();
            if stderr.is_empty() {
                format!("exit code {:?}", self.exit)
            } else {
                format!("exit code {:?}: {}", self.exit, stderr)
            }
        }
    }
}

fn drain(stream: Option<impl Read + Send + 'static>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buf);
        }
        buf
    })
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// Output pipes are drained on background threads so a chatty child can
/// never fill a pipe buffer and deadlock against the polling loop. The
/// returned `Err` only covers spawn failures (e.g. binary not found);
/// everything after a successful spawn is reported in the `Invocation`.
pub fn invoke(cmd: &mut Command, timeout: Duration) -> std::io::Result<Invocation> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let start = Instant::now();
    let mut child = cmd.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    const POLL: Duration = Duration::from_millis(2);
    let (status, timed_out) = loop {
        match child.try_wait()? {
            Some(status) => break (Some(status), false),
            None if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                break (None, true);
            }
            None => std::thread::sleep(POLL),
        }
    };
    let elapsed = start.elapsed();

    Ok(Invocation {
        exit: status.and_then(|s| s.code()),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        elapsed,
        timed_out,
    })
}
