use anyhow::{Context, Result, anyhow};
use regex::Regex;
use std::ffi::OsStr;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs `exe args...` to completion, capturing stdout and stderr.
/// `timeout` of `None` waits indefinitely.
pub fn run_tool<I, S>(exe: &OsStr, args: I, timeout: Option<Duration>) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(exe);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    debug!("run {:?} timeout={:?}", cmd, timeout);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {}", exe.to_string_lossy()))?;

    match timeout {
        Some(limit) => wait_with_timeout(&mut child, limit),
        None => child
            .wait_with_output()
            .with_context(|| format!("waiting for {}", exe.to_string_lossy())),
    }
}

/// Like [`run_tool`] but turns a non-zero exit into an error carrying stderr.
pub fn run_tool_checked<I, S>(exe: &OsStr, args: I, timeout: Option<Duration>) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_tool(exe, args, timeout)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{} exited with {}: {}",
            exe.to_string_lossy(),
            output.status,
            stderr.trim()
        ));
    }
    Ok(output)
}

/// Asks `exe --version` and pulls the first dotted number off the first line.
/// `None` means the tool could not be run at all.
pub fn tool_version(exe: &OsStr) -> Option<String> {
    let output = match run_tool_checked(exe, ["--version"], Some(Duration::from_secs(30))) {
        Ok(output) => output,
        Err(err) => {
            debug!("`--version` failed for {}: {err:#}", exe.to_string_lossy());
            return None;
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or_default();
    Some(parse_version(first_line).unwrap_or_else(|| "unknown".to_string()))
}

pub fn parse_version(line: &str) -> Option<String> {
    static VERSION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = VERSION_RE
        .get_or_init(|| Regex::new(r"\d+(?:\.\d+)+").ok())
        .as_ref()?;
    re.find(line).map(|m| m.as_str().to_string())
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs > 0 {
        Some(Duration::from_secs(secs))
    } else {
        None
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty tool can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
