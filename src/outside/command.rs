use std::{
    io::ErrorKind,
    process::{Command, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

use bitflags::bitflags;
use tracing::{debug, trace, warn, Level};

use crate::result::{bail, Error, Result};

/// Interval between two checks of a command running under a timeout
const POLL_INTERVAL: Duration = Duration::from_millis(50);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDIN = 0b0000001;
        const STDOUT = 0b0000010;
        const STDERR = 0b0000100;
    }
}

fn get_io(capture: bool) -> Stdio {
    if capture {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

/// Map a spawn failure, turning a missing program into [`Error::MissingDependency`]
pub fn spawn_error(program: &str, err: std::io::Error) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::MissingDependency(program.to_owned())
    } else {
        Error::from(err).wrap_err_with(|| format!("Could not run {program} command"))
    }
}

fn log_output(res: &Output) {
    debug!("status: {}", res.status);
    debug!("stdout: {} bytes long", res.stdout.len());
    trace!("stdout: {:?}", String::from_utf8_lossy(&res.stdout));
    debug!("stderr: {} bytes long", res.stderr.len());
    trace!("stderr: {:?}", String::from_utf8_lossy(&res.stderr));
}

/// Run a command, returning its raw output handle.
///
/// IO handles will be captured only if the caller required it or if the log level is Debug.
/// In that last case, `stdout` and `stderr` will be logged.
///
/// The function returns an error only if the command failed to execute.
/// If the program runs but returns a non-0 status code, it will not trigger an error.
pub fn run_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    capture: Capture,
) -> Result<Output> {
    let is_debug = tracing::enabled!(Level::DEBUG);

    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(get_io(capture.contains(Capture::STDIN)))
        .stdout(get_io(is_debug || capture.contains(Capture::STDOUT)))
        .stderr(get_io(is_debug || capture.contains(Capture::STDERR)));

    debug!("Executing command: {cmd:?}");
    let res = cmd.output().map_err(|err| spawn_error(program, err))?;

    if is_debug {
        log_output(&res);
    }

    Ok(res)
}

/// Run the command and verify that it has returned a success status code.
pub fn assert_success_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
) -> Result<()> {
    let res = run_command(program, f, Capture::empty())?;
    if res.status.success() {
        Ok(())
    } else {
        bail(format!("{program} did run but was not successful"))
    }
}

/// Run a command whose output is not needed, killing it if it has not
/// exited once the timeout elapsed.
///
/// Returns whether the command exited with a success status code in time.
pub fn run_command_with_timeout<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    timeout: Duration,
) -> Result<bool> {
    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    debug!("Executing command with a {}s timeout: {cmd:?}", timeout.as_secs());
    let mut child = cmd.spawn().map_err(|err| spawn_error(program, err))?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            debug!("status: {status}");
            return Ok(status.success());
        }

        if Instant::now() >= deadline {
            warn!("{program} did not exit after {}s, killing it", timeout.as_secs());
            // The child may exit between the check and the kill
            let _ = child.kill();
            child.wait()?;
            return Ok(false);
        }

        thread::sleep(POLL_INTERVAL);
    }
}
