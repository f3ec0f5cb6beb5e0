// src/exec/command.rs

//! Launch description and process spawning.

use std::ffi::OsString;
use std::fmt;
use std::io::PipeReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

/// What to launch and where.
///
/// The arguments are passed through untouched; external workers read their
/// real configuration from a side file written before launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: OsString,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
    display: String,
}

impl LaunchCommand {
    /// Execute `program` directly (no shell). A missing executable is a
    /// launch error.
    pub fn new(program: impl Into<OsString>) -> Self {
        let program = program.into();
        let display = program.to_string_lossy().into_owned();
        Self {
            program,
            args: Vec::new(),
            working_dir: None,
            display,
        }
    }

    /// Run a command line through the platform shell (`sh -c` on POSIX,
    /// `cmd /C` on Windows).
    ///
    /// The shell itself is the supervised process, so a missing program
    /// inside the line surfaces as a non-zero exit code, not a launch error.
    pub fn shell(line: impl Into<String>) -> Self {
        let line = line.into();
        let (program, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
        Self {
            program: program.into(),
            args: vec![flag.into(), line.clone().into()],
            working_dir: None,
            display: line,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        let arg = arg.into();
        self.display.push(' ');
        self.display.push_str(&arg.to_string_lossy());
        self.args.push(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// A freshly spawned child whose stdout and stderr share one pipe.
#[derive(Debug)]
pub(crate) struct SpawnedProcess {
    pub child: Child,
    pub pid: u32,
    pub output: PipeReader,
}

/// Spawn `launch` with stdout and stderr merged into a single pipe.
///
/// Both descriptors of the child refer to the same write end, so the reader
/// sees lines in exactly the order the process wrote them.
///
/// With `own_group` on POSIX, the child leads a new process group (pgid ==
/// pid) so that termination signals can reach its whole tree.
pub(crate) fn spawn_merged(launch: &LaunchCommand, own_group: bool) -> std::io::Result<SpawnedProcess> {
    let (output, stdout_writer) = std::io::pipe()?;
    let stderr_writer = stdout_writer.try_clone()?;

    let child = {
        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args)
            .stdin(Stdio::null())
            .stdout(stdout_writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);

        if let Some(dir) = &launch.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        if own_group {
            cmd.process_group(0);
        }
        #[cfg(not(unix))]
        let _ = own_group;

        // `cmd` owns our copies of the write ends; it is dropped at the end
        // of this block so the reader sees EOF once the child tree exits.
        cmd.spawn()?
    };

    let pid = child
        .id()
        .ok_or_else(|| std::io::Error::other("spawned process reported no pid"))?;

    Ok(SpawnedProcess { child, pid, output })
}
