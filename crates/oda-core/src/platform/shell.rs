use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

use crate::error::{OdaError, Result};

/// Longest stderr excerpt carried into an error.
const STDERR_TAIL: usize = 2000;

/// A typed external invocation. Secrets go in `env`, never in `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// `sh -c <script>`, for operator-supplied hook commands.
    pub fn script(script: &str) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program basename, used in log lines and errors.
    pub fn tool(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Port through which every external tool is executed.
pub trait ProcessRunner {
    /// Run to completion. A non-zero exit is an `ExternalTool` error.
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Stream `source`'s stdout into `sink`'s stdin without touching disk.
    fn run_piped(&self, source: &CommandSpec, sink: &CommandSpec) -> Result<()>;
}

/// Runs commands with `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(tool = spec.tool(), args = ?spec.args, "running");
        let output = spec
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(spec, e))?;
        check_status(spec, output.status, &output.stderr)?;
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn run_piped(&self, source: &CommandSpec, sink: &CommandSpec) -> Result<()> {
        debug!(source = source.tool(), sink = sink.tool(), "running pipe");

        let mut source_child = source
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(source, e))?;
        let Some(pipe) = source_child.stdout.take() else {
            let _ = source_child.kill();
            let _ = source_child.wait();
            return Err(OdaError::Other(format!(
                "{} stdout was not captured",
                source.tool()
            )));
        };

        // The sink command is consumed here, so once the source exits no
        // write end of the pipe remains open and the sink sees EOF.
        let sink_spawn = {
            let mut cmd = sink.to_command();
            cmd.stdin(Stdio::from(pipe))
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()
        };
        let mut sink_child = match sink_spawn {
            Ok(child) => child,
            Err(e) => {
                let _ = source_child.kill();
                let _ = source_child.wait();
                return Err(spawn_error(sink, e));
            }
        };

        // psql can be chatty on stderr; drain it so it never blocks on a full pipe.
        let sink_stderr = sink_child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        let source_output = source_child.wait_with_output();
        let sink_status = sink_child.wait();
        let sink_err = sink_stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let source_output = source_output.map_err(|e| spawn_error(source, e))?;
        let sink_status = sink_status.map_err(|e| spawn_error(sink, e))?;
        let source_result = check_status(source, source_output.status, &source_output.stderr);

        // A sink that exits early cuts the pipe, so its failure is the cause.
        match check_status(sink, sink_status, &sink_err) {
            Ok(()) => source_result,
            Err(sink_failure) => match source_result {
                Err(OdaError::ExternalTool { status, stderr, .. })
                    if !broken_pipe(source_output.status) =>
                {
                    Err(with_source_failure(
                        sink_failure,
                        source.tool(),
                        &status,
                        &stderr,
                    ))
                }
                _ => Err(sink_failure),
            },
        }
    }
}

/// Killed by SIGPIPE, or a shell reporting it as exit code 141.
fn broken_pipe(status: ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(13) {
            return true;
        }
    }
    status.code() == Some(141)
}

fn with_source_failure(
    sink_failure: OdaError,
    tool: &str,
    status: &str,
    stderr: &str,
) -> OdaError {
    match sink_failure {
        OdaError::ExternalTool {
            tool: sink_tool,
            status: sink_status,
            stderr: sink_stderr,
        } => OdaError::ExternalTool {
            tool: sink_tool,
            status: sink_status,
            stderr: format!("{sink_stderr}; {tool} also failed ({status}): {stderr}"),
        },
        other => other,
    }
}

fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> OdaError {
    OdaError::ToolSpawn {
        tool: spec.tool().to_string(),
        source,
    }
}

fn check_status(spec: &CommandSpec, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let status = match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    };
    Err(OdaError::ExternalTool {
        tool: spec.tool().to_string(),
        status,
        stderr: stderr_tail(stderr),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text.len().saturating_sub(STDERR_TAIL);
    let start = (start..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    text[start..].to_string()
}
