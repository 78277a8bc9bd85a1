use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::config::{parse_config, OdaConfig};
use crate::db::{ConnectionDescriptor, Row, SqlConnector, SqlError, SqlSession};
use crate::error::{OdaError, Result};
use crate::platform::shell::{CommandOutput, CommandSpec, ProcessRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Run(CommandSpec),
    Piped(CommandSpec, CommandSpec),
}

impl RecordedCall {
    /// `pg_dump`, or `tar|psql` for a pipe.
    pub fn label(&self) -> String {
        match self {
            RecordedCall::Run(spec) => spec.tool().to_string(),
            RecordedCall::Piped(a, b) => format!("{}|{}", a.tool(), b.tool()),
        }
    }
}

type Hook = Box<dyn Fn(&CommandSpec)>;

/// `tar --list` output of an archive holding both a dump and a filestore.
pub const FULL_ARCHIVE_LISTING: &str = "./\n./dump.sql\n./manifest.json\n./filestore/\n./filestore/ab/\n";

/// Records every invocation instead of running it.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<RecordedCall>>,
    fail_tool: Option<String>,
    hook: Option<Hook>,
    /// Canned stdout keyed by a command's first argument.
    stdout: Vec<(String, Vec<u8>)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default().with_stdout("--list", FULL_ARCHIVE_LISTING)
    }

    /// Fail every call whose tool (or pipe label) equals `tool`.
    pub fn failing(tool: &str) -> Self {
        Self {
            fail_tool: Some(tool.to_string()),
            ..Self::new()
        }
    }

    /// Answer every `run` whose first argument is `first_arg` with `stdout`.
    pub fn with_stdout(mut self, first_arg: &str, stdout: &str) -> Self {
        self.stdout.retain(|(arg, _)| arg != first_arg);
        self.stdout
            .push((first_arg.to_string(), stdout.as_bytes().to_vec()));
        self
    }

    /// Run `hook` on each successful `run` call, e.g. to fake tool side effects.
    pub fn with_hook(mut self, hook: impl Fn(&CommandSpec) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls.borrow().iter().map(RecordedCall::label).collect()
    }

    fn record(&self, call: RecordedCall) -> Result<()> {
        let label = call.label();
        self.calls.borrow_mut().push(call);
        if self.fail_tool.as_deref() == Some(label.as_str()) {
            return Err(OdaError::ExternalTool {
                tool: label,
                status: "exit code 1".into(),
                stderr: "simulated failure".into(),
            });
        }
        Ok(())
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        self.record(RecordedCall::Run(cmd.clone()))?;
        if let Some(hook) = &self.hook {
            hook(cmd);
        }
        let stdout = self
            .stdout
            .iter()
            .find(|(arg, _)| cmd.args.first() == Some(arg))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(CommandOutput {
            stdout,
            ..CommandOutput::default()
        })
    }

    fn run_piped(&self, source: &CommandSpec, sink: &CommandSpec) -> Result<()> {
        self.record(RecordedCall::Piped(source.clone(), sink.clone()))
    }
}

#[derive(Default)]
pub struct FakeDbState {
    pub executed: Vec<String>,
    pub opened: usize,
    pub closed: usize,
    failures: Vec<(String, SqlError)>,
    responses: Vec<(String, Vec<Row>)>,
    refuse_connect: bool,
}

/// Scripted database shared by every session it opens.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Rc<RefCell<FakeDbState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server answering the manifest queries for a small install.
    pub fn with_manifest_rows() -> Self {
        Self::new()
            .respond("server_version_num", vec![vec![Some("160002".into())]])
            .respond(
                "ir_module_module",
                vec![
                    vec![Some("base".into()), Some("17.0.1.3".into())],
                    vec![Some("web".into()), Some("17.0.1.0".into())],
                    vec![Some("sale".into()), None],
                ],
            )
    }

    pub fn respond(self, contains: &str, rows: Vec<Row>) -> Self {
        self.state
            .borrow_mut()
            .responses
            .push((contains.to_string(), rows));
        self
    }

    /// Statements containing `contains` fail with SQLSTATE `code`.
    pub fn fail_when(self, contains: &str, code: &str) -> Self {
        self.state.borrow_mut().failures.push((
            contains.to_string(),
            SqlError::new(Some(code), format!("simulated {code}")),
        ));
        self
    }

    pub fn refusing_connections(self) -> Self {
        self.state.borrow_mut().refuse_connect = true;
        self
    }

    pub fn state(&self) -> std::cell::Ref<'_, FakeDbState> {
        self.state.borrow()
    }
}

impl SqlConnector for FakeConnector {
    fn connect(
        &self,
        _conn: &ConnectionDescriptor,
    ) -> std::result::Result<Box<dyn SqlSession>, SqlError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_connect {
            return Err(SqlError::new(None, "connection refused"));
        }
        state.opened += 1;
        Ok(Box::new(FakeSession {
            state: Rc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Rc<RefCell<FakeDbState>>,
}

impl FakeSession {
    fn check(&self, sql: &str) -> std::result::Result<(), SqlError> {
        let mut state = self.state.borrow_mut();
        state.executed.push(sql.to_string());
        match state.failures.iter().find(|(needle, _)| sql.contains(needle)) {
            Some((_, err)) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl SqlSession for FakeSession {
    fn execute(&mut self, sql: &str) -> std::result::Result<u64, SqlError> {
        self.check(sql).map(|()| 1)
    }

    fn query_rows(&mut self, sql: &str) -> std::result::Result<Vec<Row>, SqlError> {
        self.check(sql)?;
        let state = self.state.borrow();
        Ok(state
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn close(self: Box<Self>) -> std::result::Result<(), SqlError> {
        self.state.borrow_mut().closed += 1;
        Ok(())
    }
}

pub fn test_connection(database: &str) -> ConnectionDescriptor {
    ConnectionDescriptor {
        host: "db.internal".into(),
        port: 5432,
        database: database.into(),
        user: "odoo".into(),
        password: Some("pw".into()),
        template: Some("template0".into()),
    }
}

/// Config rooted in `root` with `backups/`, `data/` and one addon root `custom_addons`.
pub fn test_config(root: &Path) -> OdaConfig {
    let yaml = format!(
        "backups_dir: {root}/backups
database:
  name: mycompany
  user: odoo
  password: pw
data_dir: {root}/data
addons:
  - {root}/addons/custom_addons
archive:
  compression: none
",
        root = root.display()
    );
    parse_config(&yaml, Path::new("test.yaml")).unwrap()
}

/// Create an empty file named `name` in `dir`.
pub fn touch(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), b"").unwrap();
}
