use std::path::Path;

use crate::config::{Compression, ToolsConfig};
use crate::db::ConnectionDescriptor;
use crate::platform::shell::CommandSpec;

/// Archive member holding the SQL dump.
pub const DUMP_MEMBER: &str = "./dump.sql";
/// Archive member holding the filestore subtree.
pub const FILESTORE_MEMBER: &str = "./filestore";
/// Path components dropped so `./filestore/<x>` lands at `<dest>/<x>`.
pub const FILESTORE_STRIP_COMPONENTS: u32 = 2;

/// Builds the external invocations used by backup and restore.
#[derive(Debug, Clone, Copy)]
pub struct Toolbox<'a> {
    tools: &'a ToolsConfig,
}

impl<'a> Toolbox<'a> {
    pub fn new(tools: &'a ToolsConfig) -> Self {
        Self { tools }
    }

    /// Plain-SQL dump without ownership or privilege statements.
    pub fn pg_dump(&self, conn: &ConnectionDescriptor, out_file: &Path) -> CommandSpec {
        pg_target(CommandSpec::new(&self.tools.pg_dump), conn)
            .arg("--no-owner")
            .arg("--no-acl")
            .arg("--file")
            .path_arg(out_file)
            .arg(&conn.database)
    }

    /// Drop `conn.database`, terminating its sessions. Absent databases are not an error.
    pub fn dropdb(&self, conn: &ConnectionDescriptor) -> CommandSpec {
        pg_target(CommandSpec::new(&self.tools.dropdb), conn)
            .arg("--if-exists")
            .arg("--force")
            .arg(&conn.database)
    }

    /// Create `conn.database` from `conn.template` when one is set.
    pub fn createdb(&self, conn: &ConnectionDescriptor, owner: &str) -> CommandSpec {
        let mut spec = pg_target(CommandSpec::new(&self.tools.createdb), conn)
            .arg("--encoding")
            .arg("unicode")
            .arg("--lc-collate")
            .arg("C");
        if let Some(template) = &conn.template {
            spec = spec.arg("--template").arg(template);
        }
        spec.arg("--owner").arg(owner).arg(&conn.database)
    }

    /// SQL client reading statements from stdin.
    pub fn psql(&self, conn: &ConnectionDescriptor) -> CommandSpec {
        pg_target(CommandSpec::new(&self.tools.psql), conn)
            .arg("--no-psqlrc")
            .arg("--quiet")
            .arg("--dbname")
            .arg(&conn.database)
    }

    /// Archive the contents of `dir` (not `dir` itself) into `archive`.
    pub fn tar_create(&self, archive: &Path, dir: &Path, compression: Compression) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.tools.tar)
            .arg("--create")
            .arg("--dereference");
        if let Some(flag) = compression.tar_flag() {
            spec = spec.arg(flag);
        }
        spec.arg("--file")
            .path_arg(archive)
            .arg("-C")
            .path_arg(dir)
            .arg(".")
    }

    /// Extract the whole archive into `dest`.
    pub fn tar_extract(&self, archive: &Path, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.tools.tar)
            .arg("--extract")
            .arg("--file")
            .path_arg(archive)
            .arg("-C")
            .path_arg(dest)
    }

    /// List the member names of `archive`, one per line.
    pub fn tar_list(&self, archive: &Path) -> CommandSpec {
        CommandSpec::new(&self.tools.tar)
            .arg("--list")
            .arg("--file")
            .path_arg(archive)
    }

    /// Extract one member of `archive` and write it to stdout.
    pub fn tar_member_to_stdout(&self, archive: &Path, member: &str) -> CommandSpec {
        CommandSpec::new(&self.tools.tar)
            .arg("--extract")
            .arg("--to-stdout")
            .arg("--file")
            .path_arg(archive)
            .arg(member)
    }

    /// Extract the `member` subtree into `dest`, dropping `strip` leading components.
    pub fn tar_extract_subtree(
        &self,
        archive: &Path,
        dest: &Path,
        member: &str,
        strip: u32,
    ) -> CommandSpec {
        self.tar_extract(archive, dest)
            .arg(format!("--strip-components={strip}"))
            .arg(member)
    }
}

fn pg_target(spec: CommandSpec, conn: &ConnectionDescriptor) -> CommandSpec {
    let spec = spec
        .arg("--host")
        .arg(&conn.host)
        .arg("--port")
        .arg(conn.port.to_string())
        .arg("--username")
        .arg(&conn.user)
        .arg("--no-password");
    match &conn.password {
        Some(password) => spec.env("PGPASSWORD", password),
        None => spec,
    }
}
