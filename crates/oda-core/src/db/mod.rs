mod postgres;
mod runtime;

use std::fmt;

use thiserror::Error;

pub use self::postgres::PgConnector;

/// SQLSTATE for `undefined_table`.
pub const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for `undefined_column`.
pub const UNDEFINED_COLUMN: &str = "42703";

/// Parameters for reaching one database. Built fresh for every operation.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub template: Option<String>,
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("template", &self.template)
            .finish()
    }
}

/// A failed SQL statement or connection attempt.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SqlError {
    /// SQLSTATE reported by the server, if any.
    pub code: Option<String>,
    pub message: String,
}

impl SqlError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// True for missing tables or columns, which optional modules leave behind.
    pub fn is_undefined_object(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(UNDEFINED_TABLE) | Some(UNDEFINED_COLUMN)
        )
    }
}

/// One row of text columns. `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

/// A single open database session.
pub trait SqlSession {
    /// Execute a statement and return the number of affected rows.
    fn execute(&mut self, sql: &str) -> std::result::Result<u64, SqlError>;

    /// Run a query whose columns are all castable to text.
    fn query_rows(&mut self, sql: &str) -> std::result::Result<Vec<Row>, SqlError>;

    /// Close the session. Must be called before the owning operation returns.
    fn close(self: Box<Self>) -> std::result::Result<(), SqlError>;
}

/// Opens sessions. Sessions are never pooled or shared between operations.
pub trait SqlConnector {
    fn connect(
        &self,
        conn: &ConnectionDescriptor,
    ) -> std::result::Result<Box<dyn SqlSession>, SqlError>;
}

/// Run `f` on a fresh session and close it afterwards. A close failure is
/// only reported when `f` itself succeeded.
pub fn with_session<T>(
    connector: &dyn SqlConnector,
    conn: &ConnectionDescriptor,
    f: impl FnOnce(&mut dyn SqlSession) -> crate::error::Result<T>,
) -> crate::error::Result<T> {
    let mut session = connector.connect(conn)?;
    let result = f(session.as_mut());
    let closed = session.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!(error = %close_err, "closing database session failed");
            Err(e)
        }
    }
}
