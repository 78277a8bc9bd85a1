use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Row as _};
use tracing::debug;

use super::runtime::block_on;
use super::{ConnectionDescriptor, Row, SqlConnector, SqlError, SqlSession};

/// Opens one unpooled `PgConnection` per operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

impl SqlConnector for PgConnector {
    fn connect(&self, conn: &ConnectionDescriptor) -> Result<Box<dyn SqlSession>, SqlError> {
        let mut opts = PgConnectOptions::new()
            .host(&conn.host)
            .port(conn.port)
            .username(&conn.user)
            .database(&conn.database)
            .application_name("oda");
        if let Some(password) = &conn.password {
            opts = opts.password(password);
        }

        debug!(
            host = %conn.host,
            port = conn.port,
            database = %conn.database,
            user = %conn.user,
            "opening database session"
        );
        let connection = block_on(opts.connect()).map_err(sql_error)?;
        Ok(Box::new(PgSession { conn: connection }))
    }
}

struct PgSession {
    conn: PgConnection,
}

impl SqlSession for PgSession {
    fn execute(&mut self, sql: &str) -> Result<u64, SqlError> {
        let done = block_on(sqlx::raw_sql(sql).execute(&mut self.conn)).map_err(sql_error)?;
        Ok(done.rows_affected())
    }

    fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, SqlError> {
        let rows = block_on(sqlx::raw_sql(sql).fetch_all(&mut self.conn)).map_err(sql_error)?;
        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.try_get::<Option<String>, _>(i).map_err(sql_error))
                    .collect::<Result<Row, SqlError>>()
            })
            .collect()
    }

    fn close(self: Box<Self>) -> Result<(), SqlError> {
        block_on(self.conn.close()).map_err(sql_error)
    }
}

fn sql_error(err: sqlx::Error) -> SqlError {
    match &err {
        sqlx::Error::Database(db) => SqlError::new(db.code().as_deref(), db.message()),
        other => SqlError::new(None, other.to_string()),
    }
}
