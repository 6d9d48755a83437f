use async_trait::async_trait;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, error};

use crate::data_importer::sql_generator::{quote_identifier, InsertStatement, PlaceholderStyle};
use crate::error::{DriverError, ImporterError};
use crate::types::ConnectionConfig;

/// Database capability consumed by the importer.
///
/// Values always reach the database through `execute` on a statement returned
/// by `prepare`; implementations must bind them natively and never splice them
/// into statement text.
#[async_trait]
pub trait Connection: Send {
    type Statement: Send + Sync;

    async fn prepare(&mut self, insert: &InsertStatement) -> Result<Self::Statement, DriverError>;

    async fn begin(&mut self) -> Result<(), DriverError>;

    /// Execute `statement` with `values` bound positionally. Returns affected rows.
    async fn execute(
        &mut self,
        statement: &Self::Statement,
        values: &[&str],
    ) -> Result<u64, DriverError>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;
}

/// PostgreSQL connection over tokio-postgres (extended query protocol only)
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Connect and spawn the connection driver task.
    ///
    /// The driver error is logged here; the caller only ever sees the generic
    /// `ImporterError::Connection`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ImporterError> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .password(&config.password)
            .connect_timeout(config.connect_timeout)
            .application_name(&config.application_name);

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            error!(
                host = %config.host,
                port = config.port,
                database = %config.database,
                error = %e,
                "Connection failed"
            );
            ImporterError::Connection
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        debug!(host = %config.host, database = %config.database, "PostgreSQL connection established");
        Ok(Self { client })
    }
}

/// Fully qualified, quoted name usable as a cast target.
fn cast_target(ty: &Type) -> String {
    format!("{}.{}", quote_identifier(ty.schema()), quote_identifier(ty.name()))
}

#[async_trait]
impl Connection for PostgresConnection {
    type Statement = Statement;

    /// Prepares the insert, then re-prepares with text casts if the server
    /// inferred any non-text parameter type, so every field binds as text and
    /// the server's input function does the conversion.
    async fn prepare(&mut self, insert: &InsertStatement) -> Result<Statement, DriverError> {
        let described = self
            .client
            .prepare(&insert.to_sql(PlaceholderStyle::Numbered))
            .await?;

        let casts: Vec<Option<String>> = described
            .params()
            .iter()
            .map(|ty| {
                if <&str as ToSql>::accepts(ty) {
                    None
                } else {
                    Some(cast_target(ty))
                }
            })
            .collect();

        if casts.iter().all(Option::is_none) {
            return Ok(described);
        }

        let sql = insert.to_sql_with_casts(&casts);
        debug!(sql = %sql, "Re-preparing insert with text casts");
        let text_params = vec![Type::TEXT; casts.len()];
        Ok(self.client.prepare_typed(&sql, &text_params).await?)
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement, values: &[&str]) -> Result<u64, DriverError> {
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        Ok(self.client.execute(statement, &params).await?)
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
