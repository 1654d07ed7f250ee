//! SQL Server connection and the [`SourceReader`] implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sync_core::SourceRow;
use tiberius::{Client, Config, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::query::SourceQuery;
use crate::tsql::{self, QueryParam};
use crate::value;
use crate::SourceReader;

const SECRET_KEYS: &[&str] = &["pwd", "password"];
const IGNORED_KEYS: &[&str] = &["driver", "dsn"];

fn split_pairs(connection_string: &str) -> impl Iterator<Item = (&str, &str)> {
    connection_string
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (part.trim(), ""),
        })
}

/// Rewrite an ODBC-style connection string into the ADO.NET form the driver
/// parses: ODBC-only keys are dropped and `{...}` value braces removed.
pub fn to_ado_string(connection_string: &str) -> String {
    split_pairs(connection_string)
        .filter(|(key, _)| !IGNORED_KEYS.contains(&key.to_ascii_lowercase().as_str()))
        .map(|(key, value)| {
            let value = value
                .strip_prefix('{')
                .and_then(|v| v.strip_suffix('}'))
                .unwrap_or(value);
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Connection string with secrets replaced, safe to log.
pub fn mask_connection_string(connection_string: &str) -> String {
    split_pairs(connection_string)
        .map(|(key, value)| {
            if SECRET_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Open SQL Server session.
pub struct MssqlSource {
    client: Client<Compat<TcpStream>>,
}

impl MssqlSource {
    /// Connect using an ODBC or ADO.NET connection string.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let mut config = Config::from_ado_string(&to_ado_string(connection_string))
            .context("Invalid SQL Server connection string")?;

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .with_context(|| format!("Failed to reach SQL Server at {}", config.get_addr()))?;
        tcp.set_nodelay(true)?;

        let client = match Client::connect(config.clone(), tcp.compat_write()).await {
            Ok(client) => client,
            // Azure SQL may redirect the session to another node.
            Err(tiberius::error::Error::Routing { host, port }) => {
                info!("SQL Server redirected connection to {}:{}", host, port);
                config.host(&host);
                config.port(port);
                let tcp = TcpStream::connect(config.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(config, tcp.compat_write()).await?
            }
            Err(e) => return Err(e).context("SQL Server login failed"),
        };

        info!("Connected to SQL Server");
        Ok(Self { client })
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        debug!("SQL Server connection closed");
        Ok(())
    }
}

#[async_trait]
impl SourceReader for MssqlSource {
    async fn read<'a>(
        &'a mut self,
        query: &SourceQuery,
    ) -> Result<BoxStream<'a, Result<SourceRow>>> {
        let rendered = tsql::render(query);
        debug!("Source query for {}: {}", query.table, rendered.sql);

        let mut select = Query::new(rendered.sql);
        for param in rendered.params {
            match param {
                QueryParam::Date(date) => select.bind(date),
                QueryParam::Text(text) => select.bind(text),
            }
        }

        let stream = select
            .query(&mut self.client)
            .await
            .with_context(|| format!("Failed to query source table {}", query.table))?;

        Ok(stream
            .into_row_stream()
            .map(|row| {
                let row = row?;
                row.into_iter()
                    .map(|data| value::convert(&data))
                    .collect::<Result<SourceRow>>()
            })
            .boxed())
    }
}
