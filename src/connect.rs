//! Source and destination connections.

use anyhow::{Context, Result};
use phc_sync_mssql_source::{mask_connection_string, MssqlSource};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{error, info};

use crate::config::{DestinationOpts, SourceOpts, SslMode};

/// Open the SQL Server session, giving up after `timeout`.
pub async fn connect_source(opts: &SourceOpts, timeout: Duration) -> Result<MssqlSource> {
    let connection_string = opts.connection_string()?;
    info!(
        "Connecting to SQL Server: {}",
        mask_connection_string(connection_string)
    );
    tokio::time::timeout(timeout, MssqlSource::connect(connection_string))
        .await
        .with_context(|| format!("Timed out connecting to SQL Server after {timeout:?}"))?
}

/// Accepts any server certificate while still checking handshake signatures.
/// Matches libpq's `sslmode=require`, which encrypts without verifying.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn tls_config(mode: SslMode) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .context("Failed to configure TLS protocol versions")?;
    let config = match mode {
        SslMode::VerifyFull => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        _ => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
            .with_no_client_auth(),
    };
    Ok(config)
}

/// Open the destination session. The client is shared by the sink and the
/// watermark store.
pub async fn connect_destination(
    opts: &DestinationOpts,
    timeout: Duration,
) -> Result<Arc<Mutex<Client>>> {
    let config = opts.to_pg_config(timeout)?;
    let tls = match opts.pg_sslmode {
        SslMode::Disable => None,
        mode => Some(MakeRustlsConnect::new(tls_config(mode)?)),
    };
    info!(
        "Connecting to Postgres: {} (sslmode {:?})",
        opts.display_target(),
        opts.pg_sslmode
    );

    let connecting = async {
        match tls {
            None => {
                let (client, connection) = config.connect(NoTls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Postgres connection error: {e}");
                    }
                });
                Ok::<_, tokio_postgres::Error>(client)
            }
            Some(tls) => {
                let (client, connection) = config.connect(tls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Postgres connection error: {e}");
                    }
                });
                Ok::<_, tokio_postgres::Error>(client)
            }
        }
    };

    let client = tokio::time::timeout(timeout, connecting)
        .await
        .with_context(|| format!("Timed out connecting to Postgres after {timeout:?}"))?
        .with_context(|| format!("Failed to connect to Postgres at {}", opts.display_target()))?;

    info!("Connected to Postgres");
    Ok(Arc::new(Mutex::new(client)))
}
