use log::{error, info};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio_postgres::Client;
use url::Url;

use crate::error::ProcessError;

/// Build the TLS connector, trusting `sslrootcert_path` on top of the system roots if given
pub fn create_ssl_connector(sslrootcert_path: Option<&str>) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    if let Some(path) = sslrootcert_path {
        builder
            .set_ca_file(path)
            .map_err(|e| format!("Error loading CA cert: {}", e))?;
    }

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Split the `sslrootcert` parameter off a connection URL
///
/// libpq understands `sslrootcert` but tokio-postgres rejects it, so it is
/// removed from the query string and returned separately.
pub fn split_sslrootcert(database_url: &str) -> Result<(String, Option<String>), String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Open a single connection and drive it on a background task
pub async fn connect(database_url: &str) -> Result<Client, ProcessError> {
    let (clean_database_url, sslrootcert_path) =
        split_sslrootcert(database_url).map_err(ProcessError::StorageUnavailable)?;

    let connector = create_ssl_connector(sslrootcert_path.as_deref())
        .map_err(ProcessError::StorageUnavailable)?;

    let (client, connection) = tokio_postgres::connect(&clean_database_url, connector).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {}", e);
        }
    });

    info!("Connected to state database");
    Ok(client)
}
