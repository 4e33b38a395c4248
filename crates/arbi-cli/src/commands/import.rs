//! Import command for storing a run payload in the local `SQLite` store.
//!
//! The payload goes through the same gateway policy a remote upload would,
//! so locally stored runs obey the same thresholds and dedupe rules.

use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use arbi_db::Database;
use arbi_upload::{GatewayRequest, handle};

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, file: Option<&Path>) -> Result<()> {
    let body = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .context("failed to read payload from stdin")?;
            body
        }
    };

    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    import_payload(writer, &mut db, config, &body)
}

fn import_payload<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    body: &str,
) -> Result<()> {
    let request = GatewayRequest {
        method: "POST",
        origin: Some(&config.upload.origin),
        body,
    };
    let response = handle(&request, db, &config.gateway.allowed_origins);

    let field = |key: &str| {
        response
            .body
            .as_ref()
            .and_then(|b| b.get(key))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if response.status != 200 {
        bail!("import refused ({}): {}", response.status, field("error"));
    }
    writeln!(writer, "{}", field("message"))?;
    Ok(())
}
