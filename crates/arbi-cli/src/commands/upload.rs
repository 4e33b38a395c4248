//! Upload command: parse a log and send the run to a gateway.

use std::io::Write;

use anyhow::{Context, Result, bail};
use arbi_core::{CancellationToken, FileSource, LogParser};
use arbi_upload::{UploadClient, UploadOptions, UploadPayload, accept_submission};

use crate::Config;
use crate::cli::UploadArgs;

pub fn run<W: Write>(writer: &mut W, config: &Config, args: &UploadArgs) -> Result<()> {
    let endpoint = args
        .endpoint
        .as_deref()
        .or(config.upload.endpoint.as_deref())
        .context("no upload endpoint configured; pass --endpoint or set upload.endpoint")?;
    let client = UploadClient::new(endpoint, config.upload.origin.clone())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let message = runtime.block_on(upload(&client, config, args))?;

    writeln!(writer, "{message}")?;
    Ok(())
}

async fn upload(client: &UploadClient, config: &Config, args: &UploadArgs) -> Result<String> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = parse_and_send(client, config, args, &cancel).await;
    watcher.abort();
    result
}

async fn parse_and_send(
    client: &UploadClient,
    config: &Config,
    args: &UploadArgs,
    cancel: &CancellationToken,
) -> Result<String> {
    let source = FileSource::open(&args.log)?;
    let parser = LogParser::new(config.parser.clone());
    let mut reported = 0;
    let summary = parser
        .parse_async(source, cancel, |progress| {
            let percent = progress.percent();
            if percent >= reported + 10 {
                reported = percent;
                tracing::info!(percent, "parsing log");
            }
        })
        .await
        .with_context(|| format!("failed to parse {}", args.log.display()))?;

    let payload = UploadPayload::from_summary(
        &summary,
        &UploadOptions {
            actual_vitus: args.actual_vitus,
            drone_override: args.drones,
            saturation_threshold: config.upload.saturation_threshold,
            player_alias: args.alias.clone(),
            notes: args.notes.clone(),
        },
    );

    // Fail fast on runs the gateway would refuse anyway.
    if let Err(rejection) = accept_submission(&serde_json::to_value(&payload)?) {
        bail!("run not eligible for upload: {rejection}");
    }

    tokio::select! {
        result = client.upload(&payload) => Ok(result?),
        () = cancel.cancelled() => bail!("upload cancelled"),
    }
}
