// Command-line surface. Credentials, host, file names, and which
// operation runs all arrive as flags, environment variables, or
// subcommands; nothing is baked in.
//
// Persistence policy for downloaded bodies lives in this layer: record
// submissions and failures go to the rolling response log, report
// successes to report files, batch-status successes to a status CSV.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::api::{
    self, ApiClient, Outcome, ResponseBody, SubscriberReportQuery, TransactionReportQuery,
};
use crate::batch::{self, BatchRecord};
use crate::config::{Settings, DEFAULT_HOST};
use crate::errors::ClientError;
use crate::output::OutputDir;
use crate::token;

#[derive(Debug, Parser)]
#[command(
    name = "ebbp-cli",
    version,
    about = "Client for the EBBP benefit-enrollment API"
)]
pub struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// API host, scheme included. Staging hosts (`api-stg`) keep a
    /// separate token cache.
    #[arg(long, env = "EBBP_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Username for the Basic-Auth token exchange.
    #[arg(long, env = "EBBP_USERNAME")]
    username: String,

    /// Password for the token exchange. Prompted for interactively when
    /// not supplied.
    #[arg(long, env = "EBBP_PASSWORD")]
    password: Option<String>,

    /// Directory where reports, batch-status files, and the response
    /// log are written.
    #[arg(long, env = "EBBP_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Token cache file. Defaults to ~/.ebbp-tokens, with a -stg
    /// variant on staging hosts.
    #[arg(long, env = "EBBP_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,
}

impl ConnectionArgs {
    fn into_settings(self) -> Result<Settings> {
        let password = match self.password {
            Some(password) => password,
            None => Password::new()
                .with_prompt(format!("EBBP password for {}", self.username))
                .interact()
                .context("reading password")?,
        };
        let token_cache = self
            .token_cache
            .unwrap_or_else(|| Settings::default_token_cache(&self.host));
        Ok(Settings {
            host: self.host,
            username: self.username,
            password,
            output_dir: self.output_dir,
            token_cache,
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enroll every subscriber in a batch CSV.
    Enroll(BatchFileArgs),
    /// Check eligibility for every subscriber in a batch CSV without
    /// enrolling anyone.
    Verify(BatchFileArgs),
    /// De-enroll every subscriber in a batch CSV.
    DeEnroll(BatchFileArgs),
    /// Update every subscriber in a batch CSV.
    Update(BatchFileArgs),
    /// Upload a whole batch CSV for server-side processing.
    BatchUpload(BatchFileArgs),
    /// Download the processing status of uploaded batches as CSV.
    BatchStatus,
    /// Download a subscriber report.
    SubscriberReport(SubscriberReportArgs),
    /// Download a transaction report.
    TransactionReport(TransactionReportArgs),
}

#[derive(Debug, Args)]
struct BatchFileArgs {
    /// Batch CSV file; the header row uses the API's subscriber field
    /// names (e.g. `bqpLast4ssn`).
    file: PathBuf,
}

#[derive(Debug, Args)]
struct SubscriberReportArgs {
    /// Report flavor, e.g. `detail`.
    #[arg(long)]
    report_type: String,

    /// Study Area Code to filter on.
    #[arg(long)]
    sac: String,

    /// Include subscriber IDs in the report.
    #[arg(long)]
    include_subscriber_id: bool,
}

#[derive(Debug, Args)]
struct TransactionReportArgs {
    /// Report flavor, e.g. `detail`.
    #[arg(long)]
    report_type: String,

    /// Study Area Code to filter on.
    #[arg(long)]
    sac: String,

    /// Start of the reporting window, MM/DD/YYYY.
    #[arg(long)]
    start_date: String,

    /// End of the reporting window, MM/DD/YYYY.
    #[arg(long)]
    end_date: String,

    /// Transaction kind to report on, e.g. `enroll`.
    #[arg(long = "type")]
    transaction_type: String,

    /// Include subscriber IDs in the report.
    #[arg(long)]
    include_subscriber_id: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    let settings = cli.connection.into_settings()?;
    let outputs = OutputDir::new(settings.output_dir.clone());

    let client = Client::builder().build().context("building HTTP client")?;
    let token = token::ensure_token(&client, &settings)?;
    let api = ApiClient::new(client, settings.service_url(), &token);
    debug!(service_url = %settings.service_url(), "client ready");

    match cli.command {
        Command::Enroll(args) => {
            run_record_loop("Enroll", &args.file, &outputs, |record| {
                api.enroll_subscriber(record)
            })
        }
        Command::Verify(args) => {
            run_record_loop("Verify", &args.file, &outputs, |record| {
                api.verify_subscriber(record)
            })
        }
        Command::DeEnroll(args) => {
            run_record_loop("De-enroll", &args.file, &outputs, |record| {
                api.de_enroll_subscriber(record)
            })
        }
        Command::Update(args) => {
            run_record_loop("Update", &args.file, &outputs, |record| {
                api.update_subscriber(record)
            })
        }
        Command::BatchUpload(args) => run_batch_upload(&api, &outputs, &args.file),
        Command::BatchStatus => run_batch_status(&api, &outputs),
        Command::SubscriberReport(args) => {
            let query = SubscriberReportQuery {
                report_type: args.report_type,
                sac: args.sac,
                include_subscriber_id: args.include_subscriber_id,
            };
            run_report("subscriber", api.subscriber_report(&query)?, &outputs)
        }
        Command::TransactionReport(args) => {
            let query = TransactionReportQuery {
                report_type: args.report_type,
                sac: args.sac,
                start_date: args.start_date,
                end_date: args.end_date,
                transaction_type: args.transaction_type,
                include_subscriber_id: args.include_subscriber_id,
            };
            run_report("transaction", api.transaction_report(&query)?, &outputs)
        }
    }
}

/// Submit every record of a batch file through `submit`, one at a time
/// in file order. A rejected record is reported and the loop moves on;
/// only transport-level failures abort the run.
fn run_record_loop<F>(verb: &str, file: &Path, outputs: &OutputDir, submit: F) -> Result<()>
where
    F: Fn(&BatchRecord) -> Result<Outcome, ClientError>,
{
    let mut records = batch::read_batch_file(file)?;
    if records.is_empty() {
        println!("{verb}: no records in {}", file.display());
        return Ok(());
    }

    let bar = ProgressBar::new(records.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}").unwrap());

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for (index, record) in records.iter_mut().enumerate() {
        record.blank_placeholder_ssn();
        let outcome = submit(record)?;
        // Every body worth keeping lands in the response log; success
        // bodies too, since they carry the service-assigned IDs.
        outputs.append_api_response(&outcome.body().to_json())?;
        match &outcome {
            Outcome::Success(_) => accepted += 1,
            Outcome::Rejected(_) => {
                rejected += 1;
                bar.suspend(|| println!("record {}: rejected (HTTP 400)", index + 1));
            }
            Outcome::Unexpected { status, .. } => {
                rejected += 1;
                bar.suspend(|| println!("record {}: failed (HTTP {status})", index + 1));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "{verb}: {accepted} accepted, {rejected} rejected of {} records",
        records.len()
    );
    Ok(())
}

fn run_batch_upload(api: &ApiClient, outputs: &OutputDir, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading batch file {}", file.display()))?;
    let file_name = api::upload_file_name(file);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(format!("Uploading {file_name}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let outcome = api.upload_batch(file_name, contents)?;
    spinner.finish_and_clear();

    match outcome {
        Outcome::Success(body) => {
            outputs.append_api_response(&body.to_json())?;
            println!("Batch upload accepted.");
            Ok(())
        }
        Outcome::Rejected(body) => fail("Batch upload", 400, &body, outputs),
        Outcome::Unexpected { status, body } => fail("Batch upload", status, &body, outputs),
    }
}

fn run_batch_status(api: &ApiClient, outputs: &OutputDir) -> Result<()> {
    match api.batch_status()? {
        Outcome::Success(body) => {
            let rows = body
                .as_json()
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            match outputs.write_batch_status(&rows)? {
                Some(path) => println!("Wrote batch status file: {}", path.display()),
                None => println!("No batches to report on."),
            }
            Ok(())
        }
        Outcome::Rejected(body) => fail("Batch status", 400, &body, outputs),
        Outcome::Unexpected { status, body } => fail("Batch status", status, &body, outputs),
    }
}

fn run_report(kind: &str, outcome: Outcome, outputs: &OutputDir) -> Result<()> {
    match outcome {
        Outcome::Success(body) => {
            let path = outputs.write_report(kind, body.as_text().unwrap_or_default())?;
            println!("Wrote report file: {}", path.display());
            Ok(())
        }
        Outcome::Rejected(body) => fail(&format!("{kind} report"), 400, &body, outputs),
        Outcome::Unexpected { status, body } => {
            fail(&format!("{kind} report"), status, &body, outputs)
        }
    }
}

/// A non-success outcome on a one-shot operation: keep the body, tell
/// the operator, leave the exit status at zero -- the run itself worked.
fn fail(what: &str, status: u16, body: &ResponseBody, outputs: &OutputDir) -> Result<()> {
    let path = outputs.append_api_response(&body.to_json())?;
    println!(
        "{what} failed with HTTP {status}; response appended to {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn transaction_report_flags_parse() {
        let cli = Cli::try_parse_from([
            "ebbp-cli",
            "--username",
            "user",
            "--password",
            "secret",
            "transaction-report",
            "--report-type",
            "detail",
            "--sac",
            "825010",
            "--start-date",
            "05/01/2021",
            "--end-date",
            "05/20/2021",
            "--type",
            "enroll",
            "--include-subscriber-id",
        ])
        .unwrap();
        match cli.command {
            Command::TransactionReport(args) => {
                assert_eq!(args.transaction_type, "enroll");
                assert_eq!(args.sac, "825010");
                assert!(args.include_subscriber_id);
            }
            other => panic!("parsed the wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn enroll_takes_a_positional_batch_file() {
        let cli = Cli::try_parse_from([
            "ebbp-cli",
            "--username",
            "user",
            "--password",
            "secret",
            "enroll",
            "subscribers.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Enroll(args) => assert_eq!(args.file, PathBuf::from("subscribers.csv")),
            other => panic!("parsed the wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn missing_username_is_rejected_when_env_is_clear() {
        // The username has no default; without the flag or EBBP_USERNAME
        // the parse must fail.
        std::env::remove_var("EBBP_USERNAME");
        assert!(Cli::try_parse_from(["ebbp-cli", "batch-status"]).is_err());
    }
}
