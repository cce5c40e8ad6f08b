// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the command-line client.
//
// Module responsibilities:
// - `config`: runtime settings (host, credentials, file locations) and
//   the URLs derived from them.
// - `token`: bearer-token lifecycle -- cache file, Basic-Auth exchange,
//   expiry tracking with a safety margin.
// - `api`: the EBBP service client; one method per remote operation,
//   all funneled through a single response classifier.
// - `batch`: batch CSV input and the subscriber-record fix-up.
// - `output`: timestamped report, batch-status, and response-log
//   writers.
// - `cli`: the clap command surface and per-command drivers.
// - `errors`: the fatal error taxonomy shared by `token` and `api`.
//
// Keeping this separation makes the HTTP layer testable against a mock
// server without touching the terminal UX.
pub mod api;
pub mod batch;
pub mod cli;
pub mod config;
pub mod errors;
pub mod output;
pub mod token;
