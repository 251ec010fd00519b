use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use pupilnet_remote::{Client, ClientConfig};
use pupilnet_transport::ZmqTransport;

use crate::exit::{remote_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod command;
pub mod listen;
pub mod notify;
pub mod ports;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the SUB and PUB ports reported by the remote.
    Ports,
    /// Send a raw control command and print the reply.
    Command(CommandArgs),
    /// Send a notification record.
    Notify(NotifyArgs),
    /// Subscribe and print received gaze data.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Where and how to reach the remote. Shared by every networked command.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Remote host [default: 127.0.0.1].
    #[arg(long, global = true, env = "PUPILNET_HOST")]
    pub host: Option<String>,

    /// Control (request/reply) port [default: 50020].
    #[arg(long, global = true, env = "PUPILNET_PORT")]
    pub port: Option<u16>,

    /// JSON client config file. --host and --port override its values.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Reply timeout for control requests (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub timeout: String,
}

impl RemoteArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)
                .map_err(|err| remote_error("config rejected", err))?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.req_port = port;
        }
        Ok(config.with_request_timeout(Some(parse_duration(&self.timeout)?)))
    }

    pub fn connect(&self) -> CliResult<Client<ZmqTransport>> {
        let config = self.client_config()?;
        Client::connect_with_config(config).map_err(|err| remote_error("connect failed", err))
    }
}

pub fn run(command: Command, remote: &RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(remote, format),
        Command::Command(args) => command::run(args, remote, format),
        Command::Notify(args) => notify::run(args, remote, format),
        Command::Listen(args) => listen::run(args, remote, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Command text, e.g. `t` for the remote's current time or `R` to
    /// start recording.
    pub text: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Notification subject, e.g. `recording.should_start`.
    #[arg(long)]
    pub subject: String,
    /// Additional record fields as a JSON object.
    #[arg(long, value_name = "OBJECT")]
    pub json: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Topic prefix to subscribe to (repeatable). Default: everything.
    #[arg(long = "topic", value_name = "PREFIX")]
    pub topics: Vec<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Maximum messages drained per poll.
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..))]
    pub batch: u32,
    /// Stop at the first malformed payload instead of skipping it.
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
