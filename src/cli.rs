//! Command Line Interface (CLI) arguments and commands.

use crate::array::DatasetData;
use crate::client;
use crate::error::Nh5Error;
use crate::models::{self, ClientConfig, DatasetDataOptions, Group};
use crate::range_downloader_http::HttpCredentials;

use clap::{Parser, Subcommand};
use std::error::Error;
use std::process::ExitCode;

/// nh5 command line interface
#[derive(Clone, Debug, Parser)]
#[command(about = "Inspect NH5 containers served over HTTP")]
pub struct CommandLineArgs {
    /// URL of the NH5 container
    pub url: String,
    /// Number of bytes requested by the first header probe
    #[arg(long, default_value_t = models::DEFAULT_INITIAL_PROBE_SIZE, env = "NH5_PROBE_SIZE")]
    pub probe_size: usize,
    /// Username for HTTP basic authentication
    #[arg(long, env = "NH5_USERNAME", requires = "password", conflicts_with = "token")]
    pub username: Option<String>,
    /// Password for HTTP basic authentication
    #[arg(long, env = "NH5_PASSWORD", requires = "username", hide_env_values = true)]
    pub password: Option<String>,
    /// Bearer token for HTTP authentication
    #[arg(long, env = "NH5_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

/// nh5 subcommands
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// List the subgroups and datasets of a group
    Ls {
        /// Path of the group
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print the dtype, shape and attributes of a dataset as JSON
    Info {
        /// Path of the dataset
        path: String,
    },
    /// Print the values of a dataset
    Cat {
        /// Path of the dataset
        path: String,
    },
}

impl Command {
    /// Path argument of the command.
    pub fn path(&self) -> &str {
        match self {
            Self::Ls { path } | Self::Info { path } | Self::Cat { path } => path,
        }
    }
}

impl CommandLineArgs {
    /// Returns the credentials selected on the command line.
    pub fn credentials(&self) -> HttpCredentials {
        match (&self.username, &self.password, &self.token) {
            (Some(username), Some(password), _) => HttpCredentials::basic(username, password),
            (_, _, Some(token)) => HttpCredentials::bearer(token),
            _ => HttpCredentials::None,
        }
    }

    /// Returns the client configuration selected on the command line.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            initial_probe_size: self.probe_size,
            credentials: self.credentials(),
        }
    }
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

/// Format an error and its chain of causes on a single line.
pub fn error_report(error: &Nh5Error) -> String {
    let mut report = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        report.push_str(": ");
        report.push_str(&source.to_string());
        current = source.source();
    }
    report
}

/// Format a group listing, subgroups first.
pub fn format_group(group: &Group) -> String {
    let mut lines = vec![];
    for subgroup in &group.subgroups {
        lines.push(format!("{}/", subgroup.name));
    }
    for dataset in &group.datasets {
        lines.push(format!(
            "{}\t{}\t{:?}",
            dataset.name, dataset.dtype, dataset.shape
        ));
    }
    lines.join("\n")
}

/// Format dataset values using the array's display formatting.
pub fn format_values(data: &DatasetData) -> String {
    match data {
        DatasetData::Int8(array) => array.to_string(),
        DatasetData::Uint8(array) => array.to_string(),
        DatasetData::Int16(array) => array.to_string(),
        DatasetData::Uint16(array) => array.to_string(),
        DatasetData::Int32(array) => array.to_string(),
        DatasetData::Uint32(array) => array.to_string(),
        DatasetData::Float32(array) => array.to_string(),
        DatasetData::Float64(array) => array.to_string(),
    }
}

/// Execute the selected command, writing its output to stdout.
///
/// A path that does not exist is reported on stderr and yields a failure exit code.
pub async fn run(args: &CommandLineArgs) -> Result<ExitCode, Nh5Error> {
    let client = client::create_client_with_config(&args.url, args.client_config()).await?;
    let output = match &args.command {
        Command::Ls { path } => client.get_group(path).map(|group| format_group(&group)),
        Command::Info { path } => match client.get_dataset(path) {
            Some(dataset) => Some(serde_json::to_string_pretty(&dataset)?),
            None => None,
        },
        Command::Cat { path } => client
            .get_dataset_data(path, &DatasetDataOptions::default())
            .await?
            .map(|data| format_values(&data)),
    };
    match output {
        Some(output) => {
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("error: {} not found", args.command.path());
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Hierarchy;
    use crate::test_utils;

    use ndarray::array;

    fn parse_from(args: &[&str]) -> CommandLineArgs {
        CommandLineArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn parse_ls_default_path() {
        let args = parse_from(&["nh5", "http://example.com/f.nh5", "ls"]);
        assert_eq!("http://example.com/f.nh5", args.url);
        assert_eq!(100_000, args.probe_size);
        match &args.command {
            Command::Ls { path } => assert_eq!("/", path),
            command => panic!("unexpected command {command:?}"),
        }
        assert_eq!(HttpCredentials::None, args.credentials());
    }

    #[test]
    fn parse_cat_with_options() {
        let args = parse_from(&[
            "nh5",
            "--probe-size",
            "4096",
            "--token",
            "abc",
            "http://example.com/f.nh5",
            "cat",
            "/a/ds1",
        ]);
        let config = args.client_config();
        assert_eq!(4096, config.initial_probe_size);
        assert_eq!(HttpCredentials::bearer("abc"), config.credentials);
        match &args.command {
            Command::Cat { path } => assert_eq!("/a/ds1", path),
            command => panic!("unexpected command {command:?}"),
        }
    }

    #[test]
    fn parse_basic_auth() {
        let args = parse_from(&[
            "nh5",
            "--username",
            "user",
            "--password",
            "secret",
            "http://example.com/f.nh5",
            "info",
            "/a/ds1",
        ]);
        assert_eq!(HttpCredentials::basic("user", "secret"), args.credentials());
    }

    #[test]
    fn parse_username_requires_password() {
        let result = CommandLineArgs::try_parse_from([
            "nh5",
            "--username",
            "user",
            "http://example.com/f.nh5",
            "ls",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn command_path() {
        let args = parse_from(&["nh5", "http://example.com/f.nh5", "info", "/a/ds1"]);
        assert_eq!("/a/ds1", args.command.path());
    }

    #[test]
    fn format_group_listing() {
        let hierarchy = Hierarchy::new(test_utils::get_test_header());
        let group = hierarchy.get_group("/a").unwrap();
        assert_eq!("b/\nc/\nds1\tint32\t[4]", format_group(&group));
    }

    #[test]
    fn format_values_1d() {
        let data = DatasetData::Int16(array![1, -2, 3].into_dyn());
        assert_eq!("[1, -2, 3]", format_values(&data));
    }

    #[test]
    fn error_report_chain() {
        let json_error = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let report = error_report(&Nh5Error::from(json_error));
        assert!(report.starts_with("failed to parse NH5 header JSON: EOF while parsing"));
    }
}
