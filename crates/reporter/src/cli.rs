//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "reporter")]
#[command(about = "Telemetry reporter — sends host snapshots to the relayer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Connect as a reporter and send a snapshot every interval [default]
    Run,

    /// Connect as a viewer and print every relayed payload
    Watch,

    /// Send one message to the reporter registered under IDENTITY
    Send {
        /// Reporter identity on the relayer
        #[arg(value_name = "IDENTITY")]
        identity: String,

        /// Payload, sent verbatim
        #[arg(value_name = "MESSAGE")]
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["reporter"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_send() {
        let cli = Cli::try_parse_from(["reporter", "send", "host-B", "ping"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Send {
                identity: "host-B".to_string(),
                message: "ping".to_string(),
            })
        );
    }

    #[test]
    fn send_requires_message() {
        assert!(Cli::try_parse_from(["reporter", "send", "host-B"]).is_err());
    }
}
