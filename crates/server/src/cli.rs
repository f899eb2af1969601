//! CLI argument parsing.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// On-call rotation scheduler.
///
/// Runs one scheduling workflow per rotation and notifies the tenant's
/// messaging channel whenever the on-call assignee changes.
#[derive(Parser, Debug)]
#[command(name = "oncall-server", version, about = "On-call rotation scheduler")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given)
    Serve,

    /// Print who is on call for a rotation and when that next changes
    OnCall {
        /// Rotation id as listed in the directory file
        rotation_id: String,

        /// Instant to evaluate (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let args = CliArgs::try_parse_from(["oncall-server"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn on_call_parses_instant() {
        let args =
            CliArgs::try_parse_from(["oncall-server", "on-call", "rot-1", "--at", "2024-01-10T12:00:00Z"]).unwrap();
        match args.command {
            Some(Command::OnCall { rotation_id, at }) => {
                assert_eq!(rotation_id, "rot-1");
                assert_eq!(at.unwrap().to_rfc3339(), "2024-01-10T12:00:00+00:00");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bad_instant_is_rejected() {
        assert!(CliArgs::try_parse_from(["oncall-server", "on-call", "rot-1", "--at", "tomorrow"]).is_err());
    }
}
