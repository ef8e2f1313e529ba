use crate::ops::{run_check_config, run_ensure_webhook, run_list_sessions, ListSessionsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use directbnb::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "DirectBnB",
    about = "Run the DirectBnB booking backend and manage its Stripe integration",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect and configure the Stripe account used for checkout
    Stripe {
        #[command(subcommand)]
        command: StripeCommand,
    },
}

#[derive(Subcommand, Debug)]
enum StripeCommand {
    /// Report which Stripe settings are present and fetch the account
    CheckConfig,
    /// Register the checkout webhook endpoint unless it already exists
    EnsureWebhook,
    /// Print the most recent checkout sessions
    ListSessions(ListSessionsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Stripe { command } => match command {
            StripeCommand::CheckConfig => run_check_config().await,
            StripeCommand::EnsureWebhook => run_ensure_webhook().await,
            StripeCommand::ListSessions(args) => run_list_sessions(args).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["directbnb-api"]).expect("parses");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["directbnb-api", "serve", "--port", "8080"])
            .expect("parses serve");
        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(8080)),
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn stripe_subcommands_parse() {
        let cli = Cli::try_parse_from(["directbnb-api", "stripe", "list-sessions", "--limit", "3"])
            .expect("parses list-sessions");
        match cli.command {
            Some(Command::Stripe {
                command: StripeCommand::ListSessions(args),
            }) => assert_eq!(args.limit, 3),
            other => panic!("expected list-sessions, got {other:?}"),
        }

        let cli = Cli::try_parse_from(["directbnb-api", "stripe", "ensure-webhook"])
            .expect("parses ensure-webhook");
        assert!(matches!(
            cli.command,
            Some(Command::Stripe {
                command: StripeCommand::EnsureWebhook
            })
        ));
    }
}
