use clap::Parser;
use std::error::Error;
use tol_client::api_client::ApiClient;
use tol_client::commands::request::RequestCommand;
use tol_client::commands::retrieve_token::RetrieveTokenCommand;
use tol_client::http::client::HttpClient;
use tol_client::parameters::{ClientArgs, Commands};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "tol-cli")]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    /// Log token fetches and requests to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .init();

    let http_client = HttpClient::new(cli.client.http_config()?)
        .map_err(|e| format!("error creating http client: {}", e))?;
    let api_client = ApiClient::with_http_client(cli.client.client_config(), http_client);

    let output = match cli.command {
        Commands::Token {
            output_token_format,
        } => RetrieveTokenCommand::new(api_client).retrieve_token(&output_token_format)?,
        Commands::Request(request_args) => {
            RequestCommand::new(api_client).request(request_args.request_options()?)?
        }
    };

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
