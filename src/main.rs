use clap::Parser;
use mail_beacon::{config::Args, logging::init_logging, start_server};

#[tokio::main]
async fn main() {
    // parse cli arguments
    let args = Args::parse();
    init_logging(&args.log_level);

    if let Err(e) = start_server(args).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
