// src/main.rs

use tracing::error;

#[tokio::main]
async fn main() {
    let cli = taskctl::cli::parse();
    taskctl::logging::init_logging(cli.debug, cli.quiet);

    match taskctl::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}
