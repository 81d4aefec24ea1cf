#![forbid(unsafe_code)]

use qaf_server::config::{self, Config};
use qaf_server::{http, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if config::wants_help(&args) {
        print!("{}", config::usage());
        return Ok(());
    }
    if config::wants_version(&args) {
        println!("{}", config::version_line());
        return Ok(());
    }

    let config = Config::parse(&args, |name| std::env::var(name).ok())?;
    logging::init(config.log_format)?;
    http::run(config).await?;
    Ok(())
}
