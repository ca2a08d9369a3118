use joycond::config::Config;
use joycond::daemon;
use joycond::logger::{self, Verbosity};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("joycond: {}", e);
            std::process::exit(1);
        }
    };
    logger::init(Verbosity::from_u8(config.verbosity));
    log::info!("Starting joycond");

    if let Err(e) = daemon::run(&config).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
