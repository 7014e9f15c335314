mod broadcast;
mod config;
mod error;
mod lifecycle;
mod model;
mod room;
mod server;
mod session;
mod utils;

use config::Config;

#[actix::main]
async fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match lifecycle::run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            std::process::ExitCode::FAILURE
        }
    }
}
