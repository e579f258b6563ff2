use dotenvy::dotenv;

use promptstats::api::{self, App};
use promptstats::config::Config;
use promptstats::error::ApplicationError;
use promptstats::logger;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    let database = config.database().await?;
    let github = config.github()?;
    let authenticator = config.authenticator();

    api::serve(config.host, App::new(database, authenticator, github)).await
}
