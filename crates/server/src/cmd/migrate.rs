//! `sb-server migrate` - apply the schema and exit

use anyhow::Result;
use tracing::info;

use sb_config::Config;

pub async fn run(config: Config) -> Result<()> {
    let pool = sb_store::connect(&config.db).await?;
    sb_store::migrate(&pool).await?;
    info!("migration complete");
    Ok(())
}
