// ABOUTME: Plan command implementation.
// ABOUTME: Lists the containers an update would replace, without pulling or changing anything.

use super::runtime_connection::connect_to_runtime;
use reimage::config::Config;
use reimage::error::Result;
use reimage::output::Output;
use reimage::types::ImageRef;
use reimage::update::Updater;

pub async fn plan(config: Config, image: &str, output: Output) -> Result<()> {
    let tag = ImageRef::parse(image)?;

    let runtime = connect_to_runtime(&config.runtime_config()?, &output).await?;
    let plan = Updater::new(runtime, config.update_settings())
        .plan(&tag)
        .await?;

    output.plan(&plan);
    Ok(())
}
