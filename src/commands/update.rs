// ABOUTME: Update command implementation.
// ABOUTME: Pulls the image and replaces every container of its old version.

use super::runtime_connection::connect_to_runtime;
use reimage::config::Config;
use reimage::error::Result;
use reimage::output::Output;
use reimage::types::ImageRef;
use reimage::update::{UpdateOutcome, Updater};

pub async fn update(config: Config, image: &str, mut output: Output) -> Result<()> {
    let tag = ImageRef::parse(image)?;
    output.start_timer();

    let runtime = connect_to_runtime(&config.runtime_config()?, &output).await?;
    let updater = Updater::new(runtime, config.update_settings());

    output.progress(&format!("→ Updating {tag}..."));
    match updater.update_image(&tag).await {
        Ok(UpdateOutcome::AlreadyCurrent { tag, image }) => {
            output.success(&format!("{tag} is already up to date ({})", image.short()));
            Ok(())
        }
        Ok(UpdateOutcome::Updated(report)) => {
            output.report(&report);
            for warning in &report.warnings {
                output.warning(&warning.message);
            }
            output.success(&format!(
                "Replaced {} container(s) with {} ({})",
                report.replaced(),
                report.tag,
                report.new_image.short()
            ));
            Ok(())
        }
        Err(e) => {
            if let Some(report) = e.report() {
                output.report(report);
            }
            Err(e.into())
        }
    }
}
