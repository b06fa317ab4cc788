// ABOUTME: Config scaffolding for new hosts.
// ABOUTME: Creates a commented reimage.yml template.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    Ok(())
}

const TEMPLATE: &str = r#"# Engine flavor (docker or podman). Omit to auto-detect.
# runtime: docker

# Control socket. A literal path, or read from the environment:
# socket: { env: DOCKER_SOCKET, default: /var/run/docker.sock }

# Retries for every engine call during an update.
retry:
  retries: 3
  delay: 2s

# Remove dangling images after every container was replaced.
prune:
  enabled: false
  retries: 1
  delay: 2s

# Replace stopped containers too (recreated, not started).
include_stopped: true
"#;
