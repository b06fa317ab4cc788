// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via the Docker-compatible API on a local socket.

use crate::runtime::error::ConnectionError;
use crate::runtime::traits::{
    ContainerError, ContainerFilters, ContainerOps, ContainerRecord, ContainerSpec, ContainerState,
    ImageError, ImageOps, ImageRecord, InspectedContainer, PruneReport, PullProgress, PullStream,
};
use crate::runtime::types::{RuntimeInfo, RuntimeType};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, EndpointSettings, NetworkingConfig, ProgressDetail};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    ListImagesOptions, PruneImagesOptions, RemoveContainerOptions, RemoveImageOptions,
    StartContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;

/// Seconds bollard waits for a single API response.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_code(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_image_error(e: bollard::errors::Error, target: &str) -> ImageError {
    match status_code(&e) {
        Some((404, _)) => ImageError::NotFound(target.to_string()),
        Some((409, message)) => ImageError::InUse(format!("{target}: {message}")),
        _ => ImageError::Runtime(format!("{target}: {e}")),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match status_code(&e) {
        Some((404, message)) => ContainerError::ImageNotFound(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match status_code(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::AlreadyRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match status_code(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Talks to Docker or Podman through the Docker-compatible API on a local
/// Unix socket.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the runtime described by `info`.
    ///
    /// Use with `detect_local()`. The connection is lazy; call `ping()` to
    /// confirm the engine answers.
    pub fn connect(info: &RuntimeInfo) -> Result<Self, ConnectionError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ConnectionError::Connect {
                    socket: info.socket_path.clone(),
                    reason: e.to_string(),
                })?;
        Ok(Self::new(client, info.runtime_type))
    }

    /// Check that the engine answers.
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        self.client
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| ConnectionError::Ping {
                socket: self.runtime_type.to_string(),
                reason: e.to_string(),
            })
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

/// Build the engine's create body from a spec.
///
/// Endpoint settings are passed through untouched so static IPs, aliases and
/// per-network MACs survive recreation. A top-level MAC is pinned on the
/// primary endpoint when that endpoint does not carry one already.
/// Byte counts of a layer transfer, e.g. `1048576/5242880`.
fn progress_text(detail: &ProgressDetail) -> Option<String> {
    match (detail.current, detail.total) {
        (Some(current), Some(total)) if total > 0 => Some(format!("{current}/{total}")),
        (Some(current), _) => Some(current.to_string()),
        _ => None,
    }
}

pub(crate) fn create_body(spec: &ContainerSpec) -> ContainerCreateBody {
    let config = spec.config.clone();

    let mut endpoints: HashMap<String, EndpointSettings> = spec.endpoints.clone();
    if let Some(mac) = &spec.mac_address {
        let primary = spec
            .host_config
            .as_ref()
            .and_then(|h| h.network_mode.clone())
            .filter(|mode| endpoints.contains_key(mode))
            .or_else(|| {
                let mut names: Vec<&String> = endpoints.keys().collect();
                names.sort();
                names.first().map(|n| (*n).clone())
            });
        if let Some(endpoint) = primary.and_then(|name| endpoints.get_mut(&name))
            && endpoint.mac_address.as_deref().is_none_or(str::is_empty)
        {
            endpoint.mac_address = Some(mac.clone());
        }
    }

    ContainerCreateBody {
        hostname: config.hostname,
        domainname: config.domainname,
        user: config.user,
        attach_stdin: config.attach_stdin,
        attach_stdout: config.attach_stdout,
        attach_stderr: config.attach_stderr,
        exposed_ports: config.exposed_ports,
        tty: config.tty,
        open_stdin: config.open_stdin,
        stdin_once: config.stdin_once,
        env: config.env,
        cmd: config.cmd,
        healthcheck: config.healthcheck,
        args_escaped: config.args_escaped,
        image: Some(spec.image.clone()),
        volumes: config.volumes,
        working_dir: config.working_dir,
        entrypoint: config.entrypoint,
        network_disabled: config.network_disabled,
        on_build: config.on_build,
        labels: config.labels,
        stop_signal: config.stop_signal,
        stop_timeout: config.stop_timeout,
        shell: config.shell,
        host_config: spec.host_config.clone(),
        networking_config: if endpoints.is_empty() {
            None
        } else {
            Some(NetworkingConfig {
                endpoints_config: Some(endpoints),
            })
        },
        ..Default::default()
    }
}

/// Pick the MAC of the endpoint named by the network mode, else the first
/// endpoint (by name) that has one.
fn primary_mac(
    network_mode: Option<&str>,
    networks: &HashMap<String, EndpointSettings>,
) -> Option<String> {
    let non_empty = |e: &EndpointSettings| e.mac_address.clone().filter(|m| !m.is_empty());

    if let Some(mac) = network_mode
        .and_then(|mode| networks.get(mode))
        .and_then(non_empty)
    {
        return Some(mac);
    }

    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();
    names.into_iter().find_map(|name| non_empty(&networks[name]))
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn list_images(&self, reference: &ImageRef) -> Result<Vec<ImageRecord>, ImageError> {
        let reference = reference.to_string();
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.clone()]);

        let opts = ListImagesOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| map_image_error(e, &reference))?;

        Ok(images
            .into_iter()
            .map(|image| ImageRecord {
                id: ImageId::new(image.id),
                tags: image.repo_tags,
            })
            .collect())
    }

    fn pull_image(&self, reference: &ImageRef) -> PullStream {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        let stream = self.client.create_image(Some(opts), None, None);
        Box::pin(stream.map(move |result| {
            result
                .map(|info| PullProgress {
                    progress: info.progress_detail.as_ref().and_then(progress_text),
                    id: info.id,
                    status: info.status.unwrap_or_default(),
                })
                .map_err(|e| ImageError::PullFailed(format!("{image_name}: {e}")))
        }))
    }

    async fn remove_image(&self, id: &ImageId) -> Result<(), ImageError> {
        let opts = RemoveImageOptions {
            force: false,
            ..Default::default()
        };

        self.client
            .remove_image(id.as_str(), Some(opts), None)
            .await
            .map_err(|e| map_image_error(e, id.as_str()))?;

        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport, ImageError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);

        let response = self
            .client
            .prune_images(Some(PruneImagesOptions {
                filters: Some(filters),
            }))
            .await
            .map_err(|e| map_image_error(e, "dangling images"))?;

        let mut report = PruneReport {
            space_reclaimed: response.space_reclaimed.unwrap_or(0).max(0) as u64,
            ..Default::default()
        };
        for item in response.images_deleted.unwrap_or_default() {
            if let Some(deleted) = item.deleted {
                report.deleted.push(deleted);
            }
            if let Some(untagged) = item.untagged {
                report.untagged.push(untagged);
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerRecord>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(ancestor) = &filters.ancestor {
            filter_map.insert("ancestor".to_string(), vec![ancestor.clone()]);
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let state = c
                    .state
                    .map(|s| ContainerState::from_engine(&s.to_string()))
                    .unwrap_or(ContainerState::Other);

                ContainerRecord {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    names: c
                        .names
                        .unwrap_or_default()
                        .into_iter()
                        .map(|n| n.trim_start_matches('/').to_string())
                        .collect(),
                    state,
                    image_id: c.image_id.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<InspectedContainer, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let networks = details
            .network_settings
            .and_then(|settings| settings.networks)
            .unwrap_or_default();

        let network_mode = details
            .host_config
            .as_ref()
            .and_then(|h| h.network_mode.as_deref());
        let mac_address = primary_mac(network_mode, &networks);

        Ok(InspectedContainer {
            id: details.id.map_or_else(|| id.clone(), ContainerId::new),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            running: details
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false),
            image: details.image.unwrap_or_default(),
            config: details.config,
            host_config: details.host_config,
            networks,
            mac_address,
        })
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let opts = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), create_body(spec))
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(map_container_start_error)
    }
}
