// ABOUTME: Scriptable in-memory engine implementing the runtime traits.
// ABOUTME: Journals every call and injects transient or permanent failures per call.

use crate::runtime::traits::{
    ContainerError, ContainerFilters, ContainerOps, ContainerRecord, ContainerSpec, ContainerState,
    ImageError, ImageOps, ImageRecord, InspectedContainer, PruneReport, PullProgress, PullStream,
};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bollard::models::{
    ContainerConfig, EndpointIpamConfig, EndpointSettings, HostConfig, PortBinding,
    RestartPolicy, RestartPolicyNameEnum,
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One call made against the mock, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListImages(String),
    Pull(String),
    RemoveImage(ImageId),
    Prune,
    ListContainers(Option<String>),
    Inspect(ContainerId),
    RemoveContainer(ContainerId),
    Create(String),
    Start(ContainerId),
}

impl Call {
    /// Whether the call changes engine state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::Pull(_)
                | Call::RemoveImage(_)
                | Call::Prune
                | Call::RemoveContainer(_)
                | Call::Create(_)
                | Call::Start(_)
        )
    }
}

/// What the next pull does.
#[derive(Debug, Clone)]
pub enum PullBehavior {
    /// The tag already points at the newest image.
    UpToDate,
    /// The tag moves to this image; later pulls are up to date.
    NewImage(ImageId),
    /// The registry does not know the reference.
    Missing,
}

type Matcher = Box<dyn Fn(&Call) -> bool + Send>;

struct FailureRule {
    matches: Matcher,
    remaining: Option<u32>,
}

struct State {
    images: Vec<ImageRecord>,
    containers: Vec<InspectedContainer>,
    pull: PullBehavior,
    calls: Vec<Call>,
    rules: Vec<FailureRule>,
    next_id: u64,
    /// Base image of each locally built image.
    parents: HashMap<String, String>,
}

impl State {
    /// Journal the call and report whether an injected failure applies.
    fn record(&mut self, call: Call) -> Option<String> {
        let injected = self.rules.iter_mut().find_map(|rule| {
            if !(rule.matches)(&call) {
                return None;
            }
            match rule.remaining.as_mut() {
                Some(0) => None,
                Some(n) => {
                    *n -= 1;
                    Some(format!("injected failure: {call:?}"))
                }
                None => Some(format!("injected failure: {call:?}")),
            }
        });
        self.calls.push(call);
        injected
    }

    fn container(&self, id: &ContainerId) -> Option<&InspectedContainer> {
        self.containers.iter().find(|c| &c.id == id)
    }

    /// Whether `image` is `ancestor` or was built on top of it, the way
    /// the engine's `ancestor` filter matches.
    fn descends_from(&self, image: &str, ancestor: &str) -> bool {
        let mut current = Some(image);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parents.get(id).map(String::as_str);
        }
        false
    }
}

/// In-memory engine for tests.
#[derive(Clone)]
pub struct MockRuntime {
    state: Arc<Mutex<State>>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                images: Vec::new(),
                containers: Vec::new(),
                pull: PullBehavior::UpToDate,
                calls: Vec::new(),
                rules: Vec::new(),
                next_id: 1,
                parents: HashMap::new(),
            })),
        }
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&self, id: &str, tags: &[&str]) -> ImageId {
        let id = ImageId::new(id);
        self.state.lock().images.push(ImageRecord {
            id: id.clone(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        });
        id
    }

    /// Add an image built `FROM` `parent`.
    pub fn add_derived_image(&self, id: &str, tags: &[&str], parent: &ImageId) -> ImageId {
        let id = self.add_image(id, tags);
        self.state
            .lock()
            .parents
            .insert(id.to_string(), parent.to_string());
        id
    }

    pub fn add_container(&self, container: InspectedContainer) -> ContainerId {
        let id = container.id.clone();
        self.state.lock().containers.push(container);
        id
    }

    pub fn set_pull(&self, behavior: PullBehavior) {
        self.state.lock().pull = behavior;
    }

    /// Fail the next `times` calls matching `pred`, then behave normally.
    pub fn fail_times(&self, times: u32, pred: impl Fn(&Call) -> bool + Send + 'static) {
        self.state.lock().rules.push(FailureRule {
            matches: Box::new(pred),
            remaining: Some(times),
        });
    }

    /// Fail every call matching `pred`.
    pub fn fail_always(&self, pred: impl Fn(&Call) -> bool + Send + 'static) {
        self.state.lock().rules.push(FailureRule {
            matches: Box::new(pred),
            remaining: None,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.state.lock().images.clone()
    }

    pub fn has_image(&self, id: &ImageId) -> bool {
        self.state.lock().images.iter().any(|i| &i.id == id)
    }

    pub fn containers(&self) -> Vec<InspectedContainer> {
        self.state.lock().containers.clone()
    }

    pub fn container_named(&self, name: &str) -> Option<InspectedContainer> {
        self.state
            .lock()
            .containers
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }
}

/// A container with a realistic configuration: env, command, a published
/// port, a restart policy, and a user-defined network with a static address.
pub fn sample_container(id: &str, name: &str, image: &ImageId, running: bool) -> InspectedContainer {
    let network = format!("{name}-net");
    let mac = format!("02:42:ac:11:00:{:02x}", name.len());

    let endpoint = EndpointSettings {
        ipam_config: Some(EndpointIpamConfig {
            ipv4_address: Some("172.30.0.10".to_string()),
            ..Default::default()
        }),
        aliases: Some(vec![name.to_string()]),
        mac_address: Some(mac.clone()),
        ip_address: Some("172.30.0.10".to_string()),
        ..Default::default()
    };

    InspectedContainer {
        id: ContainerId::new(id),
        name: name.to_string(),
        running,
        image: image.to_string(),
        config: Some(ContainerConfig {
            image: Some("app:latest".to_string()),
            env: Some(vec![format!("SERVICE={name}"), "PORT=8080".to_string()]),
            cmd: Some(vec!["serve".to_string(), "--port".to_string(), "8080".to_string()]),
            labels: Some(HashMap::from([("role".to_string(), name.to_string())])),
            ..Default::default()
        }),
        host_config: Some(HostConfig {
            port_bindings: Some(HashMap::from([(
                "8080/tcp".to_string(),
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some("18080".to_string()),
                }]),
            )])),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            binds: Some(vec![format!("/srv/{name}:/data")]),
            network_mode: Some(network.clone()),
            ..Default::default()
        }),
        networks: HashMap::from([(network, endpoint)]),
        mac_address: Some(mac),
    }
}

fn image_failure(message: String) -> ImageError {
    ImageError::Runtime(message)
}

fn container_failure(message: String) -> ContainerError {
    ContainerError::Runtime(message)
}

fn pull_events(state: &mut State, reference: &str) -> Vec<Result<PullProgress, ImageError>> {
    if let Some(message) = state.record(Call::Pull(reference.to_string())) {
        return vec![Err(ImageError::PullFailed(message))];
    }

    match state.pull.clone() {
        PullBehavior::UpToDate => vec![
            Ok(PullProgress::status(format!("Pulling from {reference}"))),
            Ok(PullProgress::status(format!(
                "Status: Image is up to date for {reference}"
            ))),
        ],
        PullBehavior::Missing => vec![Err(ImageError::NotFound(reference.to_string()))],
        PullBehavior::NewImage(id) => {
            for image in &mut state.images {
                image.tags.retain(|t| t != reference);
            }
            match state.images.iter_mut().find(|i| i.id == id) {
                Some(image) => image.tags.push(reference.to_string()),
                None => state.images.push(ImageRecord {
                    id: id.clone(),
                    tags: vec![reference.to_string()],
                }),
            }
            state.pull = PullBehavior::UpToDate;

            let layer = Some(id.short().to_string());
            vec![
                Ok(PullProgress::status(format!("Pulling from {reference}"))),
                Ok(PullProgress {
                    id: layer.clone(),
                    status: "Downloading".to_string(),
                    progress: Some("[=====>     ]".to_string()),
                }),
                Ok(PullProgress {
                    id: layer,
                    status: "Pull complete".to_string(),
                    progress: None,
                }),
                Ok(PullProgress::status(format!(
                    "Status: Downloaded newer image for {reference}"
                ))),
            ]
        }
    }
}

#[async_trait]
impl ImageOps for MockRuntime {
    async fn list_images(&self, reference: &ImageRef) -> Result<Vec<ImageRecord>, ImageError> {
        let reference = reference.to_string();
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::ListImages(reference.clone())) {
            return Err(image_failure(message));
        }
        Ok(state
            .images
            .iter()
            .filter(|i| i.tags.contains(&reference))
            .cloned()
            .collect())
    }

    fn pull_image(&self, reference: &ImageRef) -> PullStream {
        let state = Arc::clone(&self.state);
        let reference = reference.to_string();
        Box::pin(
            futures::stream::once(async move { pull_events(&mut state.lock(), &reference) })
                .map(futures::stream::iter)
                .flatten(),
        )
    }

    async fn remove_image(&self, id: &ImageId) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::RemoveImage(id.clone())) {
            return Err(image_failure(message));
        }
        if state.containers.iter().any(|c| c.image == id.as_str())
            || state.parents.values().any(|p| p == id.as_str())
        {
            return Err(ImageError::InUse(id.to_string()));
        }
        let before = state.images.len();
        state.images.retain(|i| &i.id != id);
        if state.images.len() == before {
            return Err(ImageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport, ImageError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::Prune) {
            return Err(image_failure(message));
        }
        let in_use: Vec<String> = state.containers.iter().map(|c| c.image.clone()).collect();
        let mut report = PruneReport::default();
        state.images.retain(|image| {
            let dangling = image.tags.is_empty() && !in_use.contains(&image.id.to_string());
            if dangling {
                report.deleted.push(image.id.to_string());
            }
            !dangling
        });
        Ok(report)
    }
}

#[async_trait]
impl ContainerOps for MockRuntime {
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerRecord>, ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::ListContainers(filters.ancestor.clone())) {
            return Err(container_failure(message));
        }
        Ok(state
            .containers
            .iter()
            .filter(|c| filters.all || c.running)
            .filter(|c| {
                filters
                    .ancestor
                    .as_deref()
                    .is_none_or(|a| state.descends_from(&c.image, a))
            })
            .map(|c| ContainerRecord {
                id: c.id.clone(),
                names: vec![c.name.clone()],
                state: if c.running {
                    ContainerState::Running
                } else {
                    ContainerState::Stopped
                },
                image_id: c.image.clone(),
            })
            .collect())
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<InspectedContainer, ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::Inspect(id.clone())) {
            return Err(container_failure(message));
        }
        state
            .container(id)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::RemoveContainer(id.clone())) {
            return Err(container_failure(message));
        }
        match state.container(id).map(|c| c.running) {
            None => Err(ContainerError::NotFound(id.to_string())),
            Some(true) if !force => Err(ContainerError::Runtime(format!(
                "cannot remove running container {id}"
            ))),
            Some(_) => {
                state.containers.retain(|c| &c.id != id);
                Ok(())
            }
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::Create(spec.name.clone())) {
            return Err(container_failure(message));
        }
        if !state.images.iter().any(|i| i.id.as_str() == spec.image) {
            return Err(ContainerError::ImageNotFound(spec.image.clone()));
        }
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(ContainerError::AlreadyExists(spec.name.clone()));
        }

        let id = ContainerId::new(format!("{:064x}", state.next_id));
        state.next_id += 1;
        state.containers.push(InspectedContainer {
            id: id.clone(),
            name: spec.name.clone(),
            running: false,
            image: spec.image.clone(),
            config: Some(spec.config.clone()),
            host_config: spec.host_config.clone(),
            networks: spec.endpoints.clone(),
            mac_address: spec.mac_address.clone(),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = state.record(Call::Start(id.clone())) {
            return Err(container_failure(message));
        }
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if container.running {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.running = true;
        Ok(())
    }
}
