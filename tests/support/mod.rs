// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup and a mock engine preloaded with an image and its containers.

use reimage::runtime::mock::{MockRuntime, PullBehavior, sample_container};
use reimage::types::{ImageId, ImageRef};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("reimage=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const TAG: &str = "app:latest";

#[allow(dead_code)]
pub fn tag() -> ImageRef {
    ImageRef::parse(TAG).unwrap()
}

/// An engine with `app:latest` at `sha256:old`, one container per name
/// (all running), and a pull that brings `sha256:new`.
#[allow(dead_code)]
pub struct Host {
    pub mock: MockRuntime,
    pub old: ImageId,
    pub new: ImageId,
}

#[allow(dead_code)]
pub fn host(names: &[&str]) -> Host {
    init_tracing();
    let mock = MockRuntime::new();
    let old = mock.add_image("sha256:old", &[TAG]);
    let new = ImageId::new("sha256:new");
    for (i, name) in names.iter().enumerate() {
        mock.add_container(sample_container(&format!("c{i}"), name, &old, true));
    }
    mock.set_pull(PullBehavior::NewImage(new.clone()));
    Host { mock, old, new }
}
