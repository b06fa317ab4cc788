// ABOUTME: Compile-fail test verifying ContainerId and ImageId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use reimage::types::{ContainerId, ImageId};

fn main() {
    let _: ContainerId = ImageId::new("sha256:abc123");
}
