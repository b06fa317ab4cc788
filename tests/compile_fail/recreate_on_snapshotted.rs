// ABOUTME: Compile-fail test verifying recreate cannot be called before the old container is removed.
// ABOUTME: This test should fail to compile, validating state machine safety.

use reimage::retry::RetryPolicy;
use reimage::runtime::FullRuntime;
use reimage::update::{Engine, Snapshotted, UpdateTask};

async fn try_invalid_recreate<R: FullRuntime>(task: UpdateTask<Snapshotted>, engine: &Engine<R>) {
    // ERROR: recreate() method doesn't exist on UpdateTask<Snapshotted>
    let _ = task.recreate(engine, RetryPolicy::default()).await;
}

fn main() {}
