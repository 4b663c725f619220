//! Mock construction helpers

use station_monitor::backend::{DashBackend, FrontendReceiver, MockBackend};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Start a backend thread over `mock`
pub fn start_backend(mock: Arc<MockBackend>) -> (JoinHandle<()>, FrontendReceiver) {
    let (backend, frontend) = DashBackend::new(mock);
    let handle = std::thread::spawn(move || backend.run());
    (handle, frontend)
}

/// Demo-seeded mock backend
pub fn demo_backend() -> Arc<MockBackend> {
    Arc::new(MockBackend::seeded_demo().expect("seeding demo backend"))
}

/// Stop the backend and wait for its thread
pub fn stop_backend(handle: JoinHandle<()>, frontend: &FrontendReceiver) {
    frontend.shutdown();
    handle.join().expect("backend thread panicked");
}
