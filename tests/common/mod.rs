//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use station_monitor::backend::{BackendMessage, FrontendReceiver};
use std::time::{Duration, Instant};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Receive messages until `pick` returns `Some`, skipping the rest
pub fn wait_for<T>(
    frontend: &FrontendReceiver,
    mut pick: impl FnMut(BackendMessage) -> Option<T>,
) -> T {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if let Ok(msg) = frontend.receiver.recv_timeout(Duration::from_millis(50)) {
            if let Some(found) = pick(msg) {
                return found;
            }
        }
    }
    panic!("expected backend message not received within {:?}", test_timeout());
}

/// Poll `condition` until it holds or the test timeout passes
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}
