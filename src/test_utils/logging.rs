use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness's captured stdout.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// `RUST_LOG` overrides the default `hybrank=debug` filter.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hybrank=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Prints a bracketed banner around one test scenario.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        init_test_tracing();
        println!("\n{}", "=".repeat(60));
        println!("[TEST START] {test_name}");
        Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn log_input<T: std::fmt::Debug>(&self, name: &str, value: &T) {
        println!("[INPUT] {name}: {value:?}");
    }

    pub fn log_actual<T: std::fmt::Debug>(&self, value: &T) {
        println!("[ACTUAL] {value:?}");
    }

    pub fn pass(&self) {
        println!(
            "[RESULT] {} PASSED in {:?}",
            self.test_name,
            self.start_time.elapsed()
        );
    }
}
