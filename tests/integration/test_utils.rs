//! Shared test utilities for integration tests
//!
//! Configuration loading reads the process environment, so tests that touch
//! it run one at a time behind a global mutex and restore what they changed.

use numctx::context::{Context, ContextRef};
use numctx::event::ContextModified;
use parking_lot::Mutex as EventLog;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Captured values of the variables a test overrides
struct EnvState {
    saved: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(names: &[&str]) -> Self {
        Self {
            saved: names
                .iter()
                .map(|name| (name.to_string(), std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(v) => std::env::set_var(&name, v),
                None => std::env::remove_var(&name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir` and the
/// given extra variables set
///
/// The user-level config file then resolves to
/// `<test_dir>/numctx/config.toml` on Linux.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut names = vec!["HOME", "XDG_CONFIG_HOME", "NUMCTX_ENV"];
    names.extend(vars.iter().map(|(name, _)| *name));
    let env_state = EnvState::capture(&names);

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());
    std::env::remove_var("NUMCTX_ENV");
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    env_state.restore();
    result
}

/// Record every event a context posts
pub fn record_events(context: &ContextRef) -> Arc<EventLog<Vec<ContextModified>>> {
    let seen = Arc::new(EventLog::new(Vec::new()));
    let sink = seen.clone();
    context.events().subscribe(move |e| sink.lock().push(e.clone()));
    seen
}
