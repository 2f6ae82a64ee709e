use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use varia_versions::{ConditionContext, HostContext};

/// Host for the record `user/1`, mounted as `avatar`, whose named checks
/// are flags a test can flip between calls.
#[derive(Default)]
pub struct TestHost {
    checks: Mutex<HashMap<String, bool>>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, check: &str, value: bool) {
        self.checks
            .lock()
            .unwrap()
            .insert(check.to_string(), value);
    }
}

impl HostContext for TestHost {
    fn model_name(&self) -> Option<&str> {
        Some("user")
    }

    fn model_id(&self) -> Option<String> {
        Some("1".to_string())
    }

    fn mounted_as(&self) -> Option<&str> {
        Some("avatar")
    }

    fn named_check(&self, check: &str, _ctx: &ConditionContext<'_>) -> Option<bool> {
        self.checks.lock().unwrap().get(check).copied()
    }
}
