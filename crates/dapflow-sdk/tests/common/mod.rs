#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dapflow_sdk::{DebugConfig, Debugger};
use dapflow_testing::fixtures::fast_config;
use dapflow_testing::{FakeHost, FakeOptions, FakeProgram, TestWorld};

/// A debugger wired to a scripted host, plus the directory its programs live in
pub struct Scenario {
    pub world: TestWorld,
    pub host: Arc<FakeHost>,
    pub debugger: Debugger,
}

impl Scenario {
    pub fn new(options: FakeOptions, script: impl FnOnce(&TestWorld) -> Vec<FakeProgram>) -> Self {
        Self::with_config(options, fast_config(), script)
    }

    pub fn with_config(
        options: FakeOptions,
        config: DebugConfig,
        script: impl FnOnce(&TestWorld) -> Vec<FakeProgram>,
    ) -> Self {
        let world = TestWorld::new();
        let host = FakeHost::with_options(options);
        for program in script(&world) {
            host.add_program(program);
        }
        let host = Arc::new(host);
        let debugger = Debugger::new(host.clone(), config).expect("debugger builds");
        Self {
            world,
            host,
            debugger,
        }
    }

    /// Wait until the tracker has seen the session end
    pub async fn wait_for_no_session(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.debugger.active_session().is_some() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "session still active after 2s"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
