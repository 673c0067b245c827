//! This crate contains utilities for preparing an environment
//! for integration tests, including:
//! * docker containers
//! * test data generators

use pg::PgContainer;

pub mod data_gen;
pub mod pg;

pub struct TestEnvironment {
    pub pg: Option<PgContainer>,
}

#[derive(Default)]
pub struct TestEnvironmentCfg {
    pub pg: bool,
}

impl TestEnvironmentCfg {
    pub fn with_pg(mut self) -> Self {
        self.pg = true;
        self
    }
    pub async fn start(self) -> TestEnvironment {
        TestEnvironment::start_with_cfg(self).await
    }
}

impl TestEnvironment {
    pub fn builder() -> TestEnvironmentCfg {
        TestEnvironmentCfg::default()
    }

    pub async fn start_with_cfg(cfg: TestEnvironmentCfg) -> TestEnvironment {
        let pg = if cfg.pg {
            Some(PgContainer::run().await.unwrap())
        } else {
            None
        };

        TestEnvironment { pg }
    }

    /// Returns URL of PosgreSQL instance running in container
    pub async fn world_state_pg_url(&self) -> String {
        self.pg.as_ref().unwrap().connection_url().await
    }
}
