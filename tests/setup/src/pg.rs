use testcontainers::{core::Mount, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

const PG_PORT: u16 = 5432;

pub struct PgContainer {
    node: ContainerAsync<Postgres>,
}

impl PgContainer {
    /// Launches docker container with PostgreSQL that is prepopulated
    /// with SQL scripts from migrations directory
    pub async fn run() -> anyhow::Result<PgContainer> {
        let container_cfg = Postgres::default().with_mount(Mount::bind_mount(ddl_path(), "/docker-entrypoint-initdb.d"));

        let node = container_cfg.start().await?;

        Ok(PgContainer { node })
    }

    pub async fn connection_url(&self) -> String {
        let host = self.node.get_host().await.unwrap();
        let port = self.node.get_host_port_ipv4(PG_PORT).await.unwrap();

        format!("postgres://postgres:postgres@{host}:{port}/postgres")
    }
}

/// Returns path to "migrations" folder
fn ddl_path() -> String {
    std::env::current_dir().unwrap() // integration tests dir
        .parent().unwrap() // workspace dir
        .join("migrations")
        .to_str().unwrap()
        .to_string()
}
