use std::time::Duration;

use crate::{Result, TestInfraError};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const CONNECT_ATTEMPTS: usize = 20;
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, TypedBuilder)]
pub struct MySqlConfig {
    #[builder(default = "shortbin".to_string(), setter(into))]
    database: String,
    #[builder(default = "shortbin".to_string(), setter(into))]
    username: String,
    #[builder(default = "shortbin".to_string(), setter(into))]
    password: String,
    /// DDL statements run, in order, once the server accepts connections.
    #[builder(default)]
    schema: Vec<&'static str>,
}

/// A disposable MySQL server with the schema already applied.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MySqlConfig,
    pool: MySqlPool,
}

impl MySqlServer {
    pub async fn start(config: MySqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", "8.4")
            .with_exposed_port(3306_u16.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(3306).await?;
        let url = format!(
            "mysql://{}:{}@{}:{}/{}",
            config.username, config.password, host, port, config.database
        );

        let pool = connect_with_retry(&url).await?;
        for statement in &config.schema {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self {
            container,
            config,
            pool,
        })
    }

    pub async fn database_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(3306).await?;
        Ok(format!(
            "mysql://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

/// The server logs "ready" once during init and once for real, so the first
/// connections can still be refused.
async fn connect_with_retry(url: &str) -> Result<MySqlPool> {
    let mut last_error = None;
    for _ in 0..CONNECT_ATTEMPTS {
        match MySqlPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                last_error = Some(e);
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
        }
    }
    Err(last_error.map_or(TestInfraError::NotReady, TestInfraError::Database))
}
