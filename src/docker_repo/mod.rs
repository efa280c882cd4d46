// Container stats and runtime info via bollard.

mod stats;

use crate::host_repo::HostRepo;
use crate::models::{ContainerCounts, ContainerStat, SystemInfo, now_millis};
use bollard::container::{ListContainersOptions, StatsOptions};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures_util::StreamExt;
use futures_util::future::join_all;
use std::collections::HashMap;
use tracing::warn;

#[derive(Clone)]
pub struct DockerRepo {
    docker: Docker,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker })
    }

    /// Client for a daemon reachable over TCP. Unlike the unix connect, no
    /// socket path has to exist at construction time; the address is only
    /// dialed on first use.
    pub fn connect_http(addr: &str) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_http(addr, 30, API_DEFAULT_VERSION)?;
        Ok(Self { docker })
    }

    /// Raw client handle for the event stream and exec backends.
    pub fn client(&self) -> Docker {
        self.docker.clone()
    }

    /// One fresh stats sample per running container. Failures are logged and
    /// degrade to an empty list (or a skipped container), never an error.
    pub async fn sample_containers(&self) -> Vec<ContainerStat> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);
        let options = ListContainersOptions {
            all: false,
            filters,
            ..Default::default()
        };

        let containers = match self.docker.list_containers(Some(options)).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, operation = "list_containers", "Docker list_containers failed");
                return Vec::new();
            }
        };

        let timestamp = now_millis();
        let samples = containers.iter().map(|c| {
            let id = c.id.clone().unwrap_or_default();
            let name = c
                .names
                .as_ref()
                .and_then(|n| n.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| id.clone());
            self.sample_one(id, name, timestamp)
        });
        join_all(samples).await.into_iter().flatten().collect()
    }

    async fn sample_one(&self, id: String, name: String, timestamp: u64) -> Option<ContainerStat> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(&id, Some(options));
        match stream.next().await {
            Some(Ok(s)) => Some(stats::build_stat(&s, &id, &name, timestamp)),
            Some(Err(e)) => {
                warn!(error = %e, container = %name, operation = "stats", "stats sample failed");
                None
            }
            None => None,
        }
    }

    /// Runtime counts and versions combined with the host CPU/memory samples.
    pub async fn system_info(&self, host: &HostRepo) -> anyhow::Result<SystemInfo> {
        let info = self.docker.info().await?;
        let version = self.docker.version().await?;
        let host_usage = host.sample().await;
        Ok(SystemInfo {
            containers: ContainerCounts {
                total: info.containers.unwrap_or(0),
                running: info.containers_running.unwrap_or(0),
                paused: info.containers_paused.unwrap_or(0),
                stopped: info.containers_stopped.unwrap_or(0),
            },
            images: info.images.unwrap_or(0),
            version: version.version.unwrap_or_default(),
            architecture: info.architecture.unwrap_or_default(),
            os: info.operating_system.unwrap_or_default(),
            kernel_version: info.kernel_version.unwrap_or_default(),
            host: host_usage,
        })
    }
}
