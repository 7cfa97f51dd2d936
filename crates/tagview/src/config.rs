use std::net::SocketAddr;

use serde::Deserialize;

use tagview_core::RepositoryDefinition;
use tagview_pullstats::PullStatisticsConfig;

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 13030))
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub static_repositories: Vec<RepositoryDefinition>,
    #[serde(default)]
    pub pull_statistics: PullStatisticsConfig,
}
