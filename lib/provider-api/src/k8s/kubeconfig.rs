use serde::Deserialize;

/// The parts of a cluster's admin kubeconfig the provider exposes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Kubeconfig {
    /// The raw YAML document
    pub config_file: String,
    pub host: String,
    pub cluster_ca_certificate: String,
    pub token: String,
}

#[derive(Deserialize)]
struct RawKubeconfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Deserialize)]
struct NamedCluster {
    cluster: ClusterEntry,
}

#[derive(Deserialize)]
struct ClusterEntry {
    #[serde(default)]
    server: String,
    #[serde(default, rename = "certificate-authority-data")]
    certificate_authority_data: String,
}

#[derive(Deserialize)]
struct NamedUser {
    user: UserEntry,
}

#[derive(Deserialize)]
struct UserEntry {
    #[serde(default)]
    token: String,
}

impl Kubeconfig {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let raw: RawKubeconfig = serde_yaml::from_str(yaml)?;
        let cluster = raw.clusters.into_iter().next().map(|c| c.cluster);
        let user = raw.users.into_iter().next().map(|u| u.user);
        Ok(Kubeconfig {
            config_file: yaml.to_string(),
            host: cluster.as_ref().map(|c| c.server.clone()).unwrap_or_default(),
            cluster_ca_certificate: cluster.map(|c| c.certificate_authority_data).unwrap_or_default(),
            token: user.map(|u| u.token).unwrap_or_default(),
        })
    }
}
