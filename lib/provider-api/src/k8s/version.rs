use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Kubernetes version offered by the vendor
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Version {
    /// Full version, e.g. `1.32.2`
    pub name: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub available_cnis: Vec<String>,

    #[serde(default)]
    pub available_container_runtimes: Vec<String>,

    #[serde(default)]
    pub available_feature_gates: Vec<String>,

    #[serde(default)]
    pub available_admission_plugins: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListVersionsResponse {
    pub versions: Vec<Version>,
}
