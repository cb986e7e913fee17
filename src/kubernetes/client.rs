// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use kube::api::{DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::{FetchError, ResourceFetcher, ResourceRecord, WorkloadKind};
use crate::cli::ConnectionArgs;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Cluster, user and context name of the kubeconfig built from command line options
const EXPLICIT_CONTEXT: &str = "kube-workload-check";

/// Lists CronJobs and Jobs across all namespaces
pub struct KubeFetcher {
    client: Client,
    /// Version of the `batch` API group to query
    api_version: String,
}

impl KubeFetcher {
    /// Build a client from the connection options
    ///
    /// Resolution order:
    /// 1. `--in-cluster`: service account token and CA
    /// 2. `--api-server`: kubeconfig assembled from the credential options
    /// 3. `--context`: named context from the local kubeconfig
    /// 4. Inferred configuration (KUBECONFIG, ~/.kube/config, in-cluster env)
    pub async fn connect(args: &ConnectionArgs) -> Result<Self, FetchError> {
        let mut config = Self::load_config(args).await?;

        // Set timeouts for reliability
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        debug!(
            cluster_url = %config.cluster_url,
            api_version = %args.api_version,
            "Connecting to Kubernetes API"
        );

        let client = Client::try_from(config)
            .map_err(|e| FetchError::Client(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            api_version: args.api_version.clone(),
        })
    }

    async fn load_config(args: &ConnectionArgs) -> Result<Config, FetchError> {
        if args.in_cluster {
            debug!("Using in-cluster service account");
            return Config::incluster().map_err(|e| {
                FetchError::Client(format!("Failed to load in-cluster configuration: {}", e))
            });
        }

        if let Some(server) = &args.api_server {
            let kubeconfig = explicit_kubeconfig(server, args)?;
            return Config::from_custom_kubeconfig(
                kubeconfig,
                &KubeConfigOptions {
                    context: Some(EXPLICIT_CONTEXT.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| FetchError::Client(format!("Invalid connection options: {}", e)));
        }

        if args.has_credentials() {
            warn!("Credential options are ignored without --api-server");
        }

        match &args.context {
            Some(context) => {
                let kubeconfig = Kubeconfig::read()
                    .map_err(|e| FetchError::Client(format!("Failed to read kubeconfig: {}", e)))?;
                Config::from_custom_kubeconfig(
                    kubeconfig,
                    &KubeConfigOptions {
                        context: Some(context.clone()),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| {
                    FetchError::Client(format!(
                        "Failed to load kubeconfig for context '{}': {}",
                        context, e
                    ))
                })
            }
            None => Config::infer().await.map_err(|e| {
                FetchError::Client(format!("Failed to infer Kubernetes configuration: {}", e))
            }),
        }
    }

    /// List every item of `kind`, following continue tokens until the last page
    async fn list(
        &self,
        kind: WorkloadKind,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceRecord>, FetchError> {
        let ar = kind.api_resource(&self.api_version);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        let base_params = build_list_params(label_selector);

        debug!(
            kind = %ar.kind,
            api_version = %ar.api_version,
            label_selector = ?label_selector,
            "Fetching workloads"
        );

        let mut items: Vec<Value> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = base_params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = api.list(&params).await?;
            page_count += 1;

            for item in list.items {
                let index = items.len();
                let value = serde_json::to_value(item).map_err(|e| FetchError::InvalidRecord {
                    kind: kind.plural(),
                    index,
                    reason: e.to_string(),
                })?;
                items.push(value);
            }

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        kind = %ar.kind,
                        page = page_count,
                        total_so_far = items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        debug!(
            kind = %ar.kind,
            pages = page_count,
            total_items = items.len(),
            "Listing complete"
        );

        kind.parse_items(items)
    }
}

#[async_trait]
impl ResourceFetcher for KubeFetcher {
    async fn fetch_scheduled_resources(
        &self,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceRecord>, FetchError> {
        self.list(WorkloadKind::CronJob, label_selector).await
    }

    async fn fetch_completion_resources(
        &self,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceRecord>, FetchError> {
        self.list(WorkloadKind::Job, label_selector).await
    }
}

/// Build ListParams from the label selector
fn build_list_params(label_selector: Option<&str>) -> ListParams {
    let mut params = ListParams::default();

    if let Some(selector) = label_selector {
        params = params.labels(selector);
    }

    trace!(label_selector = ?label_selector, "Built ListParams");

    params
}

/// Assemble a single-context kubeconfig from the command line credentials
///
/// Only options that were given are written, so kube applies its own
/// defaults for the rest (token files, client certificate loading).
fn explicit_kubeconfig(server: &str, args: &ConnectionArgs) -> Result<Kubeconfig, FetchError> {
    let mut cluster = Map::new();
    cluster.insert("server".to_string(), json!(server));
    insert_path(&mut cluster, "certificate-authority", args.ca_file.as_deref());

    let mut user = Map::new();
    insert_path(&mut user, "client-certificate", args.cert.as_deref());
    insert_path(&mut user, "client-key", args.key.as_deref());
    insert_string(&mut user, "username", args.user.as_deref());
    insert_string(&mut user, "password", args.password.as_deref());
    insert_string(&mut user, "token", args.token.as_deref());
    insert_path(&mut user, "tokenFile", args.token_file.as_deref());

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{"name": EXPLICIT_CONTEXT, "cluster": cluster}],
        "users": [{"name": EXPLICIT_CONTEXT, "user": user}],
        "contexts": [{
            "name": EXPLICIT_CONTEXT,
            "context": {"cluster": EXPLICIT_CONTEXT, "user": EXPLICIT_CONTEXT}
        }],
        "current-context": EXPLICIT_CONTEXT,
    });

    serde_json::from_value(document)
        .map_err(|e| FetchError::Client(format!("Invalid connection options: {}", e)))
}

fn insert_string(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}

fn insert_path(map: &mut Map<String, Value>, key: &str, value: Option<&Path>) {
    if let Some(path) = value {
        map.insert(key.to_string(), json!(path.to_string_lossy()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn connection() -> ConnectionArgs {
        ConnectionArgs {
            api_version: "v1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_explicit_kubeconfig_with_token() {
        let args = ConnectionArgs {
            token: Some("s3cr3t".to_string()),
            ca_file: Some(PathBuf::from("/etc/ssl/cluster-ca.pem")),
            ..connection()
        };

        let kubeconfig = explicit_kubeconfig("https://10.0.0.1:6443", &args).unwrap();
        assert_eq!(kubeconfig.current_context.as_deref(), Some(EXPLICIT_CONTEXT));

        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some("https://10.0.0.1:6443"));
        assert_eq!(
            cluster.certificate_authority.as_deref(),
            Some("/etc/ssl/cluster-ca.pem")
        );

        let user = kubeconfig.auth_infos[0].auth_info.as_ref().unwrap();
        assert!(user.token.is_some());
        assert!(user.username.is_none());
        assert!(user.client_certificate.is_none());
    }

    #[test]
    fn test_explicit_kubeconfig_with_client_certificate() {
        let args = ConnectionArgs {
            cert: Some(PathBuf::from("/etc/check/client.crt")),
            key: Some(PathBuf::from("/etc/check/client.key")),
            token_file: Some(PathBuf::from("/var/run/token")),
            ..connection()
        };

        let kubeconfig = explicit_kubeconfig("https://k8s.example.com", &args).unwrap();
        let user = kubeconfig.auth_infos[0].auth_info.as_ref().unwrap();
        assert_eq!(user.client_certificate.as_deref(), Some("/etc/check/client.crt"));
        assert_eq!(user.client_key.as_deref(), Some("/etc/check/client.key"));
        assert_eq!(user.token_file.as_deref(), Some("/var/run/token"));
        assert!(user.token.is_none());
    }

    #[test]
    fn test_explicit_kubeconfig_with_basic_auth() {
        let args = ConnectionArgs {
            user: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
            ..connection()
        };

        let kubeconfig = explicit_kubeconfig("https://k8s.example.com", &args).unwrap();
        let user = kubeconfig.auth_infos[0].auth_info.as_ref().unwrap();
        assert_eq!(user.username.as_deref(), Some("admin"));
        assert!(user.password.is_some());
    }

    #[test]
    fn test_build_list_params() {
        let params = build_list_params(Some("app=backup,tier=batch"));
        assert_eq!(params.label_selector.as_deref(), Some("app=backup,tier=batch"));

        let params = build_list_params(None);
        assert!(params.label_selector.is_none());
    }
}
