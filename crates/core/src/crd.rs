//! Custom resources served by the controller.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value::{KeyRef, SinkKind};

/// Selects one key of a ConfigMap or Secret in an arbitrary namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ValueSelector {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

/// A query parameter or header whose value may come from a ConfigMap, a
/// Secret or an inline literal, optionally wrapped by a `%s` template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamedValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ValueSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ValueSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "fmt", skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestParams {
    /// Absolute base url; declared params are appended to its query string.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<NamedValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<NamedValue>,
    /// ConfigMap key the response body is written to.
    pub write_response_to_config_map: ValueSelector,
}

impl HttpRequestParams {
    pub const DEFAULT_METHOD: &'static str = "GET";

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or(Self::DEFAULT_METHOD)
    }

    pub fn sink(&self) -> KeyRef {
        KeyRef::config_map(&self.write_response_to_config_map)
    }

    pub fn observation(&self) -> HttpRequestObservation {
        let sink = self.sink();
        HttpRequestObservation {
            target: Some(sink.kind.as_str().to_string()),
            name: Some(sink.name),
            namespace: Some(sink.namespace),
            key: Some(sink.key),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ProviderConfigReference {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fetchsync.io",
    version = "v1alpha1",
    kind = "HttpRequest",
    status = "HttpRequestStatus",
    category = "fetchsync",
    category = "http",
    printcolumn = r#"{"name":"TARGET","type":"string","jsonPath":".status.atProvider.target"}"#,
    printcolumn = r#"{"name":"NAME","type":"string","jsonPath":".status.atProvider.name"}"#,
    printcolumn = r#"{"name":"NAMESPACE","type":"string","jsonPath":".status.atProvider.namespace"}"#,
    printcolumn = r#"{"name":"KEY","type":"string","jsonPath":".status.atProvider.key"}"#,
    printcolumn = r#"{"name":"READY","type":"string","priority":1,"jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","priority":1,"jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestSpec {
    pub for_provider: HttpRequestParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<ProviderConfigReference>,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Mirrors the sink target once content is in sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct HttpRequestObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    /// "True", "False" or "Unknown".
    pub status: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub at_provider: HttpRequestObservation,
}

/// Transport settings referenced by `HttpRequest.spec.providerConfigRef`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[kube(group = "fetchsync.io", version = "v1alpha1", kind = "ProviderConfig", category = "fetchsync")]
pub struct ProviderConfigSpec {
    /// Log request and response summaries at info level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    /// Skip TLS certificate verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

impl HttpRequest {
    /// Name of the referenced ProviderConfig, if any.
    pub fn provider_config_name(&self) -> Option<&str> {
        self.spec.provider_config_ref.as_ref().map(|r| r.name.as_str())
    }

    pub fn sink_kind(&self) -> SinkKind { self.spec.for_provider.sink().kind }
}
