use std::collections::BTreeMap;

use async_trait::async_trait;
use fetchsync_core::{Error, KeyRef, KeyedStore, Result, SinkKind};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use metrics::counter;
use serde_json::{json, Value as Json};
use tracing::debug;

/// ConfigMaps and Secrets as a [`KeyedStore`].
///
/// Writes are supported for both kinds. `HttpRequest` sinks are always
/// ConfigMaps, Secret writes keep the store usable for any `KeyRef`.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self { Self { client } }

    fn config_maps(&self, ns: &str) -> Api<ConfigMap> { Api::namespaced(self.client.clone(), ns) }

    fn secrets(&self, ns: &str) -> Api<Secret> { Api::namespaced(self.client.clone(), ns) }

    async fn contains(&self, at: &KeyRef) -> Result<bool> {
        Ok(self.get(at).await.map_err(|e| Error::store_write(at, e))?.is_some())
    }

    async fn patch_key(&self, at: &KeyRef, patch: &Json) -> std::result::Result<(), kube::Error> {
        let pp = PatchParams::default();
        match at.kind {
            SinkKind::ConfigMap => self.config_maps(&at.namespace).patch(&at.name, &pp, &Patch::Merge(patch)).await.map(|_| ()),
            SinkKind::Secret => self.secrets(&at.namespace).patch(&at.name, &pp, &Patch::Merge(patch)).await.map(|_| ()),
        }
    }

    async fn create_with(&self, at: &KeyRef, value: &str) -> std::result::Result<(), kube::Error> {
        let pp = PostParams::default();
        match at.kind {
            SinkKind::ConfigMap => self.config_maps(&at.namespace).create(&pp, &new_config_map(at, value)).await.map(|_| ()),
            SinkKind::Secret => self.secrets(&at.namespace).create(&pp, &new_secret(at, value)).await.map(|_| ()),
        }
    }

    async fn exists(&self, at: &KeyRef) -> std::result::Result<bool, kube::Error> {
        Ok(match at.kind {
            SinkKind::ConfigMap => self.config_maps(&at.namespace).get_opt(&at.name).await?.is_some(),
            SinkKind::Secret => self.secrets(&at.namespace).get_opt(&at.name).await?.is_some(),
        })
    }
}

#[async_trait]
impl KeyedStore for KubeStore {
    async fn get(&self, at: &KeyRef) -> Result<Option<String>> {
        let value = match at.kind {
            SinkKind::ConfigMap => self
                .config_maps(&at.namespace)
                .get_opt(&at.name)
                .await
                .map_err(|e| Error::lookup(at, e))?
                .and_then(|cm| config_map_value(&cm, &at.key)),
            SinkKind::Secret => self
                .secrets(&at.namespace)
                .get_opt(&at.name)
                .await
                .map_err(|e| Error::lookup(at, e))?
                .and_then(|s| secret_value(&s, &at.key)),
        };
        debug!(target_ref = %at, found = value.is_some(), "kube store: get");
        Ok(value)
    }

    async fn set(&self, at: &KeyRef, value: &str) -> Result<()> {
        let exists = self.exists(at).await.map_err(|e| Error::store_write(at, e))?;
        let res = if exists {
            self.patch_key(at, &set_patch(at.kind, &at.key, value)).await
        } else {
            match self.create_with(at, value).await {
                // Lost a creation race; the object is there now.
                Err(kube::Error::Api(ae)) if ae.code == 409 => self.patch_key(at, &set_patch(at.kind, &at.key, value)).await,
                other => other,
            }
        };
        res.map_err(|e| Error::store_write(at, e))?;
        counter!("store_write_total", 1, "op" => "set");
        debug!(target_ref = %at, bytes = value.len(), created = !exists, "kube store: set");
        Ok(())
    }

    async fn delete(&self, at: &KeyRef) -> Result<()> {
        if !self.contains(at).await? {
            debug!(target_ref = %at, "kube store: delete of absent entry");
            return Ok(());
        }
        match self.patch_key(at, &delete_patch(&at.key)).await {
            Ok(()) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(e) => return Err(Error::store_write(at, e)),
        }
        counter!("store_write_total", 1, "op" => "delete");
        debug!(target_ref = %at, "kube store: delete");
        Ok(())
    }
}

fn config_map_value(cm: &ConfigMap, key: &str) -> Option<String> {
    cm.data.as_ref().and_then(|d| d.get(key)).cloned()
}

fn secret_value(s: &Secret, key: &str) -> Option<String> {
    if let Some(b) = s.data.as_ref().and_then(|d| d.get(key)) {
        return Some(String::from_utf8_lossy(&b.0).into_owned());
    }
    s.string_data.as_ref().and_then(|d| d.get(key)).cloned()
}

fn object_meta(at: &KeyRef) -> ObjectMeta {
    ObjectMeta { name: Some(at.name.clone()), namespace: Some(at.namespace.clone()), ..Default::default() }
}

fn new_config_map(at: &KeyRef, value: &str) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(at),
        data: Some(BTreeMap::from([(at.key.clone(), value.to_string())])),
        ..Default::default()
    }
}

fn new_secret(at: &KeyRef, value: &str) -> Secret {
    Secret {
        metadata: object_meta(at),
        data: Some(BTreeMap::from([(at.key.clone(), ByteString(value.as_bytes().to_vec()))])),
        ..Default::default()
    }
}

/// Merge patch touching a single key. Secret values go through `ByteString`
/// so they land base64-encoded in `data`.
fn set_patch(kind: SinkKind, key: &str, value: &str) -> Json {
    match kind {
        SinkKind::ConfigMap => json!({ "data": { key: value } }),
        SinkKind::Secret => json!({ "data": { key: ByteString(value.as_bytes().to_vec()) } }),
    }
}

fn delete_patch(key: &str) -> Json {
    json!({ "data": { key: Json::Null } })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(kind: SinkKind) -> KeyRef {
        KeyRef { kind, name: "cm1".into(), namespace: "ns".into(), key: "data".into() }
    }

    #[test]
    fn config_map_lookup_by_key() {
        let cm = new_config_map(&at(SinkKind::ConfigMap), "hello");
        assert_eq!(config_map_value(&cm, "data").as_deref(), Some("hello"));
        assert_eq!(config_map_value(&cm, "other"), None);
        assert_eq!(config_map_value(&ConfigMap::default(), "data"), None);
        assert_eq!(cm.metadata.namespace.as_deref(), Some("ns"));
    }

    #[test]
    fn secret_prefers_data_over_string_data() {
        let mut s = new_secret(&at(SinkKind::Secret), "from-data");
        assert_eq!(secret_value(&s, "data").as_deref(), Some("from-data"));

        s.data = None;
        s.string_data = Some(BTreeMap::from([("data".to_string(), "from-string-data".to_string())]));
        assert_eq!(secret_value(&s, "data").as_deref(), Some("from-string-data"));
    }

    #[test]
    fn secret_writes_read_back_as_text() {
        let sink = at(SinkKind::Secret);
        let created = new_secret(&sink, "tok\u{e9}n");
        assert_eq!(secret_value(&created, "data").as_deref(), Some("tok\u{e9}n"));

        // Creating and patching encode the value identically.
        let patch = set_patch(SinkKind::Secret, "data", "tok\u{e9}n");
        assert_eq!(patch["data"], serde_json::to_value(&created.data).unwrap());
    }

    #[test]
    fn patches_touch_only_one_key() {
        assert_eq!(set_patch(SinkKind::ConfigMap, "data", "v"), json!({"data": {"data": "v"}}));
        // "v" base64-encoded
        assert_eq!(set_patch(SinkKind::Secret, "data", "v"), json!({"data": {"data": "dg=="}}));
        assert_eq!(delete_patch("data"), json!({"data": {"data": null}}));
    }
}
