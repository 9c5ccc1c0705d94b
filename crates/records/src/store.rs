use crate::error::{ErrorKind, Result};
use crate::export::{Exporter, PrettyJson};
use crate::{RecordId, id_to_rel_path};
use exn::{OptionExt, ResultExt};
use media_storage::BackendHandle;
use media_storage::backend::ReadOnlyBackend;
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::sync::Mutex;
use tracing::instrument;

/// Records in a storage container, modified one at a time.
///
/// Reading, modifying, exporting and writing a record is not idempotent, so
/// every [`update`](Self::update) on a store holds the same lock for the
/// whole sequence. Share one store (behind an [`Arc`]) between every task
/// that touches the same corpus.
pub struct RecordStore {
    backend: BackendHandle,
    exporter: Arc<dyn Exporter>,
    lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self {
            backend,
            exporter: Arc::new(PrettyJson),
            lock: Mutex::new(()),
        }
    }

    /// A store whose writes are logged and discarded.
    pub fn dry_run(backend: BackendHandle) -> Self {
        Self::new(Arc::new(ReadOnlyBackend::new(backend)))
    }

    pub fn with_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporter = Arc::new(exporter);
        self
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Read record `id`, apply `modify`, export it and write it back.
    ///
    /// Returns the record as modified. Nothing is written if `modify` fails.
    #[instrument(skip(self, modify))]
    pub async fn update<F>(&self, id: RecordId, modify: F) -> Result<Value>
    where
        F: FnOnce(&mut Value) -> Result<()> + Send,
    {
        let path = id_to_rel_path(id)?;
        let _guard = self.lock.lock().await;

        let bytes = self.backend.read(&path).await.or_raise(|| ErrorKind::Read(id))?;
        let mut record: Value = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Malformed {
            id,
            reason: "not a JSON document".to_string(),
        })?;
        modify(&mut record)?;
        let exported = self.exporter.export(id, &record)?;
        self.backend.write(&path, &exported).await.or_raise(|| ErrorKind::Write(id))?;

        tracing::info!(backend = self.backend.name(), path = %path.display(), "Updated record");
        Ok(record)
    }

    /// Mark record `id` as no longer current, as of `now`.
    pub async fn deprecate(&self, id: RecordId, now: OffsetDateTime) -> Result<Value> {
        self.update(id, |record| deprecate_record(id, record, now)).await
    }
}

/// Apply the deprecation changes to a record in memory.
///
/// Sets `edtf:deprecated` to the calendar date of `now`, `mz:is_current` to
/// zero and `wof:lastmodified` to `now` in unix seconds. Derived media
/// properties (`sizes`, `colours`) no longer describe anything and are
/// dropped.
pub fn deprecate_record(id: RecordId, record: &mut Value, now: OffsetDateTime) -> Result<()> {
    let date = now.format(format_description!("[year]-[month]-[day]")).or_raise(|| ErrorKind::Timestamp)?;
    let properties = record.get_mut("properties").and_then(Value::as_object_mut).ok_or_raise(|| {
        ErrorKind::Malformed {
            id,
            reason: "missing properties object".to_string(),
        }
    })?;

    properties.insert("edtf:deprecated".to_string(), Value::from(date));
    properties.insert("mz:is_current".to_string(), Value::from(0));
    properties.insert("wof:lastmodified".to_string(), Value::from(now.unix_timestamp()));
    if let Some(media) = properties.get_mut("media:properties").and_then(Value::as_object_mut) {
        media.remove("sizes");
        media.remove("colours");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::try_join_all;
    use media_storage::backend::{MockBackend, StorageBackend};
    use serde_json::json;
    use std::path::Path;
    use time::macros::datetime;

    const KEY: &str = "123/456/7/1234567.geojson";

    fn record() -> Value {
        json!({
            "type": "Feature",
            "id": 1234567,
            "properties": {
                "wof:id": 1234567,
                "mz:is_current": 1,
                "media:properties": {
                    "sizes": {"o": {"width": 10, "height": 10}},
                    "colours": ["#ffffff"],
                    "fingerprint": "abc",
                },
            },
        })
    }

    fn store_with(value: &Value) -> (Arc<MockBackend>, RecordStore) {
        let backend = Arc::new(MockBackend::with_files([(KEY, serde_json::to_vec(value).unwrap())]));
        let store = RecordStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn test_deprecate_record_fields() {
        let now = datetime!(2024-03-05 12:30:00 UTC);
        let mut value = record();
        deprecate_record(1234567, &mut value, now).unwrap();

        let properties = &value["properties"];
        assert_eq!(properties["edtf:deprecated"], "2024-03-05");
        assert_eq!(properties["mz:is_current"], 0);
        assert_eq!(properties["wof:lastmodified"], now.unix_timestamp());
        assert_eq!(properties["media:properties"], json!({"fingerprint": "abc"}));
    }

    #[test]
    fn test_deprecate_record_without_properties() {
        let mut value = json!({"type": "Feature"});
        let err = deprecate_record(7, &mut value, OffsetDateTime::UNIX_EPOCH).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed { id: 7, .. }));
    }

    #[tokio::test]
    async fn test_deprecate_writes_back() {
        let (backend, store) = store_with(&record());
        let now = datetime!(2019-06-01 00:00:00 UTC);
        store.deprecate(1234567, now).await.unwrap();

        let written: Value = serde_json::from_slice(&backend.read(Path::new(KEY)).await.unwrap()).unwrap();
        assert_eq!(written["properties"]["edtf:deprecated"], "2019-06-01");
        assert_eq!(written["properties"]["mz:is_current"], 0);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let (_backend, store) = store_with(&record());
        let err = store.deprecate(42, OffsetDateTime::UNIX_EPOCH).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Read(42));
    }

    #[tokio::test]
    async fn test_failed_modification_writes_nothing() {
        let (backend, store) = store_with(&record());
        let before = backend.read(Path::new(KEY)).await.unwrap();
        let result = store
            .update(1234567, |value| {
                value["properties"]["touched"] = json!(true);
                exn::bail!(ErrorKind::Timestamp)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(backend.read(Path::new(KEY)).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_malformed_record() {
        let backend = Arc::new(MockBackend::with_files([(KEY, "not json")]));
        let store = RecordStore::new(backend);
        let err = store.deprecate(1234567, OffsetDateTime::UNIX_EPOCH).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed { id: 1234567, .. }));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_record_untouched() {
        let backend = Arc::new(MockBackend::with_files([(KEY, serde_json::to_vec(&record()).unwrap())]));
        let before = backend.read(Path::new(KEY)).await.unwrap();
        let store = RecordStore::dry_run(backend.clone());

        let updated = store.deprecate(1234567, OffsetDateTime::UNIX_EPOCH).await.unwrap();
        assert_eq!(updated["properties"]["mz:is_current"], 0);
        assert_eq!(backend.read(Path::new(KEY)).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_custom_exporter() {
        struct Compact;
        impl Exporter for Compact {
            fn export(&self, id: RecordId, record: &Value) -> Result<Vec<u8>> {
                serde_json::to_vec(record).or_raise(|| ErrorKind::Export(id))
            }
        }

        let (backend, store) = store_with(&json!({"properties": {}}));
        let store = store.with_exporter(Compact);
        store.update(1234567, |_| Ok(())).await.unwrap();
        assert_eq!(backend.read(Path::new(KEY)).await.unwrap(), br#"{"properties":{}}"#);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_serialized() {
        let (backend, store) = store_with(&json!({"properties": {"count": 0}}));
        let store = Arc::new(store);

        let tasks = (0..32).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update(1234567, |value| {
                        let count = value["properties"]["count"].as_i64().unwrap_or_default();
                        value["properties"]["count"] = json!(count + 1);
                        Ok(())
                    })
                    .await
                    .map(|_| ())
            })
        });
        for outcome in try_join_all(tasks).await.unwrap() {
            outcome.unwrap();
        }

        let written: Value = serde_json::from_slice(&backend.read(Path::new(KEY)).await.unwrap()).unwrap();
        assert_eq!(written["properties"]["count"], 32);
    }
}
