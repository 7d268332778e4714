//! Catalog tables and the objects that back them.
//!
//! Keys under the warehouse bucket:
//! - `<prefix>/<name>/<name>` single uploaded data file
//! - `<prefix>/<name>/part-<uuid>.<ext>` datasets written from Arrow batches

use std::path::Path;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capability::{ColumnDef, ObjectVersion, TableDescription, TableVersion};
use crate::dataset::{self, JsonCompression, TableSchema};
use crate::error::WarehouseError;
use crate::warehouse::Warehouse;

/// Page size for catalog version listing.
const VERSIONS_PAGE_SIZE: i32 = 100;

pub struct Table<'a> {
    warehouse: &'a Warehouse,
    name: String,
    prefix: String,
    catalog_prefix: Option<String>,
}

impl<'a> Table<'a> {
    /// `name` must already be normalized.
    pub(crate) fn new(warehouse: &'a Warehouse, name: String, prefix: &str) -> Self {
        Self {
            warehouse,
            name,
            prefix: prefix.trim_matches('/').to_string(),
            catalog_prefix: None,
        }
    }

    /// Catalog entries created by a crawler with a `table_prefix` are named
    /// `<table_prefix><name>`.
    pub fn with_catalog_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.catalog_prefix = Some(prefix.into()).filter(|p: &String| !p.is_empty());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the table in the catalog.
    pub fn catalog_name(&self) -> String {
        match &self.catalog_prefix {
            Some(p) => format!("{p}{}", self.name),
            None => self.name.clone(),
        }
    }

    /// `<prefix>/<name>/`: everything stored for this table. The trailing
    /// slash keeps `event` from matching keys of a sibling `events`.
    pub fn data_prefix(&self) -> String {
        format!("{}/", join_key(&[&self.prefix, &self.name]))
    }

    /// `<prefix>/<name>/<name>`: the single-file upload target.
    pub fn object_key(&self) -> String {
        join_key(&[&self.prefix, &self.name, &self.name])
    }

    pub async fn describe(&self) -> Result<TableDescription, WarehouseError> {
        let caps = self.warehouse.capabilities();
        let desc = caps
            .catalog
            .get_table(self.warehouse.name(), &self.catalog_name())
            .await?;
        debug!(table = %desc.name, columns = desc.columns.len(), "Describe table");
        Ok(desc)
    }

    pub async fn columns(&self) -> Result<Vec<ColumnDef>, WarehouseError> {
        Ok(self.describe().await?.columns)
    }

    /// Every catalog version of this table, newest first as returned by the
    /// catalog.
    pub async fn get_versions(&self) -> Result<Vec<TableVersion>, WarehouseError> {
        let caps = self.warehouse.capabilities();
        let table = self.catalog_name();
        let mut versions = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = caps
                .catalog
                .get_table_versions(
                    self.warehouse.name(),
                    &table,
                    VERSIONS_PAGE_SIZE,
                    token.as_deref(),
                )
                .await?;

            if page.versions.is_empty() {
                break;
            }
            versions.extend(page.versions);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(table = %table, versions = versions.len(), "Listed table versions");
        Ok(versions)
    }

    /// Upload a local file to [`Table::object_key`], optionally tagged.
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
        tags: &[(&str, &str)],
    ) -> Result<(), WarehouseError> {
        let path = path.as_ref();
        let key = self.object_key();
        info!(file = %path.display(), key = %key, "Uploading table file");

        let body = tokio::fs::read(path).await?;
        let tagging = encode_tags(tags);
        self.warehouse
            .capabilities()
            .objects
            .put_object(self.warehouse.name(), &key, Bytes::from(body), tagging.as_deref())
            .await?;
        Ok(())
    }

    /// Download the object at [`Table::object_key`] to a local file.
    pub async fn download(&self, path: impl AsRef<Path>) -> Result<(), WarehouseError> {
        let path = path.as_ref();
        let key = self.object_key();
        info!(key = %key, file = %path.display(), "Downloading table file");

        let body = self
            .warehouse
            .capabilities()
            .objects
            .get_object(self.warehouse.name(), &key)
            .await?;
        tokio::fs::write(path, &body).await?;
        Ok(())
    }

    /// Write `batch` as a Zstd Parquet part file. Returns the object key.
    pub async fn as_parquet(&self, batch: &RecordBatch) -> Result<String, WarehouseError> {
        let metadata = [
            ("cheapodb.table", self.name.clone()),
            ("cheapodb.created_at", chrono::Utc::now().to_rfc3339()),
        ];
        let buf = dataset::write_parquet_bytes(batch, &metadata)?;
        self.put_part("parquet", buf).await
    }

    /// Write `batch` as newline-delimited JSON. Returns the object key.
    pub async fn as_json(
        &self,
        batch: &RecordBatch,
        compression: JsonCompression,
    ) -> Result<String, WarehouseError> {
        let buf = dataset::write_json_bytes(batch, compression)?;
        self.put_part(compression.extension(), buf).await
    }

    /// Coerce JSON records to `schema` and write them as Parquet.
    pub async fn from_records(
        &self,
        records: &[Value],
        schema: &TableSchema,
    ) -> Result<String, WarehouseError> {
        let batch = dataset::records_to_batch(records, schema)?;
        self.as_parquet(&batch).await
    }

    async fn put_part(&self, extension: &str, buf: Vec<u8>) -> Result<String, WarehouseError> {
        let file = format!("part-{}.{extension}", uuid::Uuid::new_v4());
        let key = join_key(&[&self.prefix, &self.name, &file]);
        let size = buf.len();

        self.warehouse
            .capabilities()
            .objects
            .put_object(self.warehouse.name(), &key, Bytes::from(buf), None)
            .await?;

        info!(table = %self.name, key = %key, bytes = size, "Wrote dataset");
        Ok(key)
    }

    /// Remove the catalog entry, and with `include_data` every object
    /// version and delete marker under [`Table::data_prefix`] first.
    /// Missing data or a missing catalog entry is logged, not returned.
    pub async fn delete_table(&self, include_data: bool) -> Result<(), WarehouseError> {
        let caps = self.warehouse.capabilities();
        let bucket = self.warehouse.name();

        if include_data {
            let prefix = self.data_prefix();
            info!(bucket, prefix = %prefix, "Deleting table data");
            let versions = self.list_versions(&prefix).await?;

            if versions.is_empty() {
                warn!(bucket, prefix = %prefix, "Data does not exist");
            } else {
                let concurrency = self.warehouse.ingest_config().concurrency.max(1);
                let deleted = stream::iter(versions)
                    .map(|v| async move { delete_version(self.warehouse, v).await })
                    .buffer_unordered(concurrency)
                    .try_fold(0usize, |n, _| async move { Ok(n + 1) })
                    .await?;
                info!(bucket, prefix = %prefix, deleted, "Deleted table data");
            }
        }

        let table = self.catalog_name();
        info!(database = bucket, table = %table, "Deleting table");
        match caps.catalog.delete_table(bucket, &table).await {
            Ok(()) => info!(table = %table, "Deleted table"),
            Err(e) if e.is_not_found() => {
                warn!(database = bucket, table = %table, "Table does not exist")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn list_versions(&self, prefix: &str) -> Result<Vec<ObjectVersion>, WarehouseError> {
        let objects = &self.warehouse.capabilities().objects;
        let mut all = Vec::new();
        let mut marker = None;

        loop {
            let page = match objects
                .list_object_versions(self.warehouse.name(), prefix, marker.as_ref())
                .await
            {
                Ok(page) => page,
                Err(e) if e.is_not_found() => break,
                Err(e) => return Err(e.into()),
            };
            all.extend(page.versions);
            match page.next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(all)
    }
}

async fn delete_version(warehouse: &Warehouse, version: ObjectVersion) -> Result<(), WarehouseError> {
    match warehouse
        .capabilities()
        .objects
        .delete_object(warehouse.name(), &version.key, version.version_id.as_deref())
        .await
    {
        Ok(()) => {
            debug!(key = %version.key, version = ?version.version_id, "Deleted object version");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(key = %version.key, "Object version already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Join key segments with `/`, skipping empty ones.
fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `k1=v1&k2=v2`, URL-encoded. `None` when there are no tags.
fn encode_tags(tags: &[(&str, &str)]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    Some(
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(tags)
            .finish(),
    )
}
