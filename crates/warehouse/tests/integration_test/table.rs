use serde_json::json;

use cheapo_warehouse::capability::{ObjectVersion, TableVersion, TableVersionPage};
use cheapo_warehouse::dataset::{records_to_batch, JsonCompression, TableSchema};

use crate::fake::{open_lake, table_description, FakeCloud};

fn version(key: &str, id: &str, delete_marker: bool) -> ObjectVersion {
    ObjectVersion {
        key: key.to_string(),
        version_id: Some(id.to_string()),
        is_delete_marker: delete_marker,
    }
}

fn table_version(id: &str) -> TableVersion {
    TableVersion {
        version_id: Some(id.to_string()),
        table: None,
    }
}

#[tokio::test]
async fn test_blank_table_name_is_rejected() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;

    assert!(wh.table("  ", "raw").is_err());

    let table = wh.table("  events ", "/raw/").unwrap();
    assert_eq!(table.name(), "events");
    assert_eq!(table.prefix(), "raw");
    assert_eq!(table.object_key(), "raw/events/events");
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;
    let table = wh.table("events", "raw").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("events.csv");
    std::fs::write(&source, "id,kind\n1,click\n").unwrap();

    table
        .upload(&source, &[("team", "data eng"), ("tier", "gold")])
        .await
        .unwrap();

    fake.with(|s| {
        let (body, tagging) = &s.objects["lake/raw/events/events"];
        assert_eq!(body.as_ref(), b"id,kind\n1,click\n");
        assert_eq!(tagging.as_deref(), Some("team=data+eng&tier=gold"));
    });

    let target = dir.path().join("copy.csv");
    table.download(&target).await.unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "id,kind\n1,click\n");
}

#[tokio::test]
async fn test_upload_without_tags_sends_no_tagging() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("data.json");
    std::fs::write(&source, "{}").unwrap();

    wh.table("events", "").unwrap().upload(&source, &[]).await.unwrap();

    fake.with(|s| {
        let (_, tagging) = &s.objects["lake/events/events"];
        assert_eq!(tagging, &None);
    });
}

#[tokio::test]
async fn test_download_missing_object_fails() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;
    let dir = tempfile::tempdir().unwrap();

    let result = wh
        .table("events", "raw")
        .unwrap()
        .download(dir.path().join("out"))
        .await;
    assert!(result.is_err());
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_describe_and_columns() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.tables.insert(
            "events".into(),
            table_description("events", &[("id", "bigint"), ("kind", "string")]),
        )
    });
    let wh = open_lake(&fake).await;
    let table = wh.table("events", "raw").unwrap();

    let desc = table.describe().await.unwrap();
    assert_eq!(desc.location.as_deref(), Some("s3://lake/raw/events/"));

    let columns = table.columns().await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "kind"]);
    assert_eq!(columns[0].data_type.as_deref(), Some("bigint"));
}

#[tokio::test]
async fn test_catalog_prefix_applies_to_catalog_calls() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.tables
            .insert("raw_events".into(), table_description("raw_events", &[("id", "int")]))
    });
    let wh = open_lake(&fake).await;
    let table = wh.table("events", "raw").unwrap().with_catalog_prefix("raw_");

    assert_eq!(table.catalog_name(), "raw_events");
    assert_eq!(table.object_key(), "raw/events/events");
    assert_eq!(table.describe().await.unwrap().name, "raw_events");

    table.delete_table(false).await.unwrap();
    fake.with(|s| assert_eq!(s.deleted_tables, vec!["raw_events".to_string()]));
}

#[tokio::test]
async fn test_get_versions_follows_tokens() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.version_pages.insert(
            None,
            TableVersionPage {
                versions: vec![table_version("3"), table_version("2")],
                next_token: Some("t1".into()),
            },
        );
        s.version_pages.insert(
            Some("t1".into()),
            TableVersionPage {
                versions: vec![table_version("1")],
                next_token: Some("t2".into()),
            },
        );
        // "t2" has no page registered: the catalog returns an empty page.
    });
    let wh = open_lake(&fake).await;

    let versions = wh.table("events", "raw").unwrap().get_versions().await.unwrap();

    let ids: Vec<&str> = versions
        .iter()
        .filter_map(|v| v.version_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["3", "2", "1"]);
    fake.with(|s| {
        assert_eq!(
            s.version_tokens_seen,
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    });
}

#[tokio::test]
async fn test_get_versions_stops_without_token() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.version_pages.insert(
            None,
            TableVersionPage {
                versions: vec![table_version("1")],
                next_token: None,
            },
        )
    });
    let wh = open_lake(&fake).await;

    let versions = wh.table("events", "raw").unwrap().get_versions().await.unwrap();
    assert_eq!(versions.len(), 1);
    fake.with(|s| assert_eq!(s.version_tokens_seen.len(), 1));
}

#[tokio::test]
async fn test_delete_table_with_data_removes_every_version() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.tables
            .insert("events".into(), table_description("events", &[("id", "int")]));
        s.listed_versions = vec![
            version("raw/events/events", "v1", false),
            version("raw/events/part-a.parquet", "v2", false),
            version("raw/events/part-b.parquet", "v3", true),
            version("raw/events/part-c.parquet", "v4", false),
            version("raw/events/part-d.parquet", "v5", false),
            version("raw/other/other", "v6", false),
        ];
    });
    let wh = open_lake(&fake).await;

    wh.table("events", "raw").unwrap().delete_table(true).await.unwrap();

    fake.with(|s| {
        let mut deleted: Vec<(String, Option<String>)> = s.deleted_objects.clone();
        deleted.sort();
        let expected: Vec<(String, Option<String>)> = [
            ("raw/events/events", "v1"),
            ("raw/events/part-a.parquet", "v2"),
            ("raw/events/part-b.parquet", "v3"),
            ("raw/events/part-c.parquet", "v4"),
            ("raw/events/part-d.parquet", "v5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect();
        assert_eq!(deleted, expected);
        assert_eq!(s.deleted_tables, vec!["events".to_string()]);
    });
}

#[tokio::test]
async fn test_delete_table_leaves_sibling_table_data() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.tables
            .insert("event".into(), table_description("event", &[("id", "int")]));
        s.listed_versions = vec![
            version("raw/event/event", "v1", false),
            version("raw/events/events", "v2", false),
            version("raw/event/part-a.parquet", "v3", true),
        ];
    });
    let wh = open_lake(&fake).await;
    let table = wh.table("event", "raw").unwrap();
    assert_eq!(table.data_prefix(), "raw/event/");

    table.delete_table(true).await.unwrap();

    fake.with(|s| {
        let mut deleted: Vec<&str> = s.deleted_objects.iter().map(|(k, _)| k.as_str()).collect();
        deleted.sort_unstable();
        assert_eq!(deleted, vec!["raw/event/event", "raw/event/part-a.parquet"]);
    });
}

#[tokio::test]
async fn test_delete_table_tolerates_missing_data_and_table() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;

    wh.table("ghost", "raw").unwrap().delete_table(true).await.unwrap();

    fake.with(|s| {
        assert!(s.deleted_objects.is_empty());
        assert!(s.deleted_tables.is_empty());
    });
}

#[tokio::test]
async fn test_delete_table_without_data_keeps_objects() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.tables
            .insert("events".into(), table_description("events", &[("id", "int")]));
        s.listed_versions = vec![version("raw/events/events", "v1", false)];
    });
    let wh = open_lake(&fake).await;

    wh.table("events", "raw").unwrap().delete_table(false).await.unwrap();

    fake.with(|s| {
        assert!(s.deleted_objects.is_empty());
        assert_eq!(s.deleted_tables, vec!["events".to_string()]);
    });
}

#[tokio::test]
async fn test_from_records_writes_parquet_part() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;
    let schema = TableSchema::new().column("id", "bigint").column("kind", "string");
    let records = vec![
        json!({"id": 1, "kind": "click"}),
        json!({"id": "2", "kind": "view"}),
    ];

    let key = wh
        .table("events", "raw")
        .unwrap()
        .from_records(&records, &schema)
        .await
        .unwrap();

    assert!(key.starts_with("raw/events/part-"), "{key}");
    assert!(key.ends_with(".parquet"), "{key}");
    fake.with(|s| {
        let (body, _) = &s.objects[&format!("lake/{key}")];
        assert_eq!(&body[..4], b"PAR1");
    });
}

#[tokio::test]
async fn test_as_json_with_zstd() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;
    let schema = TableSchema::new().column("id", "bigint");
    let batch = records_to_batch(&[json!({"id": 7})], &schema).unwrap();

    let key = wh
        .table("events", "raw")
        .unwrap()
        .as_json(&batch, JsonCompression::Zstd)
        .await
        .unwrap();

    assert!(key.ends_with(".json.zst"), "{key}");
    fake.with(|s| {
        let (body, _) = &s.objects[&format!("lake/{key}")];
        let text = String::from_utf8(zstd::decode_all(body.as_ref()).unwrap()).unwrap();
        assert_eq!(text.trim_end(), r#"{"id":7}"#);
    });
}

#[tokio::test]
async fn test_each_part_gets_a_unique_key() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;
    let schema = TableSchema::new().column("id", "bigint");
    let table = wh.table("events", "raw").unwrap();
    let batch = records_to_batch(&[json!({"id": 1})], &schema).unwrap();

    let a = table.as_json(&batch, JsonCompression::None).await.unwrap();
    let b = table.as_json(&batch, JsonCompression::None).await.unwrap();

    assert_ne!(a, b);
    assert!(a.ends_with(".json"));
    fake.with(|s| assert_eq!(s.objects.len(), 2));
}
