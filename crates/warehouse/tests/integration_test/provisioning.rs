use serde_json::Value;

use cheapo_warehouse::{create_warehouse, Warehouse, WarehouseError, WarehouseOptions};

use crate::fake::{lake_options, FakeCloud, ACCOUNT, ROLE_ARN};

#[tokio::test]
async fn test_missing_role_without_auto_create_is_rejected() {
    let fake = FakeCloud::new();
    let result = Warehouse::open(fake.capabilities(), WarehouseOptions::new("lake")).await;

    assert!(matches!(result, Err(WarehouseError::Configuration(_))));
    fake.with(|s| {
        assert_eq!(s.identity_calls, 0);
        assert!(s.buckets.is_empty());
    });
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let fake = FakeCloud::new();
    let result = Warehouse::open(
        fake.capabilities(),
        WarehouseOptions::new("   ").iam_role_arn(ROLE_ARN),
    )
    .await;
    assert!(matches!(result, Err(WarehouseError::Configuration(_))));
}

#[tokio::test]
async fn test_explicit_role_is_used_as_is() {
    let fake = FakeCloud::new();
    let wh = Warehouse::open(fake.capabilities(), lake_options().create_iam_role(true))
        .await
        .unwrap();

    assert_eq!(wh.role_arn(), ROLE_ARN);
    assert_eq!(wh.results_location(), "s3://lake/results/");
    assert_eq!(wh.bucket_arn(), "arn:aws:s3:::lake");
    fake.with(|s| {
        assert_eq!(s.identity_calls, 0, "no role should be created");
        assert!(s.buckets.is_empty(), "open must not create the bucket");
        assert!(s.databases.is_empty());
    });
}

#[tokio::test]
async fn test_create_warehouse_with_new_role() {
    let fake = FakeCloud::new();
    let options = WarehouseOptions::new("lake")
        .description("analytics sandbox")
        .create_iam_role(true)
        .region("eu-west-1");

    let wh = create_warehouse(fake.capabilities(), options).await.unwrap();

    assert_eq!(
        wh.role_arn(),
        format!("arn:aws:iam::{ACCOUNT}:role/service-role/lake-CheapoDBExecutionRole")
    );

    fake.with(|s| {
        assert_eq!(s.roles.len(), 1);
        let role = &s.roles[0];
        assert_eq!(role.name, "lake-CheapoDBExecutionRole");
        assert_eq!(role.path, "/service-role/");
        let trust: Value = serde_json::from_str(&role.trust_policy).unwrap();
        assert_eq!(
            trust["Statement"][1]["Condition"]["StringEquals"]["sts:ExternalId"],
            ACCOUNT
        );

        assert_eq!(
            s.attached_policies,
            vec![(
                "lake-CheapoDBExecutionRole".to_string(),
                "arn:aws:iam::aws:policy/service-role/AWSGlueServiceRole".to_string()
            )]
        );

        let (role_name, policy_name, document) = &s.inline_policies[0];
        assert_eq!(role_name, "lake-CheapoDBExecutionRole");
        assert_eq!(policy_name, "CheapoDBRolePolicy");
        let policy: Value = serde_json::from_str(document).unwrap();
        assert_eq!(
            policy["Statement"][1]["Resource"][0],
            format!("arn:aws:firehose:eu-west-1:{ACCOUNT}:deliverystream/*")
        );

        assert_eq!(s.buckets, vec![("lake".to_string(), "eu-west-1".to_string())]);
        assert_eq!(
            s.databases,
            vec![("lake".to_string(), Some("analytics sandbox".to_string()))]
        );
    });
}

#[tokio::test]
async fn test_existing_role_is_not_reused() {
    let fake = FakeCloud::new();
    fake.with(|s| s.role_exists = true);

    let result = Warehouse::open(
        fake.capabilities(),
        WarehouseOptions::new("lake").create_iam_role(true),
    )
    .await;

    match result {
        Err(WarehouseError::RoleAlreadyExists { warehouse, role_name }) => {
            assert_eq!(warehouse, "lake");
            assert_eq!(role_name, "lake-CheapoDBExecutionRole");
        }
        Err(other) => panic!("expected RoleAlreadyExists, got {other}"),
        Ok(_) => panic!("expected RoleAlreadyExists, got a warehouse"),
    }
    fake.with(|s| {
        assert!(s.attached_policies.is_empty());
        assert!(s.buckets.is_empty());
    });
}

#[tokio::test]
async fn test_open_then_create() {
    let fake = FakeCloud::new();
    let wh = Warehouse::open(fake.capabilities(), lake_options()).await.unwrap();
    fake.with(|s| assert!(s.buckets.is_empty()));

    wh.create().await.unwrap();
    fake.with(|s| {
        assert_eq!(s.buckets.len(), 1);
        assert_eq!(s.databases, vec![("lake".to_string(), None)]);
    });
}
