//! Execution role for crawlers and delivery streams.
//!
//! The role is created once per warehouse and never silently reused: if it
//! exists already the caller must pass its ARN explicitly.

use chrono::Local;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::capability::{Capabilities, RoleDefinition};
use crate::error::WarehouseError;

pub const ROLE_PATH: &str = "/service-role/";
pub const GLUE_SERVICE_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSGlueServiceRole";
pub const INLINE_POLICY_NAME: &str = "CheapoDBRolePolicy";

/// `<warehouse>-CheapoDBExecutionRole`
pub fn role_name(warehouse: &str) -> String {
    format!("{warehouse}-CheapoDBExecutionRole")
}

/// Trust policy letting Glue assume the role, and Firehose assume it on
/// behalf of `account` only.
pub fn trust_policy(account: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "",
                "Effect": "Allow",
                "Principal": { "Service": "glue.amazonaws.com" },
                "Action": "sts:AssumeRole"
            },
            {
                "Sid": "",
                "Effect": "Allow",
                "Principal": { "Service": "firehose.amazonaws.com" },
                "Action": "sts:AssumeRole",
                "Condition": {
                    "StringEquals": { "sts:ExternalId": account }
                }
            }
        ]
    })
}

/// Inline policy scoped to the warehouse bucket and to delivery streams in
/// the warehouse's region and account.
pub fn access_policy(bucket: &str, region: &str, account: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [
                    "s3:GetObject",
                    "s3:PutObject",
                    "s3:AbortMultipartUpload",
                    "s3:GetBucketLocation",
                    "s3:ListBucket",
                    "s3:ListBucketMultipartUploads"
                ],
                "Resource": [
                    format!("arn:aws:s3:::{bucket}"),
                    format!("arn:aws:s3:::{bucket}/*")
                ]
            },
            {
                "Effect": "Allow",
                "Action": [
                    "firehose:CreateDeliveryStream",
                    "firehose:DeleteDeliveryStream",
                    "firehose:PutRecord",
                    "firehose:PutRecordBatch",
                    "firehose:UpdateDestination"
                ],
                "Resource": [
                    format!("arn:aws:firehose:{region}:{account}:deliverystream/*")
                ]
            }
        ]
    })
}

/// Create the warehouse execution role and return its ARN.
///
/// Steps: resolve the caller's account, create the role with the trust
/// policy, attach the managed Glue service policy, then put the inline
/// access policy. An existing role is reported as
/// [`WarehouseError::RoleAlreadyExists`].
pub async fn create_execution_role(
    caps: &Capabilities,
    warehouse: &str,
    region: &str,
) -> Result<String, WarehouseError> {
    let account = caps.identity.caller_account().await?;
    let name = role_name(warehouse);
    info!(role = %name, bucket = warehouse, account = %account, "Creating execution role");

    let definition = RoleDefinition {
        name: name.clone(),
        path: ROLE_PATH.to_string(),
        description: format!(
            "IAM role created by CheapoDB on {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
        trust_policy: serde_json::to_string(&trust_policy(&account))?,
    };

    let arn = match caps.identity.create_role(&definition).await {
        Ok(arn) => arn,
        Err(e) if e.is_already_exists() => {
            return Err(WarehouseError::RoleAlreadyExists {
                warehouse: warehouse.to_string(),
                role_name: name,
            });
        }
        Err(e) => return Err(e.into()),
    };

    caps.identity
        .attach_role_policy(&name, GLUE_SERVICE_POLICY_ARN)
        .await?;
    debug!(role = %name, policy = GLUE_SERVICE_POLICY_ARN, "Attached managed policy");

    let document = serde_json::to_string(&access_policy(warehouse, region, &account))?;
    caps.identity
        .put_role_policy(&name, INLINE_POLICY_NAME, &document)
        .await?;
    debug!(role = %name, policy = INLINE_POLICY_NAME, "Put inline policy");

    info!(role = %name, arn = %arn, "Execution role ready");
    Ok(arn)
}
