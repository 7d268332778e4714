use async_trait::async_trait;
use tracing::debug;

use super::{missing_field, provider_error, AwsCapabilities};
use crate::capability::{Identity, ProviderError, RoleDefinition};

#[async_trait]
impl Identity for AwsCapabilities {
    async fn caller_account(&self) -> Result<String, ProviderError> {
        let resp = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| provider_error("sts", "GetCallerIdentity", e))?;

        resp.account()
            .map(str::to_string)
            .ok_or_else(|| missing_field("sts", "GetCallerIdentity", "Account"))
    }

    async fn create_role(&self, definition: &RoleDefinition) -> Result<String, ProviderError> {
        let resp = self
            .iam
            .create_role()
            .role_name(&definition.name)
            .path(&definition.path)
            .description(&definition.description)
            .assume_role_policy_document(&definition.trust_policy)
            .send()
            .await
            .map_err(|e| provider_error("iam", "CreateRole", e))?;

        let role = resp
            .role()
            .ok_or_else(|| missing_field("iam", "CreateRole", "Role"))?;
        debug!(role = %definition.name, arn = role.arn(), "Role created");
        Ok(role.arn().to_string())
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.iam
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| provider_error("iam", "AttachRolePolicy", e))?;
        Ok(())
    }

    async fn put_role_policy(
        &self,
        role: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<(), ProviderError> {
        self.iam
            .put_role_policy()
            .role_name(role)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| provider_error("iam", "PutRolePolicy", e))?;
        Ok(())
    }
}
