use async_trait::async_trait;
use aws_sdk_glue::types as glue;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{invalid_request, missing_field, provider_error, AwsCapabilities};
use crate::capability::{
    Catalog, ColumnDef, CrawlerDefinition, CrawlerState, CrawlerStatus, Crawlers, LastCrawl,
    ProviderError, TableDescription, TableVersion, TableVersionPage,
};

const SERVICE: &str = "glue";

fn to_utc(dt: &aws_sdk_glue::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn describe_table(table: &glue::Table) -> TableDescription {
    let sd = table.storage_descriptor();
    TableDescription {
        name: table.name().to_string(),
        database: table.database_name().map(str::to_string),
        location: sd.and_then(|s| s.location()).map(str::to_string),
        table_type: table.table_type().map(str::to_string),
        columns: sd
            .map(|s| {
                s.columns()
                    .iter()
                    .map(|c| ColumnDef {
                        name: c.name().to_string(),
                        data_type: c.r#type().map(str::to_string),
                        comment: c.comment().map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        update_time: table.update_time().and_then(to_utc),
    }
}

#[async_trait]
impl Catalog for AwsCapabilities {
    async fn create_database(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), ProviderError> {
        let input = glue::DatabaseInput::builder()
            .name(name)
            .set_description(description.map(str::to_string))
            .build()
            .map_err(|e| invalid_request(SERVICE, "CreateDatabase", e))?;

        self.glue
            .create_database()
            .database_input(input)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "CreateDatabase", e))?;
        Ok(())
    }

    async fn get_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<TableDescription, ProviderError> {
        let resp = self
            .glue
            .get_table()
            .database_name(database)
            .name(table)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "GetTable", e))?;

        resp.table()
            .map(describe_table)
            .ok_or_else(|| missing_field(SERVICE, "GetTable", "Table"))
    }

    async fn get_table_versions(
        &self,
        database: &str,
        table: &str,
        max_results: i32,
        next_token: Option<&str>,
    ) -> Result<TableVersionPage, ProviderError> {
        let resp = self
            .glue
            .get_table_versions()
            .database_name(database)
            .table_name(table)
            .max_results(max_results)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "GetTableVersions", e))?;

        let versions = resp
            .table_versions()
            .iter()
            .map(|v| TableVersion {
                version_id: v.version_id().map(str::to_string),
                table: v.table().map(describe_table),
            })
            .collect();

        Ok(TableVersionPage {
            versions,
            next_token: resp.next_token().map(str::to_string),
        })
    }

    async fn delete_table(&self, database: &str, table: &str) -> Result<(), ProviderError> {
        self.glue
            .delete_table()
            .database_name(database)
            .name(table)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "DeleteTable", e))?;
        Ok(())
    }
}

#[async_trait]
impl Crawlers for AwsCapabilities {
    async fn create_crawler(&self, definition: &CrawlerDefinition) -> Result<(), ProviderError> {
        let targets = glue::CrawlerTargets::builder()
            .s3_targets(
                glue::S3Target::builder()
                    .path(&definition.s3_target_path)
                    .build(),
            )
            .build();

        let policy = glue::SchemaChangePolicy::builder()
            .update_behavior(glue::UpdateBehavior::from(
                definition.update_behavior.as_str(),
            ))
            .delete_behavior(glue::DeleteBehavior::from(
                definition.delete_behavior.as_str(),
            ))
            .build();

        self.glue
            .create_crawler()
            .name(&definition.name)
            .role(&definition.role)
            .database_name(&definition.database)
            .description(&definition.description)
            .targets(targets)
            .set_table_prefix(definition.table_prefix.clone())
            .set_schedule(definition.schedule.clone())
            .schema_change_policy(policy)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "CreateCrawler", e))?;

        debug!(crawler = %definition.name, path = %definition.s3_target_path, "Crawler created");
        Ok(())
    }

    async fn get_crawler(&self, name: &str) -> Result<CrawlerStatus, ProviderError> {
        let resp = self
            .glue
            .get_crawler()
            .name(name)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "GetCrawler", e))?;

        let crawler = resp
            .crawler()
            .ok_or_else(|| missing_field(SERVICE, "GetCrawler", "Crawler"))?;

        Ok(CrawlerStatus {
            name: crawler.name().unwrap_or(name).to_string(),
            state: crawler
                .state()
                .map(|s| CrawlerState::from_provider(s.as_str()))
                .unwrap_or(CrawlerState::Ready),
            elapsed_ms: crawler.crawl_elapsed_time(),
            last_crawl: crawler.last_crawl().map(|lc| LastCrawl {
                status: lc
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                error_message: lc.error_message().map(str::to_string),
            }),
        })
    }

    async fn start_crawler(&self, name: &str) -> Result<(), ProviderError> {
        self.glue
            .start_crawler()
            .name(name)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "StartCrawler", e))?;
        Ok(())
    }
}
