//! Storage stack - users table and asset/media buckets

use anyhow::Result;
use serde_json::json;

use super::bucket::{add_bucket, BucketSpec};
use super::template::{fn_get_att, fn_ref, ExportedValue, RemovalPolicy, Resource, Template};
use super::{StackOutputs, SynthContext};

/// Values the storage stack publishes to its consumers
#[derive(Debug, Clone)]
pub struct StorageOutputs {
    pub users_table_name: ExportedValue,
    pub users_table_arn: ExportedValue,
    pub assets_bucket_name: ExportedValue,
    pub media_bucket_name: ExportedValue,
}

impl StackOutputs for StorageOutputs {
    fn exports(&self) -> Vec<&ExportedValue> {
        vec![
            &self.users_table_name,
            &self.users_table_arn,
            &self.assets_bucket_name,
            &self.media_bucket_name,
        ]
    }
}

pub fn build(ctx: &SynthContext<'_>) -> Result<(Template, StorageOutputs)> {
    let names = &ctx.names;
    let removal = RemovalPolicy::for_stage(ctx.stage);
    let mut template = Template::new(
        &names.storage_stack,
        format!(
            "Storage resources for {} ({})",
            ctx.config.project.name,
            ctx.stage.label()
        ),
    );

    template.add_resource(
        "UsersTable",
        Resource::new(
            "AWS::DynamoDB::Table",
            json!({
                "TableName": names.users_table,
                "AttributeDefinitions": [
                    { "AttributeName": "id", "AttributeType": "S" },
                    { "AttributeName": "createdAt", "AttributeType": "N" },
                    { "AttributeName": "email", "AttributeType": "S" }
                ],
                "KeySchema": [
                    { "AttributeName": "id", "KeyType": "HASH" },
                    { "AttributeName": "createdAt", "KeyType": "RANGE" }
                ],
                "BillingMode": "PAY_PER_REQUEST",
                "StreamSpecification": { "StreamViewType": "NEW_AND_OLD_IMAGES" },
                "PointInTimeRecoverySpecification": { "PointInTimeRecoveryEnabled": true },
                "GlobalSecondaryIndexes": [{
                    "IndexName": "EmailIndex",
                    "KeySchema": [{ "AttributeName": "email", "KeyType": "HASH" }],
                    "Projection": { "ProjectionType": "ALL" }
                }]
            }),
        )
        .with_removal_policy(removal),
    )?;

    // Beta buckets are emptied on teardown; production keeps its objects
    let auto_delete_objects = !ctx.stage.is_production();

    add_bucket(
        &mut template,
        "AssetsBucket",
        &BucketSpec {
            name: &names.assets_bucket,
            removal,
            auto_delete_objects,
            cors_methods: &["GET", "HEAD"],
        },
    )?;

    add_bucket(
        &mut template,
        "MediaBucket",
        &BucketSpec {
            name: &names.media_bucket,
            removal,
            auto_delete_objects,
            cors_methods: &["GET", "PUT", "POST"],
        },
    )?;

    let outputs = StorageOutputs {
        users_table_name: template.add_export(
            "UsersTableName",
            fn_ref("UsersTable"),
            names.export("UsersTableName"),
        )?,
        users_table_arn: template.add_export(
            "UsersTableArn",
            fn_get_att("UsersTable", "Arn"),
            names.export("UsersTableArn"),
        )?,
        assets_bucket_name: template.add_export(
            "AssetsBucketName",
            fn_ref("AssetsBucket"),
            names.export("AssetsBucketName"),
        )?,
        media_bucket_name: template.add_export(
            "MediaBucketName",
            fn_ref("MediaBucket"),
            names.export("MediaBucketName"),
        )?,
    };

    Ok((template, outputs))
}
