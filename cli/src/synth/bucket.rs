//! S3 bucket descriptors shared by the storage and pipeline stacks.
//!
//! Buckets that request automatic object deletion get a custom resource
//! that empties them before the provisioning engine deletes them; the
//! backing provider function is added once per template.

use serde_json::{json, Value};

use super::template::{fn_get_att, fn_join, fn_ref, RemovalPolicy, Resource, Template};
use crate::error::SynthError;

const PROVIDER_ROLE_ID: &str = "AutoDeleteObjectsProviderRole";
const PROVIDER_ID: &str = "AutoDeleteObjectsProvider";
const PROVIDER_CODE: &str = include_str!("../../assets/auto_delete_objects.js");

/// Bucket settings the stacks vary
#[derive(Debug, Clone)]
pub struct BucketSpec<'a> {
    pub name: &'a str,
    pub removal: RemovalPolicy,
    pub auto_delete_objects: bool,
    /// HTTP methods allowed cross-origin from any origin; empty disables CORS
    pub cors_methods: &'a [&'a str],
}

fn bucket_properties(spec: &BucketSpec<'_>) -> Value {
    let mut properties = json!({
        "BucketName": spec.name,
        "BucketEncryption": {
            "ServerSideEncryptionConfiguration": [
                { "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" } }
            ]
        },
        "PublicAccessBlockConfiguration": {
            "BlockPublicAcls": true,
            "BlockPublicPolicy": true,
            "IgnorePublicAcls": true,
            "RestrictPublicBuckets": true
        }
    });

    if !spec.cors_methods.is_empty() {
        properties["CorsConfiguration"] = json!({
            "CorsRules": [{
                "AllowedMethods": spec.cors_methods,
                "AllowedOrigins": ["*"],
                "AllowedHeaders": ["*"]
            }]
        });
    }

    if spec.auto_delete_objects {
        properties["Tags"] = json!([
            { "Key": "stagecraft:auto-delete-objects", "Value": "true" }
        ]);
    }

    properties
}

/// Add a bucket (and its auto-delete wiring when requested)
pub fn add_bucket(
    template: &mut Template,
    logical_id: &str,
    spec: &BucketSpec<'_>,
) -> Result<(), SynthError> {
    template.add_resource(
        logical_id,
        Resource::new("AWS::S3::Bucket", bucket_properties(spec)).with_removal_policy(spec.removal),
    )?;

    if spec.auto_delete_objects {
        ensure_provider(template)?;
        add_auto_delete(template, logical_id)?;
    }

    Ok(())
}

fn ensure_provider(template: &mut Template) -> Result<(), SynthError> {
    if template.resource(PROVIDER_ID).is_some() {
        return Ok(());
    }

    template.add_resource(
        PROVIDER_ROLE_ID,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }]
                },
                "ManagedPolicyArns": [
                    { "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole" }
                ]
            }),
        ),
    )?;

    template.add_resource(
        PROVIDER_ID,
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "Runtime": "nodejs22.x",
                "Handler": "index.handler",
                "Timeout": 900,
                "MemorySize": 128,
                "Role": fn_get_att(PROVIDER_ROLE_ID, "Arn"),
                "Code": { "ZipFile": PROVIDER_CODE },
                "Description": "Empties buckets before stack deletion"
            }),
        )
        .depends_on(PROVIDER_ROLE_ID),
    )
}

fn add_auto_delete(template: &mut Template, bucket_id: &str) -> Result<(), SynthError> {
    let policy_id = format!("{}Policy", bucket_id);
    let bucket_arn = fn_get_att(bucket_id, "Arn");

    template.add_resource(
        &policy_id,
        Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": fn_ref(bucket_id),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "AWS": fn_get_att(PROVIDER_ROLE_ID, "Arn") },
                        "Action": [
                            "s3:DeleteObject*",
                            "s3:GetBucket*",
                            "s3:List*",
                            "s3:PutBucketPolicy"
                        ],
                        "Resource": [
                            bucket_arn.clone(),
                            fn_join("", vec![bucket_arn, json!("/*")])
                        ]
                    }]
                }
            }),
        ),
    )?;

    template.add_resource(
        format!("{}AutoDeleteObjects", bucket_id),
        Resource::new(
            "Custom::S3AutoDeleteObjects",
            json!({
                "ServiceToken": fn_get_att(PROVIDER_ID, "Arn"),
                "BucketName": fn_ref(bucket_id)
            }),
        )
        .depends_on(policy_id)
        .with_removal_policy(RemovalPolicy::Destroy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, auto_delete: bool) -> BucketSpec<'_> {
        BucketSpec {
            name,
            removal: RemovalPolicy::Destroy,
            auto_delete_objects: auto_delete,
            cors_methods: &["GET", "HEAD"],
        }
    }

    #[test]
    fn test_private_bucket_properties() {
        let mut template = Template::new("TestStack", "test");
        add_bucket(&mut template, "AssetsBucket", &spec("beta-assets", false)).unwrap();

        let bucket = template.resource("AssetsBucket").unwrap();
        assert_eq!(bucket.property("BucketName").unwrap(), "beta-assets");
        assert_eq!(
            bucket.property("PublicAccessBlockConfiguration").unwrap()["BlockPublicPolicy"],
            true
        );
        assert_eq!(
            bucket.property("CorsConfiguration").unwrap()["CorsRules"][0]["AllowedMethods"],
            json!(["GET", "HEAD"])
        );
        assert!(template.resource(PROVIDER_ID).is_none());
    }

    #[test]
    fn test_auto_delete_shares_one_provider() {
        let mut template = Template::new("TestStack", "test");
        add_bucket(&mut template, "AssetsBucket", &spec("beta-assets", true)).unwrap();
        add_bucket(&mut template, "MediaBucket", &spec("beta-media", true)).unwrap();

        assert_eq!(template.resources_of_type("AWS::Lambda::Function").len(), 1);
        assert_eq!(template.resources_of_type("Custom::S3AutoDeleteObjects").len(), 2);
        assert_eq!(template.resources_of_type("AWS::S3::BucketPolicy").len(), 2);

        let custom = template.resource("MediaBucketAutoDeleteObjects").unwrap();
        assert_eq!(custom.depends_on, vec!["MediaBucketPolicy".to_string()]);
    }

    #[test]
    fn test_no_cors_when_methods_empty() {
        let mut template = Template::new("TestStack", "test");
        let spec = BucketSpec {
            name: "artifacts",
            removal: RemovalPolicy::Destroy,
            auto_delete_objects: false,
            cors_methods: &[],
        };
        add_bucket(&mut template, "ArtifactBucket", &spec).unwrap();
        assert!(template
            .resource("ArtifactBucket")
            .unwrap()
            .property("CorsConfiguration")
            .is_none());
    }
}
