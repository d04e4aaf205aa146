//! API stack - GraphQL API with a Lambda resolver
//!
//! Consumes the storage and auth outputs directly: the user pool id feeds
//! the API's default authorizer and the table name/ARN feed the resolver
//! function's environment and grants.

use anyhow::Result;
use serde_json::{json, Value};

use super::auth::AuthOutputs;
use super::storage::StorageOutputs;
use super::template::{fn_get_att, fn_join, fn_ref, ExportedValue, Resource, Template};
use super::{StackOutputs, SynthContext};

const HELLO_CODE: &str = include_str!("../../assets/hello.js");

const TABLE_ACTIONS: &[&str] = &[
    "dynamodb:GetItem",
    "dynamodb:PutItem",
    "dynamodb:Query",
    "dynamodb:Scan",
];

/// Values the API stack publishes to its consumers
#[derive(Debug, Clone)]
pub struct ApiOutputs {
    pub graphql_url: ExportedValue,
    pub api_id: ExportedValue,
    pub api_key: ExportedValue,
}

impl StackOutputs for ApiOutputs {
    fn exports(&self) -> Vec<&ExportedValue> {
        vec![&self.graphql_url, &self.api_id, &self.api_key]
    }
}

fn assume_role(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
}

pub fn build(
    ctx: &SynthContext<'_>,
    storage: &StorageOutputs,
    auth: &AuthOutputs,
) -> Result<(Template, ApiOutputs)> {
    let names = &ctx.names;
    let api_config = &ctx.config.api;
    let mut template = Template::new(
        &names.api_stack,
        format!(
            "API resources for {} ({})",
            ctx.config.project.name,
            ctx.stage.label()
        ),
    );

    template.add_resource(
        "Api",
        Resource::new(
            "AWS::AppSync::GraphQLApi",
            json!({
                "Name": names.graphql_api,
                "AuthenticationType": "AMAZON_COGNITO_USER_POOLS",
                "UserPoolConfig": {
                    "UserPoolId": auth.user_pool_id.import(),
                    "AwsRegion": { "Ref": "AWS::Region" },
                    "DefaultAction": "ALLOW"
                },
                "AdditionalAuthenticationProviders": [
                    { "AuthenticationType": "API_KEY" }
                ],
                "XrayEnabled": api_config.xray_enabled
            }),
        ),
    )?;

    template.add_resource(
        "ApiSchema",
        Resource::new(
            "AWS::AppSync::GraphQLSchema",
            json!({
                "ApiId": fn_get_att("Api", "ApiId"),
                "Definition": api_config.schema_definition()?
            }),
        ),
    )?;

    let expires = ctx.now + chrono::Duration::from_std(api_config.api_key_expiry()?)?;
    template.add_resource(
        "ApiDefaultApiKey",
        Resource::new(
            "AWS::AppSync::ApiKey",
            json!({
                "ApiId": fn_get_att("Api", "ApiId"),
                "Expires": expires.timestamp()
            }),
        )
        .depends_on("ApiSchema"),
    )?;

    template.add_resource(
        "HelloFunctionServiceRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role("lambda.amazonaws.com"),
                "ManagedPolicyArns": [
                    { "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole" }
                ]
            }),
        ),
    )?;

    template.add_resource(
        "HelloFunctionServiceRoleDefaultPolicy",
        Resource::new(
            "AWS::IAM::Policy",
            json!({
                "PolicyName": "HelloFunctionServiceRoleDefaultPolicy",
                "Roles": [fn_ref("HelloFunctionServiceRole")],
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": TABLE_ACTIONS,
                        "Resource": storage.users_table_arn.import()
                    }]
                }
            }),
        ),
    )?;

    let timeout = api_config.function_timeout()?;
    template.add_resource(
        "HelloFunction",
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "FunctionName": names.hello_function,
                "Runtime": api_config.runtime,
                "Handler": "index.handler",
                "Code": { "ZipFile": HELLO_CODE },
                "Role": fn_get_att("HelloFunctionServiceRole", "Arn"),
                "Environment": {
                    "Variables": {
                        "STAGE": ctx.stage.prefix(),
                        "USERS_TABLE_NAME": storage.users_table_name.import()
                    }
                },
                "Timeout": timeout.as_secs(),
                "MemorySize": api_config.memory_mb
            }),
        )
        .depends_on("HelloFunctionServiceRoleDefaultPolicy")
        .depends_on("HelloFunctionServiceRole"),
    )?;

    template.add_resource(
        "HelloDataSourceServiceRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({ "AssumeRolePolicyDocument": assume_role("appsync.amazonaws.com") }),
        ),
    )?;

    template.add_resource(
        "HelloDataSourceServiceRoleDefaultPolicy",
        Resource::new(
            "AWS::IAM::Policy",
            json!({
                "PolicyName": "HelloDataSourceServiceRoleDefaultPolicy",
                "Roles": [fn_ref("HelloDataSourceServiceRole")],
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "lambda:InvokeFunction",
                        "Resource": [
                            fn_get_att("HelloFunction", "Arn"),
                            fn_join("", vec![fn_get_att("HelloFunction", "Arn"), json!(":*")])
                        ]
                    }]
                }
            }),
        ),
    )?;

    template.add_resource(
        "HelloDataSource",
        Resource::new(
            "AWS::AppSync::DataSource",
            json!({
                "ApiId": fn_get_att("Api", "ApiId"),
                "Name": "HelloDataSource",
                "Type": "AWS_LAMBDA",
                "LambdaConfig": { "LambdaFunctionArn": fn_get_att("HelloFunction", "Arn") },
                "ServiceRoleArn": fn_get_att("HelloDataSourceServiceRole", "Arn")
            }),
        ),
    )?;

    template.add_resource(
        "HelloResolver",
        Resource::new(
            "AWS::AppSync::Resolver",
            json!({
                "ApiId": fn_get_att("Api", "ApiId"),
                "TypeName": "Query",
                "FieldName": "hello",
                "DataSourceName": fn_get_att("HelloDataSource", "Name"),
                "Kind": "UNIT"
            }),
        )
        .depends_on("ApiSchema")
        .depends_on("HelloDataSource"),
    )?;

    let outputs = ApiOutputs {
        graphql_url: template.add_export(
            "GraphQLApiUrl",
            fn_get_att("Api", "GraphQLUrl"),
            names.export("GraphQLApiUrl"),
        )?,
        api_id: template.add_export(
            "GraphQLApiId",
            fn_get_att("Api", "ApiId"),
            names.export("GraphQLApiId"),
        )?,
        api_key: template.add_export(
            "GraphQLApiKey",
            fn_get_att("ApiDefaultApiKey", "ApiKey"),
            names.export("GraphQLApiKey"),
        )?,
    };

    Ok((template, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagecraftConfig;
    use crate::domain::Stage;
    use crate::synth::tests::context;
    use crate::synth::{auth, storage};

    fn build_for(stage: Stage, config: &StagecraftConfig) -> (Template, ApiOutputs) {
        let ctx = context(stage, config);
        let (_, storage_outputs) = storage::build(&ctx).unwrap();
        let (_, auth_outputs) = auth::build(&ctx).unwrap();
        build(&ctx, &storage_outputs, &auth_outputs).unwrap()
    }

    #[test]
    fn test_api_imports_injected_outputs() {
        let config = StagecraftConfig::default();
        let (template, outputs) = build_for(Stage::Beta, &config);

        let api = template.resource("Api").unwrap();
        assert_eq!(api.property("Name").unwrap(), "betaMyProjectAPI");
        assert_eq!(
            api.property("UserPoolConfig").unwrap()["UserPoolId"],
            json!({ "Fn::ImportValue": "betaUserPoolId" })
        );

        let policy = template
            .resource("HelloFunctionServiceRoleDefaultPolicy")
            .unwrap();
        assert_eq!(
            policy.property("PolicyDocument").unwrap()["Statement"][0]["Resource"],
            json!({ "Fn::ImportValue": "betaUsersTableArn" })
        );

        assert_eq!(outputs.graphql_url.export_name, "betaGraphQLApiUrl");
        assert_eq!(outputs.api_key.export_name, "betaGraphQLApiKey");
    }

    #[test]
    fn test_function_environment_and_limits() {
        let config = StagecraftConfig::default();
        let (template, _) = build_for(Stage::Production, &config);

        let function = template.resource("HelloFunction").unwrap();
        assert_eq!(function.property("FunctionName").unwrap(), "MyProject-Hello");
        assert_eq!(function.property("Runtime").unwrap(), "nodejs22.x");
        assert_eq!(function.property("Timeout").unwrap(), 30);
        assert_eq!(function.property("MemorySize").unwrap(), 512);

        let env = &function.property("Environment").unwrap()["Variables"];
        assert_eq!(env["STAGE"], "");
        assert_eq!(env["USERS_TABLE_NAME"], json!({ "Fn::ImportValue": "UsersTableName" }));
    }

    #[test]
    fn test_api_key_expiry_from_clock() {
        let config = StagecraftConfig::default();
        let ctx = context(Stage::Beta, &config);
        let (_, storage_outputs) = storage::build(&ctx).unwrap();
        let (_, auth_outputs) = auth::build(&ctx).unwrap();
        let (template, _) = build(&ctx, &storage_outputs, &auth_outputs).unwrap();

        let key = template.resource("ApiDefaultApiKey").unwrap();
        let expected = ctx.now.timestamp() + 365 * 24 * 3600;
        assert_eq!(key.property("Expires").unwrap(), expected);
    }

    #[test]
    fn test_resolver_wiring() {
        let config = StagecraftConfig::default();
        let (template, _) = build_for(Stage::Beta, &config);

        let resolver = template.resource("HelloResolver").unwrap();
        assert_eq!(resolver.property("TypeName").unwrap(), "Query");
        assert_eq!(resolver.property("FieldName").unwrap(), "hello");
        assert!(template
            .resource("ApiSchema")
            .unwrap()
            .property("Definition")
            .unwrap()
            .as_str()
            .unwrap()
            .contains("type Query"));
    }

    #[test]
    fn test_data_source_may_invoke_function_versions() {
        let config = StagecraftConfig::default();
        let (template, _) = build_for(Stage::Beta, &config);

        let policy = template
            .resource("HelloDataSourceServiceRoleDefaultPolicy")
            .unwrap()
            .property("PolicyDocument")
            .unwrap();
        assert_eq!(
            policy["Statement"][0]["Resource"][1],
            json!({ "Fn::Join": ["", [{ "Fn::GetAtt": ["HelloFunction", "Arn"] }, ":*"]] })
        );
    }
}
