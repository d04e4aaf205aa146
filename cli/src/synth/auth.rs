//! Auth stack - user pool, web client and identity pool

use anyhow::Result;
use serde_json::json;

use super::template::{fn_get_att, fn_ref, ExportedValue, RemovalPolicy, Resource, Template};
use super::{StackOutputs, SynthContext};

/// Values the auth stack publishes to its consumers
#[derive(Debug, Clone)]
pub struct AuthOutputs {
    pub user_pool_id: ExportedValue,
    pub user_pool_arn: ExportedValue,
    pub user_pool_client_id: ExportedValue,
    pub identity_pool_id: ExportedValue,
}

impl StackOutputs for AuthOutputs {
    fn exports(&self) -> Vec<&ExportedValue> {
        vec![
            &self.user_pool_id,
            &self.user_pool_arn,
            &self.user_pool_client_id,
            &self.identity_pool_id,
        ]
    }
}

pub fn build(ctx: &SynthContext<'_>) -> Result<(Template, AuthOutputs)> {
    let names = &ctx.names;
    let mut template = Template::new(
        &names.auth_stack,
        format!(
            "Authentication resources for {} ({})",
            ctx.config.project.name,
            ctx.stage.label()
        ),
    );

    template.add_resource(
        "UserPool",
        Resource::new(
            "AWS::Cognito::UserPool",
            json!({
                "UserPoolName": names.user_pool,
                "AdminCreateUserConfig": { "AllowAdminCreateUserOnly": false },
                "AliasAttributes": ["email"],
                "AutoVerifiedAttributes": ["email"],
                "Schema": [
                    { "Name": "email", "Required": true, "Mutable": true },
                    { "Name": "given_name", "Required": false, "Mutable": true },
                    { "Name": "family_name", "Required": false, "Mutable": true }
                ],
                "Policies": {
                    "PasswordPolicy": {
                        "MinimumLength": 8,
                        "RequireLowercase": true,
                        "RequireUppercase": true,
                        "RequireNumbers": true,
                        "RequireSymbols": true
                    }
                },
                "AccountRecoverySetting": {
                    "RecoveryMechanisms": [{ "Name": "verified_email", "Priority": 1 }]
                },
                "VerificationMessageTemplate": { "DefaultEmailOption": "CONFIRM_WITH_CODE" }
            }),
        )
        .with_removal_policy(RemovalPolicy::for_stage(ctx.stage)),
    )?;

    template.add_resource(
        "UserPoolWebClient",
        Resource::new(
            "AWS::Cognito::UserPoolClient",
            json!({
                "ClientName": names.user_pool_client,
                "UserPoolId": fn_ref("UserPool"),
                "ExplicitAuthFlows": [
                    "ALLOW_USER_PASSWORD_AUTH",
                    "ALLOW_USER_SRP_AUTH",
                    "ALLOW_REFRESH_TOKEN_AUTH"
                ],
                "AllowedOAuthFlows": ["code"],
                "AllowedOAuthFlowsUserPoolClient": true,
                "AllowedOAuthScopes": ["email", "openid", "profile"],
                "CallbackURLs": ["https://example.com"],
                "SupportedIdentityProviders": ["COGNITO"]
            }),
        ),
    )?;

    template.add_resource(
        "IdentityPool",
        Resource::new(
            "AWS::Cognito::IdentityPool",
            json!({
                "IdentityPoolName": names.identity_pool,
                "AllowUnauthenticatedIdentities": false,
                "CognitoIdentityProviders": [{
                    "ClientId": fn_ref("UserPoolWebClient"),
                    "ProviderName": fn_get_att("UserPool", "ProviderName")
                }]
            }),
        ),
    )?;

    let outputs = AuthOutputs {
        user_pool_id: template.add_export(
            "UserPoolId",
            fn_ref("UserPool"),
            names.export("UserPoolId"),
        )?,
        user_pool_arn: template.add_export(
            "UserPoolArn",
            fn_get_att("UserPool", "Arn"),
            names.export("UserPoolArn"),
        )?,
        user_pool_client_id: template.add_export(
            "UserPoolClientId",
            fn_ref("UserPoolWebClient"),
            names.export("UserPoolClientId"),
        )?,
        identity_pool_id: template.add_export(
            "IdentityPoolId",
            fn_ref("IdentityPool"),
            names.export("IdentityPoolId"),
        )?,
    };

    Ok((template, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use crate::synth::tests::context;

    #[test]
    fn test_user_pool_and_client() {
        let config = Default::default();
        let ctx = context(Stage::Beta, &config);
        let (template, outputs) = build(&ctx).unwrap();

        assert_eq!(template.resources_of_type("AWS::Cognito::UserPool").len(), 1);
        assert_eq!(template.resources_of_type("AWS::Cognito::UserPoolClient").len(), 1);
        assert_eq!(template.resources_of_type("AWS::Cognito::IdentityPool").len(), 1);

        let pool = template.resource("UserPool").unwrap();
        assert_eq!(pool.property("UserPoolName").unwrap(), "betaMyProjectUserPool");
        assert_eq!(
            pool.property("Policies").unwrap()["PasswordPolicy"]["MinimumLength"],
            8
        );

        let client = template.resource("UserPoolWebClient").unwrap();
        assert_eq!(client.property("ClientName").unwrap(), "betaMyProjectWebClient");
        assert_eq!(client.property("AllowedOAuthFlows").unwrap(), &json!(["code"]));

        assert_eq!(outputs.user_pool_id.export_name, "betaUserPoolId");
        assert_eq!(outputs.exports().len(), 4);
    }

    #[test]
    fn test_identity_pool_links_client() {
        let config = Default::default();
        let ctx = context(Stage::Production, &config);
        let (template, _) = build(&ctx).unwrap();

        let identity = template.resource("IdentityPool").unwrap();
        assert_eq!(identity.property("IdentityPoolName").unwrap(), "MyProjectIdentityPool");
        assert_eq!(
            identity.property("CognitoIdentityProviders").unwrap()[0]["ClientId"],
            json!({ "Ref": "UserPoolWebClient" })
        );
        assert_eq!(
            template.resource("UserPool").unwrap().deletion_policy,
            Some("Retain")
        );
    }
}
