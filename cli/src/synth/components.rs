//! Standalone component pipelines
//!
//! The API and Web components live in their own repositories, each with a
//! single build-and-deploy stage. They deploy into the resources of the
//! service stacks for the same stage, so every target name comes from
//! [`ResourceNames`](crate::domain::ResourceNames).

use anyhow::Result;
use serde_json::{json, Value};

use super::bucket::{add_bucket, BucketSpec};
use super::codebuild::{BuildProject, BuildSpec, ComputeType, Grant, Phase};
use super::codepipeline::{console_url, Action, PipelineSpec, PipelineStage};
use super::pipeline::{describe_stacks_grant, frontend_env_commands, website_commands, website_url};
use super::template::{RemovalPolicy, Template};
use super::SynthContext;
use crate::domain::{Component, ComponentNames};

const ARTIFACT_BUCKET_ID: &str = "ArtifactBucket";
const PROJECT_ID: &str = "BuildProject";

fn build_project(ctx: &SynthContext<'_>, component: Component, names: &ComponentNames) -> BuildProject {
    let service = &ctx.names;
    let pipeline = &ctx.config.pipeline;
    let region = &ctx.config.environment.region;

    match component {
        Component::Api => BuildProject::new(
            PROJECT_ID,
            &names.build_project,
            &pipeline.build_image,
            BuildSpec::new()
                .install_node(pipeline.node_version, ["npm ci"])
                .phase(Phase::Build, ["npm run build", "npm test"])
                .phase(
                    Phase::PostBuild,
                    [
                        "cd dist".to_string(),
                        "zip -r ../function.zip .".to_string(),
                        "cd ..".to_string(),
                        "zip -r function.zip node_modules".to_string(),
                        format!(
                            "aws lambda update-function-code --function-name {} --zip-file fileb://function.zip",
                            service.hello_function
                        ),
                    ],
                )
                .artifacts(None, &["function.zip"]),
        )
        .with_grant(Grant::new(
            &["lambda:UpdateFunctionCode", "lambda:GetFunction"],
            vec![json!("*")],
        )),
        Component::Web => BuildProject::new(
            PROJECT_ID,
            &names.build_project,
            &pipeline.build_image,
            BuildSpec::new()
                .install_node(pipeline.node_version, ["npm install"])
                .phase(Phase::PreBuild, frontend_env_commands(service, region))
                .phase(Phase::Build, ["npm run build", "npm test"])
                .phase(
                    Phase::PostBuild,
                    website_commands(&service.web_bucket, region, "public/"),
                )
                .artifacts(Some("public"), &["**/*"]),
        )
        .with_compute(ComputeType::Medium)
        .with_env("GATSBY_STAGE", ctx.stage.label())
        .with_grant(describe_stacks_grant(service))
        .with_grant(Grant::new(&["s3:*"], vec![json!("*")])),
    }
}

/// Build the pipeline stack for one component
pub fn build(ctx: &SynthContext<'_>, component: Component) -> Result<Template> {
    let components = &ctx.config.components;
    let names = ComponentNames::derive(ctx.stage, components, component);
    let repo = match component {
        Component::Api => &components.api_repo,
        Component::Web => &components.web_repo,
    };

    let mut template = Template::new(
        &names.stack,
        format!(
            "{} component pipeline for {} ({})",
            component.title(),
            ctx.config.project.name,
            ctx.stage.label()
        ),
    );

    add_bucket(
        &mut template,
        ARTIFACT_BUCKET_ID,
        &BucketSpec {
            name: &names.artifacts_bucket,
            removal: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            cors_methods: &[],
        },
    )?;

    build_project(ctx, component, &names).add_to(&mut template, ARTIFACT_BUCKET_ID)?;

    PipelineSpec {
        logical_id: "Pipeline".to_string(),
        name: names.pipeline.clone(),
        artifact_bucket_id: ARTIFACT_BUCKET_ID.to_string(),
        restart_on_update: false,
        stages: vec![
            PipelineStage::new(
                "Source",
                vec![Action::GitHubSource {
                    name: "GitHub_Source".to_string(),
                    owner: components.owner.clone(),
                    repo: repo.clone(),
                    branch: components.branch.clone(),
                    token_secret: components.token_secret.clone(),
                    output: "SourceCode".to_string(),
                }],
            ),
            PipelineStage::new(
                "Build_and_Deploy",
                vec![Action::codebuild(
                    "Build_and_Deploy",
                    PROJECT_ID,
                    "SourceCode",
                    &["BuildOutput"],
                )],
            ),
        ],
    }
    .add_to(&mut template)?;

    template.add_output(
        "PipelineUrl",
        Value::String(console_url(&names.pipeline)),
        Some(&format!("{} component pipeline in the AWS console", component.title())),
    )?;

    if component == Component::Web {
        template.add_output(
            "WebsiteUrl",
            Value::String(website_url(&ctx.names.web_bucket, &ctx.config.environment.region)),
            Some("Static website endpoint"),
        )?;
    }

    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagecraftConfig;
    use crate::domain::Stage;
    use crate::synth::tests::context;

    fn post_build(template: &Template) -> Vec<String> {
        let raw = template.resource(PROJECT_ID).unwrap().property("Source").unwrap()
            ["BuildSpec"]
            .as_str()
            .unwrap()
            .to_string();
        let spec: Value = serde_json::from_str(&raw).unwrap();
        spec["phases"]["post_build"]["commands"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_api_component_updates_stage_function() {
        let config = StagecraftConfig::default();
        let template = build(&context(Stage::Production, &config), Component::Api).unwrap();

        assert_eq!(template.stack_name(), "KiroApiPipelineStack");
        let commands = post_build(&template);
        assert!(commands
            .last()
            .unwrap()
            .contains("--function-name MyProject-Hello "));
        assert!(!commands.iter().any(|c| c.contains("beta")));

        let pipeline = template.resource("Pipeline").unwrap();
        assert_eq!(pipeline.property("Name").unwrap(), "kiro-api-pipeline");
        assert_eq!(pipeline.property("Stages").unwrap()[1]["Name"], "Build_and_Deploy");
    }

    #[test]
    fn test_web_component_targets_stage_bucket() {
        let mut config = StagecraftConfig::default();
        config.environment.region = "us-west-2".to_string();
        let template = build(&context(Stage::Beta, &config), Component::Web).unwrap();

        assert_eq!(template.stack_name(), "betaKiroWebPipelineStack");
        let commands = post_build(&template);
        assert!(commands.iter().any(|c| c == "aws s3 sync public/ s3://beta-my-project-web --delete"));

        assert_eq!(
            template.outputs["WebsiteUrl"].value,
            "http://beta-my-project-web.s3-website-us-west-2.amazonaws.com"
        );
        assert_eq!(
            template.resource(ARTIFACT_BUCKET_ID).unwrap().property("BucketName").unwrap(),
            "beta-kiro-web-pipeline-artifacts"
        );
    }

    #[test]
    fn test_production_web_component_has_no_beta_names() {
        let config = StagecraftConfig::default();
        let template = build(&context(Stage::Production, &config), Component::Web).unwrap();
        let rendered = template.to_json_pretty().unwrap();
        assert!(!rendered.contains("betaMyService"));
        assert!(!rendered.contains("beta-my-project"));
        assert!(template.outputs.get("WebsiteUrl").is_some());
    }

    #[test]
    fn test_api_component_has_no_website_output() {
        let config = StagecraftConfig::default();
        let template = build(&context(Stage::Beta, &config), Component::Api).unwrap();
        assert!(template.outputs.get("WebsiteUrl").is_none());
        assert!(template.resource("PipelineWebhook").is_some());
    }
}
