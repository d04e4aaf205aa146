//! Pipeline stack - build and deploy the whole service from one repository
//!
//! Stages: Source, Build (infra/api/web in parallel), Deploy_Infrastructure,
//! Deploy_Application, and for production a manual approval gate whose
//! position comes from `pipeline.approval`.

use anyhow::Result;
use serde_json::{json, Value};

use super::bucket::{add_bucket, BucketSpec};
use super::codebuild::{BuildProject, BuildSpec, ComputeType, Grant, Phase};
use super::codepipeline::{console_url, Action, PipelineSpec, PipelineStage};
use super::template::{fn_ref, fn_sub, ExportedValue, RemovalPolicy, Template};
use super::{StackOutputs, SynthContext};
use crate::config::ApprovalPlacement;
use crate::domain::ResourceNames;
use crate::error::SynthError;

const ARTIFACT_BUCKET_ID: &str = "ArtifactBucket";
const DEPLOY_INFRASTRUCTURE: &str = "Deploy_Infrastructure";

/// Values the pipeline stack publishes
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub pipeline_name: ExportedValue,
}

impl StackOutputs for PipelineOutputs {
    fn exports(&self) -> Vec<&ExportedValue> {
        vec![&self.pipeline_name]
    }
}

fn stack_output_command(variable: &str, stack: &str, output_key: &str) -> String {
    format!(
        "export {}=$(aws cloudformation describe-stacks --stack-name {} --query 'Stacks[0].Outputs[?OutputKey==`{}`].OutputValue' --output text)",
        variable, stack, output_key
    )
}

/// Commands exporting the frontend's build-time settings from the deployed
/// API and Auth stacks of the same stage
pub(super) fn frontend_env_commands(names: &ResourceNames, region: &str) -> Vec<String> {
    vec![
        stack_output_command("GATSBY_GRAPHQL_ENDPOINT", &names.api_stack, "GraphQLApiUrl"),
        stack_output_command("GATSBY_API_KEY", &names.api_stack, "GraphQLApiKey"),
        stack_output_command("GATSBY_USER_POOL_ID", &names.auth_stack, "UserPoolId"),
        stack_output_command("GATSBY_USER_POOL_CLIENT_ID", &names.auth_stack, "UserPoolClientId"),
        format!("export GATSBY_AWS_REGION={}", region),
    ]
}

/// Read access to exactly the stacks [`frontend_env_commands`] queries
pub(super) fn describe_stacks_grant(names: &ResourceNames) -> Grant {
    let stack_arn = |stack: &str| {
        fn_sub(&format!(
            "arn:${{AWS::Partition}}:cloudformation:${{AWS::Region}}:${{AWS::AccountId}}:stack/{}/*",
            stack
        ))
    };
    Grant::new(
        &["cloudformation:DescribeStacks"],
        vec![stack_arn(&names.api_stack), stack_arn(&names.auth_stack)],
    )
}

/// Commands publishing `source` as a static website in `bucket`
pub(super) fn website_commands(bucket: &str, region: &str, source: &str) -> Vec<String> {
    let policy = format!(
        r#"{{"Version":"2012-10-17","Statement":[{{"Sid":"PublicReadGetObject","Effect":"Allow","Principal":"*","Action":"s3:GetObject","Resource":"arn:aws:s3:::{}/*"}}]}}"#,
        bucket
    );
    vec![
        format!("aws s3 mb s3://{} --region {} || true", bucket, region),
        format!("aws s3api delete-public-access-block --bucket {} || true", bucket),
        format!(
            "aws s3 website s3://{} --index-document index.html --error-document 404.html",
            bucket
        ),
        format!("aws s3 sync {} s3://{} --delete", source, bucket),
        format!("aws s3api put-bucket-policy --bucket {} --policy '{}'", bucket, policy),
    ]
}

pub(super) fn website_url(bucket: &str, region: &str) -> String {
    format!("http://{}.s3-website-{}.amazonaws.com", bucket, region)
}

fn build_projects(ctx: &SynthContext<'_>) -> Vec<BuildProject> {
    let names = &ctx.names;
    let pipeline = &ctx.config.pipeline;
    let region = &ctx.config.environment.region;
    let image = &pipeline.build_image;
    let node = pipeline.node_version;
    let infra_out = format!("{}/cdk.out", pipeline.infra_dir);
    let web_out = format!("{}/public", pipeline.web_dir);

    let infra_build = BuildProject::new(
        "InfraBuild",
        &names.infra_build_project,
        image,
        BuildSpec::new()
            .install_node(node, [format!("cd {}", pipeline.infra_dir), "npm ci".to_string()])
            .phase(Phase::Build, ["npm run build", "npm test", "npx cdk synth"])
            .artifacts(Some(infra_out.as_str()), &["**/*"]),
    );

    let api_build = BuildProject::new(
        "ApiBuild",
        &names.api_build_project,
        image,
        BuildSpec::new()
            .install_node(node, [format!("cd {}", pipeline.api_dir), "npm ci".to_string()])
            .phase(Phase::Build, ["npm run build", "npm test"])
            .phase(
                Phase::PostBuild,
                [
                    "cd ..".to_string(),
                    format!(
                        "zip -r api-bundle.zip {dir}/dist {dir}/node_modules",
                        dir = pipeline.api_dir
                    ),
                ],
            )
            .artifacts(None, &["api-bundle.zip"]),
    );

    let web_build = BuildProject::new(
        "WebBuild",
        &names.web_build_project,
        image,
        BuildSpec::new()
            .install_node(node, [format!("cd {}", pipeline.web_dir), "npm install".to_string()])
            .phase(Phase::PreBuild, frontend_env_commands(names, region))
            .phase(Phase::Build, ["npm run build", "npm test"])
            .artifacts(Some(web_out.as_str()), &["**/*"]),
    )
    .with_compute(ComputeType::Medium)
    .with_env("GATSBY_STAGE", ctx.stage.label())
    .with_grant(describe_stacks_grant(names));

    let infra_deploy = BuildProject::new(
        "InfraDeploy",
        &names.infra_deploy_project,
        image,
        BuildSpec::new()
            .install_node(node, ["npm install -g aws-cdk"])
            .phase(
                Phase::Build,
                [format!(
                    "cdk deploy {} --require-approval never",
                    names.application_stacks().join(" ")
                )],
            ),
    )
    .privileged()
    .with_grant(Grant::new(&["*"], vec![json!("*")]));

    let api_deploy = BuildProject::new(
        "ApiDeploy",
        &names.api_deploy_project,
        image,
        BuildSpec::new().phase(
            Phase::Build,
            [
                "unzip api-bundle.zip".to_string(),
                format!(
                    "aws lambda update-function-code --function-name {} --zip-file fileb://api-bundle.zip",
                    names.hello_function
                ),
            ],
        ),
    )
    .with_grant(Grant::new(&["lambda:UpdateFunctionCode"], vec![json!("*")]));

    let web_deploy = BuildProject::new(
        "WebDeploy",
        &names.web_deploy_project,
        image,
        BuildSpec::new().phase(Phase::Build, website_commands(&names.web_bucket, region, ".")),
    )
    .with_grant(Grant::new(&["s3:*"], vec![json!("*")]));

    vec![infra_build, api_build, web_build, infra_deploy, api_deploy, web_deploy]
}

fn pipeline_stages(ctx: &SynthContext<'_>) -> Result<Vec<PipelineStage>, SynthError> {
    let source = &ctx.config.source;

    let mut stages = vec![
        PipelineStage::new(
            "Source",
            vec![Action::GitHubSource {
                name: "GitHub_Source".to_string(),
                owner: source.owner.clone(),
                repo: source.repo.clone(),
                branch: source.branch(ctx.stage).to_string(),
                token_secret: source.token_secret.clone(),
                output: "SourceCode".to_string(),
            }],
        ),
        PipelineStage::new(
            "Build",
            vec![
                Action::codebuild("Build_Infrastructure", "InfraBuild", "SourceCode", &["InfraBuild"]),
                Action::codebuild("Build_API", "ApiBuild", "SourceCode", &["ApiBuild"]),
                Action::codebuild("Build_Web", "WebBuild", "SourceCode", &["WebBuild"]),
            ],
        ),
        PipelineStage::new(
            DEPLOY_INFRASTRUCTURE,
            vec![Action::codebuild("Deploy_CDK_Stacks", "InfraDeploy", "InfraBuild", &[])],
        ),
        PipelineStage::new(
            "Deploy_Application",
            vec![
                Action::codebuild("Deploy_API", "ApiDeploy", "ApiBuild", &[]),
                Action::codebuild("Deploy_Web", "WebDeploy", "WebBuild", &[]),
            ],
        ),
    ];

    if ctx.stage.is_production() {
        let approval = PipelineStage::new(
            "Approve_Production",
            vec![Action::ManualApproval {
                name: "Manual_Approval".to_string(),
                message: ctx.config.pipeline.approval_message.clone(),
            }],
        );
        match ctx.config.pipeline.approval {
            ApprovalPlacement::AfterDeploy => stages.push(approval),
            ApprovalPlacement::BeforeDeploy => {
                insert_before(&mut stages, DEPLOY_INFRASTRUCTURE, approval)
                    .map_err(|reason| SynthError::InvalidPipeline {
                        pipeline: ctx.names.pipeline.clone(),
                        reason,
                    })?
            }
        }
    }

    Ok(stages)
}

/// Insert `stage` directly ahead of the stage named `anchor`
fn insert_before(
    stages: &mut Vec<PipelineStage>,
    anchor: &str,
    stage: PipelineStage,
) -> Result<(), String> {
    let index = stages
        .iter()
        .position(|s| s.name == anchor)
        .ok_or_else(|| format!("no '{}' stage to gate", anchor))?;
    stages.insert(index, stage);
    Ok(())
}

pub fn build(ctx: &SynthContext<'_>) -> Result<(Template, PipelineOutputs)> {
    let names = &ctx.names;
    let mut template = Template::new(
        &names.pipeline_stack,
        format!(
            "CI/CD pipeline for {} ({})",
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

    for project in build_projects(ctx) {
        project.add_to(&mut template, ARTIFACT_BUCKET_ID)?;
    }

    PipelineSpec {
        logical_id: "Pipeline".to_string(),
        name: names.pipeline.clone(),
        artifact_bucket_id: ARTIFACT_BUCKET_ID.to_string(),
        restart_on_update: true,
        stages: pipeline_stages(ctx)?,
    }
    .add_to(&mut template)?;

    let outputs = PipelineOutputs {
        pipeline_name: template.add_export(
            "PipelineName",
            fn_ref("Pipeline"),
            names.export("PipelineName"),
        )?,
    };
    template.add_output(
        "PipelineUrl",
        Value::String(console_url(&names.pipeline)),
        Some("Pipeline in the AWS console"),
    )?;

    Ok((template, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagecraftConfig;
    use crate::domain::Stage;
    use crate::synth::tests::context;

    fn stage_names(template: &Template) -> Vec<String> {
        template
            .resource("Pipeline")
            .unwrap()
            .property("Stages")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["Name"].as_str().unwrap().to_string())
            .collect()
    }

    fn buildspec(template: &Template, logical_id: &str) -> Value {
        let project = template.resource(logical_id).unwrap();
        let raw = project.property("Source").unwrap()["BuildSpec"]
            .as_str()
            .unwrap();
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_beta_pipeline_has_no_approval() {
        let config = StagecraftConfig::default();
        let (template, outputs) = build(&context(Stage::Beta, &config)).unwrap();

        assert_eq!(
            stage_names(&template),
            vec!["Source", "Build", "Deploy_Infrastructure", "Deploy_Application"]
        );
        assert_eq!(
            template.resource("Pipeline").unwrap().property("Name").unwrap(),
            "betaMyProject-Pipeline"
        );
        assert_eq!(outputs.pipeline_name.export_name, "betaPipelineName");
        assert_eq!(template.resources_of_type("AWS::CodeBuild::Project").len(), 6);
        assert_eq!(
            template.resource("ArtifactBucket").unwrap().property("BucketName").unwrap(),
            "beta-my-project-pipeline-artifacts"
        );
    }

    #[test]
    fn test_approval_gate_follows_deploy_stage_position() {
        let stage = |name: &str| PipelineStage::new(name, vec![]);
        let mut stages = vec![
            stage("Source"),
            stage("Source_Assets"),
            stage("Build"),
            stage(DEPLOY_INFRASTRUCTURE),
        ];
        insert_before(&mut stages, DEPLOY_INFRASTRUCTURE, stage("Approve_Production")).unwrap();
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Source", "Source_Assets", "Build", "Approve_Production", DEPLOY_INFRASTRUCTURE]
        );

        let mut no_deploy = vec![stage("Source")];
        let err = insert_before(&mut no_deploy, DEPLOY_INFRASTRUCTURE, stage("Approve_Production"))
            .unwrap_err();
        assert!(err.contains(DEPLOY_INFRASTRUCTURE));
        assert_eq!(no_deploy.len(), 1);
    }

    #[test]
    fn test_production_approval_placement() {
        let mut config = StagecraftConfig::default();
        let (template, _) = build(&context(Stage::Production, &config)).unwrap();
        assert_eq!(stage_names(&template).last().unwrap(), "Approve_Production");

        config.pipeline.approval = ApprovalPlacement::BeforeDeploy;
        let (template, _) = build(&context(Stage::Production, &config)).unwrap();
        assert_eq!(
            stage_names(&template),
            vec![
                "Source",
                "Build",
                "Approve_Production",
                "Deploy_Infrastructure",
                "Deploy_Application"
            ]
        );
    }

    #[test]
    fn test_source_tracks_stage_branch() {
        let config = StagecraftConfig::default();
        let (beta, _) = build(&context(Stage::Beta, &config)).unwrap();
        let (prod, _) = build(&context(Stage::Production, &config)).unwrap();

        let branch = |t: &Template| {
            t.resource("Pipeline").unwrap().property("Stages").unwrap()[0]["Actions"][0]
                ["Configuration"]["Branch"]
                .clone()
        };
        assert_eq!(branch(&beta), "beta");
        assert_eq!(branch(&prod), "main");
    }

    #[test]
    fn test_web_build_reads_same_stage_stacks() {
        let mut config = StagecraftConfig::default();
        config.environment.region = "us-west-2".to_string();
        let (template, _) = build(&context(Stage::Beta, &config)).unwrap();

        let spec = buildspec(&template, "WebBuild");
        let pre_build = spec["phases"]["pre_build"]["commands"].to_string();
        assert!(pre_build.contains("--stack-name betaMyServiceAPIStack"));
        assert!(pre_build.contains("--stack-name betaMyServiceAuthStack"));
        assert!(pre_build.contains("GATSBY_AWS_REGION=us-west-2"));

        let env = &template.resource("WebBuild").unwrap().property("Environment").unwrap()
            ["EnvironmentVariables"][0];
        assert_eq!(env["Value"], "beta");

        let policy = template.resource("WebBuildRoleDefaultPolicy").unwrap();
        let describe = &policy.property("PolicyDocument").unwrap()["Statement"][2];
        assert_eq!(describe["Action"], json!(["cloudformation:DescribeStacks"]));
        assert!(describe["Resource"][0]["Fn::Sub"]
            .as_str()
            .unwrap()
            .ends_with(":stack/betaMyServiceAPIStack/*"));
    }

    #[test]
    fn test_deploy_projects_target_stage_resources() {
        let mut config = StagecraftConfig::default();
        config.environment.region = "us-west-2".to_string();
        let (template, _) = build(&context(Stage::Production, &config)).unwrap();

        let infra = buildspec(&template, "InfraDeploy");
        assert_eq!(
            infra["phases"]["build"]["commands"][0],
            "cdk deploy MyServiceStorageStack MyServiceAuthStack MyServiceAPIStack --require-approval never"
        );
        assert_eq!(
            template.resource("InfraDeploy").unwrap().property("Environment").unwrap()
                ["PrivilegedMode"],
            true
        );

        let api = buildspec(&template, "ApiDeploy");
        assert!(api["phases"]["build"]["commands"][1]
            .as_str()
            .unwrap()
            .contains("--function-name MyProject-Hello "));

        let web = buildspec(&template, "WebDeploy");
        assert_eq!(
            web["phases"]["build"]["commands"][0],
            "aws s3 mb s3://my-project-web --region us-west-2 || true"
        );
    }

    #[test]
    fn test_pipeline_url_output() {
        let config = StagecraftConfig::default();
        let (template, _) = build(&context(Stage::Beta, &config)).unwrap();
        let url = &template.outputs["PipelineUrl"];
        assert_eq!(
            url.value,
            "https://console.aws.amazon.com/codesuite/codepipeline/pipelines/betaMyProject-Pipeline/view"
        );
        assert!(url.export_name().is_none());
    }
}
