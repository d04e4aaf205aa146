//! CodePipeline descriptors
//!
//! A pipeline is an ordered list of stages, each holding actions that run
//! in parallel within their run order. Artifacts flow forward only: an
//! action may consume an artifact solely when an earlier stage produced it.

use serde_json::{json, Value};
use std::collections::HashSet;

use super::template::{fn_get_att, fn_join, fn_ref, Resource, Template};
use crate::error::SynthError;

pub const WEBHOOK_ID: &str = "PipelineWebhook";

fn secret_reference(secret: &str) -> String {
    format!("{{{{resolve:secretsmanager:{}:SecretString:::}}}}", secret)
}

/// One pipeline action
#[derive(Debug, Clone)]
pub enum Action {
    /// GitHub checkout, triggered by a webhook on `branch`
    GitHubSource {
        name: String,
        owner: String,
        repo: String,
        branch: String,
        token_secret: String,
        output: String,
    },
    /// Run a CodeBuild project from this template
    CodeBuild {
        name: String,
        project_id: String,
        input: String,
        outputs: Vec<String>,
        run_order: u32,
    },
    /// Block until someone approves
    ManualApproval { name: String, message: String },
}

impl Action {
    pub fn codebuild(
        name: impl Into<String>,
        project_id: impl Into<String>,
        input: impl Into<String>,
        outputs: &[&str],
    ) -> Self {
        Self::CodeBuild {
            name: name.into(),
            project_id: project_id.into(),
            input: input.into(),
            outputs: outputs.iter().map(|o| o.to_string()).collect(),
            run_order: 1,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::GitHubSource { name, .. }
            | Self::CodeBuild { name, .. }
            | Self::ManualApproval { name, .. } => name,
        }
    }

    fn inputs(&self) -> Vec<&str> {
        match self {
            Self::CodeBuild { input, .. } => vec![input.as_str()],
            _ => Vec::new(),
        }
    }

    fn outputs(&self) -> Vec<&str> {
        match self {
            Self::GitHubSource { output, .. } => vec![output.as_str()],
            Self::CodeBuild { outputs, .. } => outputs.iter().map(String::as_str).collect(),
            Self::ManualApproval { .. } => Vec::new(),
        }
    }

    fn to_json(&self) -> Value {
        let artifacts = |names: Vec<&str>| -> Vec<Value> {
            names.into_iter().map(|n| json!({ "Name": n })).collect()
        };

        match self {
            Self::GitHubSource {
                name,
                owner,
                repo,
                branch,
                token_secret,
                output,
            } => json!({
                "Name": name,
                "ActionTypeId": {
                    "Category": "Source",
                    "Owner": "ThirdParty",
                    "Provider": "GitHub",
                    "Version": "1"
                },
                "Configuration": {
                    "Owner": owner,
                    "Repo": repo,
                    "Branch": branch,
                    "OAuthToken": secret_reference(token_secret),
                    "PollForSourceChanges": false
                },
                "OutputArtifacts": artifacts(vec![output.as_str()]),
                "RunOrder": 1
            }),
            Self::CodeBuild {
                name,
                project_id,
                run_order,
                ..
            } => {
                let mut action = json!({
                    "Name": name,
                    "ActionTypeId": {
                        "Category": "Build",
                        "Owner": "AWS",
                        "Provider": "CodeBuild",
                        "Version": "1"
                    },
                    "Configuration": { "ProjectName": fn_ref(project_id) },
                    "InputArtifacts": artifacts(self.inputs()),
                    "RunOrder": run_order
                });
                let outputs = self.outputs();
                if !outputs.is_empty() {
                    action["OutputArtifacts"] = Value::Array(artifacts(outputs));
                }
                action
            }
            Self::ManualApproval { name, message } => json!({
                "Name": name,
                "ActionTypeId": {
                    "Category": "Approval",
                    "Owner": "AWS",
                    "Provider": "Manual",
                    "Version": "1"
                },
                "Configuration": { "CustomData": message },
                "RunOrder": 1
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub name: String,
    pub actions: Vec<Action>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }
}

/// Complete pipeline definition
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub logical_id: String,
    pub name: String,
    pub artifact_bucket_id: String,
    pub restart_on_update: bool,
    pub stages: Vec<PipelineStage>,
}

impl PipelineSpec {
    /// Check stage name uniqueness and forward-only artifact flow
    pub fn validate(&self) -> Result<(), SynthError> {
        let mut stage_names = HashSet::new();
        let mut produced: HashSet<&str> = HashSet::new();

        for stage in &self.stages {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(SynthError::InvalidPipeline {
                    pipeline: self.name.clone(),
                    reason: format!("stage '{}' declared twice", stage.name),
                });
            }
            if stage.actions.is_empty() {
                return Err(SynthError::InvalidPipeline {
                    pipeline: self.name.clone(),
                    reason: format!("stage '{}' has no actions", stage.name),
                });
            }

            for action in &stage.actions {
                for input in action.inputs() {
                    if !produced.contains(input) {
                        return Err(SynthError::InvalidPipeline {
                            pipeline: self.name.clone(),
                            reason: format!(
                                "action '{}' consumes artifact '{}' before any stage produces it",
                                action.name(),
                                input
                            ),
                        });
                    }
                }
            }
            // Outputs become visible to later stages only
            for action in &stage.actions {
                produced.extend(action.outputs());
            }
        }

        Ok(())
    }

    fn project_ids(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|s| s.actions.iter())
            .filter_map(|a| match a {
                Action::CodeBuild { project_id, .. } => Some(project_id.as_str()),
                _ => None,
            })
            .collect()
    }

    fn source(&self) -> Option<&Action> {
        self.stages
            .iter()
            .flat_map(|s| s.actions.iter())
            .find(|a| matches!(a, Action::GitHubSource { .. }))
    }

    /// Add the pipeline, its role and (for GitHub sources) the webhook
    pub fn add_to(&self, template: &mut Template) -> Result<(), SynthError> {
        self.validate()?;

        let role_id = format!("{}Role", self.logical_id);
        let policy_id = format!("{}RoleDefaultPolicy", self.logical_id);
        let bucket_arn = fn_get_att(&self.artifact_bucket_id, "Arn");

        template.add_resource(
            &role_id,
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "codepipeline.amazonaws.com" },
                            "Action": "sts:AssumeRole"
                        }]
                    }
                }),
            ),
        )?;

        let mut statements = vec![json!({
            "Effect": "Allow",
            "Action": ["s3:GetObject*", "s3:GetBucket*", "s3:List*", "s3:PutObject", "s3:Abort*"],
            "Resource": [bucket_arn.clone(), fn_join("", vec![bucket_arn, json!("/*")])]
        })];
        let projects: Vec<Value> = self
            .project_ids()
            .into_iter()
            .map(|id| fn_get_att(id, "Arn"))
            .collect();
        if !projects.is_empty() {
            statements.push(json!({
                "Effect": "Allow",
                "Action": ["codebuild:BatchGetBuilds", "codebuild:StartBuild", "codebuild:StopBuild"],
                "Resource": projects
            }));
        }

        template.add_resource(
            &policy_id,
            Resource::new(
                "AWS::IAM::Policy",
                json!({
                    "PolicyName": policy_id,
                    "Roles": [fn_ref(&role_id)],
                    "PolicyDocument": { "Version": "2012-10-17", "Statement": statements }
                }),
            ),
        )?;

        let stages: Vec<Value> = self
            .stages
            .iter()
            .map(|stage| {
                json!({
                    "Name": stage.name,
                    "Actions": stage.actions.iter().map(Action::to_json).collect::<Vec<_>>()
                })
            })
            .collect();

        template.add_resource(
            &self.logical_id,
            Resource::new(
                "AWS::CodePipeline::Pipeline",
                json!({
                    "Name": self.name,
                    "RoleArn": fn_get_att(&role_id, "Arn"),
                    "ArtifactStore": { "Type": "S3", "Location": fn_ref(&self.artifact_bucket_id) },
                    "RestartExecutionOnUpdate": self.restart_on_update,
                    "Stages": stages
                }),
            )
            .depends_on(policy_id)
            .depends_on(role_id),
        )?;

        if let Some(Action::GitHubSource {
            name,
            branch,
            token_secret,
            ..
        }) = self.source()
        {
            template.add_resource(
                WEBHOOK_ID,
                Resource::new(
                    "AWS::CodePipeline::Webhook",
                    json!({
                        "Authentication": "GITHUB_HMAC",
                        "AuthenticationConfiguration": {
                            "SecretToken": secret_reference(token_secret)
                        },
                        "Filters": [{
                            "JsonPath": "$.ref",
                            "MatchEquals": format!("refs/heads/{}", branch)
                        }],
                        "TargetAction": name,
                        "TargetPipeline": fn_ref(&self.logical_id),
                        "TargetPipelineVersion": 1,
                        "RegisterWithThirdParty": true
                    }),
                ),
            )?;
        }

        Ok(())
    }
}

/// Console link for a pipeline
pub fn console_url(pipeline_name: &str) -> String {
    format!(
        "https://console.aws.amazon.com/codesuite/codepipeline/pipelines/{}/view",
        urlencoding::encode(pipeline_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Action {
        Action::GitHubSource {
            name: "GitHub_Source".to_string(),
            owner: "octo".to_string(),
            repo: "infra".to_string(),
            branch: "beta".to_string(),
            token_secret: "GithubToken".to_string(),
            output: "SourceCode".to_string(),
        }
    }

    fn spec(stages: Vec<PipelineStage>) -> PipelineSpec {
        PipelineSpec {
            logical_id: "Pipeline".to_string(),
            name: "betaMyProject-Pipeline".to_string(),
            artifact_bucket_id: "ArtifactBucket".to_string(),
            restart_on_update: true,
            stages,
        }
    }

    #[test]
    fn test_forward_artifact_flow_is_valid() {
        let pipeline = spec(vec![
            PipelineStage::new("Source", vec![source()]),
            PipelineStage::new(
                "Build",
                vec![Action::codebuild("Build_API", "ApiBuild", "SourceCode", &["ApiBuild"])],
            ),
            PipelineStage::new(
                "Deploy",
                vec![Action::codebuild("Deploy_API", "ApiDeploy", "ApiBuild", &[])],
            ),
        ]);
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_same_stage_artifact_is_not_visible() {
        let pipeline = spec(vec![
            PipelineStage::new("Source", vec![source()]),
            PipelineStage::new(
                "Build",
                vec![
                    Action::codebuild("Build_API", "ApiBuild", "SourceCode", &["ApiBuild"]),
                    Action::codebuild("Deploy_API", "ApiDeploy", "ApiBuild", &[]),
                ],
            ),
        ]);
        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("ApiBuild"));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let pipeline = spec(vec![
            PipelineStage::new("Source", vec![source()]),
            PipelineStage::new("Source", vec![source()]),
        ]);
        assert!(matches!(
            pipeline.validate(),
            Err(SynthError::InvalidPipeline { .. })
        ));
    }

    #[test]
    fn test_webhook_filters_on_branch() {
        let mut template = Template::new("TestStack", "test");
        spec(vec![PipelineStage::new("Source", vec![source()])])
            .add_to(&mut template)
            .unwrap();

        let webhook = template.resource(WEBHOOK_ID).unwrap();
        assert_eq!(
            webhook.property("Filters").unwrap()[0]["MatchEquals"],
            "refs/heads/beta"
        );
        assert_eq!(
            webhook
                .property("AuthenticationConfiguration")
                .unwrap()["SecretToken"],
            "{{resolve:secretsmanager:GithubToken:SecretString:::}}"
        );

        let pipeline = template.resource("Pipeline").unwrap();
        let action = &pipeline.property("Stages").unwrap()[0]["Actions"][0];
        assert_eq!(action["ActionTypeId"]["Provider"], "GitHub");
        assert_eq!(action["Configuration"]["PollForSourceChanges"], false);
    }

    #[test]
    fn test_console_url_encodes_name() {
        assert_eq!(
            console_url("beta MyProject"),
            "https://console.aws.amazon.com/codesuite/codepipeline/pipelines/beta%20MyProject/view"
        );
    }
}
