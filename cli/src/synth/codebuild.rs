//! CodeBuild projects driven by a pipeline
//!
//! A [`BuildSpec`] is the typed form of the buildspec document; a
//! [`BuildProject`] pairs it with the environment and the IAM grants the
//! project's role needs.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::template::{fn_get_att, fn_join, fn_ref, Resource, Template};
use crate::error::SynthError;

pub const BUILDSPEC_VERSION: &str = "0.2";

/// Buildspec phases in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Install,
    PreBuild,
    Build,
    PostBuild,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseSpec {
    #[serde(rename = "runtime-versions", skip_serializing_if = "BTreeMap::is_empty")]
    pub runtime_versions: BTreeMap<String, u32>,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artifacts {
    #[serde(rename = "base-directory", skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<String>,
    pub files: Vec<String>,
}

/// Typed buildspec document
#[derive(Debug, Clone, Serialize)]
pub struct BuildSpec {
    pub version: &'static str,
    pub phases: BTreeMap<Phase, PhaseSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            version: BUILDSPEC_VERSION,
            phases: BTreeMap::new(),
            artifacts: None,
        }
    }
}

impl BuildSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: install phase pinned to a Node.js runtime
    pub fn install_node<I, S>(mut self, node_version: u32, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let phase = self.phases.entry(Phase::Install).or_default();
        phase
            .runtime_versions
            .insert("nodejs".to_string(), node_version);
        phase.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Builder: append commands to a phase
    pub fn phase<I, S>(mut self, phase: Phase, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases
            .entry(phase)
            .or_default()
            .commands
            .extend(commands.into_iter().map(Into::into));
        self
    }

    /// Builder: declare output artifacts
    pub fn artifacts(mut self, base_directory: Option<&str>, files: &[&str]) -> Self {
        self.artifacts = Some(Artifacts {
            base_directory: base_directory.map(str::to_string),
            files: files.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build container size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeType {
    Small,
    Medium,
}

impl ComputeType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "BUILD_GENERAL1_SMALL",
            Self::Medium => "BUILD_GENERAL1_MEDIUM",
        }
    }
}

/// One IAM statement granted to a project's role
#[derive(Debug, Clone)]
pub struct Grant {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl Grant {
    pub fn new(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    fn statement(&self) -> Value {
        json!({
            "Effect": "Allow",
            "Action": self.actions,
            "Resource": self.resources
        })
    }
}

/// A pipeline-driven CodeBuild project
#[derive(Debug, Clone)]
pub struct BuildProject {
    pub logical_id: String,
    pub name: String,
    pub image: String,
    pub compute: ComputeType,
    pub privileged: bool,
    pub environment: Vec<(String, String)>,
    pub spec: BuildSpec,
    pub grants: Vec<Grant>,
}

impl BuildProject {
    pub fn new(
        logical_id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        spec: BuildSpec,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            name: name.into(),
            image: image.into(),
            compute: ComputeType::Small,
            privileged: false,
            environment: Vec::new(),
            spec,
            grants: Vec::new(),
        }
    }

    /// Builder: set compute size
    pub fn with_compute(mut self, compute: ComputeType) -> Self {
        self.compute = compute;
        self
    }

    /// Builder: enable privileged mode (docker-in-docker)
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Builder: add a plaintext environment variable
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.push((name.into(), value.into()));
        self
    }

    /// Builder: grant the project's role extra permissions
    pub fn with_grant(mut self, grant: Grant) -> Self {
        self.grants.push(grant);
        self
    }

    pub fn role_id(&self) -> String {
        format!("{}Role", self.logical_id)
    }

    fn policy_id(&self) -> String {
        format!("{}RoleDefaultPolicy", self.logical_id)
    }

    /// Add role, policy and project to `template`.
    ///
    /// The role always gets log delivery and read/write on the pipeline's
    /// artifact bucket in addition to the explicit grants.
    pub fn add_to(&self, template: &mut Template, artifact_bucket_id: &str) -> Result<(), SynthError> {
        let role_id = self.role_id();
        let policy_id = self.policy_id();

        template.add_resource(
            &role_id,
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "codebuild.amazonaws.com" },
                            "Action": "sts:AssumeRole"
                        }]
                    }
                }),
            ),
        )?;

        let bucket_arn = fn_get_att(artifact_bucket_id, "Arn");
        let mut statements = vec![
            Grant::new(
                &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                vec![json!({
                    "Fn::Sub": format!(
                        "arn:${{AWS::Partition}}:logs:${{AWS::Region}}:${{AWS::AccountId}}:log-group:/aws/codebuild/{}:*",
                        self.name
                    )
                })],
            )
            .statement(),
            Grant::new(
                &["s3:GetObject*", "s3:GetBucket*", "s3:List*", "s3:PutObject", "s3:Abort*"],
                vec![bucket_arn.clone(), fn_join("", vec![bucket_arn, json!("/*")])],
            )
            .statement(),
        ];
        statements.extend(self.grants.iter().map(Grant::statement));

        template.add_resource(
            &policy_id,
            Resource::new(
                "AWS::IAM::Policy",
                json!({
                    "PolicyName": policy_id,
                    "Roles": [fn_ref(&role_id)],
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": statements
                    }
                }),
            ),
        )?;

        let buildspec = self
            .spec
            .to_json()
            .map_err(|e| SynthError::Render {
                what: format!("buildspec for {}", self.name),
                message: e.to_string(),
            })?;

        let environment_variables: Vec<Value> = self
            .environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Type": "PLAINTEXT", "Value": value }))
            .collect();

        let mut environment = json!({
            "Type": "LINUX_CONTAINER",
            "Image": self.image,
            "ComputeType": self.compute.as_str(),
            "ImagePullCredentialsType": "CODEBUILD",
            "PrivilegedMode": self.privileged
        });
        if !environment_variables.is_empty() {
            environment["EnvironmentVariables"] = Value::Array(environment_variables);
        }

        template.add_resource(
            &self.logical_id,
            Resource::new(
                "AWS::CodeBuild::Project",
                json!({
                    "Name": self.name,
                    "ServiceRole": fn_get_att(&role_id, "Arn"),
                    "Source": { "Type": "CODEPIPELINE", "BuildSpec": buildspec },
                    "Artifacts": { "Type": "CODEPIPELINE" },
                    "Environment": environment
                }),
            )
            .depends_on(policy_id)
            .depends_on(role_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buildspec_phase_order_and_keys() {
        let spec = BuildSpec::new()
            .phase(Phase::Build, ["npm run build"])
            .install_node(20, ["npm ci"])
            .phase(Phase::PostBuild, ["zip -r bundle.zip dist"])
            .artifacts(Some("dist"), &["**/*"]);

        let rendered: Value = serde_json::from_str(&spec.to_json().unwrap()).unwrap();
        assert_eq!(rendered["version"], "0.2");
        assert_eq!(rendered["phases"]["install"]["runtime-versions"]["nodejs"], 20);
        assert_eq!(rendered["phases"]["post_build"]["commands"][0], "zip -r bundle.zip dist");
        assert_eq!(rendered["artifacts"]["base-directory"], "dist");

        let keys: Vec<&Phase> = spec.phases.keys().collect();
        assert_eq!(keys, vec![&Phase::Install, &Phase::Build, &Phase::PostBuild]);
    }

    #[test]
    fn test_build_phase_without_runtime_omits_key() {
        let spec = BuildSpec::new().phase(Phase::Build, ["make"]);
        let rendered: Value = serde_json::from_str(&spec.to_json().unwrap()).unwrap();
        assert!(rendered["phases"]["build"].get("runtime-versions").is_none());
        assert!(rendered.get("artifacts").is_none());
        assert_eq!(spec.phases[&Phase::Build].commands, vec!["make".to_string()]);
        assert!(!spec.phases.contains_key(&Phase::Install));
    }

    #[test]
    fn test_project_adds_role_policy_and_grants() {
        let mut template = Template::new("TestStack", "test");
        BuildProject::new(
            "WebDeploy",
            "betaMyProject-Web-Deploy",
            "aws/codebuild/standard:7.0",
            BuildSpec::new().phase(Phase::Build, ["aws s3 sync . s3://bucket"]),
        )
        .with_compute(ComputeType::Medium)
        .with_env("GATSBY_STAGE", "beta")
        .with_grant(Grant::new(&["s3:*"], vec![json!("*")]))
        .add_to(&mut template, "ArtifactBucket")
        .unwrap();

        let project = template.resource("WebDeploy").unwrap();
        assert_eq!(project.property("Name").unwrap(), "betaMyProject-Web-Deploy");
        let env = project.property("Environment").unwrap();
        assert_eq!(env["ComputeType"], "BUILD_GENERAL1_MEDIUM");
        assert_eq!(env["EnvironmentVariables"][0]["Name"], "GATSBY_STAGE");

        let policy = template.resource("WebDeployRoleDefaultPolicy").unwrap();
        let statements = policy.property("PolicyDocument").unwrap()["Statement"]
            .as_array()
            .unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[2]["Action"], json!(["s3:*"]));
        assert!(template.resource("WebDeployRole").is_some());
    }
}
