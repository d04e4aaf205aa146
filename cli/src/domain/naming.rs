//! Stage-qualified resource names
//!
//! Every physical name and export key a stack registers is derived here,
//! once per stage, from the project identity. Stacks never format names
//! themselves; they read them from [`ResourceNames`] so the beta and
//! production derivations stay in lockstep.

use serde::Serialize;
use std::collections::BTreeSet;

use super::stage::{stagify, Stage};
use crate::config::{ComponentsConfig, ProjectConfig};

/// Export keys published by the service stacks
pub const EXPORT_KEYS: &[&str] = &[
    "UsersTableName",
    "UsersTableArn",
    "AssetsBucketName",
    "MediaBucketName",
    "UserPoolId",
    "UserPoolArn",
    "UserPoolClientId",
    "IdentityPoolId",
    "GraphQLApiUrl",
    "GraphQLApiId",
    "GraphQLApiKey",
    "PipelineName",
];

/// Kind of managed resource a name is registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Table,
    Bucket,
    UserPool,
    UserPoolClient,
    IdentityPool,
    GraphqlApi,
    Function,
    BuildProject,
    Pipeline,
    Stack,
    Export,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Bucket => "bucket",
            Self::UserPool => "user pool",
            Self::UserPoolClient => "user pool client",
            Self::IdentityPool => "identity pool",
            Self::GraphqlApi => "GraphQL API",
            Self::Function => "function",
            Self::BuildProject => "build project",
            Self::Pipeline => "pipeline",
            Self::Stack => "stack",
            Self::Export => "export",
        }
    }

    /// Whether the name must be unique across every account (not just one)
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Bucket)
    }
}

/// One derived name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameEntry {
    pub kind: ResourceKind,
    /// Logical role of the resource (e.g., "assets_bucket")
    pub role: String,
    pub name: String,
}

impl NameEntry {
    fn new(kind: ResourceKind, role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            role: role.into(),
            name: name.into(),
        }
    }
}

/// Every name the service stacks register for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNames {
    pub stage: Stage,

    pub users_table: String,
    pub assets_bucket: String,
    pub media_bucket: String,
    pub artifacts_bucket: String,
    pub web_bucket: String,

    pub user_pool: String,
    pub user_pool_client: String,
    pub identity_pool: String,

    pub graphql_api: String,
    pub hello_function: String,

    pub infra_build_project: String,
    pub api_build_project: String,
    pub web_build_project: String,
    pub infra_deploy_project: String,
    pub api_deploy_project: String,
    pub web_deploy_project: String,
    pub pipeline: String,

    pub storage_stack: String,
    pub auth_stack: String,
    pub api_stack: String,
    pub pipeline_stack: String,
}

impl ResourceNames {
    pub fn derive(stage: Stage, project: &ProjectConfig) -> Self {
        let name = &project.name;
        let slug = &project.slug;
        let service = &project.service;
        let plain = |base: String| stagify(stage, &base, "");
        let dashed = |base: String| stagify(stage, &base, "-");

        Self {
            stage,
            users_table: plain("UsersTable".to_string()),
            assets_bucket: dashed(format!("{}-assets", slug)),
            media_bucket: dashed(format!("{}-media", slug)),
            artifacts_bucket: dashed(format!("{}-pipeline-artifacts", slug)),
            web_bucket: dashed(format!("{}-web", slug)),
            user_pool: plain(format!("{}UserPool", name)),
            user_pool_client: plain(format!("{}WebClient", name)),
            identity_pool: plain(format!("{}IdentityPool", name)),
            graphql_api: plain(format!("{}API", name)),
            hello_function: plain(format!("{}-Hello", name)),
            infra_build_project: plain(format!("{}-Infra-Build", name)),
            api_build_project: plain(format!("{}-API-Build", name)),
            web_build_project: plain(format!("{}-Web-Build", name)),
            infra_deploy_project: plain(format!("{}-Infra-Deploy", name)),
            api_deploy_project: plain(format!("{}-API-Deploy", name)),
            web_deploy_project: plain(format!("{}-Web-Deploy", name)),
            pipeline: plain(format!("{}-Pipeline", name)),
            storage_stack: plain(format!("{}StorageStack", service)),
            auth_stack: plain(format!("{}AuthStack", service)),
            api_stack: plain(format!("{}APIStack", service)),
            pipeline_stack: plain(format!("{}PipelineStack", service)),
        }
    }

    /// Stage-qualified export key
    pub fn export(&self, base: &str) -> String {
        stagify(self.stage, base, "")
    }

    /// Stacks the infrastructure deploy step rolls out, in dependency order
    pub fn application_stacks(&self) -> [&str; 3] {
        [&self.storage_stack, &self.auth_stack, &self.api_stack]
    }

    /// Flat list of every derived name, exports included
    pub fn entries(&self) -> Vec<NameEntry> {
        use ResourceKind::*;

        let mut entries = vec![
            NameEntry::new(Table, "users_table", &self.users_table),
            NameEntry::new(Bucket, "assets_bucket", &self.assets_bucket),
            NameEntry::new(Bucket, "media_bucket", &self.media_bucket),
            NameEntry::new(Bucket, "artifacts_bucket", &self.artifacts_bucket),
            NameEntry::new(Bucket, "web_bucket", &self.web_bucket),
            NameEntry::new(UserPool, "user_pool", &self.user_pool),
            NameEntry::new(UserPoolClient, "user_pool_client", &self.user_pool_client),
            NameEntry::new(IdentityPool, "identity_pool", &self.identity_pool),
            NameEntry::new(GraphqlApi, "graphql_api", &self.graphql_api),
            NameEntry::new(Function, "hello_function", &self.hello_function),
            NameEntry::new(BuildProject, "infra_build_project", &self.infra_build_project),
            NameEntry::new(BuildProject, "api_build_project", &self.api_build_project),
            NameEntry::new(BuildProject, "web_build_project", &self.web_build_project),
            NameEntry::new(BuildProject, "infra_deploy_project", &self.infra_deploy_project),
            NameEntry::new(BuildProject, "api_deploy_project", &self.api_deploy_project),
            NameEntry::new(BuildProject, "web_deploy_project", &self.web_deploy_project),
            NameEntry::new(Pipeline, "pipeline", &self.pipeline),
            NameEntry::new(Stack, "storage_stack", &self.storage_stack),
            NameEntry::new(Stack, "auth_stack", &self.auth_stack),
            NameEntry::new(Stack, "api_stack", &self.api_stack),
            NameEntry::new(Stack, "pipeline_stack", &self.pipeline_stack),
        ];

        entries.extend(
            EXPORT_KEYS
                .iter()
                .map(|key| NameEntry::new(Export, *key, self.export(key))),
        );

        entries
    }
}

/// A standalone component pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Api,
    Web,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Api, Component::Web];

    /// Lowercase key used in resource names
    pub fn key(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Web => "web",
        }
    }

    /// PascalCase key used in stack names
    pub fn title(&self) -> &'static str {
        match self {
            Self::Api => "Api",
            Self::Web => "Web",
        }
    }
}

/// Names registered by one component pipeline stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentNames {
    pub stage: Stage,
    pub artifacts_bucket: String,
    pub build_project: String,
    pub pipeline: String,
    pub stack: String,
}

impl ComponentNames {
    pub fn derive(stage: Stage, components: &ComponentsConfig, component: Component) -> Self {
        let prefix = &components.prefix;
        let key = component.key();
        Self {
            stage,
            artifacts_bucket: stagify(
                stage,
                &format!("{}-{}-pipeline-artifacts", prefix, key),
                "-",
            ),
            build_project: stagify(stage, &format!("{}-{}-build", prefix, key), ""),
            pipeline: stagify(stage, &format!("{}-{}-pipeline", prefix, key), ""),
            stack: stagify(
                stage,
                &format!("{}{}PipelineStack", components.stack_prefix, component.title()),
                "",
            ),
        }
    }

    pub fn entries(&self) -> Vec<NameEntry> {
        vec![
            NameEntry::new(ResourceKind::Bucket, "artifacts_bucket", &self.artifacts_bucket),
            NameEntry::new(ResourceKind::BuildProject, "build_project", &self.build_project),
            NameEntry::new(ResourceKind::Pipeline, "pipeline", &self.pipeline),
            NameEntry::new(ResourceKind::Stack, "stack", &self.stack),
        ]
    }
}

/// Names that appear in both derivations.
///
/// An empty result means the two sets of resources can be deployed side by
/// side without clobbering each other.
pub fn find_collisions(a: &[NameEntry], b: &[NameEntry]) -> Vec<String> {
    let left: BTreeSet<(ResourceKind, &str)> =
        a.iter().map(|e| (e.kind, e.name.as_str())).collect();
    let right: BTreeSet<(ResourceKind, &str)> =
        b.iter().map(|e| (e.kind, e.name.as_str())).collect();

    left.intersection(&right)
        .map(|(_, name)| name.to_string())
        .collect()
}
