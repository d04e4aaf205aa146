//! CloudFormation template model
//!
//! Resources and outputs are kept in `BTreeMap`s keyed by logical id, so a
//! template renders byte-for-byte identically for identical input.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::Stage;
use crate::error::SynthError;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// What happens to a resource's data when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Retain,
    Destroy,
}

impl RemovalPolicy {
    /// Production data outlives its stack; beta data does not
    pub fn for_stage(stage: Stage) -> Self {
        if stage.is_production() {
            Self::Retain
        } else {
            Self::Destroy
        }
    }

    fn policy(&self) -> &'static str {
        match self {
            Self::Retain => "Retain",
            Self::Destroy => "Delete",
        }
    }
}

/// One resource descriptor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub properties: Value,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<&'static str>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Builder: apply a removal policy
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.deletion_policy = Some(policy.policy());
        self.update_replace_policy = Some(policy.policy());
        self
    }

    /// Builder: add an explicit dependency on another logical id
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    #[cfg(test)]
    /// Property lookup by top-level key
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, Serialize)]
struct Export {
    #[serde(rename = "Name")]
    name: String,
}

/// One stack output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    export: Option<Export>,
}

impl Output {
    pub fn export_name(&self) -> Option<&str> {
        self.export.as_ref().map(|e| e.name.as_str())
    }
}

/// A value a stack publishes for other stacks.
///
/// Consumers receive this struct directly from the producing stack's
/// builder and call [`ExportedValue::import`] to reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedValue {
    pub export_name: String,
    /// Intrinsic that yields the value inside the producing stack
    pub value: Value,
}

impl ExportedValue {
    pub fn import(&self) -> Value {
        fn_import_value(&self.export_name)
    }
}

/// CloudFormation template for one stack
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(skip)]
    stack_name: String,

    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub resources: BTreeMap<String, Resource>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(stack_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            format_version: TEMPLATE_FORMAT_VERSION,
            description: Some(description.into()),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<(), SynthError> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) || self.outputs.contains_key(&logical_id) {
            return Err(SynthError::DuplicateLogicalId {
                stack: self.stack_name.clone(),
                logical_id,
            });
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    /// Plain output with no export
    pub fn add_output(
        &mut self,
        logical_id: impl Into<String>,
        value: Value,
        description: Option<&str>,
    ) -> Result<(), SynthError> {
        self.insert_output(logical_id.into(), value, description, None)
    }

    /// Output exported under `export_name`, returned for injection into consumers
    pub fn add_export(
        &mut self,
        logical_id: impl Into<String>,
        value: Value,
        export_name: impl Into<String>,
    ) -> Result<ExportedValue, SynthError> {
        let export_name = export_name.into();
        self.insert_output(logical_id.into(), value.clone(), None, Some(export_name.clone()))?;
        Ok(ExportedValue { export_name, value })
    }

    fn insert_output(
        &mut self,
        logical_id: String,
        value: Value,
        description: Option<&str>,
        export_name: Option<String>,
    ) -> Result<(), SynthError> {
        if self.outputs.contains_key(&logical_id) || self.resources.contains_key(&logical_id) {
            return Err(SynthError::DuplicateLogicalId {
                stack: self.stack_name.clone(),
                logical_id,
            });
        }
        self.outputs.insert(
            logical_id,
            Output {
                value,
                description: description.map(str::to_string),
                export: export_name.map(|name| Export { name }),
            },
        );
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    #[cfg(test)]
    /// Logical ids of every resource of `resource_type`
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Export names declared by this template
    pub fn export_names(&self) -> Vec<&str> {
        self.outputs.values().filter_map(Output::export_name).collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn fn_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn fn_get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn fn_import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

pub fn fn_sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

pub fn fn_join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_policy_by_stage() {
        assert_eq!(RemovalPolicy::for_stage(Stage::Production), RemovalPolicy::Retain);
        assert_eq!(RemovalPolicy::for_stage(Stage::Beta), RemovalPolicy::Destroy);

        let resource = Resource::new("AWS::S3::Bucket", json!({}))
            .with_removal_policy(RemovalPolicy::Destroy);
        assert_eq!(resource.deletion_policy, Some("Delete"));
        assert_eq!(resource.update_replace_policy, Some("Delete"));
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut template = Template::new("TestStack", "test");
        template
            .add_resource("Bucket", Resource::new("AWS::S3::Bucket", json!({})))
            .unwrap();
        let err = template
            .add_resource("Bucket", Resource::new("AWS::S3::Bucket", json!({})))
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateLogicalId { .. }));

        let err = template
            .add_output("Bucket", fn_ref("Bucket"), None)
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateLogicalId { .. }));
    }

    #[test]
    fn test_export_renders_and_imports() {
        let mut template = Template::new("TestStack", "test");
        template
            .add_resource("Table", Resource::new("AWS::DynamoDB::Table", json!({})))
            .unwrap();
        let exported = template
            .add_export("TableArn", fn_get_att("Table", "Arn"), "betaTableArn")
            .unwrap();

        assert_eq!(exported.import(), json!({ "Fn::ImportValue": "betaTableArn" }));
        assert_eq!(template.export_names(), vec!["betaTableArn"]);

        let rendered: Value = serde_json::from_str(&template.to_json_pretty().unwrap()).unwrap();
        assert_eq!(rendered["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(rendered["Outputs"]["TableArn"]["Export"]["Name"], "betaTableArn");
        assert_eq!(
            rendered["Outputs"]["TableArn"]["Value"],
            json!({ "Fn::GetAtt": ["Table", "Arn"] })
        );
        assert!(rendered.get("stack_name").is_none());
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let mut template = Template::new("TestStack", "test");
        template
            .add_resource("Topic", Resource::new("AWS::SNS::Topic", Value::Null))
            .unwrap();
        let rendered: Value = serde_json::from_str(&template.to_json_pretty().unwrap()).unwrap();
        assert!(rendered.get("Outputs").is_none());
        assert_eq!(rendered["Resources"]["Topic"], json!({ "Type": "AWS::SNS::Topic" }));
    }
}
