use pretty_assertions::assert_eq;
use serde_json::json;
use sih_graph::prelude::*;

/// Bucket and policy plus a log group; one child stays hidden
struct StoragePattern;

struct StorageInputs {
    versioned: bool,
}

impl CompositePattern for StoragePattern {
    type Inputs = StorageInputs;

    fn kind(&self) -> &'static str {
        "storage"
    }

    fn build(&self, scope: &mut PatternScope<'_>, inputs: &StorageInputs) -> BuildResult<()> {
        let mut bucket_props = props([]);
        if inputs.versioned {
            bucket_props.insert(
                "VersioningConfiguration".into(),
                Value::map([("Status", "Enabled".into())]),
            );
        }
        let bucket = scope.create_exposed(ResourceKind::Bucket, "Bucket", bucket_props)?;
        scope.create_exposed(
            ResourceKind::BucketPolicy,
            "Bucket/Policy",
            props([("Bucket", Value::Ref(bucket))]),
        )?;
        scope.create_exposed(ResourceKind::LogGroup, "Logs", props([]))?;
        // created but never exposed
        scope.create(ResourceKind::IamRole, "Internal", props([]))?;
        Ok(())
    }
}

/// Wraps the storage pattern and re-exposes its children
struct WrapperPattern;

impl CompositePattern for WrapperPattern {
    type Inputs = ();

    fn kind(&self) -> &'static str {
        "wrapper"
    }

    fn build(&self, scope: &mut PatternScope<'_>, _: &()) -> BuildResult<()> {
        let inner = scope.instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: false })?;
        scope.expose_nested(&inner);
        let logs = inner.node("Logs")?;
        scope.create_exposed(
            ResourceKind::Output,
            "LogsName",
            props([("Value", Value::Ref(logs))]),
        )?;
        Ok(())
    }
}

fn builder() -> GraphBuilder {
    GraphBuilder::new(StackContext::default())
}

#[test]
fn region_condition_selects_exactly_one_node() {
    let mut b = builder();
    let a = b.conditions_mut().unwrap().equals("A", Pseudo::Region, "x").unwrap();
    let not_a = b.conditions_mut().unwrap().negate("B", &a).unwrap();
    let n1 = b.create(ResourceKind::Bucket, "N1", props([])).unwrap();
    let n2 = b.create(ResourceKind::Bucket, "N2", props([])).unwrap();
    b.attach_condition(n1, &a).unwrap();
    b.attach_condition(n2, &not_a).unwrap();

    let t = b.finalize().unwrap();
    assert_eq!(t.resource("N1").unwrap().condition(), Some("A"));
    assert_eq!(t.resource("N2").unwrap().condition(), Some("B"));

    let x = Renderer::new(&t, &DeployEnvironment::new().with_region("x")).unwrap();
    assert_eq!(x.emitted_resources(), vec!["N1"]);
    let y = Renderer::new(&t, &DeployEnvironment::new().with_region("y")).unwrap();
    assert_eq!(y.emitted_resources(), vec!["N2"]);
}

#[test]
fn pruned_child_with_live_edge_fails_finalize() {
    let mut b = builder();
    let storage = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: true })
        .unwrap();
    let logs = storage.node("Logs").unwrap();
    let role = b.create(ResourceKind::IamRole, "Role", props([])).unwrap();
    b.add_dependency(role, logs).unwrap();
    b.remove(storage.handle(), "Logs").unwrap();

    let logs_id = b.logical_id(logs).unwrap().to_string();
    assert_eq!(
        b.finalize().unwrap_err(),
        BuildError::NodeStillReferenced {
            node: logs_id,
            referenced_by: vec!["Role".into()]
        }
    );
}

#[test]
fn pruned_child_with_live_reference_fails_finalize() {
    fn referencing_build(unhook: bool) -> BuildResult<Template> {
        let mut b = builder();
        let storage = b.instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: true })?;
        let bucket = storage.node("Bucket")?;
        let role = b.create(
            ResourceKind::IamRole,
            "Role",
            props([("Description", Value::get_att(bucket, "Arn"))]),
        )?;
        b.remove(storage.handle(), "Bucket")?;
        if unhook {
            b.remove_property(role, "Description")?;
        }
        b.finalize()
    }

    match referencing_build(false) {
        Err(BuildError::NodeStillReferenced { referenced_by, .. }) => {
            assert_eq!(referenced_by, vec!["Role".to_string()]);
        }
        other => panic!("expected NodeStillReferenced, got {other:?}"),
    }
    let t = referencing_build(true).unwrap();
    assert!(t.resource("Role").unwrap().property("Description").is_none());
}

#[test]
fn pruned_child_without_references_disappears() {
    let mut b = builder();
    let storage = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: false })
        .unwrap();
    let logs = storage.node("Logs").unwrap();
    let logs_id = b.logical_id(logs).unwrap().to_string();
    b.remove(storage.handle(), "Logs").unwrap();
    // idempotent
    b.remove(storage.handle(), "Logs").unwrap();

    let t = b.finalize().unwrap();
    assert!(t.resource(&logs_id).is_none());
    assert_eq!(t.resources().len(), 3);
}

#[test]
fn removal_cascades_to_nested_names() {
    let mut b = builder();
    let storage = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: false })
        .unwrap();
    b.remove(storage.handle(), "Bucket").unwrap();
    let policy = storage.node("Bucket/Policy").unwrap();
    assert!(b.node(policy).unwrap().is_tombstoned());

    let t = b.finalize().unwrap();
    assert_eq!(t.resources().len(), 2);
}

#[test]
fn references_to_removed_nodes_fail_eagerly() {
    let mut b = builder();
    let storage = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: false })
        .unwrap();
    let logs = storage.node("Logs").unwrap();
    let role = b.create(ResourceKind::IamRole, "Role", props([])).unwrap();
    b.remove(storage.handle(), "Logs").unwrap();

    assert!(matches!(
        b.set_property(role, "Description", Value::Ref(logs)),
        Err(BuildError::DanglingReference { .. })
    ));
    assert!(matches!(
        b.add_dependency(role, logs),
        Err(BuildError::DanglingReference { .. })
    ));
}

#[test]
fn self_reference_fails_finalize() {
    let mut b = builder();
    let role = b.create(ResourceKind::IamRole, "Role", props([])).unwrap();
    b.set_property(role, "Description", Value::get_att(role, "Arn"))
        .unwrap();

    match b.finalize() {
        Err(BuildError::CyclicDependency { from, to }) => {
            assert_eq!((from.as_str(), to.as_str()), ("Role", "Role"));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn reference_cycle_names_its_own_members() {
    let mut b = builder();
    let n1 = b.create(ResourceKind::IamRole, "N1", props([])).unwrap();
    let n2 = b.create(ResourceKind::IamRole, "N2", props([])).unwrap();
    let n3 = b.create(ResourceKind::IamRole, "N3", props([])).unwrap();
    // N1 only sits downstream of the N2 <-> N3 cycle
    b.set_property(n1, "Description", Value::Ref(n2)).unwrap();
    b.set_property(n2, "Description", Value::Ref(n3)).unwrap();
    b.set_property(n3, "Description", Value::Ref(n2)).unwrap();

    match b.finalize() {
        Err(BuildError::CyclicDependency { from, to }) => {
            assert_eq!((from.as_str(), to.as_str()), ("N2", "N3"));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn unexposed_children_are_unreachable() {
    let mut b = builder();
    let storage = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: false })
        .unwrap();
    assert_eq!(
        storage.names().collect::<Vec<_>>(),
        vec!["Bucket", "Bucket/Policy", "Logs"]
    );
    assert_eq!(
        b.remove(storage.handle(), "Internal").unwrap_err(),
        BuildError::UnknownChild {
            pattern: "Storage".into(),
            child: "Internal".into()
        }
    );
}

#[test]
fn instantiation_is_isomorphic() {
    let mut b = builder();
    let first = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: true })
        .unwrap();
    let second = b
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: true })
        .unwrap();

    assert_ne!(first.handle(), second.handle());
    assert_eq!(second.path(), "Storage2");
    assert_eq!(
        first.names().collect::<Vec<_>>(),
        second.names().collect::<Vec<_>>()
    );
    for name in first.names() {
        let a = b.node(first.node(name).unwrap()).unwrap();
        let c = b.node(second.node(name).unwrap()).unwrap();
        assert_ne!(a.logical_id(), c.logical_id());
        assert_eq!(a.kind(), c.kind());
        assert_eq!(
            a.properties().keys().collect::<Vec<_>>(),
            c.properties().keys().collect::<Vec<_>>()
        );
    }

    // identical inputs in a fresh graph produce identical ids
    let mut other = builder();
    let again = other
        .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: true })
        .unwrap();
    for name in first.names() {
        assert_eq!(
            b.logical_id(first.node(name).unwrap()).unwrap(),
            other.logical_id(again.node(name).unwrap()).unwrap()
        );
    }
}

#[test]
fn nested_patterns_re_expose_children() {
    let mut b = builder();
    let wrapper = b.instantiate(&WrapperPattern, "Wrapper", &()).unwrap();
    assert_eq!(
        wrapper.names().collect::<Vec<_>>(),
        vec!["Storage/Bucket", "Storage/Bucket/Policy", "Storage/Logs", "LogsName"]
    );

    // the output refers to the log group, so removing it is caught
    b.remove(wrapper.handle(), "Storage/Logs").unwrap();
    assert!(matches!(
        b.finalize(),
        Err(BuildError::NodeStillReferenced { .. })
    ));
}

#[test]
fn template_document_shape() {
    let mut b = builder().with_description("demo");
    b.declare_parameter(ParameterSpec::yes_no("Toggle", "No")).unwrap();
    let on = b
        .conditions_mut()
        .unwrap()
        .equals("On", Operand::param("Toggle"), "Yes")
        .unwrap();
    let bucket = b.create(ResourceKind::Bucket, "Data", props([])).unwrap();
    let role = b
        .create(
            ResourceKind::IamRole,
            "Role",
            props([("Path", "/".into())]),
        )
        .unwrap();
    b.attach_condition(bucket, &on).unwrap();
    b.add_dependency(role, bucket).unwrap();
    b.suppress(role, "W28", "first").unwrap();
    b.suppress(role, "W28", "named on purpose").unwrap();
    b.create(
        ResourceKind::Output,
        "RoleName",
        props([("Value", Value::Ref(role)), ("Description", "role".into())]),
    )
    .unwrap();

    let t = b.finalize().unwrap();
    assert_eq!(
        t.to_json(),
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": "demo",
            "Parameters": {
                "Toggle": { "Type": "String", "Default": "No", "AllowedValues": ["Yes", "No"] }
            },
            "Conditions": {
                "On": { "Fn::Equals": [{ "Ref": "Toggle" }, "Yes"] }
            },
            "Resources": {
                "Data": { "Type": "AWS::S3::Bucket", "Condition": "On" },
                "Role": {
                    "Type": "AWS::IAM::Role",
                    "DependsOn": ["Data"],
                    "Metadata": {
                        "cfn_nag": {
                            "rules_to_suppress": [{ "id": "W28", "reason": "named on purpose" }]
                        }
                    },
                    "Properties": { "Path": "/" }
                }
            },
            "Outputs": {
                "RoleName": { "Description": "role", "Value": { "Ref": "Role" } }
            }
        })
    );
    assert_eq!(t.resource("Role").unwrap().suppressed_rules(), vec!["W28"]);
}

#[test]
fn fingerprint_is_replayable() {
    fn build() -> Template {
        let mut b = builder();
        let storage = b
            .instantiate(&StoragePattern, "Storage", &StorageInputs { versioned: true })
            .unwrap();
        b.remove(storage.handle(), "Logs").unwrap();
        b.finalize().unwrap()
    }
    let a = build();
    let c = build();
    assert_eq!(a.fingerprint(), c.fingerprint());
    assert_eq!(a.fingerprint().len(), 64);
}
