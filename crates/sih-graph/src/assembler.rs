//! Graph assembly
//!
//! `finalize` validates the invariants that can only be checked once all
//! mutations are in, drops tombstoned nodes, orders the live resources and
//! serializes the result. The builder is closed for further mutation as
//! soon as `finalize` starts, whether it succeeds or not.

use crate::builder::GraphBuilder;
use crate::dag::stable_topological_order;
use crate::error::{BuildError, BuildResult};
use crate::node::{NodeRef, ResourceNode};
use crate::template::{EmittedOutput, EmittedResource, Template};
use std::collections::HashMap;

impl GraphBuilder {
    /// Assemble the template
    ///
    /// # Errors
    ///
    /// `AlreadyFinalized` on a second call; otherwise the first violated
    /// invariant: `IdCollision`, `UnresolvedCondition`, `UnknownParameter`,
    /// `NodeStillReferenced` or `CyclicDependency` (a cycle closed through
    /// property references).
    pub fn finalize(&mut self) -> BuildResult<Template> {
        self.ensure_open()?;
        self.finalized = true;

        let live: Vec<NodeRef> = self
            .nodes()
            .filter(|(_, n)| !n.tombstoned)
            .map(|(r, _)| r)
            .collect();

        self.check_unique_ids(&live)?;
        self.check_conditions(&live)?;
        self.check_parameters(&live)?;
        self.check_tombstones()?;

        let order = self.emission_order(&live)?;
        let template = self.serialize(&order, &live);

        tracing::info!(
            resources = template.resources.len(),
            outputs = template.outputs.len(),
            conditions = template.conditions.len(),
            removed = self.nodes.len() - live.len(),
            "template assembled"
        );
        Ok(template)
    }

    fn live_node(&self, node: NodeRef) -> &ResourceNode {
        &self.nodes[node.index()]
    }

    fn check_unique_ids(&self, live: &[NodeRef]) -> BuildResult<()> {
        let mut seen: HashMap<&str, NodeRef> = HashMap::new();
        for node in live {
            let id = self.live_node(*node).logical_id();
            if seen.insert(id, *node).is_some() {
                return Err(BuildError::IdCollision {
                    id: id.to_string(),
                    requested_by: id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_conditions(&self, live: &[NodeRef]) -> BuildResult<()> {
        self.conditions.check_resolved()?;
        for node in live {
            let node = self.live_node(*node);
            let attached = node.condition().into_iter();
            let deferred = node.properties().values().flat_map(|v| v.condition_refs());
            for cond in attached.chain(deferred) {
                if !self.conditions.contains(cond.name()) {
                    return Err(BuildError::UnresolvedCondition {
                        name: cond.name().to_string(),
                        referenced_by: node.logical_id().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_parameters(&self, live: &[NodeRef]) -> BuildResult<()> {
        for (name, expr) in self.conditions.iter() {
            for param in expr.parameter_refs() {
                if !self.parameters.contains_key(param) {
                    return Err(BuildError::UnknownParameter {
                        name: param.to_string(),
                        referenced_by: name.to_string(),
                    });
                }
            }
        }
        for node in live {
            let node = self.live_node(*node);
            for value in node.properties().values() {
                for param in value.parameter_refs() {
                    if !self.parameters.contains_key(param) {
                        return Err(BuildError::UnknownParameter {
                            name: param.to_string(),
                            referenced_by: node.logical_id().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// A removed node must not be the target of a live edge or reference
    fn check_tombstones(&self) -> BuildResult<()> {
        for (removed, node) in self.nodes().filter(|(_, n)| n.tombstoned) {
            let mut holders: Vec<NodeRef> = self
                .dependencies
                .dependents_of(removed)
                .into_iter()
                .filter(|from| !self.live_node(*from).tombstoned)
                .collect();
            for (candidate, other) in self.nodes().filter(|(_, n)| !n.tombstoned) {
                if other.referenced_nodes().contains(&removed) && !holders.contains(&candidate) {
                    holders.push(candidate);
                }
            }
            if !holders.is_empty() {
                holders.sort();
                return Err(BuildError::NodeStillReferenced {
                    node: node.logical_id().to_string(),
                    referenced_by: holders
                        .iter()
                        .map(|h| self.live_node(*h).logical_id().to_string())
                        .collect(),
                });
            }
        }
        Ok(())
    }

    /// Topological order of live resources over explicit and reference edges
    fn emission_order(&self, live: &[NodeRef]) -> BuildResult<Vec<NodeRef>> {
        let resources: Vec<NodeRef> = live
            .iter()
            .copied()
            .filter(|n| !self.live_node(*n).kind().is_output())
            .collect();

        let explicit = self.dependencies.edges();
        let implicit = resources.iter().flat_map(|from| {
            self.live_node(*from)
                .referenced_nodes()
                .into_iter()
                .map(move |to| (*from, to))
        });

        stable_topological_order(&resources, explicit.chain(implicit)).map_err(|cycle| {
            let name = |n: &NodeRef| self.live_node(*n).logical_id().to_string();
            let from = cycle.first();
            BuildError::CyclicDependency {
                from: from.map(name).unwrap_or_default(),
                to: cycle.get(1).or(from).map(name).unwrap_or_default(),
            }
        })
    }

    fn serialize(&self, order: &[NodeRef], live: &[NodeRef]) -> Template {
        let resolve = |node: NodeRef| self.live_node(node).logical_id().to_string();

        let resources = order
            .iter()
            .map(|r| {
                let node = self.live_node(*r);
                EmittedResource {
                    logical_id: node.logical_id().to_string(),
                    type_name: node.kind().type_name().to_string(),
                    condition: node.condition().map(|c| c.name().to_string()),
                    depends_on: self
                        .dependencies
                        .dependencies_of(*r)
                        .into_iter()
                        .map(resolve)
                        .collect(),
                    metadata: self.suppressions.metadata(*r),
                    properties: node
                        .properties()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json(&resolve)))
                        .collect(),
                }
            })
            .collect();

        let outputs = live
            .iter()
            .map(|r| self.live_node(*r))
            .filter(|n| n.kind().is_output())
            .map(|node| EmittedOutput {
                logical_id: node.logical_id().to_string(),
                condition: node.condition().map(|c| c.name().to_string()),
                value: node
                    .property("Value")
                    .map(|v| v.to_json(&resolve))
                    .unwrap_or_default(),
                description: node.property("Description").map(|v| v.to_json(&resolve)),
                export: node.property("Export").map(|v| v.to_json(&resolve)),
            })
            .collect();

        Template {
            description: self.description.clone(),
            parameters: self.parameters.values().cloned().collect(),
            conditions: self
                .conditions
                .iter()
                .map(|(name, expr)| (name.to_string(), expr.clone()))
                .collect(),
            resources,
            outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn second_finalize_fails() {
        let mut b = GraphBuilder::new(StackContext::default());
        b.create(ResourceKind::Bucket, "B", props([])).unwrap();
        assert!(b.finalize().is_ok());
        assert_eq!(b.finalize().unwrap_err(), BuildError::AlreadyFinalized);
        assert_eq!(
            b.create(ResourceKind::Bucket, "C", props([])).unwrap_err(),
            BuildError::AlreadyFinalized
        );
    }

    #[test]
    fn failed_finalize_closes_the_builder() {
        let mut b = GraphBuilder::new(StackContext::default());
        let n = b.create(ResourceKind::Bucket, "B", props([])).unwrap();
        b.attach_condition(n, &ConditionRef::named("Missing")).unwrap();
        assert!(matches!(b.finalize(), Err(BuildError::UnresolvedCondition { .. })));
        assert_eq!(b.finalize().unwrap_err(), BuildError::AlreadyFinalized);
    }

    #[test]
    fn undeclared_parameters_are_rejected() {
        let mut b = GraphBuilder::new(StackContext::default());
        b.create(
            ResourceKind::LogGroup,
            "Logs",
            props([("RetentionInDays", Value::param("Retention"))]),
        )
        .unwrap();
        assert_eq!(
            b.finalize().unwrap_err(),
            BuildError::UnknownParameter {
                name: "Retention".into(),
                referenced_by: "Logs".into()
            }
        );
    }

    #[test]
    fn references_order_emission() {
        let mut b = GraphBuilder::new(StackContext::default());
        let policy = b.create(ResourceKind::BucketPolicy, "Policy", props([])).unwrap();
        let bucket = b.create(ResourceKind::Bucket, "Bucket", props([])).unwrap();
        b.set_property(policy, "Bucket", Value::Ref(bucket)).unwrap();

        let t = b.finalize().unwrap();
        assert_eq!(t.emission_order(), vec!["Bucket", "Policy"]);
        assert!(t.resource("Policy").unwrap().depends_on().is_empty());
    }
}
