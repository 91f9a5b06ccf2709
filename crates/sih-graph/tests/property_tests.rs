use proptest::prelude::*;
use sih_graph::prelude::*;
use std::collections::{HashMap, HashSet};

fn builder() -> GraphBuilder {
    GraphBuilder::new(StackContext::default())
}

fn has_cycle(reg: &ConditionRegistry) -> bool {
    fn visit<'a>(
        reg: &'a ConditionRegistry,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> bool {
        if stack.contains(&name) {
            return true;
        }
        if !done.insert(name) {
            return false;
        }
        stack.push(name);
        let cyclic = reg
            .get(name)
            .map(|expr| {
                expr.referenced_conditions()
                    .into_iter()
                    .any(|next| visit(reg, next, stack, done))
            })
            .unwrap_or(false);
        stack.pop();
        cyclic
    }

    let mut done = HashSet::new();
    reg.iter()
        .any(|(name, _)| visit(reg, name, &mut Vec::new(), &mut done))
}

proptest! {
    #[test]
    fn prop_dependencies_stay_acyclic_and_ordered(
        node_count in 1..20usize,
        edges in proptest::collection::vec((0..20usize, 0..20usize), 0..60)
    ) {
        let mut b = builder();
        let nodes: Vec<NodeRef> = (0..node_count)
            .map(|i| b.create(ResourceKind::IamRole, &format!("Node{i}"), props([])).unwrap())
            .collect();

        let mut accepted = Vec::new();
        for (from_idx, to_idx) in edges {
            if from_idx < nodes.len() && to_idx < nodes.len() {
                match b.add_dependency(nodes[from_idx], nodes[to_idx]) {
                    Ok(()) => accepted.push((from_idx, to_idx)),
                    Err(BuildError::CyclicDependency { .. }) => {}
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
            }
        }

        let template = b.finalize().unwrap();
        prop_assert_eq!(template.resources().len(), node_count);
        for (from, to) in accepted {
            let from_pos = template.position(&format!("Node{from}")).unwrap();
            let to_pos = template.position(&format!("Node{to}")).unwrap();
            prop_assert!(to_pos < from_pos, "Node{} emitted after Node{}", to, from);
        }
    }

    #[test]
    fn prop_logical_ids_stay_unique(
        node_count in 1..10usize,
        renames in proptest::collection::vec((0..10usize, 0..6usize), 0..40)
    ) {
        let mut b = builder();
        let nodes: Vec<NodeRef> = (0..node_count)
            .map(|i| b.create(ResourceKind::Bucket, &format!("Bucket{i}"), props([])).unwrap())
            .collect();

        for (idx, target) in renames {
            if idx >= nodes.len() {
                continue;
            }
            let id = format!("Id{target}");
            let holder = b.find(&id);
            match b.set_logical_id(nodes[idx], &id) {
                Ok(()) => prop_assert!(holder.is_none() || holder == Some(nodes[idx])),
                Err(BuildError::IdCollision { .. }) => {
                    prop_assert!(holder.is_some() && holder != Some(nodes[idx]));
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }

            let mut seen = HashMap::new();
            for (node, n) in b.nodes() {
                prop_assert!(seen.insert(n.logical_id().to_string(), node).is_none());
            }
        }
    }

    #[test]
    fn prop_condition_registry_stays_acyclic(
        defs in proptest::collection::vec((0..8usize, proptest::collection::vec(0..8usize, 0..3)), 1..30)
    ) {
        let mut reg = ConditionRegistry::new();
        for (name_idx, refs) in defs {
            let name = format!("C{name_idx}");
            let expr = if refs.is_empty() {
                ConditionExpr::equals(Pseudo::Region, "x")
            } else {
                ConditionExpr::or(
                    refs.iter()
                        .map(|r| ConditionExpr::reference(&ConditionRef::named(&format!("C{r}")))),
                )
            };
            match reg.define(&name, expr) {
                Ok(_)
                | Err(BuildError::DuplicateCondition { .. })
                | Err(BuildError::CyclicCondition { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
            prop_assert!(!has_cycle(&reg));
        }
    }
}

#[test]
fn test_rejects_simple_cycle() {
    let mut b = builder();
    let n1 = b.create(ResourceKind::IamRole, "N1", props([])).unwrap();
    let n2 = b.create(ResourceKind::IamRole, "N2", props([])).unwrap();
    let n3 = b.create(ResourceKind::IamRole, "N3", props([])).unwrap();

    b.add_dependency(n1, n2).unwrap();
    b.add_dependency(n2, n3).unwrap();

    // Cycle: n3 -> n1
    assert!(matches!(
        b.add_dependency(n3, n1),
        Err(BuildError::CyclicDependency { .. })
    ));
}
