//! Dependency resolution
//!
//! The dependency map is static configuration, validated once when the
//! resolver is built: every dependency must be defined and the map must be
//! acyclic. Ordering a request is then a depth-first visit that appends a
//! component after everything it depends on.

use crate::error::PlanningError;
use crate::types::Component;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Component -> components that must install first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyMap {
    entries: BTreeMap<Component, Vec<Component>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The map shipped with stackpilot
    pub fn builtin() -> Self {
        Self::new()
            .with("traefik", &[])
            .with("keycloak", &["traefik"])
            .with("wordpress", &["traefik"])
            .with("mcp_server", &[])
    }

    /// Builder-style insert
    pub fn with(mut self, component: &str, dependencies: &[&str]) -> Self {
        self.insert(
            component,
            dependencies.iter().map(|d| (*d).to_string()).collect(),
        );
        self
    }

    /// Define (or redefine) a component's dependencies
    pub fn insert(&mut self, component: impl Into<Component>, dependencies: Vec<Component>) {
        self.entries.insert(component.into(), dependencies);
    }

    pub fn contains(&self, component: &str) -> bool {
        self.entries.contains_key(component)
    }

    /// Direct dependencies of a component (empty if unknown)
    pub fn dependencies_of(&self, component: &str) -> &[Component] {
        self.entries.get(component).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Known components, sorted
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every dependency is defined and that there are no cycles
    pub fn validate(&self) -> Result<(), PlanningError> {
        for (component, deps) in &self.entries {
            if let Some(missing) = deps.iter().find(|d| !self.entries.contains_key(*d)) {
                return Err(PlanningError::MissingDependency {
                    component: component.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut state: HashMap<&str, NodeState> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        for component in self.entries.keys() {
            self.check_cycles(component, &mut state, &mut path)?;
        }

        Ok(())
    }

    fn check_cycles<'a>(
        &'a self,
        node: &'a str,
        state: &mut HashMap<&'a str, NodeState>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), PlanningError> {
        match state.get(node).copied().unwrap_or(NodeState::Unprocessed) {
            NodeState::Processed => return Ok(()),
            NodeState::Processing => {
                // `node` is on the current path: report the loop from its first occurrence
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|n| (*n).to_string()).collect();
                cycle.push(node.to_string());
                return Err(PlanningError::DependencyCycle(cycle));
            }
            NodeState::Unprocessed => {}
        }

        state.insert(node, NodeState::Processing);
        path.push(node);
        for dep in self.dependencies_of(node) {
            self.check_cycles(dep, state, path)?;
        }
        path.pop();
        state.insert(node, NodeState::Processed);

        Ok(())
    }
}

impl FromIterator<(Component, Vec<Component>)> for DependencyMap {
    fn from_iter<I: IntoIterator<Item = (Component, Vec<Component>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unprocessed,
    Processing,
    Processed,
}

/// Orders requested components so dependencies come first
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    map: DependencyMap,
}

impl DependencyResolver {
    /// Create a resolver, rejecting maps with undefined dependencies or cycles
    pub fn new(map: DependencyMap) -> Result<Self, PlanningError> {
        map.validate()?;
        Ok(Self { map })
    }

    pub fn map(&self) -> &DependencyMap {
        &self.map
    }

    /// Reject unknown or duplicated components
    pub fn check(&self, requested: &[Component]) -> Result<(), PlanningError> {
        let mut seen = HashSet::new();
        for component in requested {
            if !self.map.contains(component) {
                return Err(PlanningError::UnknownComponent(component.clone()));
            }
            if !seen.insert(component.as_str()) {
                return Err(PlanningError::DuplicateComponent(component.clone()));
            }
        }
        Ok(())
    }

    /// Permutation of `requested` in which every dependency precedes its dependents
    ///
    /// Dependencies that were not requested are never added to the result,
    /// but they are still walked so that transitive ordering through them
    /// holds (`a -> c -> b` with only `a` and `b` requested yields `[b, a]`).
    pub fn order(&self, requested: &[Component]) -> Result<Vec<Component>, PlanningError> {
        self.check(requested)?;

        let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(requested.len());

        for component in requested {
            self.visit(component, &wanted, &mut visited, &mut ordered);
        }

        Ok(ordered)
    }

    fn visit<'a>(
        &'a self,
        component: &'a str,
        wanted: &HashSet<&str>,
        visited: &mut HashSet<&'a str>,
        ordered: &mut Vec<Component>,
    ) {
        if !visited.insert(component) {
            return;
        }

        for dep in self.map.dependencies_of(component) {
            self.visit(dep, wanted, visited, ordered);
        }

        if wanted.contains(component) {
            ordered.push(component.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<Component> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn position(order: &[Component], name: &str) -> usize {
        order.iter().position(|c| c == name).unwrap()
    }

    #[test]
    fn builtin_map_is_valid() {
        assert!(DependencyMap::builtin().validate().is_ok());
        assert!(DependencyMap::builtin().contains("traefik"));
    }

    #[test]
    fn dependency_precedes_dependent() {
        let resolver = DependencyResolver::new(DependencyMap::builtin()).unwrap();
        let order = resolver.order(&names(&["keycloak", "traefik"])).unwrap();
        assert_eq!(order, names(&["traefik", "keycloak"]));
    }

    #[test]
    fn independent_components_keep_request_order() {
        let resolver = DependencyResolver::new(DependencyMap::builtin()).unwrap();
        let order = resolver
            .order(&names(&["mcp_server", "wordpress", "traefik", "keycloak"]))
            .unwrap();
        assert_eq!(order, names(&["mcp_server", "traefik", "wordpress", "keycloak"]));
    }

    #[test]
    fn unrequested_dependencies_are_not_added() {
        let resolver = DependencyResolver::new(DependencyMap::builtin()).unwrap();
        let order = resolver.order(&names(&["wordpress"])).unwrap();
        assert_eq!(order, names(&["wordpress"]));
    }

    #[test]
    fn transitive_order_through_unrequested_component() {
        let map = DependencyMap::new()
            .with("db", &[])
            .with("api", &["db"])
            .with("web", &["api"]);
        let resolver = DependencyResolver::new(map).unwrap();

        let order = resolver.order(&names(&["web", "db"])).unwrap();
        assert_eq!(order, names(&["db", "web"]));
    }

    #[test]
    fn topological_invariant_holds_for_diamond() {
        let map = DependencyMap::new()
            .with("base", &[])
            .with("left", &["base"])
            .with("right", &["base"])
            .with("top", &["left", "right"]);
        let resolver = DependencyResolver::new(map.clone()).unwrap();
        let order = resolver
            .order(&names(&["top", "right", "left", "base"]))
            .unwrap();

        assert_eq!(order.len(), 4);
        for component in &order {
            for dep in map.dependencies_of(component) {
                assert!(position(&order, dep) < position(&order, component));
            }
        }
    }

    #[test]
    fn empty_request_orders_to_empty() {
        let resolver = DependencyResolver::new(DependencyMap::builtin()).unwrap();
        assert!(resolver.order(&[]).unwrap().is_empty());
    }

    #[test]
    fn unknown_component_is_rejected() {
        let resolver = DependencyResolver::new(DependencyMap::builtin()).unwrap();
        let err = resolver.order(&names(&["traefik", "nextcloud"])).unwrap_err();
        assert_eq!(err, PlanningError::UnknownComponent("nextcloud".into()));
    }

    #[test]
    fn duplicate_component_is_rejected() {
        let resolver = DependencyResolver::new(DependencyMap::builtin()).unwrap();
        let err = resolver.order(&names(&["traefik", "traefik"])).unwrap_err();
        assert_eq!(err, PlanningError::DuplicateComponent("traefik".into()));
    }

    #[test]
    fn cyclic_map_is_rejected() {
        let map = DependencyMap::new()
            .with("a", &["b"])
            .with("b", &["c"])
            .with("c", &["a"]);
        let err = DependencyResolver::new(map).unwrap_err();
        assert_eq!(
            err,
            PlanningError::DependencyCycle(names(&["a", "b", "c", "a"]))
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let map = DependencyMap::new().with("a", &["a"]);
        assert!(matches!(
            DependencyResolver::new(map),
            Err(PlanningError::DependencyCycle(_))
        ));
    }

    #[test]
    fn undefined_dependency_is_rejected() {
        let map = DependencyMap::new().with("keycloak", &["traefik"]);
        let err = DependencyResolver::new(map).unwrap_err();
        assert_eq!(
            err,
            PlanningError::MissingDependency {
                component: "keycloak".into(),
                dependency: "traefik".into(),
            }
        );
    }

    #[test]
    fn map_deserializes_from_table() {
        let map: DependencyMap =
            serde_json::from_str(r#"{"traefik": [], "keycloak": ["traefik"]}"#).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.dependencies_of("keycloak"), ["traefik".to_string()]);
    }
}
