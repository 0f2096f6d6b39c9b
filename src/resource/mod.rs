//! Resource identity, registry and classification.
//!
//! A resource is the process instance that produced telemetry. Keys compare
//! names case-insensitively; a key without an instance id is a grouping key
//! that selects every instance sharing the name.

use crate::core::error::{RepositoryError, Result};
use crate::core::otel_compliance::{
    attributes::{SERVICE_INSTANCE_ID, SERVICE_NAME},
    convert_attributes, extract_string_attribute, AttributeLimits,
};
use crate::core::types::KeyValue;
use dashmap::DashMap;
use opentelemetry_proto::tonic::common::v1::{
    InstrumentationScope as ProtoScope, KeyValue as ProtoKeyValue,
};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shortest instance id suffix used to disambiguate replica display names
const MIN_SUFFIX_LEN: usize = 7;

/// Identity of a resource: `{name, instance_id}`.
#[derive(Debug, Clone)]
pub struct ResourceKey {
    pub name: String,
    pub instance_id: Option<String>,
}

impl ResourceKey {
    /// Key of a concrete instance
    pub fn new<N: Into<String>, I: Into<String>>(name: N, instance_id: I) -> Self {
        Self {
            name: name.into(),
            instance_id: Some(instance_id.into()),
        }
    }

    /// Key selecting every instance sharing `name`
    pub fn grouping<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            instance_id: None,
        }
    }

    pub fn is_grouping(&self) -> bool {
        self.instance_id.is_none()
    }

    /// Case-insensitive name comparison
    pub fn same_name(&self, other: &ResourceKey) -> bool {
        lowercase_chars(&self.name).eq(lowercase_chars(&other.name))
    }

    /// Returns true if `other` is selected by this key.
    ///
    /// Instance keys select only themselves; grouping keys select every
    /// key with the same name.
    pub fn matches(&self, other: &ResourceKey) -> bool {
        self.same_name(other)
            && (self.instance_id.is_none() || self.instance_id == other.instance_id)
    }

    /// The grouping key for this key's name
    pub fn to_grouping(&self) -> ResourceKey {
        ResourceKey::grouping(self.name.clone())
    }
}

fn lowercase_chars(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_lowercase)
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.same_name(other) && self.instance_id == other.instance_id
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in lowercase_chars(&self.name) {
            c.hash(state);
        }
        self.instance_id.hash(state);
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance_id {
            Some(instance) if instance != &self.name => write!(f, "{} ({})", self.name, instance),
            _ => f.write_str(&self.name),
        }
    }
}

/// Derives a key from OTLP resource attributes.
///
/// `service.name` and `service.instance.id` fall back to each other; a
/// resource carrying neither has no identity.
pub fn derive_key(attributes: &[ProtoKeyValue]) -> Result<ResourceKey> {
    let name = extract_string_attribute(attributes, SERVICE_NAME);
    let instance_id = extract_string_attribute(attributes, SERVICE_INSTANCE_ID);

    match (name, instance_id) {
        (Some(name), Some(instance_id)) => Ok(ResourceKey::new(name, instance_id)),
        (Some(name), None) => Ok(ResourceKey::new(name.clone(), name)),
        (None, Some(instance_id)) => Ok(ResourceKey::new(instance_id.clone(), instance_id)),
        (None, None) => Err(RepositoryError::MissingIdentity),
    }
}

/// Instrumentation library that produced telemetry
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: Option<String>,
    pub attributes: Vec<KeyValue>,
}

impl InstrumentationScope {
    pub fn from_proto(scope: Option<&ProtoScope>, limits: &AttributeLimits) -> Self {
        match scope {
            Some(scope) => Self {
                name: scope.name.clone(),
                version: (!scope.version.is_empty()).then(|| scope.version.clone()),
                attributes: convert_attributes(&scope.attributes, limits),
            },
            None => Self {
                name: String::new(),
                version: None,
                attributes: Vec::new(),
            },
        }
    }
}

/// A process instance that produced telemetry
#[derive(Debug)]
pub struct Resource {
    key: ResourceKey,
    attributes: Vec<KeyValue>,
    scopes: DashMap<(String, Option<String>), Arc<InstrumentationScope>>,
    order: u64,
}

impl Resource {
    pub fn new(key: ResourceKey, attributes: Vec<KeyValue>, order: u64) -> Self {
        Self {
            key,
            attributes,
            scopes: DashMap::new(),
            order,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }

    /// Sequence number of first sighting
    pub fn order(&self) -> u64 {
        self.order
    }

    /// Registers a scope on first use and returns the shared instance
    pub fn get_or_add_scope(&self, scope: InstrumentationScope) -> Arc<InstrumentationScope> {
        let id = (scope.name.clone(), scope.version.clone());
        let entry = self.scopes.entry(id).or_insert_with(|| Arc::new(scope));
        Arc::clone(entry.value())
    }

    /// All scopes seen so far, sorted by name
    pub fn scopes(&self) -> Vec<Arc<InstrumentationScope>> {
        let mut scopes: Vec<_> = self
            .scopes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        scopes.sort_by(|a, b| a.name.cmp(&b.name));
        scopes
    }
}

/// Registry of every resource seen since the last clear
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: DashMap<ResourceKey, Arc<Resource>>,
    next_order: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the resource for `key`, creating it on first reference.
    ///
    /// Returns the resource and whether it was created by this call.
    pub fn get_or_create(
        &self,
        key: ResourceKey,
        attributes: &[ProtoKeyValue],
        limits: &AttributeLimits,
    ) -> (Arc<Resource>, bool) {
        if let Some(existing) = self.resources.get(&key) {
            return (Arc::clone(existing.value()), false);
        }

        let mut created = false;
        let entry = self.resources.entry(key.clone()).or_insert_with(|| {
            created = true;
            let order = self.next_order.fetch_add(1, Ordering::Relaxed);
            Arc::new(Resource::new(key, convert_attributes(attributes, limits), order))
        });
        (Arc::clone(entry.value()), created)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        self.resources.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Resources selected by `key`, in order of first sighting
    pub fn matching(&self, key: &ResourceKey) -> Vec<Arc<Resource>> {
        let mut matched: Vec<_> = self
            .resources
            .iter()
            .filter(|entry| key.matches(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        matched.sort_by_key(|r| r.order());
        matched
    }

    /// All resources in order of first sighting
    pub fn all(&self) -> Vec<Arc<Resource>> {
        let mut all: Vec<_> = self
            .resources
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by_key(|r| r.order());
        all
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn clear(&self) {
        self.resources.clear();
    }
}

/// How a resource is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The only instance ever seen for its name
    Singleton,
    /// One of several replicas sharing a name
    Instance,
    /// Synthetic parent standing for every replica of a name
    Grouping,
}

/// Classifies keys that share a name.
///
/// One distinct instance id yields a single singleton. Two or more yield one
/// grouping key followed by one instance per distinct id.
pub fn classify(keys: &[ResourceKey]) -> Vec<(ResourceKey, ResourceKind)> {
    let mut distinct: Vec<&ResourceKey> = Vec::new();
    for key in keys.iter().filter(|k| !k.is_grouping()) {
        if !distinct.contains(&key) {
            distinct.push(key);
        }
    }

    match distinct.as_slice() {
        [] => Vec::new(),
        [only] => vec![((*only).clone(), ResourceKind::Singleton)],
        [first, ..] => {
            let mut classified = Vec::with_capacity(distinct.len() + 1);
            classified.push((first.to_grouping(), ResourceKind::Grouping));
            classified.extend(
                distinct
                    .iter()
                    .map(|key| ((*key).clone(), ResourceKind::Instance)),
            );
            classified
        },
    }
}

/// Query-time view of a resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceView {
    pub key: ResourceKey,
    pub kind: ResourceKind,
    pub display_name: String,
    pub attributes: Vec<KeyValue>,
}

/// Builds views for every resource, groupings placed before their instances.
///
/// `resources` must be in order of first sighting; that order decides the
/// display casing of shared names.
pub fn build_resource_views(resources: &[Arc<Resource>]) -> Vec<ResourceView> {
    let mut groups: Vec<Vec<&Arc<Resource>>> = Vec::new();
    for resource in resources {
        match groups
            .iter_mut()
            .find(|group| group[0].key().same_name(resource.key()))
        {
            Some(group) => group.push(resource),
            None => groups.push(vec![resource]),
        }
    }

    let mut views = Vec::with_capacity(resources.len() + groups.len());
    for group in groups {
        let display_base = group[0].key().name.clone();
        let keys: Vec<ResourceKey> = group.iter().map(|r| r.key().clone()).collect();
        let classified = classify(&keys);

        let instance_ids: Vec<&str> = group
            .iter()
            .map(|r| r.key().instance_id.as_deref().unwrap_or_default())
            .collect();
        let suffixes = instance_suffixes(&instance_ids);

        for (key, kind) in classified {
            let (display_name, attributes) = match kind {
                ResourceKind::Singleton => (display_base.clone(), group[0].attributes().to_vec()),
                ResourceKind::Grouping => (display_base.clone(), Vec::new()),
                ResourceKind::Instance => {
                    let position = group.iter().position(|r| r.key() == &key).unwrap_or(0);
                    (
                        format!("{}-{}", display_base, suffixes[position]),
                        group[position].attributes().to_vec(),
                    )
                },
            };
            views.push(ResourceView {
                key,
                kind,
                display_name,
                attributes,
            });
        }
    }
    views
}

/// Shortest prefixes (at least seven characters) that tell instance ids apart
pub fn instance_suffixes(instance_ids: &[&str]) -> Vec<String> {
    let longest = instance_ids
        .iter()
        .map(|id| id.chars().count())
        .max()
        .unwrap_or(0);

    let mut len = MIN_SUFFIX_LEN;
    loop {
        let suffixes: Vec<String> = instance_ids
            .iter()
            .map(|id| id.chars().take(len).collect())
            .collect();
        let unique: HashSet<&String> = suffixes.iter().collect();
        if unique.len() == suffixes.len() || len >= longest {
            return suffixes;
        }
        len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue};
    use std::collections::hash_map::DefaultHasher;

    fn attr(key: &str, value: &str) -> ProtoKeyValue {
        ProtoKeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(Value::StringValue(value.to_string())),
            }),
        }
    }

    fn hash_of(key: &ResourceKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn registry_with(keys: &[ResourceKey]) -> Vec<Arc<Resource>> {
        let registry = ResourceRegistry::new();
        for key in keys {
            registry.get_or_create(key.clone(), &[], &AttributeLimits::default());
        }
        registry.all()
    }

    #[test]
    fn test_derive_key() {
        let attributes = [attr(SERVICE_NAME, "api"), attr(SERVICE_INSTANCE_ID, "pod-1")];
        let key = derive_key(&attributes).unwrap();
        assert_eq!(key, ResourceKey::new("api", "pod-1"));

        let key = derive_key(&[attr(SERVICE_NAME, "api")]).unwrap();
        assert_eq!(key, ResourceKey::new("api", "api"));

        let key = derive_key(&[attr(SERVICE_INSTANCE_ID, "pod-1")]).unwrap();
        assert_eq!(key, ResourceKey::new("pod-1", "pod-1"));

        assert!(matches!(
            derive_key(&[attr("host.name", "box")]),
            Err(RepositoryError::MissingIdentity)
        ));
    }

    #[test]
    fn test_key_name_is_case_insensitive() {
        let a = ResourceKey::new("Frontend", "1");
        let b = ResourceKey::new("frontend", "1");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, ResourceKey::new("frontend", "2"));
    }

    #[test]
    fn test_grouping_key_matches_instances() {
        let grouping = ResourceKey::grouping("api");
        assert!(grouping.matches(&ResourceKey::new("API", "a")));
        assert!(grouping.matches(&ResourceKey::new("api", "b")));
        assert!(!grouping.matches(&ResourceKey::new("web", "a")));
        assert!(!ResourceKey::new("api", "a").matches(&ResourceKey::new("api", "b")));
    }

    #[test]
    fn test_classify_singleton() {
        let keys = vec![ResourceKey::new("api", "1"), ResourceKey::new("API", "1")];
        let classified = classify(&keys);
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].1, ResourceKind::Singleton);
    }

    #[test]
    fn test_classify_replicas() {
        let keys = vec![
            ResourceKey::new("api", "1"),
            ResourceKey::new("api", "2"),
            ResourceKey::new("api", "3"),
        ];
        let classified = classify(&keys);
        let groupings = classified
            .iter()
            .filter(|(_, kind)| *kind == ResourceKind::Grouping)
            .count();
        let instances = classified
            .iter()
            .filter(|(_, kind)| *kind == ResourceKind::Instance)
            .count();
        assert_eq!(groupings, 1);
        assert_eq!(instances, 3);
        assert!(classified[0].0.is_grouping());
    }

    #[test]
    fn test_instance_suffixes_grow_until_unique() {
        let suffixes = instance_suffixes(&["abcdefgh-1", "abcdefgh-2", "zzz"]);
        assert_eq!(suffixes, vec!["abcdefgh-1", "abcdefgh-2", "zzz"]);

        let suffixes = instance_suffixes(&["1234567890", "abcdefghij"]);
        assert_eq!(suffixes, vec!["1234567", "abcdefg"]);
    }

    #[test]
    fn test_views_preserve_first_seen_casing() {
        let resources = registry_with(&[
            ResourceKey::new("Catalog", "1111111111"),
            ResourceKey::new("catalog", "2222222222"),
            ResourceKey::new("basket", "basket"),
        ]);
        let views = build_resource_views(&resources);

        let names: Vec<&str> = views.iter().map(|v| v.display_name.as_str()).collect();
        assert_eq!(names, vec!["Catalog", "Catalog-1111111", "Catalog-2222222", "basket"]);
        assert_eq!(views[0].kind, ResourceKind::Grouping);
        assert_eq!(views[3].kind, ResourceKind::Singleton);
    }

    #[test]
    fn test_registry_creates_once() {
        let registry = ResourceRegistry::new();
        let limits = AttributeLimits::default();
        let (first, created) = registry.get_or_create(ResourceKey::new("api", "1"), &[], &limits);
        assert!(created);
        let (second, created) = registry.get_or_create(ResourceKey::new("API", "1"), &[], &limits);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_scopes_are_shared() {
        let resource = Resource::new(ResourceKey::new("api", "1"), Vec::new(), 0);
        let scope = InstrumentationScope {
            name: "lib".to_string(),
            version: Some("1.0".to_string()),
            attributes: Vec::new(),
        };
        let a = resource.get_or_add_scope(scope.clone());
        let b = resource.get_or_add_scope(scope);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(resource.scopes().len(), 1);
    }
}
