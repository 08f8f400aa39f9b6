// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element classification
//!
//! Groups the elements of every loaded model by IFC category and by
//! building storey. Classifications are derived from the registry and
//! rebuilt whenever a model is added or removed.

use crate::events::{EventSource, Subscription};
use crate::model::{id_map_len, Model, ModelId, ModelIdMap};
use crate::registry::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

pub const CATEGORIES: &str = "Categories";
pub const LEVELS: &str = "Levels";

/// Identifies one group of one classification
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub classification: String,
    pub group: String,
}

impl GroupKey {
    pub fn new(classification: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            classification: classification.into(),
            group: group.into(),
        }
    }
}

/// Named set of elements across models
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationGroup {
    pub name: String,
    members: ModelIdMap,
}

impl ClassificationGroup {
    /// Member element ids, grouped by model
    pub async fn get(&self) -> ModelIdMap {
        self.members.clone()
    }

    /// Members belonging to one model, `None` if it has none here
    pub fn members_of(&self, model: ModelId) -> Option<ModelIdMap> {
        let ids = self.members.get(&model)?;
        let mut map = ModelIdMap::new();
        map.insert(model, ids.clone());
        Some(map)
    }

    pub fn len(&self) -> usize {
        id_map_len(&self.members)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One way of partitioning elements into groups
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub name: String,
    /// Display order: categories alphabetically, levels by elevation
    pub groups: Vec<ClassificationGroup>,
}

impl Classification {
    pub fn group(&self, name: &str) -> Option<&ClassificationGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Derives classifications from the registry
pub struct Classifier {
    registry: Rc<ModelRegistry>,
    classifications: RefCell<BTreeMap<String, Classification>>,
    changed: EventSource<()>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl Classifier {
    /// Create a classifier kept in sync with `registry`
    pub fn attach(registry: Rc<ModelRegistry>) -> Rc<Self> {
        let classifier = Rc::new(Self {
            registry: Rc::clone(&registry),
            classifications: RefCell::new(BTreeMap::new()),
            changed: EventSource::new(),
            subscriptions: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&classifier);
        let on_added = registry.on_added(rebuild_handler(weak.clone()));
        let on_removed = registry.on_removed(rebuild_handler(weak));
        classifier
            .subscriptions
            .borrow_mut()
            .extend([on_added, on_removed]);

        classifier.rebuild();
        classifier
    }

    /// Recompute all classifications from the registry contents
    pub fn rebuild(&self) {
        let models = self.registry.models();
        let mut map = BTreeMap::new();
        map.insert(CATEGORIES.to_string(), by_category(&models));
        map.insert(LEVELS.to_string(), by_level(&models));
        *self.classifications.borrow_mut() = map;
        self.changed.emit(&());
    }

    /// A classification by name; empty (not missing) before any load
    pub fn classification(&self, name: &str) -> Option<Classification> {
        self.classifications.borrow().get(name).cloned()
    }

    pub fn group(&self, key: &GroupKey) -> Option<ClassificationGroup> {
        self.classifications
            .borrow()
            .get(&key.classification)?
            .group(&key.group)
            .cloned()
    }

    pub fn on_change(&self, handler: impl Fn(&()) + 'static) -> Subscription {
        self.changed.subscribe(handler)
    }
}

fn rebuild_handler<T: 'static>(weak: Weak<Classifier>) -> impl Fn(&T) + 'static {
    move |_: &T| {
        if let Some(classifier) = weak.upgrade() {
            classifier.rebuild();
        }
    }
}

fn by_category(models: &[Rc<Model>]) -> Classification {
    let mut groups: BTreeMap<String, ModelIdMap> = BTreeMap::new();
    for model in models {
        for element in model.elements() {
            groups
                .entry(element.category.clone())
                .or_default()
                .entry(model.id())
                .or_default()
                .insert(element.id);
        }
    }

    Classification {
        name: CATEGORIES.to_string(),
        groups: groups
            .into_iter()
            .map(|(name, members)| ClassificationGroup { name, members })
            .collect(),
    }
}

fn by_level(models: &[Rc<Model>]) -> Classification {
    let mut groups: BTreeMap<String, (f32, ModelIdMap)> = BTreeMap::new();
    for model in models {
        for element in model.elements() {
            let Some(level) = element.level.as_ref() else {
                continue;
            };
            let entry = groups
                .entry(level.clone())
                .or_insert_with(|| (element.level_elevation.unwrap_or(f32::MAX), ModelIdMap::new()));
            entry.1.entry(model.id()).or_default().insert(element.id);
        }
    }

    let mut ordered: Vec<(String, f32, ModelIdMap)> = groups
        .into_iter()
        .map(|(name, (elevation, members))| (name, elevation, members))
        .collect();
    ordered.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    Classification {
        name: LEVELS.to_string(),
        groups: ordered
            .into_iter()
            .map(|(name, _, members)| ClassificationGroup { name, members })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_model;

    #[tokio::test]
    async fn test_groups_follow_registry() {
        let registry = Rc::new(ModelRegistry::new());
        let classifier = Classifier::attach(Rc::clone(&registry));
        assert!(classifier.classification(CATEGORIES).unwrap().groups.is_empty());

        let model = registry.insert(sample_model("example"));
        let categories = classifier.classification(CATEGORIES).unwrap();
        let walls = categories.group("IFCWALL").unwrap().get().await;
        assert_eq!(walls.get(&model.id()).map(|ids| ids.len()), Some(2));

        registry.remove(model.id());
        assert!(classifier.classification(CATEGORIES).unwrap().groups.is_empty());
        assert!(classifier.classification(LEVELS).unwrap().groups.is_empty());
    }

    #[test]
    fn test_levels_ordered_by_elevation() {
        let registry = Rc::new(ModelRegistry::new());
        let classifier = Classifier::attach(Rc::clone(&registry));
        registry.insert(sample_model("example"));

        let levels = classifier.classification(LEVELS).unwrap();
        let names: Vec<&str> = levels.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Ground Floor", "Level 1"]);
    }

    #[test]
    fn test_group_lookup() {
        let registry = Rc::new(ModelRegistry::new());
        let classifier = Classifier::attach(Rc::clone(&registry));
        registry.insert(sample_model("a"));
        registry.insert(sample_model("b"));

        let slab = classifier.group(&GroupKey::new(CATEGORIES, "IFCSLAB")).unwrap();
        assert_eq!(slab.len(), 2);
        assert!(classifier.group(&GroupKey::new(CATEGORIES, "IFCROOF")).is_none());
        assert!(classifier.group(&GroupKey::new("Unknown", "IFCSLAB")).is_none());
    }
}
