// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loaded model types
//!
//! A parser produces [`ModelData`]; the registry wraps it into a [`Model`]
//! with a session-unique [`ModelId`] and becomes its only owner.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Session-unique model identifier, assigned by the registry
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ModelId(pub u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// Element identifiers grouped by owning model
pub type ModelIdMap = BTreeMap<ModelId, BTreeSet<u32>>;

/// Merge `other` into `target`
pub fn merge_id_maps(target: &mut ModelIdMap, other: &ModelIdMap) {
    for (model, ids) in other {
        target.entry(*model).or_default().extend(ids.iter().copied());
    }
}

/// Total number of element ids in a map
pub fn id_map_len(map: &ModelIdMap) -> usize {
    map.values().map(BTreeSet::len).sum()
}

/// Element metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// STEP express id (`#123` becomes 123)
    pub id: u32,
    /// IFC entity type, e.g. `IFCWALL`
    pub category: String,
    pub name: Option<String>,
    pub global_id: Option<String>,
    /// Containing storey name
    pub level: Option<String>,
    pub level_elevation: Option<f32>,
}

impl Element {
    /// Get display label: prefer name, then category#id
    pub fn display_label(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() && name != "$" => name.to_string(),
            _ => format!("{} #{}", self.category, self.id),
        }
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Bounds of a flat xyz position array, `None` when empty or non-finite
    pub fn from_positions(positions: &[f32]) -> Option<Self> {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut any = false;

        for chunk in positions.chunks_exact(3) {
            if !chunk.iter().all(|v| v.is_finite()) {
                continue;
            }
            for axis in 0..3 {
                min[axis] = min[axis].min(chunk[axis]);
                max[axis] = max[axis].max(chunk[axis]);
            }
            any = true;
        }

        any.then_some(Bounds { min, max })
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

/// Triangle mesh of one element
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementMesh {
    pub element: u32,
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
    /// RGBA color [r, g, b, a] where values are 0.0-1.0
    pub color: [f32; 4],
}

impl ElementMesh {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_positions(&self.positions)
    }
}

/// Parser output: element metadata plus the geometry buffer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelData {
    pub name: String,
    pub elements: Vec<Element>,
    pub meshes: Vec<ElementMesh>,
}

impl ModelData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A model owned by the registry
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    data: ModelData,
    element_index: FxHashMap<u32, usize>,
    mesh_bounds: Vec<Option<Bounds>>,
    bounds: Option<Bounds>,
}

impl Model {
    pub(crate) fn new(id: ModelId, data: ModelData) -> Self {
        let element_index = data
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();

        let mesh_bounds: Vec<Option<Bounds>> = data.meshes.iter().map(ElementMesh::bounds).collect();
        let bounds = mesh_bounds
            .iter()
            .flatten()
            .fold(None, |acc: Option<Bounds>, b| {
                Some(acc.map_or(*b, |a| a.union(b)))
            });

        Self {
            id,
            data,
            element_index,
            mesh_bounds,
            bounds,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn data(&self) -> &ModelData {
        &self.data
    }

    pub fn elements(&self) -> &[Element] {
        &self.data.elements
    }

    pub fn meshes(&self) -> &[ElementMesh] {
        &self.data.meshes
    }

    /// Meshes paired with their precomputed bounds
    pub fn meshes_with_bounds(&self) -> impl Iterator<Item = (&ElementMesh, Option<&Bounds>)> {
        self.data
            .meshes
            .iter()
            .zip(self.mesh_bounds.iter().map(Option::as_ref))
    }

    pub fn element(&self, id: u32) -> Option<&Element> {
        self.element_index.get(&id).map(|&i| &self.data.elements[i])
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// All element ids of this model
    pub fn element_ids(&self) -> ModelIdMap {
        let mut map = ModelIdMap::new();
        map.insert(self.id, self.data.elements.iter().map(|e| e.id).collect());
        map
    }

    /// Serialized geometry buffer (fragment file contents)
    pub fn buffer(&self) -> Vec<u8> {
        crate::fragments::encode(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(element: u32, offset: f32) -> ElementMesh {
        ElementMesh {
            element,
            positions: vec![
                offset, 0.0, 0.0, //
                offset + 1.0, 0.0, 0.0, //
                offset, 1.0, 0.0,
            ],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            color: [1.0; 4],
        }
    }

    #[test]
    fn test_bounds_skip_non_finite() {
        let b = Bounds::from_positions(&[0.0, 0.0, 0.0, f32::NAN, 1.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(b.min, [0.0, 0.0, 0.0]);
        assert_eq!(b.max, [2.0, 3.0, 4.0]);
        assert!(Bounds::from_positions(&[]).is_none());
    }

    #[test]
    fn test_model_bounds_union() {
        let mut data = ModelData::new("m");
        data.meshes.push(mesh(1, 0.0));
        data.meshes.push(mesh(2, 5.0));
        let model = Model::new(ModelId(1), data);

        let b = model.bounds().unwrap();
        assert_eq!(b.min[0], 0.0);
        assert_eq!(b.max[0], 6.0);
    }

    #[test]
    fn test_display_label_falls_back_to_category() {
        let element = Element {
            id: 12,
            category: "IFCWALL".into(),
            name: Some("$".into()),
            global_id: None,
            level: None,
            level_elevation: None,
        };
        assert_eq!(element.display_label(), "IFCWALL #12");
    }
}
