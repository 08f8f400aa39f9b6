// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC parsing backed by ifc-lite
//!
//! Two passes over the STEP content: the first collects storeys, spatial
//! containment and the project's length unit, the second decodes every
//! product with geometry and triangulates it through the geometry router.

use crate::error::{Result, ViewerError};
use crate::loader::{LoadOptions, ModelParser};
use crate::model::{Bounds, Element, ElementMesh, ModelData};
use futures::future::LocalBoxFuture;
use ifc_lite_core::{build_entity_index, DecodedEntity, EntityDecoder, EntityScanner};
use ifc_lite_geometry::GeometryRouter;
use rustc_hash::FxHashMap;

/// Storey nesting is shallow; this only guards against cyclic aggregation
const MAX_SPATIAL_DEPTH: usize = 16;

/// [`ModelParser`] over `ifc-lite-core` / `ifc-lite-geometry`
#[derive(Clone, Copy, Debug, Default)]
pub struct IfcLiteParser;

impl IfcLiteParser {
    pub fn new() -> Self {
        Self
    }
}

impl ModelParser for IfcLiteParser {
    fn parse<'a>(
        &'a self,
        bytes: Vec<u8>,
        options: &'a LoadOptions,
        progress: &'a dyn Fn(f32),
    ) -> LocalBoxFuture<'a, Result<ModelData>> {
        Box::pin(async move {
            let content = String::from_utf8_lossy(&bytes);
            parse_ifc(&content, options, progress)
        })
    }
}

struct Storey {
    name: String,
    elevation: Option<f32>,
}

/// Helper to extract entity refs from a list attribute
fn get_ref_list(entity: &DecodedEntity, index: usize) -> Option<Vec<u32>> {
    entity
        .get_list(index)
        .map(|list| list.iter().filter_map(|v| v.as_entity_ref()).collect())
}

/// Parse STEP content into model data
pub fn parse_ifc(content: &str, options: &LoadOptions, progress: &dyn Fn(f32)) -> Result<ModelData> {
    if !content.trim_start().starts_with("ISO-10303-21") {
        return Err(ViewerError::parse("missing ISO-10303-21 header"));
    }
    progress(0.0);

    let index = build_entity_index(content);
    let entity_count = index.len();
    if entity_count == 0 {
        return Err(ViewerError::parse("no entities in DATA section"));
    }
    let mut decoder = EntityDecoder::with_index(content, index);

    // First pass: spatial structure
    let mut project_id = None;
    let mut storeys: FxHashMap<u32, Storey> = FxHashMap::default();
    let mut parent_of: FxHashMap<u32, u32> = FxHashMap::default();
    let mut container_of: FxHashMap<u32, u32> = FxHashMap::default();

    let mut scanner = EntityScanner::new(content);
    while let Some((id, type_name, _, _)) = scanner.next_entity() {
        match type_name.to_ascii_uppercase().as_str() {
            "IFCPROJECT" => project_id = Some(id),
            "IFCBUILDINGSTOREY" => {
                if let Ok(entity) = decoder.decode_by_id(id) {
                    let name = entity
                        .get_string(2)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("Storey #{}", id));
                    let elevation = entity.get_float(9).map(|e| e as f32);
                    storeys.insert(id, Storey { name, elevation });
                }
            }
            "IFCRELAGGREGATES" => {
                if let Ok(entity) = decoder.decode_by_id(id) {
                    if let (Some(parent), Some(children)) = (entity.get_ref(4), get_ref_list(&entity, 5)) {
                        for child in children {
                            parent_of.insert(child, parent);
                        }
                    }
                }
            }
            "IFCRELCONTAINEDINSPATIALSTRUCTURE" => {
                if let Ok(entity) = decoder.decode_by_id(id) {
                    if let (Some(structure), Some(elements)) = (entity.get_ref(5), get_ref_list(&entity, 4)) {
                        for element in elements {
                            container_of.insert(element, structure);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    let unit_scale = match project_id {
        Some(id) => ifc_lite_core::extract_length_unit_scale(&mut decoder, id).unwrap_or_else(|e| {
            log::warn!("Falling back to metres: {}", e);
            1.0
        }),
        None => 1.0,
    };
    log::debug!("Unit scale: {}", unit_scale);
    for storey in storeys.values_mut() {
        if let Some(elevation) = storey.elevation.as_mut() {
            *elevation *= unit_scale as f32;
        }
    }

    decoder.clear_cache();
    progress(30.0);

    // Second pass: products with geometry
    let router = GeometryRouter::with_scale(unit_scale);
    let mut data = ModelData::new(options.name.clone());
    let mut failures = 0usize;
    let mut scanned = 0usize;
    let mut scanner = EntityScanner::new(content);

    while let Some((id, type_name, _, _)) = scanner.next_entity() {
        scanned += 1;
        if scanned % 500 == 0 {
            progress(30.0 + (scanned as f32 / entity_count as f32).min(1.0) * 65.0);
        }
        if !ifc_lite_core::has_geometry_by_name(type_name) {
            continue;
        }
        let entity = match decoder.decode_by_id(id) {
            Ok(entity) => entity,
            Err(_) => {
                failures += 1;
                continue;
            }
        };

        let category = type_name.to_ascii_uppercase();
        let storey = storey_of(id, &container_of, &parent_of, &storeys);
        data.elements.push(Element {
            id,
            category: category.clone(),
            name: entity.get_string(2).map(|s| s.to_string()),
            global_id: entity.get_string(0).map(|s| s.to_string()),
            level: storey.map(|s| s.name.clone()),
            level_elevation: storey.and_then(|s| s.elevation),
        });

        match router.process_element(&entity, &mut decoder) {
            Ok(mesh) if !mesh.is_empty() => {
                let sanitize = |arr: &[f32]| -> Vec<f32> {
                    arr.iter().map(|v| if v.is_finite() { *v } else { 0.0 }).collect()
                };
                data.meshes.push(ElementMesh {
                    element: id,
                    positions: sanitize(&mesh.positions),
                    normals: sanitize(&mesh.normals),
                    indices: mesh.indices,
                    color: category_color(&category),
                });
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("No geometry for #{} {}: {}", id, category, e);
                failures += 1;
            }
        }
    }

    decoder.clear_cache();

    if options.coordinate {
        recenter(&mut data);
    }

    progress(100.0);
    log::debug!(
        "Parsed {} elements, {} meshes ({} without geometry)",
        data.elements.len(),
        data.meshes.len(),
        failures
    );
    Ok(data)
}

/// Storey containing `id`, following aggregation upwards
fn storey_of<'s>(
    id: u32,
    container_of: &FxHashMap<u32, u32>,
    parent_of: &FxHashMap<u32, u32>,
    storeys: &'s FxHashMap<u32, Storey>,
) -> Option<&'s Storey> {
    let mut current = *container_of.get(&id).or_else(|| parent_of.get(&id))?;
    for _ in 0..MAX_SPATIAL_DEPTH {
        if let Some(storey) = storeys.get(&current) {
            return Some(storey);
        }
        current = *parent_of.get(&current)?;
    }
    None
}

/// Move geometry so the model's bounding box is centered on the origin
fn recenter(data: &mut ModelData) {
    let Some(bounds) = data
        .meshes
        .iter()
        .filter_map(ElementMesh::bounds)
        .reduce(|a, b| a.union(&b))
    else {
        return;
    };
    let center = Bounds::center(&bounds);
    for mesh in &mut data.meshes {
        for chunk in mesh.positions.chunks_exact_mut(3) {
            chunk[0] -= center[0];
            chunk[1] -= center[1];
            chunk[2] -= center[2];
        }
    }
}

/// Display color for an IFC category
pub fn category_color(category: &str) -> [f32; 4] {
    let upper = category.to_uppercase();
    if upper.contains("WALL") {
        [0.95, 0.90, 0.80, 1.0]
    } else if upper.contains("SLAB") {
        [0.85, 0.82, 0.78, 1.0]
    } else if upper.contains("ROOF") {
        [0.85, 0.45, 0.35, 1.0]
    } else if upper.contains("BEAM") || upper.contains("COLUMN") || upper.contains("MEMBER") {
        [0.45, 0.55, 0.75, 1.0]
    } else if upper.contains("DOOR") {
        [0.65, 0.40, 0.25, 1.0]
    } else if upper.contains("WINDOW") || upper.contains("CURTAINWALL") {
        [0.4, 0.7, 0.9, 0.4]
    } else if upper.contains("STAIR") || upper.contains("RAMP") {
        [0.75, 0.70, 0.65, 1.0]
    } else if upper.contains("SPACE") {
        [0.7, 0.85, 0.95, 0.15]
    } else {
        [0.80, 0.78, 0.75, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SAMPLE_IFC;
    use std::cell::RefCell;

    fn options(coordinate: bool) -> LoadOptions {
        LoadOptions {
            coordinate,
            name: "example".into(),
        }
    }

    #[test]
    fn test_elements_carry_category_and_level() {
        let data = parse_ifc(SAMPLE_IFC, &options(false), &|_| {}).unwrap();
        assert_eq!(data.name, "example");

        let wall = data.elements.iter().find(|e| e.id == 20).unwrap();
        assert_eq!(wall.category, "IFCWALL");
        assert_eq!(wall.name.as_deref(), Some("Wall A"));
        assert_eq!(wall.level.as_deref(), Some("Ground Floor"));

        let upper = data.elements.iter().find(|e| e.id == 21).unwrap();
        assert_eq!(upper.level.as_deref(), Some("Level 1"));
        assert!(upper.level_elevation > wall.level_elevation);

        assert!(data.elements.iter().any(|e| e.category == "IFCSLAB"));
    }

    #[test]
    fn test_progress_is_reported_to_completion() {
        let seen = RefCell::new(Vec::new());
        parse_ifc(SAMPLE_IFC, &options(false), &|p| seen.borrow_mut().push(p)).unwrap();

        let seen = seen.into_inner();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&100.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_rejects_non_step_content() {
        let err = parse_ifc("<xml/>", &options(false), &|_| {}).unwrap_err();
        assert!(matches!(err, ViewerError::Parse(_)));
    }

    #[test]
    fn test_recenter() {
        let mut data = ModelData::new("m");
        data.meshes.push(ElementMesh {
            element: 1,
            positions: vec![10.0, 10.0, 10.0, 12.0, 14.0, 16.0],
            indices: vec![0, 1, 0],
            ..Default::default()
        });
        recenter(&mut data);
        assert_eq!(data.meshes[0].positions, vec![-1.0, -2.0, -3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_category_color() {
        assert_eq!(category_color("IfcWallStandardCase"), [0.95, 0.90, 0.80, 1.0]);
        assert!(category_color("IFCWINDOW")[3] < 1.0);
    }
}
