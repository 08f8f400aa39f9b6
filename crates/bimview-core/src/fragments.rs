// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fragment file codec
//!
//! Compact binary form of a parsed model, used for the "Download Fragments"
//! action and for reloading a model without re-parsing the IFC file.
//!
//! Layout (numeric arrays are bulk-copied in native byte order, which is
//! little-endian on every target we ship):
//!
//! ```text
//! magic u32 | version u32 | name str
//! str = byte_len u32 | utf-8 bytes
//! element_count u32 | { id u32, category str, name opt, global_id opt, level opt, elevation opt_f32 }*
//! mesh_count u32    | { element u32, positions [f32], normals [f32], indices [u32], color [f32; 4] }*
//! ```

use crate::error::{Result, ViewerError};
use crate::model::{Element, ElementMesh, ModelData};

/// Binary format header magic number
const FRAGMENT_MAGIC: u32 = 0x4641_5247; // "FRAG" in ASCII
const FRAGMENT_VERSION: u32 = 2;

/// Serialize model data to the fragment format
pub fn encode(model: &ModelData) -> Vec<u8> {
    let estimated_size: usize = 16
        + model.elements.len() * 48
        + model
            .meshes
            .iter()
            .map(|m| 4 + 12 + (m.positions.len() + m.normals.len() + m.indices.len()) * 4 + 16)
            .sum::<usize>();

    let mut buf = Vec::with_capacity(estimated_size);

    // Header
    buf.extend_from_slice(&FRAGMENT_MAGIC.to_le_bytes());
    buf.extend_from_slice(&FRAGMENT_VERSION.to_le_bytes());
    write_str(&mut buf, &model.name);

    buf.extend_from_slice(&(model.elements.len() as u32).to_le_bytes());
    for element in &model.elements {
        buf.extend_from_slice(&element.id.to_le_bytes());
        write_str(&mut buf, &element.category);
        write_opt_str(&mut buf, element.name.as_deref());
        write_opt_str(&mut buf, element.global_id.as_deref());
        write_opt_str(&mut buf, element.level.as_deref());
        match element.level_elevation {
            Some(elevation) => {
                buf.push(1);
                buf.extend_from_slice(&elevation.to_le_bytes());
            }
            None => buf.push(0),
        }
    }

    buf.extend_from_slice(&(model.meshes.len() as u32).to_le_bytes());
    for mesh in &model.meshes {
        buf.extend_from_slice(&mesh.element.to_le_bytes());

        buf.extend_from_slice(&(mesh.positions.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytemuck::cast_slice(&mesh.positions));

        buf.extend_from_slice(&(mesh.normals.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytemuck::cast_slice(&mesh.normals));

        buf.extend_from_slice(&(mesh.indices.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytemuck::cast_slice(&mesh.indices));

        buf.extend_from_slice(bytemuck::cast_slice(&mesh.color));
    }

    buf
}

/// Deserialize a fragment file
pub fn decode(bytes: &[u8]) -> Result<ModelData> {
    let mut reader = Reader { bytes, pos: 0 };

    let magic = reader.u32()?;
    if magic != FRAGMENT_MAGIC {
        return Err(ViewerError::fragment(format!("bad magic {:#010x}", magic)));
    }
    let version = reader.u32()?;
    if version != FRAGMENT_VERSION {
        return Err(ViewerError::fragment(format!("unsupported version {}", version)));
    }

    let mut model = ModelData::new(reader.str()?);

    let element_count = reader.u32()? as usize;
    model.elements.reserve(element_count.min(bytes.len()));
    for _ in 0..element_count {
        let id = reader.u32()?;
        let category = reader.str()?;
        let name = reader.opt_str()?;
        let global_id = reader.opt_str()?;
        let level = reader.opt_str()?;
        let level_elevation = match reader.u8()? {
            0 => None,
            _ => Some(f32::from_le_bytes(reader.array()?)),
        };
        model.elements.push(Element {
            id,
            category,
            name,
            global_id,
            level,
            level_elevation,
        });
    }

    let mesh_count = reader.u32()? as usize;
    model.meshes.reserve(mesh_count.min(bytes.len()));
    for _ in 0..mesh_count {
        let element = reader.u32()?;
        let positions = reader.pod_vec::<f32>()?;
        let normals = reader.pod_vec::<f32>()?;
        let indices = reader.pod_vec::<u32>()?;
        let color_bytes = reader.take(16)?;
        let color_vec: Vec<f32> = bytemuck::pod_collect_to_vec(color_bytes);
        let color = [color_vec[0], color_vec[1], color_vec[2], color_vec[3]];

        model.meshes.push(ElementMesh {
            element,
            positions,
            normals,
            indices,
            color,
        });
    }

    if reader.pos != bytes.len() {
        return Err(ViewerError::fragment(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }

    Ok(model)
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn write_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.push(1);
            write_str(buf, s);
        }
        None => buf.push(0),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| ViewerError::fragment(format!("truncated at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ViewerError::fragment(e.to_string()))
    }

    fn opt_str(&mut self) -> Result<Option<String>> {
        match self.u8()? {
            0 => Ok(None),
            _ => self.str().map(Some),
        }
    }

    fn pod_vec<T: bytemuck::Pod>(&mut self) -> Result<Vec<T>> {
        let len = self.u32()? as usize;
        let byte_len = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| ViewerError::fragment("array length overflow"))?;
        let bytes = self.take(byte_len)?;
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }
}
