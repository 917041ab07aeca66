use std::io::{BufReader, Cursor};

use crate::{
    data_structures::vertex::{chunked, expand_indexed, face_normals},
    resources::load_string,
};

/// One geometry of an OBJ file, expanded into non-indexed streams.
#[derive(Clone, Debug)]
pub struct MeshGroup {
    pub name: String,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub texcoords: Vec<f32>,
}

const OBJ_KEYWORDS: [&str; 11] = [
    "v", "vn", "vt", "vp", "f", "l", "g", "o", "usemtl", "mtllib", "s",
];

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/**
 * tobj silently skips keywords it does not know. Unknown records are not an
 * error either, but they usually mean the exporter wrote something we drop.
 */
fn warn_unhandled_keywords(file_name: &str, text: &str) {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .filter(|keyword| !OBJ_KEYWORDS.contains(keyword))
        .for_each(|keyword| log::warn!("Unhandled keyword '{keyword}' in {file_name}."));
}

/**
 * tobj only starts a new model on `usemtl` when the material resolves, and
 * it never does without a loaded `mtllib`. Re-opening the current group in
 * front of every `usemtl` makes each material switch a geometry boundary
 * whether or not the library is available. The group name is kept.
 */
pub(crate) fn split_on_material_switches(text: &str) -> String {
    let mut group = String::new();
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        match trimmed.split_whitespace().next() {
            Some("o") | Some("g") => group = trimmed[1..].trim().to_string(),
            Some("usemtl") => {
                out.push_str("g ");
                out.push_str(&group);
                out.push('\n');
            }
            _ => {}
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Parses OBJ text without a material library. Geometries split on `o`, `g` and `usemtl`.
pub fn parse_obj(file_name: &str, text: &str) -> anyhow::Result<Vec<MeshGroup>> {
    warn_unhandled_keywords(file_name, text);
    let mut reader = BufReader::new(Cursor::new(split_on_material_switches(text)));
    let (models, _) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;
    Ok(expand_models(&models, file_name))
}

/// Fetches and parses an OBJ file and the material libraries it references.
///
/// Every `usemtl` switch starts a new geometry, resolved material or not.
pub async fn load_obj(file_name: &str) -> anyhow::Result<Vec<MeshGroup>> {
    let obj_text = load_string(file_name).await?;
    if obj_text.trim().is_empty() {
        anyhow::bail!("{file_name} is empty");
    }
    warn_unhandled_keywords(file_name, &obj_text);
    let mut obj_reader = BufReader::new(Cursor::new(split_on_material_switches(&obj_text)));

    let (models, materials) = tobj::load_obj_buf_async(&mut obj_reader, &load_options(), |p| async move {
        match load_string(&p).await {
            Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
            Err(e) => {
                log::warn!("Material library {p} could not be loaded: {e}");
                Err(tobj::LoadError::OpenFileFailed)
            }
        }
    })
    .await?;
    if let Err(e) = materials {
        log::warn!("{file_name} has no usable materials ({e}).");
    }
    Ok(expand_models(&models, file_name))
}

/**
 * Turns tobj's indexed meshes into the expanded streams shapes use.
 *
 * Faces without normals get flat face normals, faces without texture
 * coordinates get zeros. V is flipped because image rows start at the top.
 */
fn expand_models(models: &[tobj::Model], file_name: &str) -> Vec<MeshGroup> {
    models
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.mesh.indices.is_empty())
        .filter_map(|(idx, m)| {
            let positions: Vec<[f32; 3]> = chunked(&m.mesh.positions);
            let indices = &m.mesh.indices;
            if indices.iter().any(|&i| i as usize >= positions.len()) {
                log::warn!(
                    "Geometry {} ({}) in {} references missing vertices and is skipped.",
                    idx,
                    m.name,
                    file_name
                );
                return None;
            }

            let normals = if m.mesh.normals.len() == m.mesh.positions.len() {
                expand_indexed(&chunked::<3>(&m.mesh.normals), indices)
            } else {
                face_normals(&positions, indices)
            };
            let texcoords: Vec<[f32; 2]> = (0..positions.len())
                .map(|i| {
                    [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ]
                })
                .collect();

            Some(MeshGroup {
                name: m.name.clone(),
                positions: expand_indexed(&positions, indices),
                normals,
                texcoords: expand_indexed(&texcoords, indices),
            })
        })
        .collect()
}
