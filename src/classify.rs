/// Substrings that mark a binary glTF payload: the plain container and the
/// Draco-compressed variant the viewer streams on some products.
const ASSET_MARKERS: [&str; 2] = [".glb", "glb_draco"];

/// True iff `candidate` is non-empty and references a binary glTF asset.
pub fn is_asset_url(candidate: Option<&str>) -> bool {
    match candidate {
        Some(url) if !url.is_empty() => ASSET_MARKERS.iter().any(|m| url.contains(m)),
        _ => false,
    }
}

/// Model reference carried by an embedded viewer element.
///
/// `<model-viewer>` uses `src`, A-Frame entities use `gltf-model`; `src` wins
/// when both are present and non-empty.
pub fn model_reference<'a>(src: Option<&'a str>, gltf_model: Option<&'a str>) -> Option<&'a str> {
    src.filter(|s| !s.is_empty())
        .or(gltf_model.filter(|s| !s.is_empty()))
}
