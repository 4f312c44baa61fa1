use crate::config::Naming;

const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// `"<name>[ - <variant>][ (<id>)].<ext>"` built from the page title and the
/// asset URL, with characters illegal in file names removed.
pub fn derive_filename(title: Option<&str>, url: &str, naming: &Naming) -> String {
    let (name, variant) = split_title(title, naming);

    let mut stem = name;
    if let Some(variant) = variant {
        stem.push_str(" - ");
        stem.push_str(&variant);
    }
    if let Some(id) = product_id(url) {
        stem.push_str(&format!(" ({id})"));
    }

    let mut file: String = stem.chars().filter(|c| !ILLEGAL.contains(c)).collect();
    file.push('.');
    file.push_str(&naming.extension);
    file
}

/// Product name and optional variant: brand suffix dropped, then split on
/// the first comma.
fn split_title(title: Option<&str>, naming: &Naming) -> (String, Option<String>) {
    let Some(title) = title else {
        return (naming.fallback_name.clone(), None);
    };
    let title = title.trim();
    let title = match title.find(naming.title_suffix.as_str()) {
        Some(at) if !naming.title_suffix.is_empty() => &title[..at],
        _ => title,
    };

    let mut parts = title.split(',');
    let name = parts.next().unwrap_or_default().trim().to_owned();
    let variant = parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);
    (name, variant)
}

/// Numeric product id in the URL path: `/<digits>_` is preferred, then
/// `/<digits>/`.
pub fn product_id(url: &str) -> Option<&str> {
    digits_after_slash(url, '_').or_else(|| digits_after_slash(url, '/'))
}

fn digits_after_slash(url: &str, terminator: char) -> Option<&str> {
    url.match_indices('/').find_map(|(at, _)| {
        let rest = &url[at + 1..];
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        (len > 0 && rest[len..].starts_with(terminator)).then(|| &rest[..len])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://web-api.ikea.com/dimma/assets/12345_abc.glb";

    #[test]
    fn name_variant_and_id() {
        let naming = Naming::default();
        assert_eq!(
            derive_filename(Some("Blue Chair, Oak - IKEA"), URL, &naming),
            "Blue Chair - Oak (12345).glb"
        );
    }

    #[test]
    fn no_comma_means_no_variant() {
        let naming = Naming::default();
        assert_eq!(derive_filename(Some("Red Lamp - IKEA"), URL, &naming), "Red Lamp (12345).glb");
    }

    #[test]
    fn missing_title_uses_fallback() {
        let naming = Naming::default();
        assert_eq!(derive_filename(None, URL, &naming), "ikea_product (12345).glb");
    }

    #[test]
    fn illegal_characters_are_stripped() {
        let naming = Naming::default();
        assert_eq!(
            derive_filename(Some("  Shelf 80/40 \"Pro\"?, Black: matte - IKEA "), "https://x/m.glb", &naming),
            "Shelf 8040 Pro - Black matte.glb"
        );
    }

    #[test]
    fn extra_commas_are_ignored() {
        let naming = Naming::default();
        assert_eq!(
            derive_filename(Some("Sofa, 3-seat, Grey - IKEA"), "https://x/m.glb", &naming),
            "Sofa - 3-seat.glb"
        );
    }

    #[test]
    fn product_id_patterns() {
        assert_eq!(product_id("https://x/1_a.glb"), Some("1"));
        assert_eq!(product_id("https://x/glb_draco/00263850/model.glb"), Some("00263850"));
        // `/<digits>_` wins even when a `/<digits>/` segment comes first.
        assert_eq!(product_id("https://x/2024/998_lod1.glb"), Some("998"));
        assert_eq!(product_id("https://x/v2/model.glb"), None);
        assert_eq!(product_id("https://x/abc_1.glb"), None);
    }
}
