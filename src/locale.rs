const LABELS: &[(&str, &str)] = &[
    ("fi/fi", "Lataa 3D"),
    ("se/sv", "Ladda ned 3D"),
    ("fr/fr", "Télécharger 3D"),
    ("es/es", "Descargar 3D"),
    ("it/it", "Scarica 3D"),
    ("no/no", "Last ned 3D"),
    ("pl/pl", "Pobierz 3D"),
    ("pt/pt", "Transferir 3D"),
    ("jp/ja", "3Dをダウンロード"),
    ("kr/ko", "3D 다운로드"),
    ("cn/zh", "下载3D模型"),
    ("ae/ar", "تنزيل ثلاثي الأبعاد"),
];

const DEFAULT_LABEL: &str = "Download 3D model";

/// Button label for the market in `href` (`ikea.com/<country>/<lang>/`).
pub fn label_for(href: &str) -> &'static str {
    LABELS
        .iter()
        .find(|(market, _)| href.contains(&format!("ikea.com/{market}/")))
        .map_or(DEFAULT_LABEL, |(_, label)| label)
}
