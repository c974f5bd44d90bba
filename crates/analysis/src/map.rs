//! Standalone Leaflet page for a cluster layer.
//!
//! The label raster is embedded as a base64 PNG image overlay on top of a
//! satellite basemap, so the page needs no server besides the tile and
//! script CDNs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use satembed_colormap::{figure, labels_to_rgba, Rgb};
use satembed_core::{Error, Raster, Region, Result};
use serde_json::json;

const SATELLITE_TILES: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";
const SATELLITE_ATTRIBUTION: &str = "Tiles &copy; Esri";

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.css" crossorigin="anonymous" />
  <script src="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.js" crossorigin="anonymous"></script>
  <style>
    html, body, #map { height: 100%; margin: 0; }
    .legend { background: rgba(255, 255, 255, 0.9); padding: 6px 8px; font: 12px sans-serif; line-height: 18px; }
    .legend i { width: 14px; height: 14px; float: left; margin-right: 6px; border: 1px solid #555; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    const config = {{CONFIG}};
    const map = L.map('map', { center: config.center, zoom: config.zoom });
    const satellite = L.tileLayer(config.tiles, { attribution: config.attribution, maxZoom: 19 }).addTo(map);
    const clusters = L.imageOverlay(config.image, config.imageBounds, { opacity: 0.8, interactive: false }).addTo(map);
    clusters.getElement().style.imageRendering = 'pixelated';
    L.control.scale().addTo(map);
    L.control.layers({ 'Satellite': satellite }, { [config.layerName]: clusters }).addTo(map);
    const legend = L.control({ position: 'bottomright' });
    legend.onAdd = function () {
      const div = L.DomUtil.create('div', 'legend');
      div.innerHTML = {{LEGEND}};
      return div;
    };
    legend.addTo(map);
    map.fitBounds(config.fitBounds);
  </script>
</body>
</html>
"#;

/// Options for a cluster map page.
#[derive(Debug, Clone)]
pub struct ClusterMapOptions {
    /// Initial zoom before the view is fitted to the region (default: 13)
    pub zoom_start: u8,
    /// Overlay layer name, also used as the page title
    pub layer_name: String,
}

impl ClusterMapOptions {
    pub fn for_k(k: usize, zoom_start: u8) -> Self {
        Self {
            zoom_start,
            layer_name: format!("K={k} clusters"),
        }
    }
}

/// Render the page for `labels` coloured with `palette`, fitted to `region`.
pub fn render_cluster_map(
    labels: &Raster<i32>,
    palette: &[Rgb],
    region: &Region,
    options: &ClusterMapOptions,
) -> Result<String> {
    let (rows, cols) = labels.shape();
    let rgba = labels_to_rgba(labels, palette);
    let png = figure::encode_png(&rgba, cols as u32, rows as u32).map_err(|e| Error::Other(e.to_string()))?;
    let image = format!("data:image/png;base64,{}", STANDARD.encode(png));

    let (left, bottom, right, top) = labels.bounds();
    let (min_x, min_y, max_x, max_y) = region.bounds();
    let (center_x, center_y) = region.center();

    // Leaflet takes [lat, lon] pairs
    let config = json!({
        "center": [center_y, center_x],
        "zoom": options.zoom_start,
        "tiles": SATELLITE_TILES,
        "attribution": SATELLITE_ATTRIBUTION,
        "image": image,
        "imageBounds": [[bottom, left], [top, right]],
        "fitBounds": [[min_y, min_x], [max_y, max_x]],
        "layerName": options.layer_name,
    });

    let legend = serde_json::to_string(&legend_html(palette)).map_err(|e| Error::Other(e.to_string()))?;

    Ok(PAGE_TEMPLATE
        .replace("{{TITLE}}", &escape_html(&options.layer_name))
        .replace("{{CONFIG}}", &script_safe(&config.to_string()))
        .replace("{{LEGEND}}", &script_safe(&legend)))
}

fn legend_html(palette: &[Rgb]) -> String {
    palette
        .iter()
        .enumerate()
        .map(|(i, color)| format!("<i style=\"background:{}\"></i>Cluster {i}<br>", color.to_hex()))
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// JSON embedded in a `<script>` block must not close it.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use satembed_colormap::kelly_palette;
    use satembed_core::{create_region, GeoTransform};

    fn labels() -> Raster<i32> {
        let mut r = Raster::from_vec(vec![0, 1, 1, -1], 2, 2).unwrap();
        r.set_transform(GeoTransform::new(-70.6, -33.4, 0.05, -0.05));
        r.set_nodata(Some(-1));
        r
    }

    #[test]
    fn page_carries_overlay_and_legend() {
        let region = create_region(-70.6, -33.5, -70.5, -33.4).unwrap();
        let palette = kelly_palette(2).unwrap();
        let html = render_cluster_map(&labels(), &palette, &region, &ClusterMapOptions::for_k(2, 11)).unwrap();

        assert!(html.contains("<title>K=2 clusters</title>"));
        assert!(html.contains("\"layerName\":\"K=2 clusters\""));
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("World_Imagery"));
        assert!(html.contains("\"zoom\":11"));
        assert!(html.contains("L.control.scale()"));
        assert!(html.contains("Cluster 0") && html.contains("Cluster 1"));
        assert!(html.contains("#F3C300"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn script_blocks_cannot_be_closed_early() {
        let region = create_region(0.0, 0.0, 1.0, 1.0).unwrap();
        let options = ClusterMapOptions {
            zoom_start: 5,
            layer_name: "</script><b>".into(),
        };
        let html = render_cluster_map(&labels(), &[], &region, &options).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("<title>&lt;/script&gt;&lt;b&gt;</title>"));
    }
}
