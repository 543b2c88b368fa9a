//! HTML fragments for component categories and flight weather
//!
//! Icons are Material Design Icons class names (`mdi-*`). All functions are
//! total: unknown inputs fall back to a generic rendering.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::models::ComponentCategory;

/// Icon used for category names outside the known table
pub const GENERIC_CATEGORY_ICON: &str = "mdi-cogs";

/// Icon and display label of a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBadge {
    pub icon: &'static str,
    pub label: String,
}

impl CategoryBadge {
    pub fn to_html(&self) -> String {
        format!(
            r#"<span class="mdi {}"></span><span>{}</span>"#,
            self.icon,
            escape_html(&self.label)
        )
    }
}

static CATEGORY_BADGES: Lazy<HashMap<&'static str, (&'static str, &'static str)>> =
    Lazy::new(|| {
        HashMap::from([
            ("Hélice", ("mdi-fan", "Hélice")),
            ("Batterie", ("mdi-battery-outline", "Batterie")),
            ("Moteur", ("mdi-cog-outline", "Moteur")),
            (
                "ESC (contrôleur de puissance moteur)",
                ("mdi-car-cruise-control", "ESC"),
            ),
            ("Caméra", ("mdi-video-outline", "Caméra")),
            ("VTX (transmetteur vidéo)", ("mdi-video-wireless-outline", "VTX")),
            ("Récepteur Vidéo", ("mdi-camera-wireless-outline", "VRX")),
            ("Télécommande", ("mdi-controller-classic-outline", "Télécommande")),
            (
                "Récepteur télémétrie",
                ("mdi-home-thermometer-outline", "Télémétrie sol"),
            ),
            ("Module de radio commande", ("mdi-antenna", "radio commande")),
            (
                "Distributeur de puissance",
                ("mdi-power-plug-outline", "Distributeur de puissance"),
            ),
            ("Module de Télémétrie", ("mdi-router-wireless", "Module Telemétrie")),
            ("Controleur de vol", ("mdi-chip", "radio commande")),
            ("Cadre", ("mdi-quadcopter", "Cadre")),
        ])
    });

/// Badge for a category name
pub fn render_name(name: &str) -> CategoryBadge {
    match CATEGORY_BADGES.get(name) {
        Some(&(icon, label)) => CategoryBadge {
            icon,
            label: label.to_string(),
        },
        None => CategoryBadge {
            icon: GENERIC_CATEGORY_ICON,
            label: name.to_string(),
        },
    }
}

/// Icon of the airborne (`true`) or ground (`false`) flag
pub fn on_board_icon(on_board: bool) -> &'static str {
    if on_board {
        "mdi-upload"
    } else {
        "mdi-download"
    }
}

pub fn render_on_board(on_board: bool) -> String {
    format!(r#"<span class="mdi {}"></span>"#, on_board_icon(on_board))
}

/// Name badge followed by the on-board icon
pub fn render_all(category: &ComponentCategory) -> String {
    render_name(&category.name).to_html() + &render_on_board(category.on_board)
}

fn cover_icon(couverture: &str) -> Option<&'static str> {
    match couverture {
        "ensoleillé" | "dégagé" => Some("mdi-weather-sunny"),
        "partiellement couvert" => Some("mdi-weather-partly-cloudy"),
        "couvert" => Some("mdi-weather-cloudy"),
        "brumeux" => Some("mdi-weather-hazy"),
        "brouillard" => Some("mdi-weather-fog"),
        _ => None,
    }
}

fn meteo_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Weather block of a flight
///
/// No `couverture` renders as sunny; an unknown one shows the raw text next
/// to an alert icon.
pub fn render_meteo(meteo: &Map<String, Value>) -> String {
    let mut html = String::from("<div class=\"meteo\">\n");
    html.push_str("  <span class=\"mdi mdi-weather-windy-variant\"></span>");
    html.push_str("  <div class=\"meteo_couverture\">Météo: ");

    match meteo.get("couverture").map(meteo_text) {
        Some(couverture) => match cover_icon(&couverture) {
            Some(icon) => html.push_str(&format!("<span class=\"mdi {}\"></span>\n", icon)),
            None => html.push_str(&format!(
                "<span class=\"mdi mdi-weather-cloudy-alert\">{}</span>\n",
                escape_html(&couverture)
            )),
        },
        None => html.push_str("<span class=\"mdi mdi-weather-sunny\"></span>\n"),
    }
    html.push_str("  </div>\n");

    if let Some(force) = meteo.get("force_vent") {
        html.push_str("  <div class=\"meteo_force_vent\"> ");
        html.push_str("<span class=\"mdi mdi-weather-windy\"></span>");
        html.push_str(&format!("<span>{}</span>", escape_html(&meteo_text(force))));
        html.push_str("  </div>\n");
    }
    if let Some(direction) = meteo.get("direction_vent") {
        html.push_str("  <div class=\"meteo_direction_vent\">");
        html.push_str("<span class=\"mdi mdi-compass-rose\"></span>");
        html.push_str(&format!("<span>{}</span>", escape_html(&meteo_text(direction))));
        html.push_str("  </div>\n");
    }

    html.push_str("</div>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn meteo(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_known_names() {
        assert_eq!(
            render_name("Hélice"),
            CategoryBadge {
                icon: "mdi-fan",
                label: "Hélice".into()
            }
        );
        assert_eq!(render_name("Batterie").icon, "mdi-battery-outline");
        assert_eq!(render_name("Récepteur Vidéo").label, "VRX");
        assert_eq!(render_name("ESC (contrôleur de puissance moteur)").label, "ESC");
        assert_eq!(CATEGORY_BADGES.len(), 14);
    }

    #[test]
    fn test_unknown_name_falls_back() {
        assert_eq!(
            render_name("Gyroscope"),
            CategoryBadge {
                icon: GENERIC_CATEGORY_ICON,
                label: "Gyroscope".into()
            }
        );
    }

    #[test]
    fn test_render_all() {
        let category = ComponentCategory::new("Télécommande", false);
        assert_eq!(
            render_all(&category),
            r#"<span class="mdi mdi-controller-classic-outline"></span><span>Télécommande</span><span class="mdi mdi-download"></span>"#
        );
        assert_eq!(render_on_board(true), r#"<span class="mdi mdi-upload"></span>"#);
    }

    #[test]
    fn test_badge_html_escapes_label() {
        let html = render_name("<b>Gyro</b>").to_html();
        assert!(html.contains("<span>&lt;b&gt;Gyro&lt;/b&gt;</span>"));
    }

    #[test]
    fn test_meteo_without_cover_is_sunny() {
        let html = render_meteo(&Map::new());
        assert!(html.contains("mdi-weather-sunny"));
        assert!(!html.contains("meteo_force_vent"));
        assert!(!html.contains("meteo_direction_vent"));
    }

    #[test]
    fn test_meteo_cover_and_wind() {
        let html = render_meteo(&meteo(json!({
            "couverture": "partiellement couvert",
            "force_vent": "15 km/h",
            "direction_vent": "NO"
        })));
        assert!(html.contains("mdi-weather-partly-cloudy"));
        assert!(html.contains(r#"<span class="mdi mdi-weather-windy"></span><span>15 km/h</span>"#));
        assert!(html.contains(r#"<span class="mdi mdi-compass-rose"></span><span>NO</span>"#));
    }

    #[test]
    fn test_meteo_unknown_cover_shows_text() {
        let html = render_meteo(&meteo(json!({"couverture": "orageux"})));
        assert!(html.contains(r#"<span class="mdi mdi-weather-cloudy-alert">orageux</span>"#));
    }

    proptest! {
        /// Any name outside the table keeps its own text as label
        #[test]
        fn property_render_name_total(name in "\\PC{0,40}") {
            let badge = render_name(&name);
            if CATEGORY_BADGES.contains_key(name.as_str()) {
                prop_assert_ne!(badge.icon, GENERIC_CATEGORY_ICON);
            } else {
                prop_assert_eq!(badge.icon, GENERIC_CATEGORY_ICON);
                prop_assert_eq!(badge.label, name);
            }
        }

        #[test]
        fn property_render_meteo_total(couverture in proptest::option::of("\\PC{0,20}")) {
            let mut map = Map::new();
            if let Some(c) = couverture {
                map.insert("couverture".into(), Value::String(c));
            }
            let html = render_meteo(&map);
            prop_assert!(html.starts_with("<div class=\"meteo\">"));
            prop_assert!(html.ends_with("</div>\n"));
        }
    }
}
