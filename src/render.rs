//! Read-only projections for the map UI: marker popup and sidebar list.
//!
//! Sentinel values are shown inline ("Unknown", "N/A") rather than hidden.
//! Everything that reaches HTML is escaped; captions are user input and
//! descriptions come from crowd-sourced data.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::annotation::{Annotation, AnnotationId, PlaceInfo, Status, WeatherReport, NOT_AVAILABLE};
use crate::units::{c_to_f, kph_to_mph, one_decimal};

pub const LOADING_TEXT: &str = "Loading more info 👀...";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PopupBody {
    Loading,
    Failed {
        message: String,
    },
    Ready {
        weather_lines: Vec<String>,
        place: Option<PlacePanel>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacePanel {
    pub title: String,
    pub population_line: String,
    pub image_url: Option<String>,
    pub description: String,
    pub distance_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupView {
    pub id: AnnotationId,
    pub caption: String,
    /// "city, state"
    pub locality: String,
    pub country: String,
    pub body: PopupBody,
}

impl PopupView {
    pub fn from_annotation(a: &Annotation) -> Self {
        let (locality, country) = match &a.location_summary {
            Some(s) => (format!("{}, {}", s.city, s.state), s.country.clone()),
            None => (String::new(), String::new()),
        };

        let body = match a.status {
            Status::Pending => PopupBody::Loading,
            Status::Failed => PopupBody::Failed {
                message: a
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "Could not load more info.".to_string()),
            },
            Status::Ready => PopupBody::Ready {
                weather_lines: a.weather.as_ref().map(weather_lines).unwrap_or_default(),
                place: a.place_info.as_ref().map(place_panel),
            },
        };

        Self {
            id: a.id,
            caption: a.caption.clone(),
            locality,
            country,
            body,
        }
    }

    /// HTML fragment for a map popup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("<strong>{}</strong><br/>", encode_text(&self.caption)));
        if !self.locality.is_empty() {
            out.push_str(&format!(
                "{}<br/>{}<br/>",
                encode_text(&self.locality),
                encode_text(&self.country)
            ));
        }

        match &self.body {
            PopupBody::Loading => {
                out.push_str(&format!(
                    "<div class=\"loading\"><div class=\"spinner\"></div><em>{}</em></div>",
                    encode_text(LOADING_TEXT)
                ));
            }
            PopupBody::Failed { message } => {
                out.push_str(&format!(
                    "<div class=\"error\">{}</div>",
                    encode_text(message)
                ));
            }
            PopupBody::Ready {
                weather_lines,
                place,
            } => {
                for line in weather_lines {
                    out.push_str(&format!("{}<br/>", encode_text(line)));
                }
                if let Some(p) = place {
                    out.push_str(&format!("{}<br/><br/>", encode_text(&p.population_line)));
                    if let Some(img) = &p.image_url {
                        out.push_str(&format!(
                            "<img src=\"{}\" alt=\"{}\" width=\"150\" /><br/>",
                            encode_double_quoted_attribute(img),
                            encode_double_quoted_attribute(&p.title)
                        ));
                    }
                    out.push_str(&format!("{}<br/>", encode_text(&p.description)));
                    if let Some(d) = &p.distance_line {
                        out.push_str(&format!("<small>{}</small><br/>", encode_text(d)));
                    }
                }
            }
        }
        out
    }
}

/// Weather lines in display units (°F, mph).
pub fn weather_lines(w: &WeatherReport) -> Vec<String> {
    match w {
        WeatherReport::Current {
            temperature_c,
            wind_speed_kph,
            description,
        } => vec![
            format!("Temp: {}°F", one_decimal(c_to_f(*temperature_c))),
            format!("Windspeed: {}mph", one_decimal(kph_to_mph(*wind_speed_kph))),
            format!("Weather: {description}"),
        ],
        WeatherReport::Historical {
            date,
            max_temp_c,
            min_temp_c,
        } => vec![
            format!("Date: {}", pretty_date(date)),
            format!("High: {}", temp_or_na(*max_temp_c)),
            format!("Low: {}", temp_or_na(*min_temp_c)),
        ],
        WeatherReport::Unavailable => vec![
            format!("Temp: {NOT_AVAILABLE}"),
            format!("Windspeed: {NOT_AVAILABLE}"),
            format!("Weather: {NOT_AVAILABLE}"),
        ],
    }
}

fn temp_or_na(c: Option<f64>) -> String {
    match c {
        Some(c) => format!("{}°F", one_decimal(c_to_f(c))),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// `YYYYMMDD` → `YYYY-MM-DD`; anything else passes through.
fn pretty_date(key: &str) -> String {
    if key.len() == 8 && key.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &key[0..4], &key[4..6], &key[6..8])
    } else {
        key.to_string()
    }
}

fn place_panel(p: &PlaceInfo) -> PlacePanel {
    PlacePanel {
        title: p.title.clone(),
        population_line: format!("Population: {}", p.population),
        image_url: p.image_url.clone(),
        description: p.description.clone(),
        distance_line: p
            .distance_km
            .map(|d| format!("{} is {:.2} km away", p.title, d)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidebarEntry {
    pub id: AnnotationId,
    pub label: String,
    pub status: Status,
}

/// Sidebar rows `"{city}, {state} : {caption}"` in insertion order. Hidden
/// (empty) once the session is finished.
pub fn sidebar_entries(annotations: &[Annotation], session_finished: bool) -> Vec<SidebarEntry> {
    if session_finished {
        return Vec::new();
    }
    annotations
        .iter()
        .map(|a| {
            let label = match &a.location_summary {
                Some(s) => format!("{}, {} : {}", s.city, s.state, a.caption),
                None => a.caption.clone(),
            };
            SidebarEntry {
                id: a.id,
                label,
                status: a.status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Coordinate, EnrichmentPatch, LocationSummary};

    fn annotation(caption: &str) -> Annotation {
        Annotation::pending(
            AnnotationId(7),
            Coordinate::new(43.0, -71.4).unwrap(),
            caption.into(),
            Some(LocationSummary {
                city: "Manchester".into(),
                state: "New Hampshire".into(),
                country: "United States".into(),
                postcode: "03101".into(),
            }),
        )
    }

    #[test]
    fn pending_popup_shows_loading() {
        let v = PopupView::from_annotation(&annotation("Diner"));
        assert_eq!(v.body, PopupBody::Loading);
        assert_eq!(v.locality, "Manchester, New Hampshire");
        assert!(v.to_html().contains("Loading more info"));
    }

    #[test]
    fn failed_popup_shows_stored_message() {
        let mut a = annotation("Diner");
        a.apply(EnrichmentPatch::Failed {
            reason: "You appear to be offline.".into(),
        });
        let html = PopupView::from_annotation(&a).to_html();
        assert!(html.contains("<div class=\"error\">You appear to be offline.</div>"));
    }

    #[test]
    fn ready_popup_converts_units_and_keeps_sentinels() {
        let mut a = annotation("Diner");
        a.apply(EnrichmentPatch::Ready {
            weather: WeatherReport::Current {
                temperature_c: 20.0,
                wind_speed_kph: 10.0,
                description: "Overcast ☁️".into(),
            },
            place_info: PlaceInfo::no_match(),
        });
        let v = PopupView::from_annotation(&a);
        let PopupBody::Ready {
            weather_lines,
            place,
        } = &v.body
        else {
            panic!("expected ready body");
        };
        assert_eq!(weather_lines[0], "Temp: 68.0°F");
        assert_eq!(weather_lines[1], "Windspeed: 6.2mph");
        assert_eq!(weather_lines[2], "Weather: Overcast ☁️");
        let place = place.as_ref().unwrap();
        assert_eq!(place.population_line, "Population: Unknown");
        assert_eq!(place.description, "No info found");
    }

    #[test]
    fn historical_missing_values_render_na() {
        let lines = weather_lines(&WeatherReport::Historical {
            date: "20240310".into(),
            max_temp_c: None,
            min_temp_c: Some(0.0),
        });
        assert_eq!(lines, vec!["Date: 2024-03-10", "High: N/A", "Low: 32.0°F"]);
    }

    #[test]
    fn html_is_escaped() {
        let mut a = annotation("<script>alert(1)</script>");
        a.apply(EnrichmentPatch::Ready {
            weather: WeatherReport::Unavailable,
            place_info: PlaceInfo {
                image_url: Some("http://x/\"onerror=\"y.jpg".into()),
                ..PlaceInfo::no_match()
            },
        });
        let html = PopupView::from_annotation(&a).to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("\"onerror=\""));
        assert!(html.contains("Temp: N/A"));
    }

    #[test]
    fn sidebar_labels_and_finish_hides() {
        let list = vec![annotation("Diner")];
        let rows = sidebar_entries(&list, false);
        assert_eq!(rows[0].label, "Manchester, New Hampshire : Diner");
        assert!(sidebar_entries(&list, true).is_empty());
    }
}
