use serde::Serialize;
use serde_json::{Value, json};

pub const BLUE: &str = "#5091cc";
pub const GRAY: &str = "#BDBDBD";
pub const DARK_GRAY: &str = "#616161";
pub const LIGHT_GRAY: &str = "#F5F5F5";
pub const LIGHT_GREEN: &str = "#C5E1A5";
pub const DARK_GREEN: &str = "#558B2F";

pub const CUSTOM_HOVER: &str = "%{customdata[0]}<extra></extra>";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    pub fn new(data: Vec<Value>, layout: Value) -> Self {
        let mut layout = layout;
        merge_missing(&mut layout, &house_style());
        Self { data, layout }
    }

    pub fn with_zero_line(mut self) -> Self {
        let line = json!({
            "type": "line",
            "xref": "paper",
            "yref": "y",
            "x0": 0,
            "y0": 0,
            "x1": 1,
            "y1": 0,
            "line": {"color": "grey", "width": 1},
        });
        if let Some(layout) = self.layout.as_object_mut() {
            let shapes = layout.entry("shapes").or_insert_with(|| json!([]));
            if let Some(shapes) = shapes.as_array_mut() {
                shapes.push(line);
            }
        }
        self
    }
}

fn house_style() -> Value {
    let axis = json!({
        "title": {"font": {"size": 16, "color": "black"}},
        "tickfont": {"size": 14},
    });
    json!({
        "font": {"family": "Roboto", "color": "black"},
        "title": {"font": {"size": 20}},
        "hoverlabel": {"align": "right", "font": {"family": "Roboto"}},
        "plot_bgcolor": "white",
        "paper_bgcolor": "white",
        "width": 800,
        "height": 600,
        "xaxis": axis.clone(),
        "yaxis": axis,
    })
}

fn merge_missing(target: &mut Value, defaults: &Value) {
    let (Some(target), Some(defaults)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };
    for (key, default) in defaults {
        match target.get_mut(key) {
            Some(existing) if existing.is_object() => merge_missing(existing, default),
            Some(_) => {}
            None => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

pub fn gain_color(value: f64) -> &'static str {
    if value > 0.0 { DARK_GREEN } else { GRAY }
}

pub fn reduction_color(value: f64) -> &'static str {
    if value < 0.0 { DARK_GREEN } else { GRAY }
}

pub fn hover_data(labels: &[String]) -> Value {
    Value::Array(labels.iter().map(|label| json!([label])).collect())
}
