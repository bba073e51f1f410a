//! Style options for the preview and exported documents
//!
//! [`StyleOptions`] is the fixed option schema with its defaults.
//! [`StyleStore`] owns one instance plus the input bindings that edit it;
//! raw input text is coerced by the binding's [`InputKind`] and the new value
//! is mirrored to every other binding of the same option.

use crate::error::{StyleError, StyleResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number regex")
});

/// A single option value
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Number(n) => write!(f, "{}", n),
            StyleValue::Bool(b) => write!(f, "{}", b),
            StyleValue::Text(s) => f.write_str(s),
        }
    }
}

/// How an input control produces its raw text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Number,
    Checkbox,
    Text,
    /// Native color picker
    Color,
    /// Hex text field paired with a color picker
    ColorHex,
}

impl InputKind {
    pub fn is_color(self) -> bool {
        matches!(self, InputKind::Color | InputKind::ColorHex)
    }
}

/// Schema entry for one option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: InputKind,
}

trait OptionValue: Sized {
    const EXPECTED: &'static str;
    fn to_value(&self) -> StyleValue;
    fn from_value(name: &str, value: StyleValue) -> StyleResult<Self>;
}

impl OptionValue for f64 {
    const EXPECTED: &'static str = "number";

    fn to_value(&self) -> StyleValue {
        StyleValue::Number(*self)
    }

    fn from_value(name: &str, value: StyleValue) -> StyleResult<Self> {
        match value {
            StyleValue::Number(n) => Ok(n),
            _ => Err(StyleError::TypeMismatch {
                name: name.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl OptionValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn to_value(&self) -> StyleValue {
        StyleValue::Bool(*self)
    }

    fn from_value(name: &str, value: StyleValue) -> StyleResult<Self> {
        match value {
            StyleValue::Bool(b) => Ok(b),
            _ => Err(StyleError::TypeMismatch {
                name: name.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl OptionValue for String {
    const EXPECTED: &'static str = "text";

    fn to_value(&self) -> StyleValue {
        StyleValue::Text(self.clone())
    }

    fn from_value(name: &str, value: StyleValue) -> StyleResult<Self> {
        match value {
            StyleValue::Text(s) => Ok(s),
            _ => Err(StyleError::TypeMismatch {
                name: name.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

/// Rendering options read by the stylesheet generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct StyleOptions {
    pub body_font: String,
    pub body_font_size: f64,
    pub line_height: f64,
    pub body_padding: f64,
    pub body_margin: f64,

    pub pre_background: String,
    pub pre_border_radius: f64,
    pub pre_margin: f64,

    pub code_font: String,
    pub code_background: String,
    pub code_padding: f64,
    pub code_color: String,
    pub code_border_radius: f64,

    pub img_max_width: f64,

    pub table_border_collapse: String,
    pub table_width: f64,
    pub table_margin: f64,
    pub th_border: String,
    pub th_padding: f64,
    pub th_background_color: String,
    pub td_border: String,
    pub td_padding: f64,

    pub blockquote_border_left: String,
    pub blockquote_padding_left: f64,
    pub blockquote_margin_left: f64,
    pub blockquote_color: String,

    pub h1_size: f64,
    pub h1_color: String,
    pub h1_margin_top: f64,
    pub h1_border_bottom: String,
    pub h1_margin_bottom: f64,
    pub h2_size: f64,
    pub h2_color: String,
    pub h2_margin_top: f64,
    pub h2_margin_bottom: f64,
    pub h3_size: f64,
    pub h3_color: String,
    pub h3_margin_top: f64,
    pub h3_margin_bottom: f64,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            body_font: "Barlow, sans-serif".to_string(),
            body_font_size: 16.0,
            line_height: 1.6,
            body_padding: 20.0,
            body_margin: 0.0,

            pre_background: "#2d2d2d".to_string(),
            pre_border_radius: 4.0,
            pre_margin: 8.0,

            code_font: "Menlo, 'SFMono-Regular', Consolas, 'Courier New', monospace".to_string(),
            code_background: "#f0f0f0".to_string(),
            code_padding: 4.0,
            code_color: "#1f8f31".to_string(),
            code_border_radius: 3.0,

            img_max_width: 100.0,

            table_border_collapse: "collapse".to_string(),
            table_width: 100.0,
            table_margin: 16.0,
            th_border: "1px solid #ddd".to_string(),
            th_padding: 8.0,
            th_background_color: "#f4f4f4".to_string(),
            td_border: "1px solid #ddd".to_string(),
            td_padding: 8.0,

            blockquote_border_left: "4px solid #ddd".to_string(),
            blockquote_padding_left: 16.0,
            blockquote_margin_left: 0.0,
            blockquote_color: "#666666".to_string(),

            h1_size: 2.2,
            h1_color: "#2c3e50".to_string(),
            h1_margin_top: 0.0,
            h1_border_bottom: "2px solid #eee".to_string(),
            h1_margin_bottom: 24.0,
            h2_size: 1.8,
            h2_color: "#34495e".to_string(),
            h2_margin_top: 0.0,
            h2_margin_bottom: 24.0,
            h3_size: 1.4,
            h3_color: "#455a64".to_string(),
            h3_margin_top: 0.0,
            h3_margin_bottom: 16.0,
        }
    }
}

macro_rules! style_schema {
    ($($field:ident => $name:literal : $kind:ident,)*) => {
        /// Every option name with the input kind that edits it
        pub const STYLE_SCHEMA: &[OptionSpec] = &[
            $(OptionSpec { name: $name, kind: InputKind::$kind },)*
        ];

        impl StyleOptions {
            /// Current value of an option
            pub fn get(&self, name: &str) -> Option<StyleValue> {
                match name {
                    $($name => Some(self.$field.to_value()),)*
                    _ => None,
                }
            }

            /// Replace an option value; the value must match the option type
            pub fn set(&mut self, name: &str, value: StyleValue) -> StyleResult<()> {
                match name {
                    $($name => self.$field = OptionValue::from_value(name, value)?,)*
                    _ => return Err(StyleError::UnknownOption(name.to_string())),
                }
                Ok(())
            }
        }
    };
}

style_schema! {
    body_font => "bodyFont": Text,
    body_font_size => "bodyFontSize": Number,
    line_height => "lineHeight": Number,
    body_padding => "bodyPadding": Number,
    body_margin => "bodyMargin": Number,
    pre_background => "preBackground": Color,
    pre_border_radius => "preBorderRadius": Number,
    pre_margin => "preMargin": Number,
    code_font => "codeFont": Text,
    code_background => "codeBackground": Color,
    code_padding => "codePadding": Number,
    code_color => "codeColor": Color,
    code_border_radius => "codeBorderRadius": Number,
    img_max_width => "imgMaxWidth": Number,
    table_border_collapse => "tableBorderCollapse": Text,
    table_width => "tableWidth": Number,
    table_margin => "tableMargin": Number,
    th_border => "thBorder": Text,
    th_padding => "thPadding": Number,
    th_background_color => "thBackgroundColor": Color,
    td_border => "tdBorder": Text,
    td_padding => "tdPadding": Number,
    blockquote_border_left => "blockquoteBorderLeft": Text,
    blockquote_padding_left => "blockquotePaddingLeft": Number,
    blockquote_margin_left => "blockquoteMarginLeft": Number,
    blockquote_color => "blockquoteColor": Color,
    h1_size => "h1Size": Number,
    h1_color => "h1Color": Color,
    h1_margin_top => "h1MarginTop": Number,
    h1_border_bottom => "h1BorderBottom": Text,
    h1_margin_bottom => "h1MarginBottom": Number,
    h2_size => "h2Size": Number,
    h2_color => "h2Color": Color,
    h2_margin_top => "h2MarginTop": Number,
    h2_margin_bottom => "h2MarginBottom": Number,
    h3_size => "h3Size": Number,
    h3_color => "h3Color": Color,
    h3_margin_top => "h3MarginTop": Number,
    h3_margin_bottom => "h3MarginBottom": Number,
}

impl StyleOptions {
    /// Parse options from JSON; missing keys keep defaults, unknown keys fail
    pub fn from_json(raw: &str) -> StyleResult<Self> {
        serde_json::from_str(raw).map_err(|e| StyleError::UnknownOption(e.to_string()))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&raw)?)
    }

    pub fn spec(name: &str) -> Option<OptionSpec> {
        STYLE_SCHEMA.iter().find(|spec| spec.name == name).copied()
    }
}

/// Canonicalize a 3 or 6 digit hex color to uppercase `#RRGGBB`
///
/// Empty input yields an empty string. Anything else that is not a hex run
/// of length 3 or 6 (after trimming and one optional leading `#`) is
/// returned unchanged.
pub fn normalize_hex(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return value.to_string();
    }
    match digits.len() {
        3 => {
            let mut out = String::with_capacity(7);
            out.push('#');
            for c in digits.chars() {
                let c = c.to_ascii_uppercase();
                out.push(c);
                out.push(c);
            }
            out
        }
        6 => format!("#{}", digits.to_ascii_uppercase()),
        _ => value.to_string(),
    }
}

/// Whether a value is already in `#RRGGBB` form
pub fn is_canonical_hex(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

/// Coerce raw input text by input kind
pub fn coerce(name: &str, kind: InputKind, raw: &str) -> StyleResult<StyleValue> {
    match kind {
        InputKind::Number => NUMBER_PREFIX
            .find(raw)
            .and_then(|m| m.as_str().trim().parse::<f64>().ok())
            .map(StyleValue::Number)
            .ok_or_else(|| StyleError::InvalidNumber {
                name: name.to_string(),
                raw: raw.to_string(),
            }),
        InputKind::Checkbox => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "checked" => Ok(StyleValue::Bool(true)),
            "false" | "off" | "0" | "" => Ok(StyleValue::Bool(false)),
            _ => Err(StyleError::InvalidToggle {
                name: name.to_string(),
                raw: raw.to_string(),
            }),
        },
        InputKind::Text => Ok(StyleValue::Text(raw.to_string())),
        InputKind::Color | InputKind::ColorHex => {
            let normalized = normalize_hex(raw);
            if is_canonical_hex(&normalized) {
                Ok(StyleValue::Text(normalized))
            } else {
                Err(StyleError::InvalidColor {
                    name: name.to_string(),
                    raw: raw.to_string(),
                })
            }
        }
    }
}

/// Identifier of a bound input
pub type BindingId = usize;

/// One input control bound to an option
#[derive(Debug, Clone, PartialEq)]
pub struct InputBinding {
    pub name: String,
    pub kind: InputKind,
    /// Text currently displayed by the control
    pub display: String,
}

/// Owns the style options and the inputs that edit them
#[derive(Debug, Clone, Default)]
pub struct StyleStore {
    options: StyleOptions,
    bindings: Vec<InputBinding>,
    revision: u64,
}

impl StyleStore {
    pub fn new(options: StyleOptions) -> Self {
        Self {
            options,
            bindings: Vec::new(),
            revision: 0,
        }
    }

    pub fn options(&self) -> &StyleOptions {
        &self.options
    }

    /// Incremented on every committed change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, name: &str) -> Option<StyleValue> {
        self.options.get(name)
    }

    /// Register an input for an option, seeded with the current value
    pub fn bind(&mut self, name: &str, kind: InputKind) -> StyleResult<BindingId> {
        let value = self
            .options
            .get(name)
            .ok_or_else(|| StyleError::UnknownOption(name.to_string()))?;
        self.bindings.push(InputBinding {
            name: name.to_string(),
            kind,
            display: value.to_string(),
        });
        Ok(self.bindings.len() - 1)
    }

    pub fn binding(&self, id: BindingId) -> Option<&InputBinding> {
        self.bindings.get(id)
    }

    /// Handle an input event from a bound control
    pub fn input(&mut self, id: BindingId, raw: &str) -> StyleResult<StyleValue> {
        let binding = self
            .bindings
            .get(id)
            .ok_or(StyleError::UnknownBinding(id))?;
        let name = binding.name.clone();
        let kind = binding.kind;
        self.set(&name, kind, raw)
    }

    /// Coerce and commit a raw value, syncing every binding of the option
    pub fn set(&mut self, name: &str, kind: InputKind, raw: &str) -> StyleResult<StyleValue> {
        if self.options.get(name).is_none() {
            return Err(StyleError::UnknownOption(name.to_string()));
        }
        let value = coerce(name, kind, raw)?;
        self.set_value(name, value.clone())?;
        Ok(value)
    }

    /// Commit an already-typed value
    pub fn set_value(&mut self, name: &str, value: StyleValue) -> StyleResult<()> {
        let display = value.to_string();
        self.options.set(name, value)?;
        for binding in self.bindings.iter_mut().filter(|b| b.name == name) {
            binding.display = display.clone();
        }
        self.revision += 1;
        log::debug!("Style option {} = {}", name, display);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_every_default() {
        let options = StyleOptions::default();
        assert_eq!(STYLE_SCHEMA.len(), 39);
        for spec in STYLE_SCHEMA {
            assert!(options.get(spec.name).is_some(), "{}", spec.name);
        }
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json.as_object().unwrap().len(), STYLE_SCHEMA.len());
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex(""), "");
        assert_eq!(normalize_hex("#abc"), "#AABBCC");
        assert_eq!(normalize_hex("abc"), "#AABBCC");
        assert_eq!(normalize_hex(" 1f8f31 "), "#1F8F31");
        assert_eq!(normalize_hex("#1F8F31"), "#1F8F31");
        assert_eq!(normalize_hex("#ZZZ"), "#ZZZ");
        assert_eq!(normalize_hex("#abcd"), "#abcd");
        assert_eq!(normalize_hex("red"), "red");
    }

    #[test]
    fn test_normalize_hex_is_idempotent() {
        for raw in ["#abc", "ABCDEF", "#12", "#ZZZ", "  #0a0B0c"] {
            let once = normalize_hex(raw);
            assert_eq!(normalize_hex(&once), once);
        }
    }

    #[test]
    fn test_coerce_number_prefix() {
        assert_eq!(
            coerce("bodyFontSize", InputKind::Number, "18px").unwrap(),
            StyleValue::Number(18.0)
        );
        assert_eq!(
            coerce("lineHeight", InputKind::Number, " .5").unwrap(),
            StyleValue::Number(0.5)
        );
        assert!(matches!(
            coerce("lineHeight", InputKind::Number, "abc"),
            Err(StyleError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_out_of_range_number_accepted() {
        let mut store = StyleStore::default();
        store.set("bodyFontSize", InputKind::Number, "-400").unwrap();
        assert_eq!(store.options().body_font_size, -400.0);
    }

    #[test]
    fn test_invalid_color_leaves_store_unchanged() {
        let mut store = StyleStore::default();
        store.set("codeColor", InputKind::ColorHex, "#0f0").unwrap();
        let revision = store.revision();

        let err = store.set("codeColor", InputKind::ColorHex, "#ZZZ").unwrap_err();
        assert!(matches!(err, StyleError::InvalidColor { .. }));
        assert_eq!(store.options().code_color, "#00FF00");
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_color_bindings_stay_in_sync() {
        let mut store = StyleStore::default();
        let picker = store.bind("h1Color", InputKind::Color).unwrap();
        let hex = store.bind("h1Color", InputKind::ColorHex).unwrap();
        let other = store.bind("h2Color", InputKind::ColorHex).unwrap();
        assert_eq!(store.binding(hex).unwrap().display, "#2c3e50");

        store.input(hex, "abc").unwrap();
        assert_eq!(store.binding(picker).unwrap().display, "#AABBCC");
        assert_eq!(store.binding(hex).unwrap().display, "#AABBCC");
        assert_eq!(store.binding(other).unwrap().display, "#34495e");
        assert_eq!(store.options().h1_color, "#AABBCC");
    }

    #[test]
    fn test_type_mismatch_and_unknown_option() {
        let mut store = StyleStore::default();
        assert!(matches!(
            store.set("bodyFont", InputKind::Number, "12"),
            Err(StyleError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.set("fontWeight", InputKind::Text, "bold"),
            Err(StyleError::UnknownOption(_))
        ));
        assert!(matches!(
            store.input(42, "x"),
            Err(StyleError::UnknownBinding(42))
        ));
    }

    #[test]
    fn test_options_from_json() {
        let options = StyleOptions::from_json(r##"{"bodyFontSize": 18, "h1Color": "#000000"}"##)
            .unwrap();
        assert_eq!(options.body_font_size, 18.0);
        assert_eq!(options.h1_color, "#000000");
        assert_eq!(options.line_height, 1.6);
        assert!(StyleOptions::from_json(r#"{"fontWeight": "bold"}"#).is_err());
    }
}
