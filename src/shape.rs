//! Shape records, property changes, and the factory that builds new shapes.
//!
//! DESIGN
//! ======
//! A `Shape` is the durable unit of board state. Its `kind` is fixed at
//! creation and its geometry variant must always match that kind; every
//! other field is mutable through `PropertyChange`. Property values are
//! normalized into typed form at the wire boundary, so equality checks in
//! the store compare meaning rather than encoding.

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ErrorCode;

/// Unique identifier for a shape record.
pub type ObjectId = Uuid;

// =============================================================================
// DEFAULTS
// =============================================================================

pub const DEFAULT_FILL: &str = "#2d2e2d";
pub const DEFAULT_SIZE: f64 = 100.0;
pub const DEFAULT_RADIUS: f64 = 50.0;
pub const DEFAULT_LINE_STROKE_WIDTH: f64 = 2.0;
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";
pub const DEFAULT_FONT_SIZE: f64 = 36.0;
pub const DEFAULT_FONT_WEIGHT: &str = "400";
pub const TEXT_PLACEHOLDER: &str = "Tap to Type";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("unrecognized shape kind: {0}")]
    UnrecognizedKind(String),
    #[error("malformed {kind}: {reason}")]
    Malformed { kind: ShapeKind, reason: &'static str },
    #[error("property {property} does not apply to {kind}")]
    Inapplicable { kind: ShapeKind, property: &'static str },
}

impl ErrorCode for ShapeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnrecognizedKind(_) => "E_UNRECOGNIZED_KIND",
            Self::Malformed { .. } => "E_MALFORMED_SHAPE",
            Self::Inapplicable { .. } => "E_INAPPLICABLE_PROPERTY",
        }
    }
}

// =============================================================================
// KIND
// =============================================================================

/// The kind of a shape. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Triangle,
    Circle,
    /// Straight segment between exactly two endpoints.
    Line,
    /// Free-form path captured from continuous pointer input.
    Freeform,
    Text,
}

impl ShapeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Triangle => "triangle",
            Self::Circle => "circle",
            Self::Line => "line",
            Self::Freeform => "freeform",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeKind {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rectangle" => Ok(Self::Rectangle),
            "triangle" => Ok(Self::Triangle),
            "circle" => Ok(Self::Circle),
            "line" => Ok(Self::Line),
            "freeform" => Ok(Self::Freeform),
            "text" => Ok(Self::Text),
            other => Err(ShapeError::UnrecognizedKind(other.to_string())),
        }
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// A point in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Kind-specific geometry. Segment and path points are relative to the
/// shape's origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Geometry {
    Sized { width: f64, height: f64 },
    Round { radius: f64 },
    Segment { points: [Point; 2] },
    Path { points: Vec<Point> },
    Text { content: String },
}

/// Accumulated scale and rotation applied on top of the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    /// Clockwise rotation in degrees.
    pub angle: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0, angle: 0.0 }
    }
}

/// Typography for text shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub size: f64,
    pub weight: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

/// A shape record as stored in the board and carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub object_id: ObjectId,
    pub kind: ShapeKind,
    /// Left/top anchor of the shape.
    pub origin: Point,
    pub geometry: Geometry,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub style: Style,
}

impl Shape {
    /// Build a free-form path from pointer samples already captured by the
    /// input layer. Points are relative to `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` when fewer than two points are supplied.
    pub fn freeform(anchor: Point, points: Vec<Point>, stroke: &str, stroke_width: f64) -> Result<Self, ShapeError> {
        let shape = Self {
            object_id: Uuid::new_v4(),
            kind: ShapeKind::Freeform,
            origin: anchor,
            geometry: Geometry::Path { points },
            transform: Transform::default(),
            style: Style { fill: None, stroke: Some(stroke.to_string()), stroke_width, font: None },
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Check that the geometry variant and style match `kind`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` describing the first violated requirement.
    pub fn validate(&self) -> Result<(), ShapeError> {
        let malformed = |reason| Err(ShapeError::Malformed { kind: self.kind, reason });
        match (self.kind, &self.geometry) {
            (ShapeKind::Rectangle | ShapeKind::Triangle, Geometry::Sized { .. })
            | (ShapeKind::Circle, Geometry::Round { .. })
            | (ShapeKind::Line, Geometry::Segment { .. }) => Ok(()),
            (ShapeKind::Freeform, Geometry::Path { points }) => {
                if points.len() < 2 {
                    return malformed("path needs at least two points");
                }
                Ok(())
            }
            (ShapeKind::Text, Geometry::Text { .. }) => {
                if self.style.font.is_none() {
                    return malformed("text needs font attributes");
                }
                Ok(())
            }
            _ => malformed("geometry does not match kind"),
        }
    }

    /// Apply one property change in place. Returns `true` if the record
    /// changed, `false` if the value was already current.
    ///
    /// # Errors
    ///
    /// Returns `Inapplicable` when the property has no meaning for this kind,
    /// or `Malformed` when the new value would break the kind's invariants.
    pub fn apply(&mut self, change: &PropertyChange) -> Result<bool, ShapeError> {
        let kind = self.kind;
        let inapplicable = || ShapeError::Inapplicable { kind, property: change.name() };

        let changed = match change {
            PropertyChange::Left(v) => replace(&mut self.origin.x, *v),
            PropertyChange::Top(v) => replace(&mut self.origin.y, *v),
            PropertyChange::Width(v) => match &mut self.geometry {
                Geometry::Sized { width, .. } => replace(width, *v),
                _ => return Err(inapplicable()),
            },
            PropertyChange::Height(v) => match &mut self.geometry {
                Geometry::Sized { height, .. } => replace(height, *v),
                _ => return Err(inapplicable()),
            },
            PropertyChange::Radius(v) => match &mut self.geometry {
                Geometry::Round { radius } => replace(radius, *v),
                _ => return Err(inapplicable()),
            },
            PropertyChange::ScaleX(v) => replace(&mut self.transform.scale_x, *v),
            PropertyChange::ScaleY(v) => replace(&mut self.transform.scale_y, *v),
            PropertyChange::Angle(v) => replace(&mut self.transform.angle, *v),
            PropertyChange::Points(new_points) => match &mut self.geometry {
                Geometry::Segment { points } => {
                    let [a, b] = new_points.as_slice() else {
                        return Err(ShapeError::Malformed { kind, reason: "line needs exactly two endpoints" });
                    };
                    replace(points, [*a, *b])
                }
                Geometry::Path { points } => {
                    if new_points.len() < 2 {
                        return Err(ShapeError::Malformed { kind, reason: "path needs at least two points" });
                    }
                    replace(points, new_points.clone())
                }
                _ => return Err(inapplicable()),
            },
            PropertyChange::Fill(v) => replace(&mut self.style.fill, Some(v.clone())),
            PropertyChange::Stroke(v) => replace(&mut self.style.stroke, Some(v.clone())),
            PropertyChange::StrokeWidth(v) => replace(&mut self.style.stroke_width, *v),
            PropertyChange::Text(v) => match &mut self.geometry {
                Geometry::Text { content } => replace(content, v.clone()),
                _ => return Err(inapplicable()),
            },
            PropertyChange::FontFamily(v) => {
                let font = self.style.font.as_mut().ok_or_else(inapplicable)?;
                replace(&mut font.family, v.clone())
            }
            PropertyChange::FontSize(v) => {
                let font = self.style.font.as_mut().ok_or_else(inapplicable)?;
                replace(&mut font.size, *v)
            }
            PropertyChange::FontWeight(v) => {
                let font = self.style.font.as_mut().ok_or_else(inapplicable)?;
                replace(&mut font.weight, v.clone())
            }
        };
        Ok(changed)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

// =============================================================================
// PROPERTY CHANGES
// =============================================================================

/// A single named property assignment. `kind` and `object_id` are never
/// assignable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "snake_case")]
pub enum PropertyChange {
    Left(#[serde(deserialize_with = "lenient_f64")] f64),
    Top(#[serde(deserialize_with = "lenient_f64")] f64),
    Width(#[serde(deserialize_with = "lenient_f64")] f64),
    Height(#[serde(deserialize_with = "lenient_f64")] f64),
    Radius(#[serde(deserialize_with = "lenient_f64")] f64),
    ScaleX(#[serde(deserialize_with = "lenient_f64")] f64),
    ScaleY(#[serde(deserialize_with = "lenient_f64")] f64),
    Angle(#[serde(deserialize_with = "lenient_f64")] f64),
    Points(Vec<Point>),
    Fill(String),
    Stroke(String),
    StrokeWidth(#[serde(deserialize_with = "lenient_f64")] f64),
    Text(String),
    FontFamily(String),
    FontSize(#[serde(deserialize_with = "lenient_f64")] f64),
    FontWeight(#[serde(deserialize_with = "lenient_text")] String),
}

impl PropertyChange {
    /// Wire name of the property.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left(_) => "left",
            Self::Top(_) => "top",
            Self::Width(_) => "width",
            Self::Height(_) => "height",
            Self::Radius(_) => "radius",
            Self::ScaleX(_) => "scale_x",
            Self::ScaleY(_) => "scale_y",
            Self::Angle(_) => "angle",
            Self::Points(_) => "points",
            Self::Fill(_) => "fill",
            Self::Stroke(_) => "stroke",
            Self::StrokeWidth(_) => "stroke_width",
            Self::Text(_) => "text",
            Self::FontFamily(_) => "font_family",
            Self::FontSize(_) => "font_size",
            Self::FontWeight(_) => "font_weight",
        }
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

/// Non-finite values are rejected: NaN never compares equal, so it would
/// make every re-applied update look like a change.
fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    let value = match Scalar::deserialize(de)? {
        Scalar::Number(v) => v,
        Scalar::Text(s) => s.trim().parse::<f64>().map_err(D::Error::custom)?,
    };
    if !value.is_finite() {
        return Err(D::Error::custom(format!("non-finite number: {value}")));
    }
    Ok(value)
}

fn lenient_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Scalar::deserialize(de)? {
        Scalar::Number(v) => Ok(v.to_string()),
        Scalar::Text(s) => Ok(s),
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Build a new shape of `kind` anchored at `anchor` with kind defaults.
///
/// Text uses `text` as its content, or a placeholder when none is given.
/// Returns `None` for `Freeform`: paths come from pointer capture and are
/// built with [`Shape::freeform`].
#[must_use]
pub fn create_shape(kind: ShapeKind, anchor: Point, text: Option<&str>) -> Option<Shape> {
    let filled = Style { fill: Some(DEFAULT_FILL.to_string()), ..Style::default() };

    let (geometry, style) = match kind {
        ShapeKind::Rectangle | ShapeKind::Triangle => {
            (Geometry::Sized { width: DEFAULT_SIZE, height: DEFAULT_SIZE }, filled)
        }
        ShapeKind::Circle => (Geometry::Round { radius: DEFAULT_RADIUS }, filled),
        ShapeKind::Line => (
            Geometry::Segment { points: [Point::new(0.0, 0.0), Point::new(DEFAULT_SIZE, DEFAULT_SIZE)] },
            Style {
                fill: None,
                stroke: Some(DEFAULT_FILL.to_string()),
                stroke_width: DEFAULT_LINE_STROKE_WIDTH,
                font: None,
            },
        ),
        ShapeKind::Text => (
            Geometry::Text { content: text.unwrap_or(TEXT_PLACEHOLDER).to_string() },
            Style {
                font: Some(Font {
                    family: DEFAULT_FONT_FAMILY.to_string(),
                    size: DEFAULT_FONT_SIZE,
                    weight: DEFAULT_FONT_WEIGHT.to_string(),
                }),
                ..filled
            },
        ),
        ShapeKind::Freeform => return None,
    };

    Some(Shape {
        object_id: Uuid::new_v4(),
        kind,
        origin: anchor,
        geometry,
        transform: Transform::default(),
        style,
    })
}

/// Like [`create_shape`], but takes the kind's wire name. Unknown names
/// create nothing.
#[must_use]
pub fn create_named(kind: &str, anchor: Point, text: Option<&str>) -> Option<Shape> {
    match kind.parse::<ShapeKind>() {
        Ok(kind) => create_shape(kind, anchor, text),
        Err(err) => {
            debug!(code = err.error_code(), error = %err, "no shape created");
            None
        }
    }
}
