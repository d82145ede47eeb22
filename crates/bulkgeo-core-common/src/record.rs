//! Record data model: typed fields, attribute values, geometry.

use std::fmt;

use anyhow::{Result, bail};
use geo_types::Geometry;

use crate::crs::Crs;
use crate::fields::unique_field_name;

/// Attribute type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `true` / `false`
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 text
    String,
}

impl FieldType {
    /// Returns the display name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "Boolean",
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::String => "String",
        }
    }
}

/// A named, typed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name, unique within its [`FieldSet`]
    pub name: String,
    /// Attribute type
    pub field_type: FieldType,
}

impl Field {
    /// Creates a new field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered sequence of uniquely named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    /// Creates an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a field set from `fields`.
    ///
    /// # Errors
    ///
    /// Returns an error if two fields share a name.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        let mut set = Self::new();
        for field in fields {
            set.push(field)?;
        }
        Ok(set)
    }

    /// Appends `field`, returning its index.
    ///
    /// # Errors
    ///
    /// Returns an error if a field with the same name already exists.
    pub fn push(&mut self, field: Field) -> Result<usize> {
        if self.contains(&field.name) {
            bail!("Duplicate field name '{}'", field.name);
        }
        self.fields.push(field);
        Ok(self.fields.len() - 1)
    }

    /// Appends a field built from `name` and `field_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if a field with the same name already exists.
    pub fn push_field(&mut self, name: impl Into<String>, field_type: FieldType) -> Result<usize> {
        self.push(Field::new(name, field_type))
    }

    /// Appends a field named after `desired`, disambiguated with a numeric suffix when
    /// the name is taken. Returns the name actually used.
    pub fn push_unique(&mut self, desired: &str, field_type: FieldType) -> String {
        let name = unique_field_name(desired, self);
        self.fields.push(Field::new(name.clone(), field_type));
        name
    }

    /// Returns the index of the field called `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Returns `true` if a field called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Returns the field at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the fields in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Field names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Missing value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    String(String),
}

impl AttributeValue {
    /// Returns `true` for [`AttributeValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Returns the natural field type of this value, `None` for null.
    #[must_use]
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Boolean(_) => Some(FieldType::Boolean),
            AttributeValue::Integer(_) => Some(FieldType::Integer),
            AttributeValue::Float(_) => Some(FieldType::Float),
            AttributeValue::String(_) => Some(FieldType::String),
        }
    }
}

/// Null renders as the empty string.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Boolean(value) => write!(f, "{value}"),
            AttributeValue::Integer(value) => write!(f, "{value}"),
            AttributeValue::Float(value) => write!(f, "{value}"),
            AttributeValue::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

/// Attribute values aligned with a [`FieldSet`], plus an optional geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// One value per field, in field order
    pub attributes: Vec<AttributeValue>,
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new(attributes: Vec<AttributeValue>, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    /// Returns the value at field index `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    /// Copies the attributes, appends `value` and pairs them with `geometry`.
    #[must_use]
    pub fn extended(&self, value: AttributeValue, geometry: Option<Geometry<f64>>) -> Self {
        let mut attributes = Vec::with_capacity(self.attributes.len() + 1);
        attributes.extend(self.attributes.iter().cloned());
        attributes.push(value);
        Self {
            attributes,
            geometry,
        }
    }
}

/// Geometry type of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryType {
    /// Attribute-only table
    #[default]
    None,
    /// Point features
    Point,
    /// Line features
    LineString,
    /// Polygon features
    Polygon,
    /// Multi-point features
    MultiPoint,
    /// Multi-line features
    MultiLineString,
    /// Multi-polygon features
    MultiPolygon,
    /// Geometry collections
    GeometryCollection,
    /// Mixed geometry types
    Unknown,
}

impl GeometryType {
    /// Returns the layer geometry type matching `geometry`.
    #[must_use]
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            },
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// Infers a layer geometry type from a sequence of optional geometries.
    ///
    /// Missing geometries are ignored; differing types yield [`GeometryType::Unknown`].
    pub fn infer<'a>(geometries: impl IntoIterator<Item = Option<&'a Geometry<f64>>>) -> Self {
        geometries
            .into_iter()
            .flatten()
            .map(GeometryType::of)
            .fold(GeometryType::None, |acc, next| match acc {
                GeometryType::None => next,
                same if same == next => same,
                _ => GeometryType::Unknown,
            })
    }

    /// Returns the display name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::None => "None",
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
            GeometryType::Unknown => "Unknown",
        }
    }
}

/// An in-memory layer as produced by the format readers.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    /// Layer fields
    pub fields: FieldSet,
    /// Records in source order
    pub records: Vec<Record>,
    /// Layer geometry type
    pub geometry_type: GeometryType,
    /// Declared CRS, if the source carries one
    pub crs: Option<Crs>,
}

impl RecordTable {
    /// Creates a table, inferring the geometry type from the records.
    #[must_use]
    pub fn new(fields: FieldSet, records: Vec<Record>, crs: Option<Crs>) -> Self {
        let geometry_type = GeometryType::infer(records.iter().map(|r| r.geometry.as_ref()));
        Self {
            fields,
            records,
            geometry_type,
            crs,
        }
    }
}
