//! `GeoJSON` parsing into a [`RecordTable`].
//!
//! Accepts a FeatureCollection, a single Feature, a bare Geometry or a
//! newline-delimited sequence of any of these.

use std::collections::HashMap;
use std::convert::TryInto;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use bulkgeo_core_common::{AttributeValue, Crs, Field, FieldSet, FieldType, Record, RecordTable};
use geo_types::Geometry;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use log::debug;

struct ParsedFeature {
    properties: JsonObject,
    geometry: Option<Geometry<f64>>,
}

/// Read a `GeoJSON` file into a [`RecordTable`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_geojson_file(path: impl AsRef<Path>) -> Result<RecordTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to open GeoJSON file '{}'", path.display()))?;
    parse_geojson_bytes(&bytes)
}

/// Parse raw bytes into a [`RecordTable`].
///
/// The field set is the union of property keys in first-seen order. Field types come
/// from the first non-null value; integers widen to floats, any other mix widens to
/// strings. A legacy `crs` member on a FeatureCollection is honored.
///
/// # Errors
///
/// Returns an error if the bytes are neither a `GeoJSON` document nor a `GeoJSON`
/// sequence, or if a geometry cannot be converted.
pub fn parse_geojson_bytes(bytes: &[u8]) -> Result<RecordTable> {
    let (features, crs) = match GeoJson::from_reader(bytes) {
        Ok(geojson) => {
            let crs = declared_crs(&geojson);
            (geojson_to_features(geojson)?, crs)
        },
        Err(primary_err) => match parse_geojson_sequence(bytes) {
            Ok(features) => (features, None),
            Err(sequence_err) => bail!(
                "Failed to parse GeoJSON as FeatureCollection ({primary_err}); \
                 also failed to parse as GeoJSON sequence: {sequence_err}"
            ),
        },
    };

    let table = build_table(features, crs)?;
    debug!(
        "Parsed {} GeoJSON feature(s) with {} field(s)",
        table.records.len(),
        table.fields.len()
    );
    Ok(table)
}

fn declared_crs(geojson: &GeoJson) -> Option<Crs> {
    let GeoJson::FeatureCollection(collection) = geojson else {
        return None;
    };
    collection
        .foreign_members
        .as_ref()?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?
        .parse()
        .ok()
}

fn geojson_to_features(geojson: GeoJson) -> Result<Vec<ParsedFeature>> {
    match geojson {
        GeoJson::FeatureCollection(collection) => collection_to_features(collection),
        GeoJson::Feature(feature) => Ok(vec![convert_feature(feature)?]),
        GeoJson::Geometry(geometry) => Ok(vec![ParsedFeature {
            properties: JsonObject::new(),
            geometry: Some(convert_geometry(geometry)?),
        }]),
    }
}

fn collection_to_features(collection: FeatureCollection) -> Result<Vec<ParsedFeature>> {
    collection
        .features
        .into_iter()
        .map(convert_feature)
        .collect()
}

fn convert_feature(feature: Feature) -> Result<ParsedFeature> {
    let geometry = feature.geometry.map(convert_geometry).transpose()?;
    Ok(ParsedFeature {
        properties: feature.properties.unwrap_or_default(),
        geometry,
    })
}

fn convert_geometry(geometry: geojson::Geometry) -> Result<Geometry<f64>> {
    geometry
        .try_into()
        .map_err(|err| anyhow!("Failed to convert GeoJSON geometry: {err}"))
}

fn parse_geojson_sequence(bytes: &[u8]) -> Result<Vec<ParsedFeature>> {
    let mut features = Vec::new();
    for (line_idx, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line_number = line_idx + 1;
        let line = std::str::from_utf8(raw_line)
            .map_err(|err| anyhow!("GeoJSON line {line_number} is not valid UTF-8: {err}"))?
            .trim();
        if line.is_empty() {
            continue;
        }
        let geojson = line.parse::<GeoJson>().map_err(|err| {
            anyhow!("Failed to parse GeoJSON feature at line {line_number}: {err}")
        })?;
        features.append(&mut geojson_to_features(geojson)?);
    }

    if features.is_empty() {
        bail!("No GeoJSON features found");
    }
    Ok(features)
}

fn value_type(value: &JsonValue) -> Option<FieldType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(FieldType::Boolean),
        JsonValue::Number(number) if number.is_i64() => Some(FieldType::Integer),
        JsonValue::Number(_) => Some(FieldType::Float),
        JsonValue::String(_) | JsonValue::Array(_) | JsonValue::Object(_) => {
            Some(FieldType::String)
        },
    }
}

fn widen(current: Option<FieldType>, next: Option<FieldType>) -> Option<FieldType> {
    match (current, next) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(FieldType::Integer), Some(FieldType::Float))
        | (Some(FieldType::Float), Some(FieldType::Integer)) => Some(FieldType::Float),
        _ => Some(FieldType::String),
    }
}

fn convert_value(value: &JsonValue, field_type: FieldType) -> AttributeValue {
    match (field_type, value) {
        (_, JsonValue::Null) => AttributeValue::Null,
        (FieldType::Boolean, JsonValue::Bool(b)) => AttributeValue::Boolean(*b),
        (FieldType::Integer, JsonValue::Number(n)) if n.is_i64() => {
            n.as_i64().map_or(AttributeValue::Null, AttributeValue::Integer)
        },
        (FieldType::Float, JsonValue::Number(n)) => {
            n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float)
        },
        (_, JsonValue::String(s)) => AttributeValue::String(s.clone()),
        (_, other) => AttributeValue::String(other.to_string()),
    }
}

fn build_table(features: Vec<ParsedFeature>, crs: Option<Crs>) -> Result<RecordTable> {
    let mut names: Vec<String> = Vec::new();
    let mut types: Vec<Option<FieldType>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for feature in &features {
        for (key, value) in &feature.properties {
            let idx = *index.entry(key.clone()).or_insert_with(|| {
                names.push(key.clone());
                types.push(None);
                names.len() - 1
            });
            types[idx] = widen(types[idx], value_type(value));
        }
    }

    let field_types: Vec<FieldType> = types
        .into_iter()
        .map(|t| t.unwrap_or(FieldType::String))
        .collect();
    let fields = FieldSet::from_fields(
        names
            .iter()
            .zip(&field_types)
            .map(|(name, field_type)| Field::new(name.clone(), *field_type)),
    )?;

    let records = features
        .into_iter()
        .map(|feature| {
            let attributes = names
                .iter()
                .zip(&field_types)
                .map(|(name, field_type)| {
                    feature
                        .properties
                        .get(name)
                        .map_or(AttributeValue::Null, |v| convert_value(v, *field_type))
                })
                .collect();
            Record::new(attributes, feature.geometry)
        })
        .collect();

    Ok(RecordTable::new(fields, records, crs))
}
