//! File to file runs through the driver registry with the offline gazetteer.

use std::fs;

use anyhow::Result;
use bulkgeo_core::common::{AttributeValue, Crs, GeometryType};
use bulkgeo_core::drivers::{FileSinkFactory, find_driver, read_records, resolve_driver};
use bulkgeo_core::error::{GeocodeError, IoError};
use bulkgeo_core::feedback::LogFeedback;
use bulkgeo_core::operations::{
    ForwardOptions, ReverseOptions, bulk_geocode, bulk_reverse_geocode,
};
use bulkgeo_core::resolver::{GazetteerOptions, GazetteerResolver};
use bulkgeo_csv::{CsvReadOptions, read_csv_file};
use bulkgeo_geojson::read_geojson_file;
use geo_types::{Geometry, Point};
use tempfile::TempDir;

const GAZETTEER: &str = "\
name,lon,lat,address
Colosseo,12.4922,41.8902,Piazza del Colosseo 1 Roma
Duomo di Milano,9.1919,45.4641,Piazza del Duomo Milano
Ponte Vecchio,11.2531,43.7680,Ponte Vecchio Firenze
";

fn gazetteer(options: GazetteerOptions) -> GazetteerResolver {
    GazetteerResolver::from_reader(GAZETTEER.as_bytes(), options).unwrap()
}

#[tokio::test]
async fn test_csv_addresses_to_geojson_points() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("addresses.csv");
    let output = temp_dir.path().join("points.geojson");
    fs::write(
        &input,
        "id,addr\n1,Piazza del Colosseo 1 Roma\n2,Via Inesistente 9\n3,ponte vecchio  firenze\n",
    )?;

    let input_driver = resolve_driver(None, &input)?;
    let source = read_records(&input, &input_driver, &CsvReadOptions::default())?;
    let factory = FileSinkFactory::new(&output, resolve_driver(None, &output)?)?;

    let report = bulk_geocode(
        &source,
        &gazetteer(GazetteerOptions::new()),
        &ForwardOptions::new("addr"),
        &factory,
        &mut LogFeedback::new(),
    )
    .await?;

    assert_eq!(report.destination, output.display().to_string());
    assert_eq!((report.emitted, report.no_match), (2, 1));

    let written = read_geojson_file(&output)?;
    assert_eq!(written.fields.names(), vec!["id", "addr", "place"]);
    assert_eq!(written.geometry_type, GeometryType::Point);
    assert_eq!(written.records.len(), 2);
    assert_eq!(written.records[0].attributes[0], AttributeValue::from("1"));
    assert_eq!(written.records[0].attributes[2], AttributeValue::from("Colosseo"));
    assert_eq!(
        written.records[1].geometry,
        Some(Geometry::Point(Point::new(11.2531, 43.7680)))
    );
    Ok(())
}

#[tokio::test]
async fn test_geojson_features_to_csv_places() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("sites.geojson");
    let output = temp_dir.path().join("sites.csv");
    fs::write(
        &input,
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"site":"A"},
             "geometry":{"type":"Point","coordinates":[9.1922,45.4643]}},
            {"type":"Feature","properties":{"site":"B"},"geometry":null}
        ]}"#,
    )?;

    let source = read_records(&input, &find_driver("GeoJSON").unwrap(), &CsvReadOptions::default())?;
    let factory = FileSinkFactory::new(&output, find_driver("CSV").unwrap())?;

    let report = bulk_reverse_geocode(
        &source,
        &gazetteer(GazetteerOptions::new().with_max_distance(500.0)),
        &ReverseOptions::new(),
        &factory,
        &mut LogFeedback::new(),
    )
    .await?;
    assert_eq!((report.processed, report.emitted, report.failed), (2, 1, 1));

    let written = read_csv_file(&output, &CsvReadOptions::new().with_wkt_column("geometry"))?;
    assert_eq!(written.fields.names(), vec!["site", "place"]);
    assert_eq!(written.records.len(), 1);
    assert_eq!(
        written.records[0].attributes,
        vec![AttributeValue::from("A"), AttributeValue::from("Duomo di Milano")]
    );
    assert_eq!(
        written.records[0].geometry,
        Some(Geometry::Point(Point::new(9.1922, 45.4643)))
    );
    Ok(())
}

#[tokio::test]
async fn test_projected_output_declares_crs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("addresses.csv");
    let output = temp_dir.path().join("points.geojson");
    fs::write(&input, "addr\nPiazza del Duomo Milano\n")?;

    let source = read_records(&input, &find_driver("CSV").unwrap(), &CsvReadOptions::default())?;
    let factory = FileSinkFactory::new(&output, find_driver("GeoJSON").unwrap())?;
    bulk_geocode(
        &source,
        &gazetteer(GazetteerOptions::new()),
        &ForwardOptions::new("addr").with_target_crs(Crs::from_epsg(32632)),
        &factory,
        &mut LogFeedback::new(),
    )
    .await?;

    let written = read_geojson_file(&output)?;
    assert_eq!(written.crs, Some(Crs::from_epsg(32632)));
    let Some(Geometry::Point(point)) = &written.records[0].geometry else {
        panic!("expected a point");
    };
    // Milano lies in UTM zone 32, a little east of its central meridian
    assert!((510_000.0..520_000.0).contains(&point.x()), "{point:?}");
    assert!((5_030_000.0..5_040_000.0).contains(&point.y()), "{point:?}");
    Ok(())
}

#[tokio::test]
async fn test_tsv_addresses_round_trip_with_tabs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("addresses.tsv");
    let output = temp_dir.path().join("points.tsv");
    fs::write(&input, "id\taddr\n1\tPiazza del Duomo Milano\n")?;

    let input_driver = resolve_driver(None, &input)?;
    let source = read_records(&input, &input_driver, &CsvReadOptions::default())?;
    assert_eq!(source.fields.names(), vec!["id", "addr"]);

    let factory = FileSinkFactory::new(&output, resolve_driver(None, &output)?)?;
    let report = bulk_geocode(
        &source,
        &gazetteer(GazetteerOptions::new()),
        &ForwardOptions::new("addr"),
        &factory,
        &mut LogFeedback::new(),
    )
    .await?;
    assert_eq!(report.emitted, 1);

    let content = fs::read_to_string(&output)?;
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("id\taddr\tplace\tgeometry"));
    let row: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(row[..3], ["1", "Piazza del Duomo Milano", "Duomo di Milano"]);
    assert!(row[3].starts_with("POINT"), "{content}");
    Ok(())
}

#[tokio::test]
async fn test_uncreatable_output_fails_with_write_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("addresses.csv");
    let output = temp_dir.path().join("missing").join("points.geojson");
    fs::write(&input, "addr\nPiazza del Duomo Milano\n")?;

    let source = read_records(&input, &find_driver("CSV").unwrap(), &CsvReadOptions::default())?;
    let factory = FileSinkFactory::new(&output, find_driver("GeoJSON").unwrap())?;
    let err = bulk_geocode(
        &source,
        &gazetteer(GazetteerOptions::new()),
        &ForwardOptions::new("addr"),
        &factory,
        &mut LogFeedback::new(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(&err, GeocodeError::Io(IoError::Write { path, .. }) if *path == output),
        "{err:?}"
    );
    assert_eq!(
        err.user_message(),
        format!("Failed to write GeoJSON file: {}", output.display())
    );
    Ok(())
}
