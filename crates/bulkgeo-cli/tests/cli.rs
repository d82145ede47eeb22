//! End-to-end runs of the `bulkgeo` binary using the offline gazetteer.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const GAZETTEER: &str = "\
name,lon,lat,address
Colosseo,12.4922,41.8902,Piazza del Colosseo 1 Roma
Duomo di Milano,9.1919,45.4641,Piazza del Duomo Milano
";

fn bulkgeo() -> Command {
    let mut cmd = Command::cargo_bin("bulkgeo").unwrap();
    // keep the environment from pointing runs at a real service
    cmd.env_remove("BULKGEO_ENDPOINT");
    cmd
}

fn write_gazetteer(dir: &Path) -> String {
    let path = dir.join("places.csv");
    fs::write(&path, GAZETTEER).unwrap();
    path.display().to_string()
}

#[test]
fn test_drivers_lists_formats() {
    bulkgeo()
        .arg("drivers")
        .assert()
        .success()
        .stdout(predicate::str::contains("Short Name"))
        .stdout(predicate::str::contains("GeoJSON"))
        .stdout(predicate::str::contains("CSV"))
        .stdout(predicate::str::contains("KML").not());
}

#[test]
fn test_drivers_all_includes_planned() {
    bulkgeo()
        .args(["drivers", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GPKG"))
        .stdout(predicate::str::contains("Planned"));

    bulkgeo()
        .args(["drivers", "--write"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(2 total)"));
}

#[test]
fn test_geocode_tsv_input_and_output() {
    let dir = TempDir::new().unwrap();
    let gazetteer = write_gazetteer(dir.path());
    let input = dir.path().join("addresses.tsv");
    let output = dir.path().join("points.tsv");
    fs::write(&input, "id\taddr\n7\tPiazza del Duomo Milano\n").unwrap();

    bulkgeo()
        .args(["geocode", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-a", "addr", "--provider", "gazetteer", "--gazetteer", &gazetteer])
        .assert()
        .success();

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("id\taddr\tplace\tgeometry\n"), "{content}");
    assert!(content.contains("7\tPiazza del Duomo Milano\tDuomo di Milano\tPOINT"));
}

#[test]
fn test_geocode_csv_to_geojson() {
    let dir = TempDir::new().unwrap();
    let gazetteer = write_gazetteer(dir.path());
    let input = dir.path().join("addresses.csv");
    let output = dir.path().join("points.geojson");
    fs::write(
        &input,
        "id,addr\n1,Piazza del Colosseo 1 Roma\n2,Nowhere Street 1\n",
    )
    .unwrap();

    bulkgeo()
        .args(["geocode", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-a", "addr", "--provider", "gazetteer", "--gazetteer", &gazetteer])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed"))
        .stdout(predicate::str::contains("No Match"));

    let collection: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let features = collection["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["place"], "Colosseo");
    assert_eq!(features[0]["geometry"]["type"], "Point");
    assert_eq!(features[0]["geometry"]["coordinates"][0], 12.4922);
}

#[test]
fn test_reverse_xy_csv() {
    let dir = TempDir::new().unwrap();
    let gazetteer = write_gazetteer(dir.path());
    let input = dir.path().join("sites.csv");
    let output = dir.path().join("sites.geojson");
    fs::write(&input, "site,lon,lat\nA,9.1922,45.4643\nB,12.4925,41.8900\n").unwrap();

    bulkgeo()
        .args(["reverse", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["--x-field", "lon", "--y-field", "lat"])
        .args(["--provider", "gazetteer", "--gazetteer", &gazetteer])
        .assert()
        .success();

    let collection: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let places: Vec<&str> = collection["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["properties"]["place"].as_str().unwrap())
        .collect();
    assert_eq!(places, vec!["Duomo di Milano", "Colosseo"]);
}

#[test]
fn test_missing_address_field_fails() {
    let dir = TempDir::new().unwrap();
    let gazetteer = write_gazetteer(dir.path());
    let input = dir.path().join("addresses.csv");
    let output = dir.path().join("points.geojson");
    fs::write(&input, "id,street\n1,Piazza del Duomo Milano\n").unwrap();

    bulkgeo()
        .args(["geocode", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-a", "address", "--provider", "gazetteer", "--gazetteer", &gazetteer])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Field 'address' not found. Available fields: id, street",
        ))
        .stderr(predicate::str::contains("case-sensitive"));

    assert!(!output.exists());
}

#[test]
fn test_gazetteer_provider_requires_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("addresses.csv");
    fs::write(&input, "addr\nPiazza del Duomo Milano\n").unwrap();

    bulkgeo()
        .args(["geocode", "-i"])
        .arg(&input)
        .args(["-o", "unused.geojson", "-a", "addr", "--provider", "gazetteer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--gazetteer"));
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let gazetteer = write_gazetteer(dir.path());

    bulkgeo()
        .args(["reverse", "-i"])
        .arg(dir.path().join("absent.geojson"))
        .arg("-o")
        .arg(dir.path().join("out.csv"))
        .args(["--provider", "gazetteer", "--gazetteer", &gazetteer])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Hint: Check that the file path is correct"));
}

#[cfg(unix)]
#[test]
fn test_second_interrupt_aborts_stalled_run() {
    use std::io::ErrorKind;
    use std::net::TcpListener;
    use std::process::{Command as Process, Stdio};
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    // accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let endpoint = format!("http://{}/", listener.local_addr().unwrap());

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("addresses.csv");
    fs::write(&input, "addr\nPiazza del Duomo Milano\n").unwrap();

    let mut child = Process::new(assert_cmd::cargo::cargo_bin("bulkgeo"))
        .args(["geocode", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("points.geojson"))
        .args(["-a", "addr", "--endpoint", &endpoint])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let _request = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock && Instant::now() < deadline => {
                sleep(Duration::from_millis(20));
            },
            Err(e) => {
                child.kill().unwrap();
                panic!("no request reached the endpoint: {e}");
            },
        }
    };

    let pid = child.id().to_string();
    let interrupt = || {
        let status = Process::new("kill")
            .args(["-INT", &pid])
            .status()
            .unwrap();
        assert!(status.success());
    };
    sleep(Duration::from_millis(200));
    interrupt();
    sleep(Duration::from_millis(200));
    assert!(child.try_wait().unwrap().is_none(), "first interrupt must not exit");
    interrupt();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("process ignored the second interrupt");
        }
        sleep(Duration::from_millis(20));
    };
    assert_eq!(status.code(), Some(130));
}
