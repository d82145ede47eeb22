//! Point reprojection between WGS84 and the supported CRSs.
//!
//! Supported systems:
//! - EPSG:4326 (identity)
//! - EPSG:3857, 900913 and 3785 (spherical Web Mercator)
//! - EPSG:326xx / 327xx (UTM north / south on WGS84, Snyder 1987 pp. 61-64)

use std::f64::consts::FRAC_PI_4;

use bulkgeo_core_common::Crs;
use geo_types::Coord;

use crate::error::CrsError;

// WGS84 ellipsoid
const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * F - F * F;
const E_PRIME2: f64 = E2 / (1.0 - E2);
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

// Web Mercator sphere
const MERCATOR_RADIUS: f64 = 6_378_137.0;
const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

// Largest accepted distance from a UTM central meridian, three zone widths
const UTM_MAX_OFFSET_DEG: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    Geographic,
    WebMercator,
    Utm { zone: u32, north: bool },
}

impl Projection {
    fn of(crs: Crs) -> Option<Self> {
        match crs.epsg() {
            4326 => Some(Self::Geographic),
            3857 | 900_913 | 3785 => Some(Self::WebMercator),
            code @ 32601..=32660 => Some(Self::Utm {
                zone: code - 32600,
                north: true,
            }),
            code @ 32701..=32760 => Some(Self::Utm {
                zone: code - 32700,
                north: false,
            }),
            _ => None,
        }
    }
}

/// Returns `true` if points can be transformed to and from `crs`.
#[must_use]
pub fn is_supported(crs: Crs) -> bool {
    Projection::of(crs).is_some()
}

/// Transform `point`, expressed in `source`, to WGS84 longitude/latitude.
///
/// # Errors
///
/// Returns [`CrsError::Unsupported`] for CRSs without a transform and
/// [`CrsError::OutOfBounds`] for non-finite or out-of-range coordinates.
pub fn to_wgs84(point: Coord<f64>, source: Crs) -> Result<Coord<f64>, CrsError> {
    let projection = Projection::of(source).ok_or(CrsError::Unsupported { crs: source })?;
    let out_of_bounds = || CrsError::OutOfBounds {
        x: point.x,
        y: point.y,
        crs: source,
    };
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(out_of_bounds());
    }

    let wgs84 = match projection {
        Projection::Geographic => point,
        Projection::WebMercator => {
            let lon = (point.x / MERCATOR_RADIUS).to_degrees();
            let lat = (2.0 * (point.y / MERCATOR_RADIUS).exp().atan() - 2.0 * FRAC_PI_4)
                .to_degrees();
            Coord { x: lon, y: lat }
        },
        Projection::Utm { zone, north } => utm_to_wgs84(point.x, point.y, zone, north),
    };
    check_geographic(wgs84).map_err(|_| out_of_bounds())
}

/// Transform a WGS84 longitude/latitude into `target`.
///
/// # Errors
///
/// Returns [`CrsError::Unsupported`] for CRSs without a transform and
/// [`CrsError::OutOfBounds`] for invalid longitude/latitude, latitudes beyond
/// the Web Mercator limit, or longitudes more than three zone widths away from a
/// UTM zone's central meridian.
pub fn from_wgs84(point: Coord<f64>, target: Crs) -> Result<Coord<f64>, CrsError> {
    let projection = Projection::of(target).ok_or(CrsError::Unsupported { crs: target })?;
    check_geographic(point)?;

    match projection {
        Projection::Geographic => Ok(point),
        Projection::WebMercator => {
            if point.y.abs() > MERCATOR_MAX_LAT {
                return Err(CrsError::OutOfBounds {
                    x: point.x,
                    y: point.y,
                    crs: target,
                });
            }
            let x = MERCATOR_RADIUS * point.x.to_radians();
            let y = MERCATOR_RADIUS * (FRAC_PI_4 + point.y.to_radians() / 2.0).tan().ln();
            Ok(Coord { x, y })
        },
        Projection::Utm { zone, north } => {
            if meridian_offset(point.x, zone).abs() > UTM_MAX_OFFSET_DEG {
                return Err(CrsError::OutOfBounds {
                    x: point.x,
                    y: point.y,
                    crs: target,
                });
            }
            Ok(wgs84_to_utm(point.x, point.y, zone, north))
        },
    }
}

fn check_geographic(point: Coord<f64>) -> Result<Coord<f64>, CrsError> {
    let valid = point.x.is_finite()
        && point.y.is_finite()
        && (-180.0..=180.0).contains(&point.x)
        && (-90.0..=90.0).contains(&point.y);
    if valid {
        Ok(point)
    } else {
        Err(CrsError::OutOfBounds {
            x: point.x,
            y: point.y,
            crs: Crs::WGS84,
        })
    }
}

fn central_meridian(zone: u32) -> f64 {
    (f64::from(zone) * 6.0 - 183.0).to_radians()
}

/// Signed distance in degrees from the zone's central meridian, in [-180, 180).
fn meridian_offset(lon_deg: f64, zone: u32) -> f64 {
    (lon_deg - (f64::from(zone) * 6.0 - 183.0) + 180.0).rem_euclid(360.0) - 180.0
}

/// Meridional arc from the equator to `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// Snyder eqs. 8-9 and 8-10
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> Coord<f64> {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - central_meridian(zone));
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    Coord {
        x: easting,
        y: if north {
            northing
        } else {
            northing + FALSE_NORTHING_SOUTH
        },
    }
}

// Footpoint latitude series, Snyder eqs. 8-17 to 8-25
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> Coord<f64> {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let root = (1.0 - E2).sqrt();
    let e1 = (1.0 - root) / (1.0 + root);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi = phi1.sin();
    let cos_phi = phi1.cos();
    let tan_phi = phi1.tan();
    let c1 = E_PRIME2 * cos_phi * cos_phi;
    let t1 = tan_phi * tan_phi;
    let w = 1.0 - E2 * sin_phi * sin_phi;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / (w * w.sqrt());
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan_phi / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi;

    Coord {
        x: lon.to_degrees(),
        y: lat.to_degrees(),
    }
}
