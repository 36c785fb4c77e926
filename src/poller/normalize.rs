//! Raw report to [`Position`] conversion

use crate::flight::{Position, RawPositionReport};
use crate::sources::ReferenceArea;

/// Below this altitude a slow report is treated as on the ground
pub const MIN_AIRBORNE_ALTITUDE_FT: i32 = 100;
/// Below this speed a low report is treated as on the ground
pub const MIN_AIRBORNE_SPEED_KT: u32 = 50;

/// Normalize one report, or `None` if it should not be displayed
///
/// Dropped: reports without a usable position, blank hex, aircraft flagged
/// on the ground, and aircraft both below [`MIN_AIRBORNE_ALTITUDE_FT`] and
/// slower than [`MIN_AIRBORNE_SPEED_KT`]. Missing altitude, speed, heading
/// and vertical rate default to zero.
pub fn normalize(report: RawPositionReport) -> Option<Position> {
    let latitude = report.latitude.filter(|lat| (-90.0..=90.0).contains(lat))?;
    let longitude = report.longitude.filter(|lon| (-180.0..=180.0).contains(lon))?;
    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }

    let hex = report.hex.trim().to_lowercase();
    if hex.is_empty() || report.on_ground {
        return None;
    }

    let altitude = report
        .altitude
        .map(|alt| alt.to_feet().round() as i32)
        .unwrap_or(0);
    let ground_speed = report
        .ground_speed
        .map(|speed| speed.to_knots().max(0.0).round() as u32)
        .unwrap_or(0);
    if altitude < MIN_AIRBORNE_ALTITUDE_FT && ground_speed < MIN_AIRBORNE_SPEED_KT {
        return None;
    }

    let heading = report
        .heading
        .filter(|h| h.is_finite())
        .map(|h| (h.rem_euclid(360.0).round() as u16) % 360)
        .unwrap_or(0);
    let vertical_rate = report
        .vertical_rate
        .map(|rate| rate.to_feet_per_minute().round() as i32)
        .unwrap_or(0);

    let callsign = report
        .callsign
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());
    let squawk = report
        .squawk
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(Position {
        hex,
        callsign,
        latitude,
        longitude,
        altitude,
        ground_speed,
        heading,
        vertical_rate,
        squawk,
        observed_at: report.observed_at,
        distance_nm: None,
    })
}

/// Normalize a batch, keeping source order
pub fn normalize_batch(reports: Vec<RawPositionReport>) -> Vec<Position> {
    reports.into_iter().filter_map(normalize).collect()
}

/// Keep positions within `area`, nearest first
///
/// Each kept position carries its distance from the reference point,
/// rounded to 0.1 nm. Equal distances keep their source order.
pub fn within_area(positions: Vec<Position>, area: &ReferenceArea) -> Vec<Position> {
    let mut kept: Vec<Position> = positions
        .into_iter()
        .filter_map(|mut position| {
            let distance = area.distance_nm(position.latitude, position.longitude);
            if distance > area.radius_nm {
                return None;
            }
            position.distance_nm = Some((distance * 10.0).round() / 10.0);
            Some(position)
        })
        .collect();
    kept.sort_by(|a, b| {
        a.distance_nm
            .unwrap_or_default()
            .total_cmp(&b.distance_nm.unwrap_or_default())
    });
    kept
}
