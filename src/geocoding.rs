//! Address to coordinates resolution.
//!
//! The production implementation talks to a Nominatim-compatible search
//! endpoint. There is no retry: a failed lookup is reported to the caller as is.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::context::GeocoderConfig;
use crate::error::ValidationFailed;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Coordinates, ValidationFailed> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(ValidationFailed("Coordinates must be finite numbers."));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationFailed("Latitude must be between -90 and 90."));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationFailed("Longitude must be between -180 and 180."));
        }
        Ok(Coordinates { latitude, longitude })
    }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no match was found for the address")]
    NoMatch,
    #[error("the geocoding service responded with status {0}")]
    Status(u16),
    #[error("the geocoding service returned malformed data")]
    Malformed,
    #[error("failed to reach the geocoding service")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

pub struct Nominatim {
    client: reqwest::Client,
    url: String,
}

impl Nominatim {
    pub fn new(config: &GeocoderConfig) -> Result<Nominatim, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;
        Ok(Nominatim {
            client,
            url: config.url.clone(),
        })
    }
}

// Nominatim sends coordinates as strings, some compatible services as numbers.
#[derive(Debug, Deserialize)]
struct Place {
    lat: JsonValue,
    lon: JsonValue,
}

fn coordinate(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn first_match(places: Vec<Place>) -> Result<Coordinates, GeocodeError> {
    let place = places.into_iter().next().ok_or(GeocodeError::NoMatch)?;
    let latitude = coordinate(&place.lat).ok_or(GeocodeError::Malformed)?;
    let longitude = coordinate(&place.lon).ok_or(GeocodeError::Malformed)?;
    Coordinates::new(latitude, longitude).map_err(|_| GeocodeError::Malformed)
}

#[async_trait]
impl Geocoder for Nominatim {
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("Geocoding \"{}\" failed with status {}", address, status);
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let places: Vec<Place> = response.json().await.map_err(|e| {
            log::warn!("Malformed geocoding response: {}", e);
            GeocodeError::Malformed
        })?;
        let coordinates = first_match(places)?;
        log::debug!("\"{}\" was geocoded to {:?}", address, coordinates);
        Ok(coordinates)
    }
}

#[test]
fn test_first_match() {
    let body = r#"[
        {"place_id": 1, "lat": "52.5170365", "lon": "13.3888599", "display_name": "Berlin"},
        {"place_id": 2, "lat": "0", "lon": "0"}
    ]"#;
    let places: Vec<Place> = serde_json::from_str(body).unwrap();
    let coordinates = first_match(places).unwrap();
    assert_eq!(coordinates.latitude, 52.5170365);
    assert_eq!(coordinates.longitude, 13.3888599);

    let places: Vec<Place> = serde_json::from_str(r#"[{"lat": 10.5, "lon": -3}]"#).unwrap();
    assert_eq!(first_match(places).unwrap(), Coordinates::new(10.5, -3.0).unwrap());

    let places: Vec<Place> = serde_json::from_str("[]").unwrap();
    assert!(matches!(first_match(places), Err(GeocodeError::NoMatch)));

    let places: Vec<Place> = serde_json::from_str(r#"[{"lat": "north", "lon": "1"}]"#).unwrap();
    assert!(matches!(first_match(places), Err(GeocodeError::Malformed)));

    let places: Vec<Place> = serde_json::from_str(r#"[{"lat": "91", "lon": "1"}]"#).unwrap();
    assert!(matches!(first_match(places), Err(GeocodeError::Malformed)));
}

#[test]
fn test_coordinates() {
    assert!(Coordinates::new(0.0, 0.0).is_ok());
    assert!(Coordinates::new(-90.0, 180.0).is_ok());
    assert!(Coordinates::new(90.5, 0.0).is_err());
    assert!(Coordinates::new(0.0, -180.5).is_err());
    assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
}
