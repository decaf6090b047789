use chrono::naive::NaiveDateTime;
use serde::Deserialize;

use super::models::{BoundingBox, EventDraft, SENTINEL_OWNER};
use crate::error::ValidationFailed;
use crate::geocoding::Coordinates;

/// The body of `POST /api/events`. A client-supplied `event_created` is ignored.
#[derive(Debug, Deserialize, Default)]
pub struct NewEvent {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_sources: Option<Vec<String>>,
    #[serde(default, with = "crate::date_format::option")]
    pub event_date: Option<NaiveDateTime>,
    #[serde(default, with = "crate::date_format::option")]
    pub event_start_time: Option<NaiveDateTime>,
    #[serde(default, with = "crate::date_format::option")]
    pub event_end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl NewEvent {
    /// Checks the form and splits off the coordinates, if the client sent any.
    pub fn validate(self) -> Result<(EventDraft, Option<Coordinates>), ValidationFailed> {
        use crate::validators::IMAGE_KEY;

        let name = self.name.ok_or(ValidationFailed("name is required."))?;
        let address = self.address.ok_or(ValidationFailed("address is required."))?;
        let description = self.description.ok_or(ValidationFailed("description is required."))?;
        let event_type = self.event_type.unwrap_or_else(|| "Any".to_string());

        let image_sources = self.image_sources.unwrap_or_default();
        for key in &image_sources {
            IMAGE_KEY.run(key)?;
        }

        let event_date = self.event_date.ok_or(ValidationFailed("event_date is required."))?;
        let event_start_time = self
            .event_start_time
            .ok_or(ValidationFailed("event_start_time is required."))?;
        let event_end_time = self
            .event_end_time
            .ok_or(ValidationFailed("event_end_time is required."))?;
        if event_start_time > event_end_time {
            return Err(ValidationFailed("event_start_time must not be after event_end_time."));
        }

        let coordinates = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)?),
            (None, None) => None,
            _ => return Err(ValidationFailed("latitude and longitude must be given together.")),
        };

        let draft = EventDraft {
            user_id: self.user_id.unwrap_or(SENTINEL_OWNER),
            name,
            event_type,
            address,
            description,
            image_sources,
            event_date,
            event_start_time,
            event_end_time,
        };
        Ok((draft, coordinates))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct EventsQuery {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lng: Option<f64>,
}

impl EventsQuery {
    pub fn bounding_box(&self) -> Result<Option<BoundingBox>, ValidationFailed> {
        match (self.min_lat, self.max_lat, self.min_lng, self.max_lng) {
            (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => {
                BoundingBox::new(min_lat, max_lat, min_lng, max_lng).map(Some)
            }
            (None, None, None, None) => Ok(None),
            _ => Err(ValidationFailed(
                "min_lat, max_lat, min_lng and max_lng must be given together.",
            )),
        }
    }
}

#[cfg(test)]
fn sample() -> NewEvent {
    serde_json::from_str(
        r#"{
            "name": "Night Market",
            "address": "1 Market Street",
            "description": "Food and music",
            "image_sources": ["events/a.png"],
            "event_date": "2025-03-01",
            "event_start_time": "2025-03-01T18:00:00",
            "event_end_time": "2025-03-01T21:00:00",
            "event_created": "1999-01-01T00:00:00"
        }"#,
    )
    .unwrap()
}

#[test]
fn test_validate() {
    let (draft, coordinates) = sample().validate().unwrap();
    assert_eq!(draft.user_id, SENTINEL_OWNER);
    assert_eq!(draft.event_type, "Any");
    assert_eq!(draft.image_sources, vec!["events/a.png".to_string()]);
    assert_eq!(coordinates, None);

    let form = NewEvent {
        latitude: Some(1.5),
        longitude: Some(2.5),
        user_id: Some(7),
        ..sample()
    };
    let (draft, coordinates) = form.validate().unwrap();
    assert_eq!(draft.user_id, 7);
    assert_eq!(coordinates, Some(Coordinates::new(1.5, 2.5).unwrap()));

    let e = NewEvent { name: None, ..sample() }.validate().unwrap_err();
    assert_eq!(e.0, "name is required.");
    let e = NewEvent {
        latitude: Some(1.0),
        ..sample()
    }
    .validate()
    .unwrap_err();
    assert_eq!(e.0, "latitude and longitude must be given together.");
    assert!(NewEvent {
        latitude: Some(95.0),
        longitude: Some(0.0),
        ..sample()
    }
    .validate()
    .is_err());

    let mut form = sample();
    std::mem::swap(&mut form.event_start_time, &mut form.event_end_time);
    assert!(form.validate().is_err());

    let form = NewEvent {
        image_sources: Some(vec![String::new()]),
        ..sample()
    };
    assert!(form.validate().is_err());

    let form = NewEvent {
        image_sources: None,
        ..sample()
    };
    assert!(form.validate().unwrap().0.image_sources.is_empty());

    // Text fields only have to be present.
    let form = NewEvent {
        name: Some("n".repeat(300)),
        description: Some("d".repeat(5000)),
        address: Some("a".repeat(600)),
        event_type: Some(String::new()),
        ..sample()
    };
    let (draft, _) = form.validate().unwrap();
    assert_eq!(draft.name.len(), 300);
    assert_eq!(draft.description.len(), 5000);
    assert_eq!(draft.event_type, "");
    let e = NewEvent {
        description: None,
        ..sample()
    }
    .validate()
    .unwrap_err();
    assert_eq!(e.0, "description is required.");
}

#[test]
fn test_bounding_box_query() {
    let query: EventsQuery = serde_urlencoded::from_str("min_lat=0&max_lat=10&min_lng=0&max_lng=10").unwrap();
    assert_eq!(
        query.bounding_box().unwrap(),
        Some(BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap())
    );
    assert_eq!(EventsQuery::default().bounding_box().unwrap(), None);
    let query: EventsQuery = serde_urlencoded::from_str("min_lat=0&max_lat=10").unwrap();
    assert!(query.bounding_box().is_err());
    let query: EventsQuery = serde_urlencoded::from_str("min_lat=5&max_lat=1&min_lng=0&max_lng=10").unwrap();
    assert!(query.bounding_box().is_err());
}
