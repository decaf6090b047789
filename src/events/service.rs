use futures::future::try_join_all;

use super::api::NewEvent;
use super::models::{BoundingBox, Event, EventDraft};
use crate::database::Querist;
use crate::error::AppError;
use crate::geocoding::{Coordinates, GeocodeError, Geocoder};
use crate::media::ObjectResolver;

/// Uses the given coordinates, or asks the geocoder exactly once.
pub async fn resolve_coordinates(
    geocoder: &dyn Geocoder,
    address: &str,
    given: Option<Coordinates>,
) -> Result<Coordinates, GeocodeError> {
    match given {
        Some(coordinates) => Ok(coordinates),
        None => geocoder.resolve(address).await,
    }
}

/// Validation and geocoding, which happen before any connection is taken.
pub async fn prepare_event(geocoder: &dyn Geocoder, form: NewEvent) -> Result<(EventDraft, Coordinates), AppError> {
    let (draft, given) = form.validate()?;
    let coordinates = resolve_coordinates(geocoder, &draft.address, given).await?;
    Ok((draft, coordinates))
}

pub async fn with_presigned_urls(resolver: &ObjectResolver, event: Event) -> Result<Event, AppError> {
    let urls = try_join_all(event.image_sources.iter().map(|key| resolver.to_presigned_get_url(key))).await?;
    Ok(Event {
        image_sources: urls,
        ..event
    })
}

pub async fn list_events<T: Querist>(
    db: &mut T,
    resolver: &ObjectResolver,
    bounds: Option<BoundingBox>,
) -> Result<Vec<Event>, AppError> {
    let events = match bounds {
        Some(bounds) => Event::within(db, &bounds).await?,
        None => Event::all(db).await?,
    };
    try_join_all(events.into_iter().map(|event| with_presigned_urls(resolver, event))).await
}

pub async fn get_event<T: Querist>(db: &mut T, resolver: &ObjectResolver, event_id: i32) -> Result<Event, AppError> {
    let event = Event::get_by_id(db, event_id).await?.ok_or(AppError::NotFound("event"))?;
    with_presigned_urls(resolver, event).await
}

#[cfg(test)]
struct CountingGeocoder {
    calls: std::sync::atomic::AtomicUsize,
    result: Option<Coordinates>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl Geocoder for CountingGeocoder {
    async fn resolve(&self, _address: &str) -> Result<Coordinates, GeocodeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.result.ok_or(GeocodeError::NoMatch)
    }
}

#[cfg(test)]
fn form(latitude: Option<f64>, longitude: Option<f64>) -> NewEvent {
    let mut form: NewEvent = serde_json::from_str(
        r#"{
            "name": "Picnic",
            "address": "Central Park",
            "description": "",
            "event_date": "2025-06-01",
            "event_start_time": "2025-06-01T12:00:00",
            "event_end_time": "2025-06-01T15:00:00"
        }"#,
    )
    .unwrap();
    form.latitude = latitude;
    form.longitude = longitude;
    form
}

#[tokio::test]
async fn geocoder_is_called_only_without_coordinates() {
    use std::sync::atomic::Ordering;

    let geocoder = CountingGeocoder {
        calls: Default::default(),
        result: Coordinates::new(40.78, -73.97).ok(),
    };

    let (_, at) = prepare_event(&geocoder, form(Some(1.0), Some(2.0))).await.unwrap();
    assert_eq!(at, Coordinates::new(1.0, 2.0).unwrap());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);

    let (_, at) = prepare_event(&geocoder, form(None, None)).await.unwrap();
    assert_eq!(at, Coordinates::new(40.78, -73.97).unwrap());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

    assert!(prepare_event(&geocoder, form(Some(1.0), None)).await.is_err());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn geocoding_failure_is_reported() {
    let geocoder = CountingGeocoder {
        calls: Default::default(),
        result: None,
    };
    let e = prepare_event(&geocoder, form(None, None)).await.unwrap_err();
    assert_eq!(e.error_code(), "GEOCODE_FAIL");
    assert_eq!(geocoder.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_keys_become_urls_in_order() {
    use crate::media::FakeStore;
    use std::sync::Arc;

    let resolver = ObjectResolver::new(Arc::new(FakeStore::default()), 3600);
    let noon = chrono::NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .unwrap();
    let event = Event {
        event_id: 1,
        user_id: 1,
        event_type: "Any".to_string(),
        name: "Picnic".to_string(),
        address: "Central Park".to_string(),
        latitude: 0.0,
        longitude: 0.0,
        description: String::new(),
        image_sources: vec!["events/b.png".to_string(), "events/a.png".to_string()],
        event_date: noon,
        event_start_time: noon,
        event_end_time: noon,
        event_created: noon,
    };
    let event = with_presigned_urls(&resolver, event).await.unwrap();
    assert_eq!(
        event.image_sources,
        vec![
            "https://bucket.test/events/b.png?expires=3600".to_string(),
            "https://bucket.test/events/a.png?expires=3600".to_string(),
        ]
    );
}

#[tokio::test]
async fn list_events_resolves_urls() {
    use crate::database::test_client;
    use crate::events::models::test_draft;
    use crate::media::FakeStore;
    use std::sync::Arc;

    let resolver = ObjectResolver::new(Arc::new(FakeStore::default()), 600);
    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    let mut trans = client.transaction().await.unwrap();
    let db = &mut trans;

    let at = Coordinates::new(-33.86, 151.2).unwrap();
    let event = Event::create(db, &test_draft("Harbour"), at).await.unwrap();
    let bounds = BoundingBox::new(-34.0, -33.0, 151.0, 152.0).ok();
    let events = list_events(db, &resolver, bounds).await.unwrap();
    let listed = events.iter().find(|e| e.event_id == event.event_id).unwrap();
    assert_eq!(
        listed.image_sources,
        vec![
            "https://bucket.test/events/a.png?expires=600".to_string(),
            "https://bucket.test/events/b.jpg?expires=600".to_string(),
        ]
    );

    let fetched = get_event(db, &resolver, event.event_id).await.unwrap();
    assert_eq!(fetched.image_sources, listed.image_sources);
    Event::delete(db, event.event_id).await.unwrap();
    assert_eq!(get_event(db, &resolver, event.event_id).await.unwrap_err().error_code(), "NOT_FOUND");
}
