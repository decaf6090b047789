use chrono::naive::NaiveDateTime;
use postgres_types::Json;
use serde::Serialize;
use tokio_postgres::Row;

use crate::database::Querist;
use crate::error::{DbError, ValidationFailed};
use crate::geocoding::Coordinates;

/// Owner of events created without a `user_id`. The row need not exist.
pub const SENTINEL_OWNER: i32 = 1;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: i32,
    pub user_id: i32,
    pub event_type: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    /// Object keys in storage, or presigned URLs once resolved for a reader.
    pub image_sources: Vec<String>,
    #[serde(with = "crate::date_format")]
    pub event_date: NaiveDateTime,
    #[serde(with = "crate::date_format")]
    pub event_start_time: NaiveDateTime,
    #[serde(with = "crate::date_format")]
    pub event_end_time: NaiveDateTime,
    #[serde(with = "crate::date_format")]
    pub event_created: NaiveDateTime,
}

/// A validated event that has not been stored yet.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub user_id: i32,
    pub name: String,
    pub event_type: String,
    pub address: String,
    pub description: String,
    pub image_sources: Vec<String>,
    pub event_date: NaiveDateTime,
    pub event_start_time: NaiveDateTime,
    pub event_end_time: NaiveDateTime,
}

/// Inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Result<BoundingBox, ValidationFailed> {
        let min = Coordinates::new(min_lat, min_lng)?;
        let max = Coordinates::new(max_lat, max_lng)?;
        if min.latitude > max.latitude {
            return Err(ValidationFailed("min_lat must not be greater than max_lat."));
        }
        if min.longitude > max.longitude {
            return Err(ValidationFailed("min_lng must not be greater than max_lng."));
        }
        Ok(BoundingBox {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude) && (self.min_lng..=self.max_lng).contains(&longitude)
    }
}

impl Event {
    fn from_row(row: &Row) -> Event {
        let Json(image_sources): Json<Vec<String>> = row.get("image_sources");
        Event {
            event_id: row.get("event_id"),
            user_id: row.get("user_id"),
            event_type: row.get("event_type"),
            name: row.get("name"),
            address: row.get("address"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            description: row.get("description"),
            image_sources,
            event_date: row.get("event_date"),
            event_start_time: row.get("event_start_time"),
            event_end_time: row.get("event_end_time"),
            event_created: row.get("event_created"),
        }
    }

    pub async fn create<T: Querist>(db: &mut T, draft: &EventDraft, at: Coordinates) -> Result<Event, DbError> {
        let row = db
            .query_exactly_one(
                include_str!("sql/create.sql"),
                &[
                    &draft.user_id,
                    &draft.name,
                    &draft.event_type,
                    &draft.address,
                    &draft.description,
                    &Json(&draft.image_sources),
                    &at.latitude,
                    &at.longitude,
                    &draft.event_date,
                    &draft.event_start_time,
                    &draft.event_end_time,
                ],
            )
            .await?;
        Ok(Event::from_row(&row))
    }

    pub async fn get_by_id<T: Querist>(db: &mut T, event_id: i32) -> Result<Option<Event>, DbError> {
        let row = db.query_one(include_str!("sql/get.sql"), &[&event_id]).await?;
        Ok(row.as_ref().map(Event::from_row))
    }

    pub async fn all<T: Querist>(db: &mut T) -> Result<Vec<Event>, DbError> {
        let rows = db.query(include_str!("sql/all.sql"), &[]).await?;
        Ok(rows.iter().map(Event::from_row).collect())
    }

    pub async fn within<T: Querist>(db: &mut T, bounds: &BoundingBox) -> Result<Vec<Event>, DbError> {
        let rows = db
            .query(
                include_str!("sql/within.sql"),
                &[&bounds.min_lat, &bounds.max_lat, &bounds.min_lng, &bounds.max_lng],
            )
            .await?;
        Ok(rows.iter().map(Event::from_row).collect())
    }

    pub async fn exists<T: Querist>(db: &mut T, event_id: i32) -> Result<bool, DbError> {
        let row = db.query_exactly_one(include_str!("sql/exists.sql"), &[&event_id]).await?;
        Ok(row.get(0))
    }

    /// Also removes the event's chat messages.
    pub async fn delete<T: Querist>(db: &mut T, event_id: i32) -> Result<u64, DbError> {
        db.execute(include_str!("sql/delete.sql"), &[&event_id]).await
    }
}

#[cfg(test)]
pub fn test_draft(name: &str) -> EventDraft {
    let start = chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
        .and_then(|date| date.and_hms_opt(18, 0, 0))
        .unwrap();
    EventDraft {
        user_id: SENTINEL_OWNER,
        name: name.to_string(),
        event_type: "Any".to_string(),
        address: "1 Market Street".to_string(),
        description: String::new(),
        image_sources: vec!["events/a.png".to_string(), "events/b.jpg".to_string()],
        event_date: start,
        event_start_time: start,
        event_end_time: start + chrono::Duration::hours(3),
    }
}

#[test]
fn test_bounding_box() {
    let bounds = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
    assert!(bounds.contains(0.0, 0.0));
    assert!(bounds.contains(10.0, 10.0));
    assert!(!bounds.contains(-5.0, -5.0));
    assert!(!bounds.contains(5.0, 10.5));

    assert!(BoundingBox::new(10.0, 0.0, 0.0, 10.0).is_err());
    assert!(BoundingBox::new(0.0, 10.0, 10.0, 0.0).is_err());
    assert!(BoundingBox::new(0.0, 91.0, 0.0, 10.0).is_err());
    assert!(BoundingBox::new(f64::NAN, 10.0, 0.0, 10.0).is_err());
}

#[tokio::test]
async fn event_test() {
    use crate::database::test_client;

    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    let mut trans = client.transaction().await.unwrap();
    let db = &mut trans;

    let draft = test_draft("Night Market");
    let event = Event::create(db, &draft, Coordinates::new(35.0, 139.0).unwrap())
        .await
        .unwrap();
    assert_eq!(event.user_id, SENTINEL_OWNER);
    assert_eq!(event.image_sources, draft.image_sources);
    assert_eq!(event.latitude, 35.0);
    let elapsed = chrono::Utc::now().naive_utc() - event.event_created;
    assert!(elapsed.num_minutes().abs() < 5);

    assert_eq!(Event::get_by_id(db, event.event_id).await.unwrap(), Some(event.clone()));
    assert!(Event::exists(db, event.event_id).await.unwrap());

    assert_eq!(Event::delete(db, event.event_id).await.unwrap(), 1);
    assert!(!Event::exists(db, event.event_id).await.unwrap());
    assert_eq!(Event::get_by_id(db, event.event_id).await.unwrap(), None);
}

#[tokio::test]
async fn events_within_bounds() {
    use crate::database::test_client;

    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    let mut trans = client.transaction().await.unwrap();
    let db = &mut trans;
    // Start from an empty table; the transaction is never committed.
    db.execute("DELETE FROM events", &[]).await.unwrap();

    let mut created = Vec::new();
    for (latitude, longitude) in [(0.0, 0.0), (10.0, 10.0), (-5.0, -5.0)] {
        let at = Coordinates::new(latitude, longitude).unwrap();
        created.push(Event::create(db, &test_draft("Spot"), at).await.unwrap());
    }

    let bounds = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
    let found: Vec<i32> = Event::within(db, &bounds)
        .await
        .unwrap()
        .into_iter()
        .map(|event| event.event_id)
        .collect();
    assert_eq!(found, vec![created[0].event_id, created[1].event_id]);

    let all: Vec<i32> = Event::all(db).await.unwrap().into_iter().map(|e| e.event_id).collect();
    assert_eq!(all, created.iter().map(|e| e.event_id).collect::<Vec<_>>());
}
