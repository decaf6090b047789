use postgres_types::FromSql;
use serde::Serialize;

use crate::database::Querist;
use crate::error::ModelError;
use crate::events::Event;
use crate::utils::timestamp;

#[derive(Debug, Serialize, FromSql, Clone, PartialEq)]
#[postgres(name = "chat_messages")]
pub struct ChatMessage {
    pub message_id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub message: String,
    /// Unix epoch seconds, set by the server.
    pub timestamp: i64,
}

impl ChatMessage {
    /// Nothing is written unless the event exists. A missing user surfaces as a
    /// foreign key violation.
    pub async fn post<T: Querist>(
        db: &mut T,
        event_id: i32,
        user_id: i32,
        message: &str,
    ) -> Result<ChatMessage, ModelError> {
        use crate::validators::MESSAGE;
        MESSAGE.run(message)?;

        if !Event::exists(db, event_id).await? {
            return Err(ModelError::InvalidEvent(event_id));
        }
        let row = db
            .query_exactly_one(
                include_str!("sql/create.sql"),
                &[&event_id, &user_id, &message, &timestamp()],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn by_event<T: Querist>(db: &mut T, event_id: i32) -> Result<Vec<ChatMessage>, ModelError> {
        if !Event::exists(db, event_id).await? {
            return Err(ModelError::InvalidEvent(event_id));
        }
        let rows = db.query(include_str!("sql/by_event.sql"), &[&event_id]).await?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }
}

#[cfg(test)]
async fn count_messages<T: Querist>(db: &mut T, event_id: i32) -> i64 {
    let row = db
        .query_exactly_one("SELECT count(*) FROM chat_messages WHERE event_id = $1", &[&event_id])
        .await
        .unwrap();
    row.get(0)
}

#[tokio::test]
async fn message_test() {
    use crate::database::test_client;
    use crate::events::test_draft;
    use crate::geocoding::Coordinates;
    use crate::users::{unique_name, User};

    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    let mut trans = client.transaction().await.unwrap();
    let db = &mut trans;

    let user = User::create(db, &unique_name("madoka")).await.unwrap();
    let at = Coordinates::new(0.0, 0.0).unwrap();
    let event = Event::create(db, &test_draft("Tea Party"), at).await.unwrap();

    let missing_event = event.event_id + 1_000_000;
    match ChatMessage::post(db, missing_event, user.user_id, "hello").await {
        Err(ModelError::InvalidEvent(id)) => assert_eq!(id, missing_event),
        other => panic!("expected an invalid event error, got {:?}", other),
    }
    assert_eq!(count_messages(db, missing_event).await, 0);

    assert!(matches!(
        ChatMessage::post(db, event.event_id, user.user_id, "").await,
        Err(ModelError::Validation(_))
    ));

    let mut posted = Vec::new();
    for text in ["first", "second", "third"] {
        posted.push(ChatMessage::post(db, event.event_id, user.user_id, text).await.unwrap());
    }
    for pair in posted.windows(2) {
        assert!(pair[0].message_id < pair[1].message_id);
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    assert_eq!(ChatMessage::by_event(db, event.event_id).await.unwrap(), posted);
    assert!(matches!(
        ChatMessage::by_event(db, missing_event).await,
        Err(ModelError::InvalidEvent(_))
    ));
}

#[tokio::test]
async fn deletes_cascade_to_messages() {
    use crate::database::test_client;
    use crate::events::test_draft;
    use crate::geocoding::Coordinates;
    use crate::users::{unique_name, User};

    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    let mut trans = client.transaction().await.unwrap();
    let db = &mut trans;

    let author = User::create(db, &unique_name("sayaka")).await.unwrap();
    let other = User::create(db, &unique_name("kyoko")).await.unwrap();
    let at = Coordinates::new(1.0, 1.0).unwrap();
    let first = Event::create(db, &test_draft("Concert"), at).await.unwrap();
    let second = Event::create(db, &test_draft("Festival"), at).await.unwrap();

    ChatMessage::post(db, first.event_id, author.user_id, "see you").await.unwrap();
    ChatMessage::post(db, second.event_id, author.user_id, "on my way").await.unwrap();
    ChatMessage::post(db, second.event_id, other.user_id, "me too").await.unwrap();

    Event::delete(db, first.event_id).await.unwrap();
    assert_eq!(count_messages(db, first.event_id).await, 0);
    assert_eq!(count_messages(db, second.event_id).await, 2);

    User::delete(db, author.user_id).await.unwrap();
    let remaining = ChatMessage::by_event(db, second.event_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, other.user_id);
}

#[tokio::test]
async fn unknown_author_writes_nothing() {
    use crate::database::test_client;
    use crate::error::AppError;
    use crate::events::test_draft;
    use crate::geocoding::Coordinates;
    use crate::users::User;

    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    // The event has to be committed: the failed insert aborts the transaction it runs in.
    let at = Coordinates::new(2.0, 2.0).unwrap();
    let event = Event::create(&mut client, &test_draft("Picnic"), at).await.unwrap();
    let stranger = i32::MAX;
    assert_eq!(User::get_by_id(&mut client, stranger).await.unwrap(), None);

    let mut trans = client.transaction().await.unwrap();
    let e = match ChatMessage::post(&mut trans, event.event_id, stranger, "hello").await {
        Err(e @ ModelError::Database(_)) => e,
        other => panic!("expected a database error, got {:?}", other),
    };
    assert_eq!(AppError::from(e).error_code(), "PERSISTENCE_FAIL");
    drop(trans);

    assert_eq!(count_messages(&mut client, event.event_id).await, 0);
    Event::delete(&mut client, event.event_id).await.unwrap();
}
