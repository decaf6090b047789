use postgres_types::FromSql;
use serde::Serialize;

use crate::database::Querist;
use crate::error::{DbError, ModelError};

#[derive(Debug, Serialize, FromSql, Clone, PartialEq)]
#[postgres(name = "users")]
pub struct User {
    pub user_id: i32,
    pub username: String,
}

impl User {
    /// The username is stored exactly as given; uniqueness is case-sensitive.
    pub async fn create<T: Querist>(db: &mut T, username: &str) -> Result<User, ModelError> {
        use crate::validators::USERNAME;
        USERNAME.run(username)?;

        let row = db.query_one(include_str!("sql/create.sql"), &[&username]).await?;
        match row {
            Some(row) => Ok(row.get(0)),
            None => Err(ModelError::DuplicateUsername(username.to_string())),
        }
    }

    pub async fn get_by_id<T: Querist>(db: &mut T, user_id: i32) -> Result<Option<User>, DbError> {
        let row = db.query_one(include_str!("sql/get.sql"), &[&user_id]).await?;
        Ok(row.map(|row| row.get(0)))
    }

    /// Also removes every chat message the user wrote.
    pub async fn delete<T: Querist>(db: &mut T, user_id: i32) -> Result<u64, DbError> {
        db.execute(include_str!("sql/delete.sql"), &[&user_id]).await
    }
}

#[cfg(test)]
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

#[tokio::test]
async fn user_test() {
    use crate::database::test_client;

    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    let mut trans = client.transaction().await.unwrap();
    let db = &mut trans;
    let username = unique_name("Humura");

    let user = User::create(db, &username).await.unwrap();
    assert_eq!(user.username, username);
    assert_eq!(User::get_by_id(db, user.user_id).await.unwrap(), Some(user.clone()));

    match User::create(db, &username).await {
        Err(ModelError::DuplicateUsername(name)) => assert_eq!(name, username),
        other => panic!("expected a duplicate username error, got {:?}", other),
    }
    let row = db
        .query_exactly_one("SELECT count(*) FROM users WHERE username = $1", &[&username])
        .await
        .unwrap();
    let count: i64 = row.get(0);
    assert_eq!(count, 1);

    let lowercase = username.to_lowercase();
    assert!(User::create(db, &lowercase).await.is_ok());

    assert!(matches!(User::create(db, "   ").await, Err(ModelError::Validation(_))));
    assert!(matches!(
        User::create(db, &"x".repeat(65)).await,
        Err(ModelError::Validation(_))
    ));

    assert_eq!(User::delete(db, user.user_id).await.unwrap(), 1);
    assert_eq!(User::get_by_id(db, user.user_id).await.unwrap(), None);
}
