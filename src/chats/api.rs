use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}
