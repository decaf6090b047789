use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Register {
    #[serde(default)]
    pub username: String,
}
