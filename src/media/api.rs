use serde::{Deserialize, Serialize};

use crate::storage::UploadForm;

#[derive(Debug, Deserialize)]
pub struct PresignUpload {
    pub file_type: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadTicket {
    pub data: UploadForm,
    pub file_key: String,
}

#[derive(Debug, Deserialize)]
pub struct FileKey {
    pub file_key: String,
}

#[derive(Debug, Serialize)]
pub struct PresignedGet {
    pub get_url: String,
}
