use serde::Deserialize;

/// `biz_data` of `POST /file/upload_file`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub status: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}
