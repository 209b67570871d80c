use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Persisted metadata for one accepted upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct ImageRecord {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    /// Path relative to the storage root, e.g. `uploads/<filename>`
    pub file_path: String,
    pub upload_time: DateTime<Utc>,
    pub views: i64,
    pub last_viewed: Option<DateTime<Utc>>,
    pub status: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub delete_password: String,
}

/// Width of the `images.original_name` column, in characters
pub const ORIGINAL_NAME_MAX_CHARS: usize = 255;

/// Clip a client-supplied file name to what the database stores.
pub fn clip_original_name(name: &str) -> String {
    name.chars().take(ORIGINAL_NAME_MAX_CHARS).collect()
}

/// Insert payload for [`ImageRecord`]
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub filename: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub file_path: String,
    pub delete_password_hash: String,
}

/// Public URL of a stored file.
pub fn public_url(base_url: &str, file_path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), file_path.trim_start_matches('/'))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageResponse {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub url: String,
    pub upload_time: DateTime<Utc>,
    pub views: i64,
}

impl ImageResponse {
    pub fn from_record(record: ImageRecord, base_url: &str) -> Self {
        Self {
            url: public_url(base_url, &record.file_path),
            id: record.id,
            filename: record.filename,
            original_name: record.original_name,
            file_size: record.file_size,
            mime_type: record.mime_type,
            upload_time: record.upload_time,
            views: record.views,
        }
    }
}

/// Gallery section: every image uploaded on one calendar day
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GalleryDay {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub images: Vec<ImageResponse>,
}

/// Groups records by upload date. Input is expected newest first and order is kept.
pub fn group_by_day(records: Vec<ImageRecord>, base_url: &str) -> Vec<GalleryDay> {
    let mut days: Vec<GalleryDay> = Vec::new();
    for record in records {
        let date = record.upload_time.date_naive();
        let image = ImageResponse::from_record(record, base_url);
        match days.last_mut() {
            Some(day) if day.date == date => day.images.push(image),
            _ => days.push(GalleryDay {
                date,
                images: vec![image],
            }),
        }
    }
    days
}
