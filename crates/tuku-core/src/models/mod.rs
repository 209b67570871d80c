pub mod image;
pub mod token;
pub mod upload;

pub use image::{
    clip_original_name, group_by_day, public_url, GalleryDay, ImageRecord, ImageResponse,
    NewImageRecord, ORIGINAL_NAME_MAX_CHARS,
};
pub use token::CachedToken;
pub use upload::{FileMeta, ImageInspection, UploadStatus, UploadedFile, ValidationOutcome};
