use store::StoreError;

use crate::upload::UploadError;

pub(crate) const STORE_UNAVAILABLE: &str = "store_unavailable";
pub(crate) const UPLOAD_FAILED: &str = "upload_failed";

/// Every store failure is reported to clients with the same opaque code; the
/// cause only goes to the log.
pub(crate) fn map_store_error(error: &StoreError) -> (u16, &'static str) {
    match error {
        StoreError::Http(_) | StoreError::Backend(_) => {
            tracing::error!(error = %error, "record store unreachable");
        }
        StoreError::Decode(_) => {
            tracing::error!(error = %error, "record store returned undecodable data");
        }
        StoreError::InvalidConfig(_) => {
            tracing::error!(error = %error, "record store misconfigured");
        }
    }
    (500, STORE_UNAVAILABLE)
}

pub(crate) fn map_upload_error(error: &UploadError) -> (u16, &'static str) {
    tracing::error!(error = %error, "upload failed");
    (500, UPLOAD_FAILED)
}
