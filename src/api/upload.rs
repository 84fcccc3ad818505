//! Multipart form reading for spreadsheet uploads

use crate::error::{DashboardError, DashboardResult};
use crate::ingest::UploadRequest;
use bytes::BufMut;
use futures::TryStreamExt;
use warp::multipart::{FormData, Part};

/// Form field carrying the spreadsheet
pub const FILE_FIELD: &str = "excelFile";
pub const BRANCH_FIELD: &str = "branch";

fn malformed(e: warp::Error) -> DashboardError {
    DashboardError::invalid_input(format!("Malformed multipart body: {e}"))
}

async fn read_part(part: Part) -> DashboardResult<Vec<u8>> {
    part.stream()
        .try_fold(Vec::new(), |mut data, chunk| async move {
            data.put(chunk);
            Ok::<_, warp::Error>(data)
        })
        .await
        .map_err(malformed)
}

/// Collect the file and branch fields; other fields are ignored
///
/// Each part is drained before the next is pulled from the form.
pub async fn read_upload_form(mut form: FormData) -> DashboardResult<UploadRequest> {
    let mut file = None;
    let mut branch = String::new();
    while let Some(part) = form.try_next().await.map_err(malformed)? {
        let name = part.name().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let file_name = part.filename().unwrap_or("upload").to_string();
                let mime = part.content_type().map(str::to_string);
                let bytes = read_part(part).await?;
                file = Some((file_name, mime, bytes));
            }
            BRANCH_FIELD => {
                let bytes = read_part(part).await?;
                branch = String::from_utf8_lossy(&bytes).trim().to_string();
            }
            _ => {
                read_part(part).await?;
            }
        }
    }

    let Some((file_name, mime, bytes)) = file else {
        return Err(DashboardError::invalid_input("No Excel file uploaded"));
    };
    Ok(UploadRequest {
        file_name,
        mime,
        bytes,
        branch,
    })
}
