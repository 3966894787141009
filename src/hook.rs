//! Adapter for a resumable-upload server's file hooks.
//!
//! The server runs `intake hook <type>` with the hook event as JSON on stdin
//! and reads the response JSON from stdout. Only the fields the pipeline
//! needs are parsed; everything else in the event is ignored.

use intake_pipeline::{Admission, UploadHooks, UploadRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookRequest {
    #[serde(rename = "Type", default)]
    pub kind: String,
    pub event: HookEvent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookEvent {
    pub upload: HookUpload,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookUpload {
    /// Empty before the upload has been created.
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub size_is_deferred: bool,
    #[serde(default)]
    pub meta_data: Option<HashMap<String, String>>,
    #[serde(default)]
    pub storage: Option<HookStorage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookStorage {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl HookUpload {
    pub fn declared_size(&self) -> Option<u64> {
        (!self.size_is_deferred).then_some(self.size)
    }

    /// The upload as the pipeline sees it. Without a storage path from the
    /// server, the file is expected at `<staging_dir>/<id>`.
    pub fn into_record(self, staging_dir: &Path) -> UploadRecord {
        let staging_path = self
            .storage
            .as_ref()
            .and_then(|storage| storage.path.clone())
            .unwrap_or_else(|| staging_dir.join(&self.id));
        UploadRecord {
            size: self.declared_size(),
            id: self.id,
            staging_path,
            metadata: self.meta_data.unwrap_or_default(),
        }
    }
}

/// Hook response. The default value, `{}`, lets the server carry on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookResponse {
    #[serde(rename = "HTTPResponse", skip_serializing_if = "Option::is_none")]
    pub http_response: Option<HttpResponse>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reject_upload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    pub header: HashMap<String, String>,
}

pub async fn pre_create<H: UploadHooks + ?Sized>(hooks: &H, request: HookRequest) -> HookResponse {
    match hooks.on_admit(request.event.upload.declared_size()).await {
        Admission::Accepted => HookResponse::default(),
        Admission::Rejected(rejection) => HookResponse {
            http_response: Some(HttpResponse {
                status_code: rejection.status_code(),
                body: rejection.to_string(),
                header: HashMap::from([("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())]),
            }),
            reject_upload: true,
        },
    }
}

/// Finalizes the upload. The client already has its response by now, so a
/// failure is only logged.
pub async fn post_finish<H: UploadHooks + ?Sized>(hooks: &H, request: HookRequest, staging_dir: &Path) -> HookResponse {
    let upload = request.event.upload.into_record(staging_dir);
    let upload_id = upload.id.clone();
    if let Err(err) = hooks.on_complete(upload).await {
        tracing::error!(%upload_id, error = ?err, "Post-finish hook failed");
    }
    HookResponse::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use intake_pipeline::error::{ErrorKind as PipelineErrorKind, Result as PipelineResult};
    use intake_pipeline::{FinalizeOutcome, Rejection};
    use serde_json::json;
    use std::sync::Mutex;

    const GIB: u64 = 1024 * 1024 * 1024;

    /// Rejects anything above `limit` and fails every finalization.
    struct FakeHooks {
        limit: u64,
        completed: Mutex<Vec<UploadRecord>>,
    }

    #[async_trait]
    impl UploadHooks for FakeHooks {
        async fn on_admit(&self, declared_size: Option<u64>) -> Admission {
            match declared_size {
                Some(size) if size > self.limit => Admission::Rejected(Rejection::InsufficientStorage {
                    required_with_margin: size + 5 * GIB,
                    available: self.limit,
                }),
                _ => Admission::Accepted,
            }
        }

        async fn on_complete(&self, upload: UploadRecord) -> PipelineResult<FinalizeOutcome> {
            let path = upload.staging_path.clone();
            self.completed.lock().unwrap().push(upload);
            exn::bail!(PipelineErrorKind::NotFound(path))
        }
    }

    fn hooks() -> FakeHooks {
        FakeHooks { limit: 10 * GIB, completed: Mutex::new(Vec::new()) }
    }

    fn request(value: serde_json::Value) -> HookRequest {
        serde_json::from_value(value).unwrap()
    }

    fn post_finish_event() -> serde_json::Value {
        json!({
            "Type": "post-finish",
            "Event": {
                "Upload": {
                    "ID": "abc123",
                    "Size": 10485760,
                    "SizeIsDeferred": false,
                    "Offset": 10485760,
                    "MetaData": { "filename": "clip.mov", "displayname": "Final Cut", "studentId": "S001", "name": "Jane Doe" },
                    "IsPartial": false,
                    "IsFinal": false,
                    "PartialUploads": null,
                    "Storage": { "Type": "filestore", "Path": "/srv/intake/incoming/abc123" }
                },
                "HTTPRequest": { "Method": "PATCH", "URI": "/files/abc123", "RemoteAddr": "127.0.0.1:51234" }
            }
        })
    }

    #[test]
    fn test_parses_server_event() {
        let request = request(post_finish_event());
        assert_eq!(request.kind, "post-finish");
        let record = request.event.upload.into_record(Path::new("/unused"));
        assert_eq!(record.id, "abc123");
        assert_eq!(record.size, Some(10_485_760));
        assert_eq!(record.staging_path, PathBuf::from("/srv/intake/incoming/abc123"));
        assert_eq!(record.title(), "Final Cut");
        assert_eq!(record.submitter_name(), "Jane Doe");
    }

    #[test]
    fn test_staging_path_fallback_and_null_metadata() {
        let request = request(json!({
            "Type": "post-finish",
            "Event": { "Upload": { "ID": "abc123", "Size": 0, "SizeIsDeferred": true, "MetaData": null, "Storage": null } }
        }));
        let record = request.event.upload.into_record(Path::new("/srv/intake/incoming"));
        assert_eq!(record.staging_path, PathBuf::from("/srv/intake/incoming/abc123"));
        assert_eq!(record.size, None);
        assert!(record.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_pre_create_rejects_with_507() {
        let event = json!({ "Type": "pre-create", "Event": { "Upload": { "ID": "", "Size": 100 * GIB } } });
        let response = pre_create(&hooks(), request(event)).await;
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["RejectUpload"], json!(true));
        assert_eq!(value["HTTPResponse"]["StatusCode"], json!(507));
        assert!(value["HTTPResponse"]["Body"].as_str().unwrap().starts_with("insufficient disk space"));
    }

    #[tokio::test]
    async fn test_pre_create_accepts() {
        let event = json!({ "Type": "pre-create", "Event": { "Upload": { "Size": GIB } } });
        let response = pre_create(&hooks(), request(event)).await;
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({}));

        let deferred = json!({ "Type": "pre-create", "Event": { "Upload": { "Size": 0, "SizeIsDeferred": true } } });
        assert_eq!(pre_create(&hooks(), request(deferred)).await, HookResponse::default());
    }

    #[tokio::test]
    async fn test_post_finish_swallows_failures() {
        let hooks = hooks();
        let response = post_finish(&hooks, request(post_finish_event()), Path::new("/unused")).await;
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({}));
        let completed = hooks.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "abc123");
    }
}
