//! Account, session listing and file endpoints

use super::challenge::ChallengeService;
use crate::infrastructure::http::{ensure_success, UpstreamClient, POW_RESPONSE_HEADER, THINKING_ENABLED_HEADER};
use crate::util::errors::{DeeptermError, DeeptermResult};
use deepterm_core_types::{ApiResponse, ChatSessionSummary, SessionPage, UploadedFile};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;

const CURRENT_USER_PATH: &str = "/users/current";
const FETCH_SESSIONS_PATH: &str = "/chat_session/fetch_page";
const DELETE_ALL_SESSIONS_PATH: &str = "/chat_session/delete_all";
const FILE_PREVIEW_PATH: &str = "/file/preview";
const UPLOAD_FILE_PATH: &str = "/file/upload_file";

#[derive(Clone)]
pub struct AccountService {
    client: UpstreamClient,
    challenges: ChallengeService,
}

impl AccountService {
    pub fn new(client: UpstreamClient, challenges: ChallengeService) -> Self {
        Self { client, challenges }
    }

    /// Profile of the token's owner, passed through as opaque JSON.
    pub async fn current_user(&self, token: &str) -> DeeptermResult<Value> {
        let request = self.client.get(token, CURRENT_USER_PATH);
        let envelope = self.client.send_envelope::<Value>(request).await?;
        require_biz_data(envelope, CURRENT_USER_PATH)
    }

    pub async fn list_sessions(&self, token: &str) -> DeeptermResult<Vec<ChatSessionSummary>> {
        let request = self.client.get(token, FETCH_SESSIONS_PATH);
        let envelope = self.client.send_envelope::<SessionPage>(request).await?;
        Ok(envelope.into_biz_data().unwrap_or_default().chat_sessions)
    }

    pub async fn delete_all_sessions(&self, token: &str, session_id: &str) -> DeeptermResult<()> {
        let request = self
            .client
            .post_in_session(token, DELETE_ALL_SESSIONS_PATH, session_id);
        self.client.send_envelope::<Value>(request).await?;
        info!("All chat sessions deleted");
        Ok(())
    }

    pub async fn file_preview(
        &self,
        token: &str,
        session_id: &str,
        file_id: &str,
    ) -> DeeptermResult<Value> {
        let file_param = format!("file-{}", file_id);
        let request = self
            .client
            .get_in_session(token, FILE_PREVIEW_PATH, session_id)
            .query(&[("file_id", file_param.as_str())]);
        let envelope = self.client.send_envelope::<Value>(request).await?;
        require_biz_data(envelope, FILE_PREVIEW_PATH)
    }

    /// Uploads a local file for later reference via `ref_file_ids`.
    ///
    /// Unlike completions, the upload is never attempted without a proof.
    pub async fn upload_file(
        &self,
        token: &str,
        session_id: &str,
        path: &Path,
    ) -> DeeptermResult<UploadedFile> {
        let target_path = self.client.config().api_path(UPLOAD_FILE_PATH);
        let proof = self
            .challenges
            .acquire_proof(token, Some(session_id), &target_path)
            .await?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        debug!("Uploading file: name={}, size={}", file_name, bytes.len());

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(token, UPLOAD_FILE_PATH)
            .header(POW_RESPONSE_HEADER, proof)
            .header(THINKING_ENABLED_HEADER, "0")
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let envelope: ApiResponse<UploadedFile> = response
            .json()
            .await
            .map_err(|e| DeeptermError::Decode(e.to_string()))?;
        require_biz_data(envelope, UPLOAD_FILE_PATH)
    }
}

fn require_biz_data<T>(envelope: ApiResponse<T>, path: &str) -> DeeptermResult<T> {
    let message = envelope.message().map(str::to_string);
    envelope.into_biz_data().ok_or_else(|| {
        DeeptermError::Decode(format!(
            "{} response carried no biz_data{}",
            path,
            message.map(|m| format!(": {}", m)).unwrap_or_default()
        ))
    })
}
