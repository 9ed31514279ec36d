use serde::Deserialize;

/// Outer response envelope shared by all upstream endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: Option<i64>,
    pub msg: Option<String>,
    pub data: Option<ApiData<T>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiData<T> {
    pub biz_code: Option<i64>,
    pub biz_msg: Option<String>,
    pub biz_data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwraps `data.biz_data`, returning `None` if either level is absent or null.
    pub fn into_biz_data(self) -> Option<T> {
        self.data.and_then(|data| data.biz_data)
    }

    /// Best available human-readable message for a rejected call.
    pub fn message(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.biz_msg.as_deref())
            .filter(|msg| !msg.is_empty())
            .or(self.msg.as_deref().filter(|msg| !msg.is_empty()))
    }
}
