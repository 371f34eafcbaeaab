//! Response utilities and macros for consistent API responses

/// Macro to create JSON responses consistently
///
/// # Example
/// ```ignore
/// ok_json!(HealthResponse {
///     status: "ok".to_string(),
///     connections: 3,
/// })
/// ```
#[macro_export]
macro_rules! ok_json {
    ($data:expr) => {
        Ok(axum::Json($data))
    };
}
