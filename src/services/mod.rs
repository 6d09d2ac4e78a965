/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Retention janitor and maintenance authorization.
pub mod retention;
/// Room lifecycle, joins and answer submission.
pub mod room_service;
/// Server-Sent Events room feeds.
pub mod sse_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
