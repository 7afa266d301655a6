/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room playback commands.
pub mod room_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Group votes on contested commands.
pub mod vote_service;
