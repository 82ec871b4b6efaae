/// Admin operations and the PIN capability check.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Participant operations: join, reconnect, submit, snapshots.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Leaderboard building and CSV export.
pub mod leaderboard;
/// Round lifecycle, question pacing and the engine loop.
pub mod round_service;
/// The scoring engine and its modifier rules.
pub mod scoring;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
