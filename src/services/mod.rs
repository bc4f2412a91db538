/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Read-only projections of live rooms.
pub mod public_service;
/// Room notifications fanned out to member connections.
pub mod room_events;
/// Room operations behind every client message.
pub mod room_service;
/// Question store connection supervisor.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
