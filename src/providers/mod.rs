pub mod base;
pub mod cli;
pub mod graphql;
pub mod grpc;
pub mod http;
pub mod http_stream;
pub mod mcp;
pub mod sse;
pub mod tcp;
pub mod text;
pub mod udp;
pub mod webrtc;
pub mod websocket;
