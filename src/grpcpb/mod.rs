//! Generated client/server stubs for the gRPC transport's JSON-over-RPC
//! wire format. `build.rs` compiles `utcp.proto` into this directory at
//! build time; the file included below is produced by `tonic_build`, not
//! hand-written.

pub mod generated {
    include!("generated/utcp.rs");
}
