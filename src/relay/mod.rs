//! Server-side relay: each client WebSocket is paired 1:1 with an upstream
//! transcription session and bridged until either side ends.

mod pairing;
mod server;

pub use pairing::{run_pairing, PairingConfig, PairingEnd};
pub use server::spawn_relay;
