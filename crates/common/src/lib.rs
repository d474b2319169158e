mod client;
mod crypto;
mod env;

pub use client::ModuleClient;
pub use crypto::{blake3_hex, decrypt, encrypt, sha256_hex};
pub use env::EnvVars;

pub fn get_current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
