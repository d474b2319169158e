mod blob;
mod postgres;
mod verifier;

pub use blob::BlobClient;
pub use postgres::PostgresClient;
pub use verifier::{VerifierClient, VerifierError};
