use anyhow::Result;

use backpack_clients::{BlobClient, PostgresClient, VerifierClient};
use backpack_common::ModuleClient;
use backpack_core::{AssertionFetcher, AwardEngine};

#[derive(Clone)]
pub struct GlobalState {
    pub db: PostgresClient,
    pub blob: BlobClient,
    pub verifier: VerifierClient,
    pub fetcher: AssertionFetcher,
    pub award: AwardEngine<PostgresClient, BlobClient>,
}

impl GlobalState {
    pub async fn new() -> Result<Self> {
        let db = PostgresClient::setup_connection().await;
        let blob = BlobClient::setup_connection().await;
        let verifier = VerifierClient::setup_connection().await;
        let fetcher = AssertionFetcher::new();
        let award = AwardEngine::new(db.clone(), blob.clone());

        Ok(Self {
            db,
            blob,
            verifier,
            fetcher,
            award,
        })
    }
}
