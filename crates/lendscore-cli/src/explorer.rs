use std::time::{Duration, Instant};

use reqwest::Client;

use lendscore_core::sources::{ExplorerResponse, ExplorerTransaction};
use lendscore_core::RawEvent;

use crate::config::ExplorerConfig;
use crate::error::{AppError, AppResult};

// ============================================================================
// Block Explorer Client - Etherscan-compatible `account/txlist`
// ============================================================================

#[derive(Clone)]
pub struct ExplorerClient {
    client: Client,
    config: ExplorerConfig,
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::ExternalApi(format!("Failed to build HTTP client: {}", e)))?;

        println!("[EXPLORER] Initializing client for {}", config.base_url);
        tracing::debug!(base_url = %config.base_url, "Creating explorer client");

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn query_params(&self, wallet: &str) -> Vec<(&'static str, String)> {
        vec![
            ("module", "account".to_string()),
            ("action", "txlist".to_string()),
            ("address", wallet.to_string()),
            ("startblock", self.config.start_block.to_string()),
            ("endblock", self.config.end_block.to_string()),
            ("page", "1".to_string()),
            ("offset", self.config.page_size.to_string()),
            ("sort", "asc".to_string()),
            ("apikey", self.config.api_key.clone()),
        ]
    }

    /// Fetch the transaction list of one wallet, oldest first.
    pub async fn get_transactions(&self, wallet: &str) -> AppResult<Vec<ExplorerTransaction>> {
        let start = Instant::now();
        tracing::debug!(wallet = %wallet, "Fetching transactions from explorer");

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&self.query_params(wallet))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(wallet = %wallet, error = %e, "Explorer request failed");
                AppError::ExternalApi(format!("Explorer request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(wallet = %wallet, status = %status, "Explorer API error");
            return Err(AppError::ExternalApi(format!(
                "Explorer API error {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let envelope: ExplorerResponse = response.json().await.map_err(|e| {
            tracing::error!(wallet = %wallet, error = %e, "Failed to parse explorer response");
            AppError::ExternalApi(format!("Failed to parse explorer response: {}", e))
        })?;

        let transactions = envelope.into_transactions().map_err(AppError::ExternalApi)?;

        tracing::info!(
            wallet = %wallet,
            count = %transactions.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Fetched wallet transactions"
        );

        Ok(transactions)
    }

    /// Fetch every wallet in turn, pausing between requests.
    ///
    /// A wallet whose fetch fails is logged and contributes no events.
    pub async fn collect_events(&self, wallets: &[String]) -> Vec<RawEvent> {
        let start = Instant::now();
        let delay = Duration::from_millis(self.config.rate_limit_ms);
        let mut events = Vec::new();
        let mut failures = 0usize;

        println!("[EXPLORER] Processing {} wallets...", wallets.len());

        for (i, wallet) in wallets.iter().enumerate() {
            println!("[EXPLORER] Wallet {}/{}: {}", i + 1, wallets.len(), wallet);

            match self.get_transactions(wallet).await {
                Ok(transactions) => {
                    println!("  Found {} transactions", transactions.len());
                    events.extend(decode_rows(wallet, &transactions));
                }
                Err(e) => {
                    failures += 1;
                    println!("  Fetch failed: {}", e);
                    tracing::warn!(
                        wallet = %wallet,
                        error = %e,
                        error_code = e.code(),
                        "Treating wallet as having no transactions"
                    );
                }
            }

            if i + 1 < wallets.len() {
                tokio::time::sleep(delay).await;
            }
        }

        println!(
            "[EXPLORER] Collected {} transactions in {}ms ({} failed wallets)",
            events.len(),
            start.elapsed().as_millis(),
            failures
        );
        tracing::info!(
            wallets = wallets.len(),
            events = events.len(),
            failures = failures,
            duration_ms = %start.elapsed().as_millis(),
            "Explorer collection complete"
        );

        events
    }
}

/// Rows without a usable timestamp are dropped.
fn decode_rows(wallet: &str, transactions: &[ExplorerTransaction]) -> Vec<RawEvent> {
    let events: Vec<RawEvent> = transactions
        .iter()
        .filter_map(ExplorerTransaction::to_raw_event)
        .collect();
    let dropped = transactions.len() - events.len();
    if dropped > 0 {
        println!("  Dropped {} rows with invalid timestamps", dropped);
        tracing::warn!(wallet = %wallet, dropped = dropped, "Explorer rows dropped");
    }
    events
}
