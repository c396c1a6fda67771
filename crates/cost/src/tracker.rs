//! Running cost accounting over append-only records.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use config::Platform;
use dashmap::DashMap;
use jiff::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use crate::pricing::PricingTable;

/// Upper bound on retained records. Totals keep counting past it.
const MAX_RECORDS: usize = 10_000;

/// A single priced LLM call. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct CostRecord {
    /// Platform the call went to.
    pub platform: Platform,
    /// Unique id of the call.
    pub request_id: Uuid,
    /// Model the call used.
    pub model: String,
    /// Prompt tokens reported by the provider.
    pub prompt_tokens: u32,
    /// Completion tokens reported by the provider.
    pub completion_tokens: u32,
    /// USD cost, `None` when no pricing was available.
    pub usd_cost: Option<f64>,
    /// When the record was created.
    pub timestamp: Timestamp,
}

/// Monotonic running totals for one platform or tenant.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TotalsSnapshot {
    /// Calls recorded.
    pub requests: u64,
    /// Prompt tokens recorded.
    pub prompt_tokens: u64,
    /// Completion tokens recorded.
    pub completion_tokens: u64,
    /// USD attributed. Calls without pricing contribute zero here but still
    /// count in `requests` and the token totals.
    pub usd: f64,
}

impl TotalsSnapshot {
    fn add(&mut self, record: &CostRecord) {
        self.requests += 1;
        self.prompt_tokens += u64::from(record.prompt_tokens);
        self.completion_tokens += u64::from(record.completion_tokens);
        self.usd += record.usd_cost.unwrap_or(0.0);
    }
}

/// Read-only view of the tracker state for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    /// Totals keyed by platform name.
    pub platforms: BTreeMap<String, TotalsSnapshot>,
    /// Totals keyed by tenant.
    pub tenants: BTreeMap<String, TotalsSnapshot>,
    /// Records priced with no matching table entry.
    pub unpriced_requests: u64,
}

/// Thread-safe cost accountant.
///
/// Totals only grow; the single way down is [`CostTracker::reset`]. Entries
/// for unrelated platforms or tenants live in separate map shards and do not
/// contend.
pub struct CostTracker {
    pricing: PricingTable,
    platform_totals: DashMap<Platform, TotalsSnapshot>,
    tenant_totals: DashMap<String, TotalsSnapshot>,
    records: Mutex<VecDeque<CostRecord>>,
}

impl CostTracker {
    /// Create a tracker with the given pricing table.
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            platform_totals: DashMap::new(),
            tenant_totals: DashMap::new(),
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Price and record one completed call.
    ///
    /// A missing pricing entry is not an error for the caller: the record is
    /// kept with `usd_cost = None` and the miss is logged.
    pub fn record(
        &self,
        platform: Platform,
        tenant: &str,
        model: &str,
        request_id: Uuid,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> CostRecord {
        let usd_cost = match self.pricing.lookup(platform, model) {
            Ok(price) => Some(price.cost(prompt_tokens, completion_tokens)),
            Err(e) => {
                log::debug!("Recording call without cost: {e}");
                None
            }
        };

        let record = CostRecord {
            platform,
            request_id,
            model: model.to_string(),
            prompt_tokens,
            completion_tokens,
            usd_cost,
            timestamp: Timestamp::now(),
        };

        self.platform_totals.entry(platform).or_default().add(&record);
        self.tenant_totals.entry(tenant.to_string()).or_default().add(&record);

        if let Ok(mut records) = self.records.lock() {
            if records.len() == MAX_RECORDS {
                records.pop_front();
            }
            records.push_back(record.clone());
        }

        record
    }

    /// Take a read-only snapshot of the running totals.
    pub fn snapshot(&self) -> UsageSnapshot {
        let platforms = self
            .platform_totals
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect();

        let tenants = self
            .tenant_totals
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        let unpriced_requests = self
            .records
            .lock()
            .map(|records| records.iter().filter(|r| r.usd_cost.is_none()).count() as u64)
            .unwrap_or(0);

        UsageSnapshot {
            platforms,
            tenants,
            unpriced_requests,
        }
    }

    /// Clear all totals and retained records.
    pub fn reset(&self) {
        self.platform_totals.clear();
        self.tenant_totals.clear();

        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use config::ModelPriceConfig;

    use super::*;

    fn tracker_with_test_price() -> CostTracker {
        let overrides = BTreeMap::from([(
            "openai/test-model".to_string(),
            ModelPriceConfig {
                input_per_1k: 0.002,
                output_per_1k: 0.004,
            },
        )]);

        CostTracker::new(PricingTable::with_overrides(&overrides))
    }

    #[test]
    fn known_price_yields_exact_cost() {
        let tracker = tracker_with_test_price();

        let record = tracker.record(Platform::Openai, "default", "test-model", Uuid::new_v4(), 100, 50);

        // 100 prompt tokens at $0.002/1k plus 50 completion tokens at $0.004/1k.
        let usd = record.usd_cost.unwrap();
        assert!((usd - 0.0004).abs() < 1e-12, "got {usd}");
    }

    #[test]
    fn unknown_model_records_without_cost() {
        let tracker = tracker_with_test_price();

        let record = tracker.record(Platform::Openai, "default", "mystery-model", Uuid::new_v4(), 100, 50);

        assert!(record.usd_cost.is_none());

        let snapshot = tracker.snapshot();
        let totals = &snapshot.platforms["openai"];

        // The call still counts against request and token totals.
        assert_eq!(totals.requests, 1);
        assert_eq!(totals.prompt_tokens, 100);
        assert_eq!(snapshot.unpriced_requests, 1);
    }

    #[test]
    fn totals_aggregate_per_platform_and_tenant() {
        let tracker = tracker_with_test_price();

        tracker.record(Platform::Openai, "tenant-a", "test-model", Uuid::new_v4(), 100, 50);
        tracker.record(Platform::Openai, "tenant-a", "test-model", Uuid::new_v4(), 100, 50);
        tracker.record(Platform::Openai, "tenant-b", "test-model", Uuid::new_v4(), 100, 50);

        let snapshot = tracker.snapshot();

        assert_eq!(snapshot.platforms["openai"].requests, 3);
        assert_eq!(snapshot.tenants["tenant-a"].requests, 2);
        assert_eq!(snapshot.tenants["tenant-b"].requests, 1);

        let usd = snapshot.platforms["openai"].usd;
        assert!((usd - 0.0012).abs() < 1e-12, "got {usd}");
    }

    #[test]
    fn reset_clears_totals() {
        let tracker = tracker_with_test_price();

        tracker.record(Platform::Openai, "default", "test-model", Uuid::new_v4(), 100, 50);
        tracker.reset();

        let snapshot = tracker.snapshot();
        assert!(snapshot.platforms.is_empty());
        assert!(snapshot.tenants.is_empty());
        assert_eq!(snapshot.unpriced_requests, 0);
    }
}
