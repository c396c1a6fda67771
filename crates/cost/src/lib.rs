//! Cost accounting for LLM platform calls.
//!
//! Maps token usage to USD through a static per-1k-token pricing table with
//! configuration overrides, keeps an append-only record log, and maintains
//! monotonic running totals per platform and per tenant. Unknown pricing
//! never fails a call: the record is kept with an unknown cost.

#![deny(missing_docs)]

mod pricing;
mod tracker;

pub use pricing::{ModelPrice, PricingError, PricingTable};
pub use tracker::{CostRecord, CostTracker, TotalsSnapshot, UsageSnapshot};
