//! Per-model cost estimates, USD per million tokens.
//!
//! Presentation-only: estimates go to the debug log so a verbose run
//! shows what a briefing costs. Unknown models simply log no estimate.

use rust_decimal::Decimal;

struct ModelCost {
    prefix: &'static str,
    /// USD per 1M input tokens.
    input: Decimal,
    /// USD per 1M output tokens.
    output: Decimal,
}

pub(crate) struct CostTable {
    models: Vec<ModelCost>,
}

impl Default for CostTable {
    fn default() -> Self {
        // Decimal::new(mantissa, scale): new(75, 3) == 0.075
        Self {
            models: vec![
                ModelCost {
                    prefix: "gemini-2.0-flash-lite",
                    input: Decimal::new(75, 3),  // 0.075
                    output: Decimal::new(30, 2), // 0.30
                },
                ModelCost {
                    prefix: "gemini-2.0-flash",
                    input: Decimal::new(10, 2),  // 0.10
                    output: Decimal::new(40, 2), // 0.40
                },
                ModelCost {
                    prefix: "claude-sonnet",
                    input: Decimal::new(3, 0),   // 3.00
                    output: Decimal::new(15, 0), // 15.00
                },
                ModelCost {
                    prefix: "claude-haiku",
                    input: Decimal::new(80, 2),  // 0.80
                    output: Decimal::new(4, 0),  // 4.00
                },
            ],
        }
    }
}

impl CostTable {
    /// Estimated USD cost of one call, or `None` for unknown models.
    pub(crate) fn estimate(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Option<Decimal> {
        let million = Decimal::from(1_000_000u64);
        // Longest matching prefix wins (flash-lite before flash).
        let cost = self
            .models
            .iter()
            .filter(|c| model.starts_with(c.prefix))
            .max_by_key(|c| c.prefix.len())?;
        Some(
            Decimal::from(input_tokens) * cost.input / million
                + Decimal::from(output_tokens) * cost.output / million,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_estimates() {
        let table = CostTable::default();
        let cost = table
            .estimate("gemini-2.0-flash-lite", 1_000_000, 0)
            .unwrap();
        assert_eq!(cost, Decimal::new(75, 3));
    }

    #[test]
    fn longest_prefix_wins() {
        let table = CostTable::default();
        // flash (not flash-lite) pricing applies to the base model
        let flash = table.estimate("gemini-2.0-flash", 1_000_000, 0).unwrap();
        assert_eq!(flash, Decimal::new(10, 2));
        let lite = table
            .estimate("gemini-2.0-flash-lite", 1_000_000, 0)
            .unwrap();
        assert!(lite < flash);
    }

    #[test]
    fn unknown_model_is_none() {
        let table = CostTable::default();
        assert!(table.estimate("gpt-4o", 1000, 1000).is_none());
    }

    #[test]
    fn zero_tokens_zero_cost() {
        let table = CostTable::default();
        assert_eq!(
            table.estimate("claude-sonnet-4-20250514", 0, 0).unwrap(),
            Decimal::ZERO
        );
    }
}
