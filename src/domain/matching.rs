use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tolerance applied when comparing invoice unit price against the PO
/// unit price. A line passes if the absolute difference is within
/// `max(min_variance_cents, po_price * price_variance_percent / 100)`.
#[derive(Debug, Clone, Copy)]
pub struct MatchTolerance {
    pub price_variance_percent: f64,
    pub min_variance_cents: i64,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        MatchTolerance {
            price_variance_percent: 2.0,
            min_variance_cents: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "code")]
pub enum MatchException {
    NoPoLines,
    MissingInvoiceLine {
        description: String,
    },
    QtyMismatch {
        description: String,
        po_quantity: i32,
        received_quantity: i32,
        invoiced_quantity: i32,
    },
    PriceVariance {
        description: String,
        po_unit_price_cents: i64,
        invoice_unit_price_cents: i64,
        variance_cents: i64,
        tolerance_cents: i64,
        variance_pct: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub passed: bool,
    pub exceptions: Vec<MatchException>,
}

/// A PO line reduced to the fields the matcher needs, keyed by
/// case-insensitive trimmed description (matching how the original system
/// reconciles line items that don't carry a stable line id across PO,
/// receipt and invoice).
#[derive(Debug, Clone)]
pub struct PoLine {
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct ReceivedLine {
    pub description: String,
    pub quantity_received: i32,
}

#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

fn normalize(description: &str) -> String {
    description.trim().to_lowercase()
}

/// Reconciles a purchase order's line items against what was received
/// and what the vendor invoiced. Pure and side-effect-free: callers are
/// responsible for persisting the result.
pub fn three_way_match_invoice(
    po_lines: &[PoLine],
    received_lines: &[ReceivedLine],
    invoice_lines: &[InvoiceLine],
    tolerance: MatchTolerance,
) -> MatchResult {
    if po_lines.is_empty() {
        return MatchResult {
            passed: false,
            exceptions: vec![MatchException::NoPoLines],
        };
    }

    let mut received_by_description: std::collections::HashMap<String, i32> =
        std::collections::HashMap::new();
    for line in received_lines {
        *received_by_description
            .entry(normalize(&line.description))
            .or_insert(0) += line.quantity_received;
    }

    let mut invoice_by_description: std::collections::HashMap<String, &InvoiceLine> =
        std::collections::HashMap::new();
    for line in invoice_lines {
        invoice_by_description.insert(normalize(&line.description), line);
    }

    let mut exceptions = Vec::new();

    for po_line in po_lines {
        let key = normalize(&po_line.description);
        let received_quantity = received_by_description.get(&key).copied().unwrap_or(0);

        let Some(invoice_line) = invoice_by_description.get(&key) else {
            exceptions.push(MatchException::MissingInvoiceLine {
                description: po_line.description.clone(),
            });
            continue;
        };

        if invoice_line.quantity != received_quantity {
            exceptions.push(MatchException::QtyMismatch {
                description: po_line.description.clone(),
                po_quantity: po_line.quantity,
                received_quantity,
                invoiced_quantity: invoice_line.quantity,
            });
        }

        let tolerance_cents = std::cmp::max(
            tolerance.min_variance_cents,
            ((po_line.unit_price_cents as f64) * tolerance.price_variance_percent / 100.0).floor()
                as i64,
        );
        let variance_cents = (invoice_line.unit_price_cents - po_line.unit_price_cents).abs();
        if variance_cents > tolerance_cents {
            let variance_pct = if po_line.unit_price_cents != 0 {
                variance_cents as f64 / po_line.unit_price_cents as f64 * 100.0
            } else {
                0.0
            };
            exceptions.push(MatchException::PriceVariance {
                description: po_line.description.clone(),
                po_unit_price_cents: po_line.unit_price_cents,
                invoice_unit_price_cents: invoice_line.unit_price_cents,
                variance_cents,
                tolerance_cents,
                variance_pct,
            });
        }
    }

    MatchResult {
        passed: exceptions.is_empty(),
        exceptions,
    }
}

/// Outcome of scoring a completed match into a persisted invoice state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    Exception,
}

pub fn outcome_for(result: &MatchResult) -> MatchOutcome {
    if result.passed {
        MatchOutcome::Matched
    } else {
        MatchOutcome::Exception
    }
}

/// Input bundle an invoking service assembles from storage before calling
/// the pure matcher; kept separate from the matcher itself so the
/// algorithm has no database or entity-id concerns.
#[derive(Debug, Clone)]
pub struct MatchInput {
    pub invoice_id: Uuid,
    pub po_lines: Vec<PoLine>,
    pub received_lines: Vec<ReceivedLine>,
    pub invoice_lines: Vec<InvoiceLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn po(description: &str, quantity: i32, unit_price_cents: i64) -> PoLine {
        PoLine {
            description: description.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    fn received(description: &str, quantity_received: i32) -> ReceivedLine {
        ReceivedLine {
            description: description.to_string(),
            quantity_received,
        }
    }

    fn invoice(description: &str, quantity: i32, unit_price_cents: i64) -> InvoiceLine {
        InvoiceLine {
            description: description.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn empty_po_lines_is_an_exception() {
        let result = three_way_match_invoice(&[], &[], &[], MatchTolerance::default());
        assert!(!result.passed);
        assert_eq!(result.exceptions, vec![MatchException::NoPoLines]);
    }

    #[test]
    fn clean_match_passes() {
        let po_lines = vec![po("Widgets", 10, 500)];
        let received = vec![received("widgets", 10)];
        let invoice_lines = vec![invoice(" Widgets ", 10, 505)];
        let result =
            three_way_match_invoice(&po_lines, &received, &invoice_lines, MatchTolerance::default());
        assert!(result.passed, "{:?}", result.exceptions);
    }

    #[test]
    fn missing_invoice_line_is_flagged() {
        let po_lines = vec![po("Widgets", 10, 500)];
        let result =
            three_way_match_invoice(&po_lines, &[], &[], MatchTolerance::default());
        assert!(!result.passed);
        assert!(matches!(
            result.exceptions[0],
            MatchException::MissingInvoiceLine { .. }
        ));
    }

    #[test]
    fn quantity_mismatch_is_flagged() {
        let po_lines = vec![po("Widgets", 10, 500)];
        let received = vec![received("Widgets", 8)];
        let invoice_lines = vec![invoice("Widgets", 10, 500)];
        let result =
            three_way_match_invoice(&po_lines, &received, &invoice_lines, MatchTolerance::default());
        assert!(!result.passed);
        assert!(matches!(
            result.exceptions[0],
            MatchException::QtyMismatch { .. }
        ));
    }

    #[test]
    fn price_outside_tolerance_is_flagged() {
        let po_lines = vec![po("Widgets", 10, 10_000)];
        let received = vec![received("Widgets", 10)];
        let invoice_lines = vec![invoice("Widgets", 10, 10_500)];
        let result =
            three_way_match_invoice(&po_lines, &received, &invoice_lines, MatchTolerance::default());
        assert!(!result.passed);
        assert!(matches!(
            result.exceptions[0],
            MatchException::PriceVariance { .. }
        ));
    }

    #[test]
    fn price_within_floor_tolerance_passes() {
        let po_lines = vec![po("Widgets", 10, 100)];
        let received = vec![received("Widgets", 10)];
        let invoice_lines = vec![invoice("Widgets", 10, 1090)];
        let result =
            three_way_match_invoice(&po_lines, &received, &invoice_lines, MatchTolerance::default());
        assert!(result.passed, "{:?}", result.exceptions);
    }
}
