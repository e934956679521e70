//! Delivery seam for change events.

use std::fmt::Write as _;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::diff::{ChangeEvent, PriceDirection};

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Something that delivers change events to people.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError>;
}

/// Deliver every event; failures are logged and counted, never propagated.
pub async fn notify_all(notifier: &dyn Notifier, events: &[ChangeEvent]) -> usize {
    let mut failures = 0;
    for event in events {
        if let Err(e) = notifier.notify(event).await {
            failures += 1;
            warn!(key = %event.key(), error = %e, "Failed to deliver change event");
        }
    }
    failures
}

/// Writes each event as a one-line message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        info!(key = %event.key(), "{}", describe(event));
        Ok(())
    }
}

/// Human-readable summary of one event.
pub fn describe(event: &ChangeEvent) -> String {
    let key = event.key();
    let route = format!(
        "{} → {} on {} (flight {})",
        key.origin, key.destination, key.date, key.flight_number
    );

    match event {
        ChangeEvent::NewFlight { price, .. } => {
            format!("New flight {route} at {}", format_money(*price))
        }
        ChangeEvent::PriceChanged {
            old_price,
            new_price,
            ..
        } => {
            let arrow = match event.direction() {
                Some(PriceDirection::Increased) => "▲",
                _ => "▼",
            };
            format!(
                "Price {arrow} {route}: {} → {}",
                format_money(*old_price),
                format_money(*new_price)
            )
        }
        ChangeEvent::Unavailable { last_price, .. } => {
            format!(
                "No longer available {route} (last seen at {})",
                format_money(*last_price)
            )
        }
    }
}

/// `$450,000`, or `$1,234.50` when there are cents.
pub fn format_money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let (whole, fraction) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('$');
    out.push_str(&grouped);
    if fraction != 0 {
        let _ = write!(out, ".{fraction:02}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FlightKey;
    use crate::snapshot::tests::date;
    use parking_lot::Mutex;

    fn key() -> FlightKey {
        FlightKey::new("BOG", "HAV", date("2022-04-14"), "7013")
    }

    #[test]
    fn money_is_grouped_by_thousands() {
        assert_eq!(format_money(450_000.0), "$450,000");
        assert_eq!(format_money(999.0), "$999");
        assert_eq!(format_money(1_234_567.5), "$1,234,567.50");
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(-1500.0), "-$1,500");
    }

    #[test]
    fn price_changes_show_direction() {
        let up = ChangeEvent::PriceChanged {
            key: key(),
            old_price: 450_000.0,
            new_price: 480_000.0,
        };
        let text = describe(&up);
        assert!(text.contains('▲'), "{text}");
        assert!(text.contains("$450,000 → $480,000"), "{text}");

        let down = ChangeEvent::PriceChanged {
            key: key(),
            old_price: 480_000.0,
            new_price: 450_000.0,
        };
        assert!(describe(&down).contains('▼'));
    }

    struct FlakyNotifier {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
            if matches!(event, ChangeEvent::Unavailable { .. }) {
                return Err(NotifyError("mailbox full".to_owned()));
            }
            self.delivered.lock().push(describe(event));
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_fatal() {
        let notifier = FlakyNotifier {
            delivered: Mutex::new(Vec::new()),
        };
        let events = vec![
            ChangeEvent::Unavailable {
                key: key(),
                last_price: 1.0,
            },
            ChangeEvent::NewFlight {
                key: key(),
                price: 2.0,
            },
        ];

        assert_eq!(notify_all(&notifier, &events).await, 1);
        assert_eq!(notifier.delivered.lock().len(), 1);
    }
}
