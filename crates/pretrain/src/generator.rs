//! Synthetic consumption histories.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

use crate::categories::CategoryTemplate;

/// Weekend consumption multiplier.
const WEEKEND_MULT: f64 = 1.3;
/// Friday consumption multiplier.
const FRIDAY_MULT: f64 = 1.1;
/// Probability of a weekend guest event.
const GUEST_PROBABILITY: f64 = 0.3;
/// Guest event consumption multiplier.
const GUEST_MULT: f64 = 1.5;
/// Shelf life at or below which perishables get a mid-week restock.
const MIDWEEK_SHELF_LIFE: u32 = 7;

/// Generates a daily synthetic history for one category.
///
/// Rules:
/// - consumption = `base_daily * dow_multiplier * U(0.8, 1.2)`, with the
///   weekend at 1.3, Friday at 1.1, otherwise 1.0;
/// - weekend guest events (probability 0.3) multiply consumption by 1.5;
/// - Saturday restock sets the quantity to `base_weekly_qty`;
/// - Wednesday restock for short-shelf-life perishables when the
///   quantity has fallen under half the low-stock threshold.
///
/// Deterministic for a given RNG state.
pub fn generate_history(
    template: &CategoryTemplate,
    start: DateTime<Utc>,
    days: u32,
    rng: &mut StdRng,
) -> Vec<(DateTime<Utc>, f64)> {
    let noise = Uniform::new(0.8, 1.2).expect("0.8 < 1.2");
    let mut quantity = template.base_weekly_qty;
    let mut history = Vec::with_capacity(days as usize);

    for day in 0..days {
        let ts = start + Duration::days(day as i64);
        let weekday = ts.weekday();
        let weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);

        let mut multiplier = if weekend {
            WEEKEND_MULT
        } else if weekday == Weekday::Fri {
            FRIDAY_MULT
        } else {
            1.0
        };
        if weekend && rng.random_bool(GUEST_PROBABILITY) {
            multiplier *= GUEST_MULT;
        }

        let consumption = template.base_daily * multiplier * noise.sample(rng);
        quantity = (quantity - consumption).max(0.0);

        if weekday == Weekday::Sat {
            quantity = template.base_weekly_qty;
        } else if weekday == Weekday::Wed
            && template.perishable
            && template.shelf_life_days <= MIDWEEK_SHELF_LIFE
            && quantity < 0.5 * template.quantity_min
        {
            quantity = template.base_weekly_qty;
        }

        history.push((ts, quantity));
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::builtin_categories;
    use chrono::TimeZone;
    use rand::SeedableRng;

    fn start() -> DateTime<Utc> {
        // 2024-01-01 is a Monday.
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn dairy() -> CategoryTemplate {
        builtin_categories().remove(0)
    }

    #[test]
    fn history_length_and_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let history = generate_history(&dairy(), start(), 60, &mut rng);
        assert_eq!(history.len(), 60);
        for pair in history.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn deterministic_given_seed() {
        let a = generate_history(&dairy(), start(), 60, &mut StdRng::seed_from_u64(7));
        let b = generate_history(&dairy(), start(), 60, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = generate_history(&dairy(), start(), 60, &mut StdRng::seed_from_u64(1));
        let b = generate_history(&dairy(), start(), 60, &mut StdRng::seed_from_u64(2));
        assert_ne!(a, b);
    }

    #[test]
    fn saturday_restocks_to_weekly_base() {
        let mut rng = StdRng::seed_from_u64(42);
        let template = dairy();
        let history = generate_history(&template, start(), 60, &mut rng);
        for (ts, quantity) in &history {
            if ts.weekday() == Weekday::Sat {
                assert_eq!(*quantity, template.base_weekly_qty);
            }
        }
    }

    #[test]
    fn quantities_never_negative() {
        for template in builtin_categories() {
            let mut rng = StdRng::seed_from_u64(42);
            let history = generate_history(&template, start(), 60, &mut rng);
            assert!(history.iter().all(|(_, q)| *q >= 0.0));
        }
    }

    #[test]
    fn consumption_declines_between_restocks() {
        let mut rng = StdRng::seed_from_u64(42);
        let template = dairy();
        let history = generate_history(&template, start(), 60, &mut rng);
        for pair in history.windows(2) {
            let (ts, prev) = pair[0];
            let (_, next) = pair[1];
            let next_day = (ts + Duration::days(1)).weekday();
            // Quantity only rises on restock days.
            if next > prev {
                assert!(matches!(next_day, Weekday::Sat | Weekday::Wed));
            }
        }
    }
}
