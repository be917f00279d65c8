//! Authoritative price computation.
//!
//! The client UI shows an estimate, but the engine recomputes the price here at order creation and
//! re-validates it at checkout time. All arithmetic is in integer cents.

use cpd_common::UsdCents;

use crate::db_types::{ContentType, DeadlineTier};

/// The price for an order: per-word base rate times word count, plus the rush fee for 24h/48h turnarounds.
pub fn quote_price(content_type: ContentType, word_count: i64, deadline: DeadlineTier) -> UsdCents {
    let base = content_type.base_rate_cents() * word_count;
    let rush_fee = base * deadline.rush_fee_percent() / 100;
    UsdCents::from(base + rush_fee)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blog_post_48h_quote() {
        // 1000 words at 12c/word = $120, plus 30% rush = $156.00
        let price = quote_price(ContentType::BlogPost, 1000, DeadlineTier::Rush48h);
        assert_eq!(price, UsdCents::from(15_600));
        assert_eq!(price.to_string(), "$156.00");
    }

    #[test]
    fn no_rush_fee_for_standard_turnaround() {
        assert_eq!(quote_price(ContentType::TechnicalWriting, 500, DeadlineTier::SevenDays), UsdCents::from(10_000));
        assert_eq!(quote_price(ContentType::SocialMedia, 200, DeadlineTier::FourteenDays), UsdCents::from(1_600));
    }

    #[test]
    fn rush_24h_adds_half() {
        assert_eq!(quote_price(ContentType::WebCopy, 1000, DeadlineTier::Rush24h), UsdCents::from(22_500));
    }
}
