//! Revenue split between creators and the platform.
//!
//! Every monetizable event is split with a fixed creator rate per stream. The creator share is
//! rounded to cents and the platform fee is the remainder, so the two parts always add up to the
//! original amount.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RevenueStream {
    SponsoredAd,
    CrossPromotion,
    Subscription,
    Donation,
    DigitalProduct,
    Affiliate,
}

impl RevenueStream {
    pub const ALL: [RevenueStream; 6] = [
        RevenueStream::SponsoredAd,
        RevenueStream::CrossPromotion,
        RevenueStream::Subscription,
        RevenueStream::Donation,
        RevenueStream::DigitalProduct,
        RevenueStream::Affiliate,
    ];

    /// Fraction of the amount credited to the creator.
    pub fn creator_rate(self) -> Decimal {
        match self {
            RevenueStream::SponsoredAd | RevenueStream::CrossPromotion => Decimal::new(8, 1),
            RevenueStream::Subscription | RevenueStream::Donation | RevenueStream::DigitalProduct => Decimal::new(9, 1),
            RevenueStream::Affiliate => Decimal::new(5, 1),
        }
    }

    /// Platform fee as a whole percentage (20, 10 or 50).
    pub fn platform_fee_percent(self) -> u32 {
        match self {
            RevenueStream::SponsoredAd | RevenueStream::CrossPromotion => 20,
            RevenueStream::Subscription | RevenueStream::Donation | RevenueStream::DigitalProduct => 10,
            RevenueStream::Affiliate => 50,
        }
    }

    /// Value stored in the `source` column of ledger rows.
    pub fn as_str(self) -> &'static str {
        match self {
            RevenueStream::SponsoredAd => "sponsored_ad",
            RevenueStream::CrossPromotion => "cross_promotion",
            RevenueStream::Subscription => "subscription",
            RevenueStream::Donation => "donation",
            RevenueStream::DigitalProduct => "digital_product",
            RevenueStream::Affiliate => "affiliate",
        }
    }
}

impl fmt::Display for RevenueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RevenueSplit {
    pub amount: Decimal,
    pub creator_share: Decimal,
    pub platform_fee: Decimal,
}

/// Split `amount` for the given stream.
pub fn split(stream: RevenueStream, amount: Decimal) -> RevenueSplit {
    let creator_share = (amount * stream.creator_rate()).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    RevenueSplit {
        amount,
        creator_share,
        platform_fee: amount - creator_share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rates_match_fee_table() {
        for stream in RevenueStream::ALL {
            let fee = Decimal::ONE - stream.creator_rate();
            assert_eq!(fee * Decimal::from(100), Decimal::from(stream.platform_fee_percent()));
        }
    }

    #[test]
    fn splits_whole_amounts() {
        let s = split(RevenueStream::Subscription, dec("10.00"));
        assert_eq!(s.creator_share, dec("9.00"));
        assert_eq!(s.platform_fee, dec("1.00"));

        let s = split(RevenueStream::SponsoredAd, dec("250"));
        assert_eq!(s.creator_share, dec("200"));
        assert_eq!(s.platform_fee, dec("50"));

        let s = split(RevenueStream::Affiliate, dec("30"));
        assert_eq!(s.creator_share, dec("15"));
        assert_eq!(s.platform_fee, dec("15"));
    }

    #[test]
    fn rounds_creator_share_half_away_from_zero() {
        // 0.05 * 0.9 = 0.045
        let s = split(RevenueStream::Donation, dec("0.05"));
        assert_eq!(s.creator_share, dec("0.05"));
        assert_eq!(s.platform_fee, dec("0.00"));

        // 0.25 * 0.5 = 0.125
        let s = split(RevenueStream::Affiliate, dec("0.25"));
        assert_eq!(s.creator_share, dec("0.13"));
        assert_eq!(s.platform_fee, dec("0.12"));
    }

    #[test]
    fn parts_always_sum_to_amount() {
        for stream in RevenueStream::ALL {
            for cents in (0..5000).step_by(7) {
                let amount = Decimal::new(cents, 2);
                let s = split(stream, amount);
                assert_eq!(s.creator_share + s.platform_fee, amount, "{stream} {amount}");
                assert!(s.creator_share >= Decimal::ZERO);
                assert!(s.platform_fee >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn zero_amount_splits_to_zero() {
        let s = split(RevenueStream::CrossPromotion, Decimal::ZERO);
        assert_eq!(s.creator_share, Decimal::ZERO);
        assert_eq!(s.platform_fee, Decimal::ZERO);
    }
}
