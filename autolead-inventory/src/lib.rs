pub mod pricing;
pub mod sales;

pub use pricing::{compute_offer, OfferBreakdown, OfferInput, OfferRequest, OfferSuggestion, PricingError};
pub use sales::{summarize, SalesSummary};
