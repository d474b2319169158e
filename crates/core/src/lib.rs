mod assertion;
mod award;
mod badge;
mod error;
mod extract;
mod fetch;
mod group;
mod recipient;
mod user;

pub use assertion::Assertion;
pub use award::{AwardEngine, BadgeStore, ImageStore, InsertOutcome};
pub use badge::Badge;
pub use error::BackpackError;
pub use extract::{extract_badge, ExtractedBadge};
pub use fetch::{AssertionFetcher, FETCH_TIMEOUT, MAX_ASSERTION_BYTES, MAX_REDIRECTS};
pub use group::{reconcile, BadgeGroup};
pub use recipient::RecipientId;
pub use user::User;
