pub mod delivery;
#[cfg(feature = "sqlx")]
pub mod repository;
pub mod subscription;

pub use delivery::{DeliveryJob, DeliveryLog, Outcome};
pub use subscription::{Subscription, SubscriptionRecord};
