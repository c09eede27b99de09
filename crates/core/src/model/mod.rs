pub mod category;
pub mod description;
pub mod occurrence;
pub mod zoom;

pub use category::EventCategory;
pub use description::{DescriptionId, DescriptionStats, EventDescription};
pub use occurrence::{Occurrence, RawRecord};
pub use zoom::ZoomRange;
