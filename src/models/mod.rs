//! Line-sequencing domain models.
//!
//! Provides the data types shared by the timeline simulator and the
//! sequence optimizer.
//!
//! # Domain Mappings
//!
//! | line-sequencer | Rolling mill | Generic scheduling |
//! |----------------|--------------|--------------------|
//! | Lot | Rolling campaign of one SKU | Job |
//! | Change-group | Roll/guide set family | Setup family |
//! | MandatoryWindow | Peak-tariff stop, ring change | Blocked period |
//! | Timeline | Shift plan | Schedule |

mod calendar;
mod changeover;
mod lot;
mod timeline;

pub use calendar::{
    CoverageRule, DayCalendar, DayRule, HolidayCalendar, Interval, MandatoryWindow,
    ObligationCalendar, hm,
};
pub use changeover::ChangeoverMatrix;
pub use lot::{Lot, MAX_DURATION_SECS, hours_to_secs, minutes_to_secs};
pub use timeline::{LotTimeline, SegmentKind, SegmentOrigin, Timeline, TimelineSegment};
pub(crate) use timeline::shift_secs;
