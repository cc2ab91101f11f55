pub mod record;
pub mod sublist;

// re-export for cleaner imports
pub use self::record::IntervalRecord;
pub use self::sublist::SublistHeader;
