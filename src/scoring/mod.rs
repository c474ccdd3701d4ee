pub mod judge;
pub mod report;
pub mod types;
pub mod weak_spots;
