pub mod header;
pub mod milestone_track;
