pub mod snapshots;
pub mod vehicles;
