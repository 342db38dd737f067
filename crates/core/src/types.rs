/// Vehicles are identified by the opaque string the T-BOX reports.
pub type VehicleId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
