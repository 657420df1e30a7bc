/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// New random resource id (UUID v4)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
