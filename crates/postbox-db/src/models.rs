/// Row type for the `messages` table.
/// `date` is kept as the RFC 3339 text it was written with.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub username: String,
    pub message: String,
    pub date: String,
}
