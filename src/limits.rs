/// Max bytes in any free-text booking field (room, title, date, bookedBy).
pub const MAX_FIELD_LEN: usize = 256;

/// Group-commit channel depth.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
