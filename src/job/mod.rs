pub mod record;

pub use record::{sanitize_name, JobRecord, JobStatus};
