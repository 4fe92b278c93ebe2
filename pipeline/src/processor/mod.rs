pub mod checkpoint;
pub mod gold;
pub mod locator;
pub mod silver;
pub mod validation;

pub use checkpoint::{JobRun, JobTracker, RunStatus};
pub use gold::{GoldProcessor, GoldReport};
pub use silver::{SilverProcessor, SilverReport};
