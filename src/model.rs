pub use like::*;
pub use metrics::*;
pub use owner::*;
pub use prompt::*;
pub use stats::*;
pub use timestamp::*;

mod like;
mod metrics;
mod owner;
mod prompt;
mod stats;
mod timestamp;
