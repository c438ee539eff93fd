pub mod config;
pub mod executor;
pub mod face;
pub mod labeler;
pub mod observe;
pub mod oracle;
pub mod page;
pub mod session;
pub mod task;
pub mod types;

pub use config::Config;
pub use oracle::{DecisionOracle, LlmOracle, OracleReply};
pub use page::{PageDriver, PageIdentity};
pub use session::BrowserSession;
pub use task::run_task;
pub use types::{Action, Decision, Observation, TaskResult, TaskSpec};
