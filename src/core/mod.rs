//! 核心层：错误类型、状态机枚举、优雅关闭

pub mod error;
pub mod shutdown;
pub mod state;

pub use error::{CoordinatorError, CoordinatorResult};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{AgentStatus, GenerationStage};
