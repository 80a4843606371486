//! Agent 协调器：每个 identity 一个 Actor
//!
//! - record：AgentRecord 状态机与积分账目（纯逻辑）
//! - actor：邮箱循环、生成任务、事件发布与持久化
//! - handle：对外的异步调用接口
//! - registry：identity → 句柄，懒启动与空闲回收

mod actor;
mod command;
mod handle;
pub mod record;
pub mod registry;

pub use actor::{CoordinatorContext, CoordinatorSettings};
pub use command::GenerationTicket;
pub use handle::CoordinatorHandle;
pub use record::{AgentRecord, AgentSummary, GenerationRecord, MintInfo, PackageKind};
pub use registry::{validate_identity, AgentRegistry};
