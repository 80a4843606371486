//! AgentRecord / GenerationRecord 及其状态迁移
//!
//! 所有迁移都是同步的纯函数：先校验，校验失败直接返回错误且不修改任何字段；
//! Actor 负责在迁移前后发布事件与持久化。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{AgentStatus, CoordinatorError, CoordinatorResult, GenerationStage};

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 套餐等级（决定默认能力集与默认积分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    Starter,
    Creator,
    Pro,
}

impl PackageKind {
    /// 是否包含视频生成能力
    pub fn supports_video(&self) -> bool {
        !matches!(self, PackageKind::Starter)
    }

    /// 初始化未指定积分时使用的默认额度
    pub fn default_credits(&self) -> u64 {
        match self {
            PackageKind::Starter => 100,
            PackageKind::Creator => 500,
            PackageKind::Pro => 2000,
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageKind::Starter => write!(f, "starter"),
            PackageKind::Creator => write!(f, "creator"),
            PackageKind::Pro => write!(f, "pro"),
        }
    }
}

/// 链上铸造信息（外部铸造流程确认后回调写入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    pub token_id: String,
    pub tx_hash: String,
    pub minted_at: i64,
}

/// 单次生成记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: String,
    pub prompt: String,
    pub is_video: bool,
    /// 受理时扣除的积分
    pub credits: u64,
    pub stage: GenerationStage,
    /// 后端上报的进度（0-100）
    pub progress: u8,
    pub result_ref: Option<String>,
    pub error: Option<String>,
    /// 失败后积分是否已退还
    #[serde(default)]
    pub refunded: bool,
    pub mint_info: Option<MintInfo>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GenerationRecord {
    pub fn new(prompt: impl Into<String>, is_video: bool, credits: u64) -> Self {
        let now = now_millis();
        Self {
            id: format!("gen_{}", uuid::Uuid::new_v4()),
            prompt: prompt.into(),
            is_video,
            credits,
            stage: GenerationStage::Queued,
            progress: 0,
            result_ref: None,
            error: None,
            refunded: false,
            mint_info: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = now_millis();
    }
}

/// getStatus 返回的摘要（不含完整生成列表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub identity: String,
    pub owner_address: String,
    pub package_kind: Option<PackageKind>,
    pub status: AgentStatus,
    pub total_credits: u64,
    pub spent_credits: u64,
    pub available_credits: u64,
    pub generation_count: usize,
    /// 当前进行中的生成
    pub active_generation: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationRecord>,
    pub updated_at: i64,
}

/// 单个 Agent 的完整状态，由其协调器独占
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub identity: String,
    pub owner_address: String,
    pub package_kind: Option<PackageKind>,
    pub total_credits: u64,
    pub spent_credits: u64,
    pub status: AgentStatus,
    /// 按受理顺序排列
    pub generations: Vec<GenerationRecord>,
    /// 进入 Error 的原因
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AgentRecord {
    pub fn new(identity: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            identity: identity.into(),
            owner_address: String::new(),
            package_kind: None,
            total_credits: 0,
            spent_credits: 0,
            status: AgentStatus::Uninitialized,
            generations: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn available_credits(&self) -> u64 {
        self.total_credits.saturating_sub(self.spent_credits)
    }

    pub fn generation(&self, generation_id: &str) -> Option<&GenerationRecord> {
        self.generations.iter().find(|g| g.id == generation_id)
    }

    fn generation_mut(&mut self, generation_id: &str) -> CoordinatorResult<&mut GenerationRecord> {
        self.generations
            .iter_mut()
            .find(|g| g.id == generation_id)
            .ok_or_else(|| CoordinatorError::NotFound(format!("generation {}", generation_id)))
    }

    /// 当前未结束的生成
    pub fn active_generation(&self) -> Option<&GenerationRecord> {
        self.generations.iter().find(|g| !g.is_finished())
    }

    fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// 生成摘要；未初始化视为不存在
    pub fn summary(&self, generation_id: Option<&str>) -> CoordinatorResult<AgentSummary> {
        if self.status == AgentStatus::Uninitialized {
            return Err(CoordinatorError::NotFound(format!("agent {}", self.identity)));
        }
        let generation = match generation_id {
            Some(id) => Some(
                self.generation(id)
                    .cloned()
                    .ok_or_else(|| CoordinatorError::NotFound(format!("generation {}", id)))?,
            ),
            None => None,
        };
        Ok(AgentSummary {
            identity: self.identity.clone(),
            owner_address: self.owner_address.clone(),
            package_kind: self.package_kind,
            status: self.status,
            total_credits: self.total_credits,
            spent_credits: self.spent_credits,
            available_credits: self.available_credits(),
            generation_count: self.generations.len(),
            active_generation: self.active_generation().map(|g| g.id.clone()),
            error: self.error.clone(),
            generation,
            updated_at: self.updated_at,
        })
    }

    /// 初始化第一步：校验并进入 Initializing
    ///
    /// 非 Uninitialized 一律拒绝（包括参数完全相同的重复调用），避免重复充值。
    pub fn begin_initialize(
        &mut self,
        owner_address: &str,
        package_kind: PackageKind,
        total_credits: u64,
    ) -> CoordinatorResult<()> {
        if self.status != AgentStatus::Uninitialized {
            return Err(CoordinatorError::AlreadyInitialized);
        }
        let owner_address = owner_address.trim();
        if owner_address.is_empty() {
            return Err(CoordinatorError::InvalidRequest(
                "owner_address is required".to_string(),
            ));
        }

        self.owner_address = owner_address.to_string();
        self.package_kind = Some(package_kind);
        self.total_credits = total_credits;
        self.spent_credits = 0;
        self.error = None;
        self.status = AgentStatus::Initializing;
        self.touch();
        Ok(())
    }

    /// 初始化第二步：Initializing → Ready
    pub fn finish_initialize(&mut self) {
        if self.status == AgentStatus::Initializing {
            self.status = AgentStatus::Ready;
            self.touch();
        }
    }

    /// 受理生成请求：创建 Queued 记录并在同一步扣除积分
    pub fn admit_generation(
        &mut self,
        prompt: &str,
        is_video: bool,
        required_credits: u64,
    ) -> CoordinatorResult<GenerationRecord> {
        match self.status {
            AgentStatus::Ready => {}
            AgentStatus::Generating => {
                let active = self
                    .active_generation()
                    .map(|g| g.id.clone())
                    .unwrap_or_default();
                return Err(CoordinatorError::Busy(active));
            }
            other => return Err(CoordinatorError::NotReady(other)),
        }

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(CoordinatorError::InvalidRequest("prompt is required".to_string()));
        }
        if required_credits == 0 {
            return Err(CoordinatorError::InvalidRequest(
                "required_credits must be positive".to_string(),
            ));
        }
        if let Some(kind) = self.package_kind {
            if is_video && !kind.supports_video() {
                return Err(CoordinatorError::CapabilityMissing {
                    capability: "video".to_string(),
                    package: kind,
                });
            }
        }
        let available = self.available_credits();
        if available < required_credits {
            return Err(CoordinatorError::InsufficientCredits {
                required: required_credits,
                available,
            });
        }

        let generation = GenerationRecord::new(prompt, is_video, required_credits);
        self.spent_credits += required_credits;
        self.status = AgentStatus::Generating;
        self.generations.push(generation.clone());
        self.touch();
        Ok(generation)
    }

    /// Queued → InProgress
    pub fn mark_in_progress(&mut self, generation_id: &str) -> CoordinatorResult<()> {
        let generation = self.generation_mut(generation_id)?;
        if generation.stage != GenerationStage::Queued {
            return Err(CoordinatorError::InvalidState(format!(
                "generation {} is {}, expected queued",
                generation_id, generation.stage
            )));
        }
        generation.stage = GenerationStage::InProgress;
        generation.touch();
        self.touch();
        Ok(())
    }

    /// 记录后端进度；只增不减，返回记录后的进度
    pub fn record_progress(&mut self, generation_id: &str, progress: u8) -> CoordinatorResult<u8> {
        let generation = self.generation_mut(generation_id)?;
        if generation.stage != GenerationStage::InProgress {
            return Err(CoordinatorError::InvalidState(format!(
                "generation {} is {}, expected in_progress",
                generation_id, generation.stage
            )));
        }
        generation.progress = generation.progress.max(progress.min(100));
        Ok(generation.progress)
    }

    /// 生成成功：写入 result_ref，Agent 回到 Ready
    pub fn complete_generation(
        &mut self,
        generation_id: &str,
        result_ref: impl Into<String>,
    ) -> CoordinatorResult<GenerationRecord> {
        let generation = self.generation_mut(generation_id)?;
        if generation.is_finished() {
            return Err(CoordinatorError::InvalidState(format!(
                "generation {} already {}",
                generation_id, generation.stage
            )));
        }
        generation.stage = GenerationStage::Completed;
        generation.progress = 100;
        generation.result_ref = Some(result_ref.into());
        generation.touch();
        let snapshot = generation.clone();

        if self.status == AgentStatus::Generating {
            self.status = AgentStatus::Ready;
        }
        self.touch();
        Ok(snapshot)
    }

    /// 生成失败：按策略退还积分，Agent 回到 Ready；返回记录与退还额度
    pub fn fail_generation(
        &mut self,
        generation_id: &str,
        reason: impl Into<String>,
        refund: bool,
    ) -> CoordinatorResult<(GenerationRecord, u64)> {
        let generation = self.generation_mut(generation_id)?;
        if generation.is_finished() {
            return Err(CoordinatorError::InvalidState(format!(
                "generation {} already {}",
                generation_id, generation.stage
            )));
        }
        generation.stage = GenerationStage::Failed;
        generation.error = Some(reason.into());
        let refunded = if refund { generation.credits } else { 0 };
        generation.refunded = refund;
        generation.touch();
        let snapshot = generation.clone();

        self.spent_credits = self.spent_credits.saturating_sub(refunded);
        if self.status == AgentStatus::Generating {
            self.status = AgentStatus::Ready;
        }
        self.touch();
        Ok((snapshot, refunded))
    }

    /// 不可恢复故障：进入 Error，需外部 reinitialize
    pub fn enter_error(&mut self, reason: impl Into<String>) {
        self.status = AgentStatus::Error;
        self.error = Some(reason.into());
        self.touch();
    }

    /// 写入铸造信息；每个生成只能写一次，且必须已完成
    pub fn record_mint(
        &mut self,
        generation_id: &str,
        token_id: &str,
        tx_hash: &str,
    ) -> CoordinatorResult<GenerationRecord> {
        if token_id.trim().is_empty() || tx_hash.trim().is_empty() {
            return Err(CoordinatorError::InvalidRequest(
                "token_id and tx_hash are required".to_string(),
            ));
        }
        let generation = self.generation_mut(generation_id)?;
        if generation.stage != GenerationStage::Completed {
            return Err(CoordinatorError::InvalidState(format!(
                "generation {} is {}, only completed generations can be minted",
                generation_id, generation.stage
            )));
        }
        if generation.mint_info.is_some() {
            return Err(CoordinatorError::InvalidState(format!(
                "generation {} already minted",
                generation_id
            )));
        }
        generation.mint_info = Some(MintInfo {
            token_id: token_id.trim().to_string(),
            tx_hash: tx_hash.trim().to_string(),
            minted_at: now_millis(),
        });
        generation.touch();
        let snapshot = generation.clone();
        self.touch();
        Ok(snapshot)
    }

    /// 充值（购买积分包后回调），返回新的 total_credits
    pub fn add_credits(&mut self, amount: u64) -> CoordinatorResult<u64> {
        if matches!(
            self.status,
            AgentStatus::Uninitialized | AgentStatus::Initializing
        ) {
            return Err(CoordinatorError::NotReady(self.status));
        }
        if amount == 0 {
            return Err(CoordinatorError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        let total = self.total_credits.checked_add(amount).ok_or_else(|| {
            CoordinatorError::InvalidRequest("credit total overflow".to_string())
        })?;
        self.total_credits = total;
        self.touch();
        Ok(total)
    }

    /// 从 Error 重新初始化：保留历史与已消耗积分
    pub fn reinitialize(
        &mut self,
        owner_address: &str,
        package_kind: PackageKind,
        total_credits: u64,
    ) -> CoordinatorResult<()> {
        if self.status != AgentStatus::Error {
            return Err(CoordinatorError::InvalidState(format!(
                "reinitialize requires error status, agent is {}",
                self.status
            )));
        }
        let owner_address = owner_address.trim();
        if owner_address.is_empty() {
            return Err(CoordinatorError::InvalidRequest(
                "owner_address is required".to_string(),
            ));
        }
        if total_credits < self.spent_credits {
            return Err(CoordinatorError::InvalidRequest(format!(
                "total_credits {} below spent credits {}",
                total_credits, self.spent_credits
            )));
        }
        self.owner_address = owner_address.to_string();
        self.package_kind = Some(package_kind);
        self.total_credits = total_credits;
        self.error = None;
        self.status = AgentStatus::Ready;
        self.touch();
        Ok(())
    }

    /// 重启恢复：把停留在 Queued / InProgress 的生成标记为失败
    ///
    /// 返回 (generation_id, 退还积分) 列表。
    pub fn recover_interrupted(&mut self, refund: bool) -> Vec<(String, u64)> {
        let interrupted: Vec<String> = self
            .generations
            .iter()
            .filter(|g| !g.is_finished())
            .map(|g| g.id.clone())
            .collect();

        let mut recovered = Vec::with_capacity(interrupted.len());
        for id in interrupted {
            if let Ok((_, refunded)) =
                self.fail_generation(&id, "interrupted before completion", refund)
            {
                recovered.push((id, refunded));
            }
        }
        match self.status {
            AgentStatus::Generating => self.status = AgentStatus::Ready,
            AgentStatus::Initializing => self.status = AgentStatus::Ready,
            _ => {}
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_agent(credits: u64) -> AgentRecord {
        let mut record = AgentRecord::new("a1");
        record.begin_initialize("0xabc", PackageKind::Starter, credits).unwrap();
        record.finish_initialize();
        record
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let mut record = ready_agent(100);
        let snapshot = record.clone();

        let err = record
            .begin_initialize("0xabc", PackageKind::Starter, 100)
            .unwrap_err();
        assert_eq!(err, CoordinatorError::AlreadyInitialized);
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_initialize_passes_through_initializing() {
        let mut record = AgentRecord::new("a1");
        record.begin_initialize("0xabc", PackageKind::Creator, 500).unwrap();
        assert_eq!(record.status, AgentStatus::Initializing);
        record.finish_initialize();
        assert_eq!(record.status, AgentStatus::Ready);
        assert_eq!(record.spent_credits, 0);
    }

    #[test]
    fn test_initialize_requires_owner() {
        let mut record = AgentRecord::new("a1");
        let err = record
            .begin_initialize("  ", PackageKind::Starter, 100)
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidRequest(_)));
        assert_eq!(record.status, AgentStatus::Uninitialized);
    }

    #[test]
    fn test_status_of_uninitialized_is_not_found() {
        let record = AgentRecord::new("ghost");
        assert!(matches!(
            record.summary(None),
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[test]
    fn test_scenario_debit_then_insufficient() {
        let mut record = ready_agent(100);

        let generation = record.admit_generation("cat", false, 25).unwrap();
        assert_eq!(record.spent_credits, 25);
        assert_eq!(record.status, AgentStatus::Generating);
        assert_eq!(generation.stage, GenerationStage::Queued);

        record.mark_in_progress(&generation.id).unwrap();
        let done = record
            .complete_generation(&generation.id, "ipfs://artifact")
            .unwrap();
        assert_eq!(done.stage, GenerationStage::Completed);
        assert_eq!(done.result_ref.as_deref(), Some("ipfs://artifact"));
        assert_eq!(record.status, AgentStatus::Ready);

        let snapshot = record.clone();
        let err = record.admit_generation("dog", false, 80).unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::InsufficientCredits {
                required: 80,
                available: 75
            }
        );
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_generate_rejections_leave_state_unchanged() {
        let mut record = AgentRecord::new("a1");
        assert_eq!(
            record.admit_generation("cat", false, 1).unwrap_err(),
            CoordinatorError::NotReady(AgentStatus::Uninitialized)
        );

        let mut record = ready_agent(100);
        let snapshot = record.clone();
        assert!(matches!(
            record.admit_generation("", false, 1),
            Err(CoordinatorError::InvalidRequest(_))
        ));
        assert!(matches!(
            record.admit_generation("cat", false, 0),
            Err(CoordinatorError::InvalidRequest(_))
        ));
        assert!(matches!(
            record.admit_generation("clip", true, 10),
            Err(CoordinatorError::CapabilityMissing { .. })
        ));
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_second_generate_while_generating_is_busy() {
        let mut record = ready_agent(100);
        let first = record.admit_generation("cat", false, 10).unwrap();
        let err = record.admit_generation("dog", false, 10).unwrap_err();
        assert_eq!(err, CoordinatorError::Busy(first.id));
        assert_eq!(record.spent_credits, 10);
        assert_eq!(record.generations.len(), 1);
    }

    #[test]
    fn test_spent_never_exceeds_total() {
        let mut record = ready_agent(50);
        for i in 0..20u64 {
            match record.admit_generation("loop", false, 7 + (i % 3)) {
                Ok(generation) => {
                    record.mark_in_progress(&generation.id).unwrap();
                    if i % 4 == 0 {
                        record.fail_generation(&generation.id, "boom", i % 8 == 0).unwrap();
                    } else {
                        record.complete_generation(&generation.id, "ref").unwrap();
                    }
                }
                Err(CoordinatorError::InsufficientCredits { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
            assert!(record.spent_credits <= record.total_credits);
        }
    }

    #[test]
    fn test_fail_with_refund() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 30).unwrap();
        let (failed, refunded) = record
            .fail_generation(&generation.id, "backend down", true)
            .unwrap();
        assert_eq!(refunded, 30);
        assert!(failed.refunded);
        assert_eq!(failed.stage, GenerationStage::Failed);
        assert_eq!(record.spent_credits, 0);
        assert_eq!(record.status, AgentStatus::Ready);
    }

    #[test]
    fn test_fail_without_refund_keeps_spent() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 30).unwrap();
        let (failed, refunded) = record
            .fail_generation(&generation.id, "timeout", false)
            .unwrap();
        assert_eq!(refunded, 0);
        assert!(!failed.refunded);
        assert_eq!(record.spent_credits, 30);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 10).unwrap();
        assert!(record.record_progress(&generation.id, 10).is_err());
        record.mark_in_progress(&generation.id).unwrap();
        assert_eq!(record.record_progress(&generation.id, 60).unwrap(), 60);
        assert_eq!(record.record_progress(&generation.id, 40).unwrap(), 60);
        assert_eq!(record.record_progress(&generation.id, 250).unwrap(), 100);
    }

    #[test]
    fn test_mint_requires_completed() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 10).unwrap();
        record.mark_in_progress(&generation.id).unwrap();
        let before = record.generation(&generation.id).cloned();

        let err = record.record_mint(&generation.id, "1", "0xtx").unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidState(_)));
        assert_eq!(record.generation(&generation.id).cloned(), before);
    }

    #[test]
    fn test_mint_only_once() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 10).unwrap();
        record.mark_in_progress(&generation.id).unwrap();
        record.complete_generation(&generation.id, "ref").unwrap();

        record.record_mint(&generation.id, "42", "0xfirst").unwrap();
        let err = record.record_mint(&generation.id, "43", "0xsecond").unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidState(_)));

        let mint = record.generation(&generation.id).unwrap().mint_info.clone().unwrap();
        assert_eq!(mint.token_id, "42");
        assert_eq!(mint.tx_hash, "0xfirst");
    }

    #[test]
    fn test_mint_unknown_generation() {
        let mut record = ready_agent(100);
        assert!(matches!(
            record.record_mint("gen_missing", "1", "0x"),
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_credits() {
        let mut record = AgentRecord::new("a1");
        assert!(matches!(
            record.add_credits(10),
            Err(CoordinatorError::NotReady(AgentStatus::Uninitialized))
        ));

        let mut record = ready_agent(100);
        assert_eq!(record.add_credits(50).unwrap(), 150);
        assert!(record.add_credits(0).is_err());
        record.total_credits = u64::MAX;
        assert!(record.add_credits(1).is_err());
    }

    #[test]
    fn test_reinitialize_only_from_error() {
        let mut record = ready_agent(100);
        assert!(matches!(
            record.reinitialize("0xabc", PackageKind::Pro, 100),
            Err(CoordinatorError::InvalidState(_))
        ));

        let generation = record.admit_generation("cat", false, 40).unwrap();
        record.fail_generation(&generation.id, "worker crashed", false).unwrap();
        record.enter_error("worker crashed");
        assert_eq!(record.status, AgentStatus::Error);

        assert!(matches!(
            record.reinitialize("0xabc", PackageKind::Pro, 10),
            Err(CoordinatorError::InvalidRequest(_))
        ));
        record.reinitialize("0xabc", PackageKind::Pro, 300).unwrap();
        assert_eq!(record.status, AgentStatus::Ready);
        assert_eq!(record.spent_credits, 40);
        assert_eq!(record.available_credits(), 260);
        assert!(record.error.is_none());
        assert_eq!(record.generations.len(), 1);
    }

    #[test]
    fn test_recover_interrupted() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 20).unwrap();
        record.mark_in_progress(&generation.id).unwrap();

        let recovered = record.recover_interrupted(true);
        assert_eq!(recovered, vec![(generation.id.clone(), 20)]);
        assert_eq!(record.status, AgentStatus::Ready);
        assert_eq!(record.spent_credits, 0);
        assert_eq!(
            record.generation(&generation.id).unwrap().stage,
            GenerationStage::Failed
        );
    }

    #[test]
    fn test_summary_with_generation_detail() {
        let mut record = ready_agent(100);
        let generation = record.admit_generation("cat", false, 10).unwrap();

        let summary = record.summary(Some(&generation.id)).unwrap();
        assert_eq!(summary.available_credits, 90);
        assert_eq!(summary.active_generation.as_deref(), Some(generation.id.as_str()));
        assert_eq!(summary.generation.unwrap().id, generation.id);

        assert!(matches!(
            record.summary(Some("gen_nope")),
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[test]
    fn test_generations_keep_insertion_order() {
        let mut record = ready_agent(100);
        let mut ids = Vec::new();
        for prompt in ["one", "two", "three"] {
            let generation = record.admit_generation(prompt, false, 5).unwrap();
            record.mark_in_progress(&generation.id).unwrap();
            record.complete_generation(&generation.id, prompt).unwrap();
            ids.push(generation.id);
        }
        let stored: Vec<_> = record.generations.iter().map(|g| g.id.clone()).collect();
        assert_eq!(stored, ids);
    }
}
