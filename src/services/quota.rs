//! 配额服务 - 业务能力层
//!
//! 生成一份试卷消耗一次配额。检查与扣减必须是同一个原子动作，
//! 否则同一用户的并发请求会同时通过余量为 1 的检查。
//! 生成失败不退还配额。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AppResult;

/// 用户配额存储的抽象
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// 查询剩余可生成次数
    async fn remaining(&self, username: &str) -> AppResult<u32>;

    /// 原子地检查并扣减
    ///
    /// 余量不足时返回 false 且不做任何修改
    async fn try_decrement(&self, username: &str, amount: u32) -> AppResult<bool>;
}

/// 进程内配额存储
///
/// 适用于单实例部署和测试；新用户首次出现时获得默认配额
pub struct InMemoryQuotaStore {
    credits: Mutex<HashMap<String, u32>>,
    default_credits: u32,
}

impl InMemoryQuotaStore {
    pub fn new(default_credits: u32) -> Self {
        Self {
            credits: Mutex::new(HashMap::new()),
            default_credits,
        }
    }

    /// 为用户追加配额
    pub async fn grant(&self, username: &str, amount: u32) {
        let mut credits = self.credits.lock().await;
        let balance = credits
            .entry(username.to_string())
            .or_insert(self.default_credits);
        *balance += amount;
        debug!("💳 用户 {} 配额增加 {}，当前余量 {}", username, amount, balance);
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn remaining(&self, username: &str) -> AppResult<u32> {
        let mut credits = self.credits.lock().await;
        Ok(*credits
            .entry(username.to_string())
            .or_insert(self.default_credits))
    }

    async fn try_decrement(&self, username: &str, amount: u32) -> AppResult<bool> {
        let mut credits = self.credits.lock().await;
        let balance = credits
            .entry(username.to_string())
            .or_insert(self.default_credits);
        if *balance < amount {
            debug!("💳 用户 {} 余量 {} 不足以扣减 {}", username, balance, amount);
            return Ok(false);
        }
        *balance -= amount;
        debug!("💳 用户 {} 扣减 {}，剩余 {}", username, amount, balance);
        Ok(true)
    }
}
