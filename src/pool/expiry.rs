//! 过期清理任务
//!
//! 按固定周期删除 `expire_at` 已过的连接。任务只持有连接池的弱引用，
//! 连接池释放或任务句柄被丢弃时任务随之终止。

use super::{ConnectionPool, PoolInner};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 运行中的过期清理任务，丢弃即停止
pub(crate) struct ExpiryTask {
    handle: JoinHandle<()>,
    period: Duration,
}

impl ExpiryTask {
    /// 启动清理任务；当前线程没有 Tokio 运行时则返回 `None`
    pub(crate) fn spawn(pool: Weak<PoolInner>, period: Duration) -> Option<Self> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("没有可用的 Tokio 运行时，过期清理未启动");
                return None;
            }
        };

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = pool.upgrade() else { break };

                match ConnectionPool::from_inner(inner).remove_expired_connections() {
                    Ok(0) => {}
                    Ok(count) => info!("清理了 {} 个过期连接", count),
                    Err(e) => warn!("清理过期连接失败: {}", e),
                }
            }
        });

        debug!(period_ms = period.as_millis() as u64, "过期清理已启动");
        Some(Self { handle, period })
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for ExpiryTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
