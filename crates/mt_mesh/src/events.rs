// crates/mt_mesh/src/events.rs

//! 网格变更通知
//!
//! 网格在细化、粗化或重分区后向所有观察者广播事件。
//! 粒子世界只用它来置位"网格已变化"标志。

use parking_lot::RwLock;
use std::sync::Arc;

/// 网格变更事件
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    /// 单元已细化
    Refined {
        /// 被细化的单元数
        cells: usize,
    },
    /// 单元已粗化
    Coarsened {
        /// 被合并的父单元数
        cells: usize,
    },
    /// 单元归属已重新分配
    Repartitioned {
        /// 分区数
        n_ranks: usize,
    },
}

impl MeshEvent {
    /// 获取事件名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Refined { .. } => "Refined",
            Self::Coarsened { .. } => "Coarsened",
            Self::Repartitioned { .. } => "Repartitioned",
        }
    }
}

/// 网格观察者 trait
pub trait MeshObserver: Send + Sync {
    /// 处理事件
    fn on_mesh_event(&self, event: &MeshEvent);

    /// 获取观察者名称 (用于调试)
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 函数式观察者
pub struct FnObserver<F>
where
    F: Fn(&MeshEvent) + Send + Sync,
{
    name: String,
    handler: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&MeshEvent) + Send + Sync,
{
    /// 创建函数式观察者
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> MeshObserver for FnObserver<F>
where
    F: Fn(&MeshEvent) + Send + Sync,
{
    fn on_mesh_event(&self, event: &MeshEvent) {
        (self.handler)(event);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 事件分发器
#[derive(Default)]
pub struct MeshSignals {
    observers: RwLock<Vec<Arc<dyn MeshObserver>>>,
}

impl MeshSignals {
    /// 创建新的分发器
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// 添加观察者
    pub fn subscribe(&self, observer: Arc<dyn MeshObserver>) {
        let name = observer.name().to_string();
        self.observers.write().push(observer);
        tracing::debug!("Added mesh observer: {}", name);
    }

    /// 移除观察者
    pub fn unsubscribe(&self, observer: &Arc<dyn MeshObserver>) {
        self.observers
            .write()
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// 分发事件
    pub fn emit(&self, event: MeshEvent) {
        let observers = self.observers.read();

        tracing::trace!("Emitting mesh event: {}", event.name());

        for observer in observers.iter() {
            observer.on_mesh_event(&event);
        }
    }

    /// 获取观察者数量
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl std::fmt::Debug for MeshSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshSignals")
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
