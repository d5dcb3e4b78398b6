//! 工作单元事件管道（uow-domain）
//!
//! 在一次工作单元提交内处理聚合记录的领域事件：
//! - 聚合（`aggregate`）与实体（`entity`）建模，聚合通过 `EventRecorder` 记录未发布事件
//! - 领域事件（`domain_event`）与阶段标记（预提交/提交后）
//! - 事件队列（`event_queue`）及按阶段生成队列的工厂
//! - 事件分发（`eventing`）：按事件类型注册的处理器与分发器
//! - 工作单元（`unit_of_work`）：预提交不动点迭代、事务提交、提交后通知与日志
//! - 事件日志（`event_log`）：把事件载荷（`describe`）展开为明细树并追加存储
//! - 持久化协议（`persist`）与内存实现
//!
//! 典型用法：
//! 1. 用 `#[aggregate]` 定义聚合，用 `#[domain_event]` 定义事件并标记阶段；
//! 2. 实现 `EventHandler<E>`，注册到 `HandlerRegistry` 并构建 `EventDispatcher`；
//! 3. 通过 `UnitOfWork::builder()` 注入持久化上下文、分发器与事件日志存储；
//! 4. 修改聚合后调用 `UnitOfWork::commit`，冲突时可用 `retry_on_conflict` 重跑。
//!
pub mod aggregate;
pub mod describe;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod event_log;
pub mod event_queue;
pub mod eventing;
pub mod persist;
pub mod unit_of_work;

// 允许在本 crate 内部通过 ::uow_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::uow_domain 路径。
extern crate self as uow_domain;
