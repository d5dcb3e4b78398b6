//! 事件子系统（eventing）
//!
//! 进程内、同步顺序的事件分发：
//! - `EventHandler`：对某一类事件进行处理，声明自身所属阶段；
//! - `HandlerRegistry`：启动时按事件类型（`TypeId`）构建的处理器表；
//! - `EventDispatcher`：按阶段解析处理器，按注册顺序执行，失败即中止。
//!
pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use dispatcher::EventDispatcher;
pub use handler::{DispatchContext, EventHandler};
pub use registry::{HandlerRegistry, RegisteredHandler};
