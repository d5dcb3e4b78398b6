//! 工作单元事件管道的过程宏
//!
//! - `#[aggregate]`：补齐聚合的标识与事件记录字段，实现 `Entity`/`Aggregate`
//! - `#[domain_event]`：为事件实现 `DomainEvent` 与 `Describe`，声明所属阶段
//! - `#[derive(Describe)]`：为事件载荷中的结构体与枚举生成可描述值
//!
//! 生成代码通过 `::uow_domain` 路径引用运行时类型。
//!
use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod aggregate;
mod attr_args;
mod derive_utils;
mod describe;
mod domain_event;
mod field_utils;

/// 聚合宏
/// - 参数：`#[aggregate(name = "order", id = OrderId, debug = true)]`，均可省略
/// - 结构体需为具名字段；需要 `serde` 依赖
#[proc_macro_attribute]
pub fn aggregate(attr: TokenStream, item: TokenStream) -> TokenStream {
    aggregate::expand(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// 领域事件宏
/// - 参数：`#[domain_event(name = "...", description = "...", pre_commit, post_commit)]`
/// - 枚举变体可用 `#[event(name = "...", description = "...")]` 覆写
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Describe, attributes(describe))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    describe::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
