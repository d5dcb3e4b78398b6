use quote::ToTokens;
use std::collections::HashSet;
use syn::punctuated::Punctuated;
use syn::{Attribute, Path, Token};

/// 把 `required` 合并进已有的 `#[derive(..)]`，去重后置于属性最前
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<Path>) {
    let mut existing = Vec::new();
    attrs.retain(|attr| {
        if !attr.path().is_ident("derive") {
            return true;
        }
        if let Ok(list) = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated) {
            existing.extend(list);
        }
        false
    });

    let mut seen = HashSet::new();
    let merged: Vec<Path> = required
        .into_iter()
        .chain(existing)
        .filter(|p| seen.insert(derive_key(p)))
        .collect();

    attrs.insert(0, syn::parse_quote!(#[derive(#(#merged),*)]));
}

// 以末段名判重，`Serialize` 与 `serde::Serialize` 视为同一个
fn derive_key(path: &Path) -> String {
    path.segments
        .last()
        .map(|seg| seg.ident.to_string())
        .unwrap_or_else(|| path.to_token_stream().to_string())
}

/// 移除指定名称的辅助属性（属性宏不能像派生宏那样声明 helper attributes）
pub(crate) fn strip_attrs(attrs: &mut Vec<Attribute>, name: &str) {
    attrs.retain(|attr| !attr.path().is_ident(name));
}
