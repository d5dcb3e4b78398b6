use syn::{Field, FieldsNamed, Ident, Token, Type, punctuated::Punctuated};

pub(crate) fn has_field(fields: &FieldsNamed, name: &str) -> bool {
    fields
        .named
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|i| i == name))
}

/// 把 `name` 字段放到最前：已存在则复用原定义，否则以 `ty` 新建
pub(crate) fn ensure_leading_field(fields: &mut FieldsNamed, name: &str, ty: &Type) {
    let mut rest: Punctuated<Field, Token![,]> = Punctuated::new();
    let mut leading: Option<Field> = None;

    for field in std::mem::take(&mut fields.named) {
        if leading.is_none() && field.ident.as_ref().is_some_and(|i| i == name) {
            leading = Some(field);
        } else {
            rest.push(field);
        }
    }

    let leading = leading.unwrap_or_else(|| {
        let ident = Ident::new(name, proc_macro2::Span::call_site());
        syn::parse_quote! { #ident: #ty }
    });

    fields.named.push(leading);
    fields.named.extend(rest);
}

/// 缺失时在末尾追加字段
pub(crate) fn append_missing_field(fields: &mut FieldsNamed, name: &str, field: Field) {
    if !has_field(fields, name) {
        fields.named.push(field);
    }
}
