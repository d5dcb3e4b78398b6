use crate::attr_args::AttrArgs;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Result};

const DESCRIBE: &str = "describe";

/// #[derive(Describe)] 实现
/// - 具名字段结构体 → `Object`，每个字段一个属性
/// - 单字段元组结构体 → 直接描述内部值
/// - 单元结构体 → 无属性的 `Object`
/// - 仅含单元变体的枚举 → `Simple`（变体名）
/// - 带字段的变体 → `Object`，类型名为 `Enum::Variant`
/// - 字段属性：`#[describe(skip)]`、`#[describe(rename = "...")]`
pub(crate) fn expand(input: &DeriveInput) -> Result<TokenStream> {
    let ident = &input.ident;
    let type_name = ident.to_string();

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                quote! { ::uow_domain::describe::Describe::describe(&self.0) }
            }
            fields => {
                let (pattern, properties) = destructure(fields)?;
                quote! {
                    let Self #pattern = self;
                    ::uow_domain::describe::DetailValue::object(#type_name, ::std::vec![#(#properties),*])
                }
            }
        },
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let v_ident = &variant.ident;
                    let v_name = variant.ident.to_string();
                    if matches!(variant.fields, Fields::Unit) {
                        return Ok(quote! {
                            Self::#v_ident => ::uow_domain::describe::DetailValue::simple(#type_name, #v_name)
                        });
                    }
                    let (pattern, properties) = destructure(&variant.fields)?;
                    let object_name = format!("{type_name}::{v_name}");
                    Ok(quote! {
                        Self::#v_ident #pattern => ::uow_domain::describe::DetailValue::object(
                            #object_name,
                            ::std::vec![#(#properties),*],
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            if arms.is_empty() {
                quote! { match *self {} }
            } else {
                quote! { match self { #(#arms,)* } }
            }
        }
        Data::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span(),
                "Describe cannot be derived for unions",
            ));
        }
    };

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param
            .bounds
            .push(syn::parse_quote!(::uow_domain::describe::Describe));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::uow_domain::describe::Describe for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn describe(&self) -> ::uow_domain::describe::DetailValue {
                #body
            }
        }
    })
}

// 生成解构模式与属性列表；跳过的字段以 `_` 绑定
fn destructure(fields: &Fields) -> Result<(TokenStream, Vec<TokenStream>)> {
    let mut properties = Vec::new();

    match fields {
        Fields::Named(named) => {
            let mut bindings = Vec::new();
            for field in &named.named {
                let Some(ident) = field.ident.as_ref() else {
                    continue;
                };
                let options = FieldOptions::parse(&field.attrs)?;
                if options.skip {
                    bindings.push(quote! { #ident: _ });
                    continue;
                }
                let name = options
                    .rename
                    .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
                bindings.push(quote! { #ident });
                properties.push(property(&name, quote! { #ident }));
            }
            Ok((quote! { { #(#bindings,)* } }, properties))
        }
        Fields::Unnamed(unnamed) => {
            let mut bindings = Vec::new();
            for (i, field) in unnamed.unnamed.iter().enumerate() {
                let options = FieldOptions::parse(&field.attrs)?;
                if options.skip {
                    bindings.push(quote! { _ });
                    continue;
                }
                let binding = Ident::new(&format!("field_{i}"), Span::call_site());
                let name = options
                    .rename
                    .unwrap_or_else(|| LitStr::new(&i.to_string(), field.span()));
                bindings.push(quote! { #binding });
                properties.push(property(&name, quote! { #binding }));
            }
            Ok((quote! { ( #(#bindings,)* ) }, properties))
        }
        Fields::Unit => Ok((TokenStream::new(), properties)),
    }
}

fn property(name: &LitStr, binding: TokenStream) -> TokenStream {
    quote! {
        ::uow_domain::describe::DetailProperty::new(
            #name,
            ::uow_domain::describe::Describe::describe(#binding),
        )
    }
}

#[derive(Default)]
struct FieldOptions {
    skip: bool,
    rename: Option<LitStr>,
}

impl FieldOptions {
    fn parse(attrs: &[syn::Attribute]) -> Result<Self> {
        let mut options = FieldOptions::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident(DESCRIBE)) {
            let AttrArgs(args) = attr.parse_args()?;
            for arg in args {
                match arg.key.to_string().as_str() {
                    "skip" => options.skip = arg.bool()?,
                    "rename" => options.rename = Some(arg.lit_str()?),
                    _ => return Err(arg.unknown("'skip' | 'rename'")),
                }
            }
        }
        Ok(options)
    }
}

/// 移除字段上的 `#[describe(..)]`，供属性宏在生成实现后清理
pub(crate) fn strip_field_attrs(data: &mut syn::Item) {
    let mut strip = |fields: &mut Fields| {
        for field in fields.iter_mut() {
            crate::derive_utils::strip_attrs(&mut field.attrs, DESCRIBE);
        }
    };
    match data {
        syn::Item::Struct(st) => strip(&mut st.fields),
        syn::Item::Enum(en) => {
            for variant in en.variants.iter_mut() {
                strip(&mut variant.fields);
            }
        }
        _ => {}
    }
}
