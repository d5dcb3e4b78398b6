use crate::attr_args::AttrArgs;
use crate::derive_utils::{apply_derives, strip_attrs};
use crate::describe;
use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::spanned::Spanned;
use syn::{DeriveInput, Item, LitStr, Result};

/// #[domain_event] 宏实现
/// - 支持结构体与枚举，派生 Debug、Clone、PartialEq
/// - 生成 `Describe`（字段可用 `#[describe(skip)]`、`#[describe(rename = "...")]`）
/// - 生成 `DomainEvent`：
///   - `name = "..."` 覆写事件类型名，默认为结构体名，枚举为 `Enum.Variant`
///   - `description = "..."` 覆写日志描述
///   - `pre_commit` / `post_commit` 阶段标记，缺省为提交后事件
/// - 枚举变体可用 `#[event(name = "...", description = "...")]` 覆写
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> Result<TokenStream> {
    let cfg: EventAttrConfig = syn::parse2(attr)?;
    let mut item = syn::parse2::<Item>(item)?;

    let (ident, generics, attrs) = match &mut item {
        Item::Struct(st) => (st.ident.clone(), st.generics.clone(), &mut st.attrs),
        Item::Enum(en) => (en.ident.clone(), en.generics.clone(), &mut en.attrs),
        other => {
            return Err(syn::Error::new(
                other.span(),
                "#[domain_event] can only be used on struct or enum types",
            ));
        }
    };
    apply_derives(
        attrs,
        vec![
            syn::parse_quote!(Debug),
            syn::parse_quote!(Clone),
            syn::parse_quote!(PartialEq),
        ],
    );

    let (event_type, description) = match &mut item {
        Item::Enum(en) => {
            if cfg.name.is_some() {
                return Err(syn::Error::new(
                    en.ident.span(),
                    "'name' is not allowed on enums; use #[event(name = \"...\")] on variants",
                ));
            }
            let mut type_arms = Vec::new();
            let mut description_arms = Vec::new();
            for variant in en.variants.iter_mut() {
                let overrides = VariantOverrides::take(&mut variant.attrs)?;
                let v_ident = &variant.ident;
                let name = overrides.name.unwrap_or_else(|| {
                    LitStr::new(&format!("{}.{}", en.ident, v_ident), v_ident.span())
                });
                type_arms.push(quote! { Self::#v_ident { .. } => #name });
                let text = overrides.description.or_else(|| cfg.description.clone());
                if let Some(text) = text {
                    description_arms.push(quote! {
                        Self::#v_ident { .. } => ::std::string::ToString::to_string(#text)
                    });
                }
            }

            let event_type = if type_arms.is_empty() {
                quote! { match *self {} }
            } else {
                quote! { match self { #(#type_arms,)* } }
            };
            let description = (!description_arms.is_empty()).then(|| {
                quote! {
                    #[allow(unreachable_patterns)]
                    fn description(&self) -> ::std::string::String {
                        match self {
                            #(#description_arms,)*
                            _ => ::std::string::ToString::to_string(
                                ::uow_domain::domain_event::DomainEvent::event_type(self),
                            ),
                        }
                    }
                }
            });
            (event_type, description)
        }
        _ => {
            let name = cfg
                .name
                .clone()
                .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
            let description = cfg.description.as_ref().map(|text| {
                quote! {
                    fn description(&self) -> ::std::string::String {
                        ::std::string::ToString::to_string(#text)
                    }
                }
            });
            (quote! { #name }, description)
        }
    };

    let phase_markers = (cfg.pre_commit || cfg.post_commit).then(|| {
        let (pre, post) = (cfg.pre_commit, cfg.post_commit);
        quote! {
            fn phase_markers(&self) -> ::uow_domain::domain_event::PhaseMarkers {
                ::uow_domain::domain_event::PhaseMarkers::new(#pre, #post)
            }
        }
    });

    // Describe 基于清理变体属性之后、清理字段属性之前的定义生成
    let input: DeriveInput = syn::parse2(item.to_token_stream())?;
    let describe_impl = describe::expand(&input)?;
    describe::strip_field_attrs(&mut item);

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #item

        #describe_impl

        impl #impl_generics ::uow_domain::domain_event::DomainEvent for #ident #ty_generics #where_clause {
            fn event_type(&self) -> &'static str {
                #event_type
            }

            #description

            #phase_markers
        }
    })
}

struct EventAttrConfig {
    name: Option<LitStr>,
    description: Option<LitStr>,
    pre_commit: bool,
    post_commit: bool,
}

impl syn::parse::Parse for EventAttrConfig {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let AttrArgs(args) = input.parse()?;
        let mut cfg = EventAttrConfig {
            name: None,
            description: None,
            pre_commit: false,
            post_commit: false,
        };

        for arg in args {
            match arg.key.to_string().as_str() {
                "name" => cfg.name = Some(arg.lit_str()?),
                "description" => cfg.description = Some(arg.lit_str()?),
                "pre_commit" => cfg.pre_commit = arg.bool()?,
                "post_commit" => cfg.post_commit = arg.bool()?,
                _ => {
                    return Err(
                        arg.unknown("'name' | 'description' | 'pre_commit' | 'post_commit'")
                    );
                }
            }
        }
        Ok(cfg)
    }
}

#[derive(Default)]
struct VariantOverrides {
    name: Option<LitStr>,
    description: Option<LitStr>,
}

impl VariantOverrides {
    // 读取并移除变体上的 #[event(..)]
    fn take(attrs: &mut Vec<syn::Attribute>) -> Result<Self> {
        let mut overrides = VariantOverrides::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("event")) {
            let AttrArgs(args) = attr.parse_args()?;
            for arg in args {
                let slot = match arg.key.to_string().as_str() {
                    "name" => &mut overrides.name,
                    "description" => &mut overrides.description,
                    _ => return Err(arg.unknown("'name' | 'description'")),
                };
                if slot.is_some() {
                    return Err(syn::Error::new(
                        arg.key.span(),
                        format!("duplicate '{}' specified for this variant", arg.key),
                    ));
                }
                *slot = Some(arg.lit_str()?);
            }
        }
        strip_attrs(attrs, "event");
        Ok(overrides)
    }
}
