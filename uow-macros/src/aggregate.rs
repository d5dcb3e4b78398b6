use crate::attr_args::AttrArgs;
use crate::derive_utils::apply_derives;
use crate::field_utils::{append_missing_field, ensure_leading_field};
use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::spanned::Spanned;
use syn::{Item, LitStr, Result, Type};

/// #[aggregate] 宏实现
/// - 确保 `id: IdType` 位于字段最前（已存在则复用原定义与类型）
/// - 缺失时在末尾追加 `#[serde(skip)] events: EventRecorder`
/// - 派生 Debug（`debug = false` 时不派生）、Default、Serialize、Deserialize
/// - 实现 `Entity`、`Aggregate`，以及作为聚合边界的 `Describe`（只记录键）
/// - 参数：`#[aggregate(name = "...", id = IdType, debug = true|false)]`；
///   `name` 默认为结构体名，`id` 默认 `String`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> Result<TokenStream> {
    let cfg: AggregateAttrConfig = syn::parse2(attr)?;
    let mut st = match syn::parse2::<Item>(item)? {
        Item::Struct(s) => s,
        other => return Err(syn::Error::new(other.span(), "#[aggregate] only on struct")),
    };

    let ident = st.ident.clone();
    let fields = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return Err(syn::Error::new(
                st.span(),
                "#[aggregate] only supports named-field struct",
            ));
        }
    };

    // 未指定 id 类型时沿用已声明的 id 字段，否则为 String
    let declared = fields
        .named
        .iter()
        .find(|f| f.ident.as_ref().is_some_and(|i| i == "id"))
        .map(|f| f.ty.clone());
    let id_type: Type = match (cfg.id_ty, declared) {
        (Some(ty), Some(declared)) if !same_type(&ty, &declared) => {
            return Err(syn::Error::new(
                declared.span(),
                "declared id field type differs from #[aggregate(id = ..)]",
            ));
        }
        (Some(ty), _) => ty,
        (None, Some(declared)) => declared,
        (None, None) => syn::parse_quote! { String },
    };
    ensure_leading_field(fields, "id", &id_type);
    append_missing_field(
        fields,
        "events",
        syn::parse_quote! {
            #[serde(skip)]
            events: ::uow_domain::aggregate::EventRecorder
        },
    );

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Default),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    if cfg.derive_debug {
        required.insert(0, syn::parse_quote!(Debug));
    }
    apply_derives(&mut st.attrs, required);

    let name = cfg
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let type_name = ident.to_string();
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    Ok(quote! {
        #st

        impl #impl_generics ::uow_domain::entity::Entity for #ident #ty_generics #where_clause {
            type Id = #id_type;

            fn new(id: Self::Id) -> Self {
                Self { id, ..::std::default::Default::default() }
            }

            fn id(&self) -> &Self::Id { &self.id }
        }

        impl #impl_generics ::uow_domain::aggregate::Aggregate for #ident #ty_generics #where_clause {
            const TYPE: &'static str = #name;

            fn recorder(&self) -> &::uow_domain::aggregate::EventRecorder { &self.events }

            fn recorder_mut(&mut self) -> &mut ::uow_domain::aggregate::EventRecorder { &mut self.events }
        }

        impl #impl_generics ::uow_domain::describe::Describe for #ident #ty_generics #where_clause {
            fn describe(&self) -> ::uow_domain::describe::DetailValue {
                ::uow_domain::describe::DetailValue::Aggregate {
                    type_name: ::std::string::ToString::to_string(#type_name),
                    key: ::std::string::ToString::to_string(&self.id),
                }
            }
        }
    })
}

fn same_type(a: &Type, b: &Type) -> bool {
    a.to_token_stream().to_string() == b.to_token_stream().to_string()
}

struct AggregateAttrConfig {
    name: Option<LitStr>,
    id_ty: Option<Type>,
    derive_debug: bool,
}

impl syn::parse::Parse for AggregateAttrConfig {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let AttrArgs(args) = input.parse()?;
        let mut cfg = AggregateAttrConfig {
            name: None,
            id_ty: None,
            derive_debug: true,
        };

        for arg in args {
            match arg.key.to_string().as_str() {
                "name" => cfg.name = Some(arg.lit_str()?),
                "id" => cfg.id_ty = Some(arg.ty()?),
                "debug" => cfg.derive_debug = arg.bool()?,
                _ => return Err(arg.unknown("'name' | 'id' | 'debug'")),
            }
        }
        Ok(cfg)
    }
}
