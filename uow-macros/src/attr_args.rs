use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Expr, Ident, LitStr, Result, Token, Type, parse::Parse, parse::ParseStream};

/// 以类型作为取值的键
const TYPE_KEYS: &[&str] = &["id"];

/// 宏参数中的一项：`key = value` 或单独的 `flag`
pub(crate) struct AttrArg {
    pub(crate) key: Ident,
    value: Option<AttrValue>,
}

enum AttrValue {
    Expr(Expr),
    Type(Type),
}

impl Parse for AttrArg {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: Ident = input.parse()?;
        let value = if input.peek(Token![=]) {
            let _eq: Token![=] = input.parse()?;
            if TYPE_KEYS.iter().any(|k| key == *k) {
                Some(AttrValue::Type(input.parse()?))
            } else {
                Some(AttrValue::Expr(input.parse()?))
            }
        } else {
            None
        };
        Ok(Self { key, value })
    }
}

/// 逗号分隔的参数列表，解析时检查重复键
pub(crate) struct AttrArgs(pub(crate) Vec<AttrArg>);

impl Parse for AttrArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let list = Punctuated::<AttrArg, Token![,]>::parse_terminated(input)?;
        let mut args: Vec<AttrArg> = Vec::new();
        for arg in list {
            if args.iter().any(|a| a.key == arg.key) {
                return Err(syn::Error::new(
                    arg.key.span(),
                    format!("duplicate key '{}' in attribute", arg.key),
                ));
            }
            args.push(arg);
        }
        Ok(Self(args))
    }
}

impl AttrArg {
    pub(crate) fn lit_str(&self) -> Result<LitStr> {
        match &self.value {
            Some(AttrValue::Expr(Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(lit),
                ..
            }))) => Ok(lit.clone()),
            _ => Err(self.expected("string literal")),
        }
    }

    pub(crate) fn bool(&self) -> Result<bool> {
        match &self.value {
            None => Ok(true),
            Some(AttrValue::Expr(Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Bool(b),
                ..
            }))) => Ok(b.value()),
            _ => Err(self.expected("boolean literal")),
        }
    }

    pub(crate) fn ty(&self) -> Result<Type> {
        match &self.value {
            Some(AttrValue::Type(ty)) => Ok(ty.clone()),
            _ => Err(self.expected("type")),
        }
    }

    pub(crate) fn unknown(&self, expected: &str) -> syn::Error {
        syn::Error::new(
            self.key.span(),
            format!("unknown key '{}'; expected {expected}", self.key),
        )
    }

    fn expected(&self, what: &str) -> syn::Error {
        let span = match &self.value {
            Some(AttrValue::Expr(expr)) => expr.span(),
            Some(AttrValue::Type(ty)) => ty.span(),
            None => self.key.span(),
        };
        syn::Error::new(span, format!("expected {what} for '{}'", self.key))
    }
}
