use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::collections::HashSet;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, parse_macro_input, spanned::Spanned};

/// Columns owned by the table service.
const RESERVED_COLUMNS: [&str; 3] = ["PartitionKey", "RowKey", "Timestamp"];

#[proc_macro_derive(TableEntity, attributes(column))]
pub fn derive_table_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_table_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(TableEnum)]
pub fn derive_table_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_table_enum(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct MappedField {
    ident: Ident,
    column: String,
}

fn expand_table_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "TableEntity cannot be derived for generic types; register the mapping by hand",
        ));
    }

    let fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(named) => named.named,
            _ => {
                return Err(syn::Error::new(
                    struct_name.span(),
                    "TableEntity supports only structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "TableEntity can only be derived for structs",
            ));
        }
    };

    let mut mapped = Vec::new();
    let mut seen = HashSet::new();

    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let Some(column) = parse_column_name(&field.attrs, &ident)? else {
            continue;
        };

        if column.trim().is_empty() {
            return Err(syn::Error::new(field.span(), "column name must not be empty"));
        }
        if RESERVED_COLUMNS.contains(&column.as_str()) {
            return Err(syn::Error::new(
                field.span(),
                format!("column name '{column}' is reserved by the table service"),
            ));
        }
        if !seen.insert(column.clone()) {
            return Err(syn::Error::new(
                field.span(),
                format!("column name '{column}' is mapped more than once"),
            ));
        }

        mapped.push(MappedField { ident, column });
    }

    let bindings = mapped.iter().map(|field| {
        let ident = &field.ident;
        let column = &field.column;
        quote! {
            .column(
                #column,
                |record: &#struct_name| &record.#ident,
                |record: &mut #struct_name| &mut record.#ident,
            )
        }
    });

    Ok(quote! {
        impl ::tablestore::mapping::TableEntity for #struct_name {
            fn entity_mapping() -> ::std::sync::Arc<::tablestore::mapping::EntityMapping<Self>> {
                static MAPPING: ::std::sync::OnceLock<
                    ::std::sync::Arc<::tablestore::mapping::EntityMapping<#struct_name>>,
                > = ::std::sync::OnceLock::new();

                ::std::sync::Arc::clone(MAPPING.get_or_init(|| {
                    ::std::sync::Arc::new(
                        ::tablestore::mapping::EntityMapping::<#struct_name>::builder()
                            #(#bindings)*
                            .build_checked_at_compile_time(),
                    )
                }))
            }
        }
    })
}

/// `#[column]`, `#[column("Name")]` or `#[column(name = "Name")]`; `None` when absent.
fn parse_column_name(attrs: &[syn::Attribute], ident: &Ident) -> syn::Result<Option<String>> {
    let mut column: Option<String> = None;

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }

        if column.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "Duplicate #[column(...)] attribute on field",
            ));
        }

        let name = match &attr.meta {
            syn::Meta::Path(_) => ident.to_string(),
            syn::Meta::List(list) => {
                if let Ok(lit) = list.parse_args::<LitStr>() {
                    lit.value()
                } else {
                    let mut named: Option<String> = None;
                    list.parse_nested_meta(|meta| {
                        if meta.path.is_ident("name") {
                            let value = meta.value()?;
                            let lit: LitStr = value.parse()?;
                            named = Some(lit.value());
                            return Ok(());
                        }

                        Err(meta.error(concat!(
                            "Unsupported #[column(...)] option. ",
                            "Supported: \"Name\", name = \"...\"",
                        )))
                    })?;
                    named.unwrap_or_else(|| ident.to_string())
                }
            }
            syn::Meta::NameValue(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    concat!(
                        "Unsupported #[column = ...] syntax. ",
                        "Use #[column], #[column(\"Name\")] or #[column(name = \"Name\")]",
                    ),
                ));
            }
        };

        column = Some(name);
    }

    Ok(column)
}

fn expand_table_enum(input: DeriveInput) -> syn::Result<TokenStream2> {
    let enum_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "TableEnum cannot be derived for generic types",
        ));
    }

    let Data::Enum(data) = input.data else {
        return Err(syn::Error::new(
            enum_name.span(),
            "TableEnum can only be derived for enums",
        ));
    };

    if data.variants.is_empty() {
        return Err(syn::Error::new(
            enum_name.span(),
            "TableEnum needs at least one variant",
        ));
    }

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "TableEnum supports only fieldless variants",
            ));
        }
        variants.push(&variant.ident);
    }

    let names = variants.iter().map(|variant| variant.to_string());
    let declared = variants.iter().zip(names).map(|(variant, name)| {
        quote!((#name, #enum_name::#variant as i32))
    });
    let ordinal_arms = variants.iter().map(|variant| {
        quote!(#enum_name::#variant => #enum_name::#variant as i32)
    });
    let restore_checks = variants.iter().map(|variant| {
        quote! {
            if ordinal == #enum_name::#variant as i32 {
                return ::std::option::Option::Some(#enum_name::#variant);
            }
        }
    });

    Ok(quote! {
        impl ::tablestore::mapping::Enumerant for #enum_name {
            const VARIANTS: &'static [(&'static str, i32)] = &[#(#declared),*];

            fn ordinal(&self) -> i32 {
                match self {
                    #(#ordinal_arms,)*
                }
            }

            fn from_ordinal(ordinal: i32) -> ::std::option::Option<Self> {
                #(#restore_checks)*
                ::std::option::Option::None
            }
        }

        impl ::tablestore::mapping::ColumnValue for #enum_name {
            const KIND: ::tablestore::ValueKind = ::tablestore::ValueKind::Int32;

            fn to_typed(
                &self,
            ) -> ::tablestore::Result<::std::option::Option<::tablestore::TypedValue>> {
                ::std::result::Result::Ok(::std::option::Option::Some(
                    ::tablestore::mapping::enumerant_to_typed(self),
                ))
            }

            fn from_typed(value: ::tablestore::TypedValue) -> ::tablestore::Result<Self> {
                ::tablestore::mapping::enumerant_from_typed(value)
            }
        }
    })
}
