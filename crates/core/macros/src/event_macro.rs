//! WebhookEvent derive macro implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Visibility, parse_macro_input};

/// Struct level `#[webhook(...)]` options.
#[derive(Default)]
struct EventAttrs {
    name: Option<String>,
    key: Option<String>,
    group: Option<String>,
    label: Option<String>,
    description: Option<String>,
    payload: Option<Ident>,
}

/// How a single field is reflected.
enum FieldMode {
    Convert,
    Skip,
    Opaque,
    Serialize,
    Export,
}

struct ReflectedField {
    ident: Ident,
    name: String,
    mode: FieldMode,
    ty: syn::Type,
}

/// Implements the WebhookEvent derive macro.
pub fn derive_webhook_event_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let attrs = parse_event_attrs(input)?;

    let type_name = attrs.name.clone().unwrap_or_else(|| name.to_string());

    match &attrs.key {
        Some(key) => {
            let payload = attrs.payload.as_ref().ok_or_else(|| {
                syn::Error::new_spanned(
                    name,
                    "#[webhook(key = ..)] requires #[webhook(payload = \"method\")]",
                )
            })?;
            let descriptor = descriptor_tokens(key, &attrs);

            Ok(quote! {
                impl #impl_generics ::outpost_events::WebhookEvent for #name #ty_generics #where_clause {
                    fn type_name(&self) -> &'static str {
                        #type_name
                    }

                    fn kind(&self) -> ::outpost_events::EventKind<'_> {
                        ::outpost_events::EventKind::SelfDescribing(self)
                    }

                    fn as_any(&self) -> &dyn ::std::any::Any {
                        self
                    }
                }

                impl #impl_generics ::outpost_events::SelfDescribingEvent for #name #ty_generics #where_clause {
                    fn descriptor(&self) -> ::outpost_events::EventDescriptor {
                        #descriptor
                    }

                    fn webhook_payload(
                        &self,
                    ) -> ::outpost_events::__private::serde_json::Map<
                        ::std::string::String,
                        ::outpost_events::__private::serde_json::Value,
                    > {
                        self.#payload()
                    }
                }

                impl #impl_generics ::outpost_events::EventType for #name #ty_generics #where_clause {
                    const TYPE_NAME: &'static str = #type_name;

                    fn descriptor() -> ::std::option::Option<::outpost_events::EventDescriptor> {
                        ::std::option::Option::Some(#descriptor)
                    }
                }
            })
        }
        None => {
            if attrs.payload.is_some() {
                return Err(syn::Error::new_spanned(
                    name,
                    "#[webhook(payload = ..)] requires #[webhook(key = \"group.name\")]",
                ));
            }

            let fields = reflected_fields(&input.data, name)?;
            let inserts = fields.iter().filter_map(field_insert);

            Ok(quote! {
                impl #impl_generics ::outpost_events::WebhookEvent for #name #ty_generics #where_clause {
                    fn type_name(&self) -> &'static str {
                        #type_name
                    }

                    fn kind(&self) -> ::outpost_events::EventKind<'_> {
                        ::outpost_events::EventKind::Plain(self)
                    }

                    fn as_any(&self) -> &dyn ::std::any::Any {
                        self
                    }
                }

                impl #impl_generics ::outpost_events::PlainEvent for #name #ty_generics #where_clause {
                    #[allow(unused_mut)]
                    fn public_fields(&self) -> ::outpost_events::Fields {
                        let mut fields = ::outpost_events::Fields::new();
                        #(#inserts)*
                        fields
                    }
                }

                impl #impl_generics ::outpost_events::EventType for #name #ty_generics #where_clause {
                    const TYPE_NAME: &'static str = #type_name;
                }
            })
        }
    }
}

fn descriptor_tokens(key: &str, attrs: &EventAttrs) -> TokenStream2 {
    let mut tokens = quote! { ::outpost_events::EventDescriptor::new(#key) };
    if let Some(group) = &attrs.group {
        tokens = quote! { #tokens.with_group(#group) };
    }
    if let Some(label) = &attrs.label {
        tokens = quote! { #tokens.with_label(#label) };
    }
    if let Some(description) = &attrs.description {
        tokens = quote! { #tokens.with_description(#description) };
    }
    tokens
}

fn field_insert(field: &ReflectedField) -> Option<TokenStream2> {
    let ident = &field.ident;
    let name = &field.name;
    let ty = &field.ty;
    let value = match field.mode {
        FieldMode::Skip => return None,
        FieldMode::Convert => quote! {
            ::outpost_events::ToFieldValue::to_field_value(&self.#ident)
        },
        FieldMode::Opaque => quote! {
            ::outpost_events::FieldValue::opaque::<#ty>()
        },
        FieldMode::Serialize => quote! {
            ::outpost_events::FieldValue::serializable(&self.#ident)
        },
        FieldMode::Export => quote! {
            ::outpost_events::FieldValue::Exportable(::std::sync::Arc::new(
                ::std::clone::Clone::clone(&self.#ident),
            ))
        },
    };
    Some(quote! {
        fields.insert(::std::string::String::from(#name), #value);
    })
}

fn parse_event_attrs(input: &DeriveInput) -> syn::Result<EventAttrs> {
    let mut attrs = EventAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("webhook") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let value = |meta: &syn::meta::ParseNestedMeta| -> syn::Result<String> {
                let lit: LitStr = meta.value()?.parse()?;
                Ok(lit.value())
            };

            if meta.path.is_ident("name") {
                attrs.name = Some(value(&meta)?);
            } else if meta.path.is_ident("key") {
                attrs.key = Some(value(&meta)?);
            } else if meta.path.is_ident("group") {
                attrs.group = Some(value(&meta)?);
            } else if meta.path.is_ident("label") {
                attrs.label = Some(value(&meta)?);
            } else if meta.path.is_ident("description") {
                attrs.description = Some(value(&meta)?);
            } else if meta.path.is_ident("payload") {
                let method = value(&meta)?;
                attrs.payload = Some(syn::parse_str(&method)?);
            } else {
                return Err(meta.error("unknown webhook attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

fn reflected_fields(data: &Data, name: &Ident) -> syn::Result<Vec<ReflectedField>> {
    let data_struct = match data {
        Data::Struct(data_struct) => data_struct,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "WebhookEvent can only be derived for structs",
            ));
        }
    };

    let named = match &data_struct.fields {
        Fields::Named(fields) => &fields.named,
        Fields::Unit => return Ok(Vec::new()),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "WebhookEvent requires named fields",
            ));
        }
    };

    let mut fields = Vec::new();
    for field in named {
        if !matches!(field.vis, Visibility::Public(_)) {
            continue;
        }
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        let mut mode = FieldMode::Convert;
        let mut rename = None;
        for attr in &field.attrs {
            if !attr.path().is_ident("webhook") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    mode = FieldMode::Skip;
                } else if meta.path.is_ident("opaque") {
                    mode = FieldMode::Opaque;
                } else if meta.path.is_ident("serialize") {
                    mode = FieldMode::Serialize;
                } else if meta.path.is_ident("export") {
                    mode = FieldMode::Export;
                } else if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    rename = Some(lit.value());
                } else {
                    return Err(meta.error("unknown webhook field attribute"));
                }
                Ok(())
            })?;
        }

        let name = rename.unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        fields.push(ReflectedField {
            ident,
            name,
            mode,
            ty: field.ty.clone(),
        });
    }

    Ok(fields)
}
